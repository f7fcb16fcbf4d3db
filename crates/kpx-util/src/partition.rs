//! Split a sequence into `(trues, falses)` by a predicate.
//!
//! Both outputs keep the relative order of the input, and every input item
//! lands in exactly one of them.

/// Partition `items` by `pred`.
///
/// Items for which `pred` returns `true` go to the first vector, all others
/// to the second. Empty input yields two empty vectors.
pub fn partition<T, I, P>(mut pred: P, items: I) -> (Vec<T>, Vec<T>)
where
    I: IntoIterator<Item = T>,
    P: FnMut(&T) -> bool,
{
    let mut trues = Vec::new();
    let mut falses = Vec::new();

    for item in items {
        if pred(&item) {
            trues.push(item);
        } else {
            falses.push(item);
        }
    }

    (trues, falses)
}

/// Fallible [`partition`]: the first predicate error aborts the whole call.
///
/// No partial result is returned on error.
pub fn try_partition<T, E, I, P>(mut pred: P, items: I) -> Result<(Vec<T>, Vec<T>), E>
where
    I: IntoIterator<Item = T>,
    P: FnMut(&T) -> Result<bool, E>,
{
    let mut trues = Vec::new();
    let mut falses = Vec::new();

    for item in items {
        if pred(&item)? {
            trues.push(item);
        } else {
            falses.push(item);
        }
    }

    Ok((trues, falses))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_and_keeps_order() {
        let (trues, falses) = partition(|x: &i32| *x == 1, [1, 2, 3, 1, 2, 3, 1]);
        assert_eq!(trues, vec![1, 1, 1]);
        assert_eq!(falses, vec![2, 3, 2, 3]);
    }

    #[test]
    fn empty_input() {
        let (trues, falses) = partition(|_: &u8| true, Vec::<u8>::new());
        assert!(trues.is_empty());
        assert!(falses.is_empty());
    }

    #[test]
    fn owned_non_copy_items() {
        let words = vec!["alpha".to_string(), "be".into(), "gamma".into()];
        let (long, short) = partition(|w: &String| w.len() > 2, words);
        assert_eq!(long, ["alpha", "gamma"]);
        assert_eq!(short, ["be"]);
    }

    #[test]
    fn try_partition_fails_fast() {
        let mut seen = 0;
        let r: Result<(Vec<i32>, Vec<i32>), String> = try_partition(
            |x: &i32| {
                seen += 1;
                if *x < 0 {
                    Err(format!("negative: {x}"))
                } else {
                    Ok(*x > 2)
                }
            },
            [1, 3, -1, 4],
        );
        assert_eq!(r.unwrap_err(), "negative: -1");
        // stops at the failing item
        assert_eq!(seen, 3);
    }

    #[test]
    fn try_partition_ok() {
        let r: Result<_, ()> = try_partition(|x: &i32| Ok(*x > 2), [1, 3, 4]);
        assert_eq!(r, Ok((vec![3, 4], vec![1])));
    }
}
