//! Invariants for `partition`, `flatten` and `checksum`.
//!
//! - partition is a stable, lossless split;
//! - flatten visits leaves in the same order as a naive recursive walk;
//! - checksum depends only on the concatenated bytes.

use kpx_util::{checksum, checksum_one, flatten, partition, Flat, Nested};
use proptest::prelude::*;

/// Reference recursive walk used to check the iterative flattener.
fn walk<'a>(n: &'a Nested<u8>, out: &mut Vec<Flat<'a, u8>>) {
    match n {
        Nested::Scalar(x) => out.push(Flat::Scalar(x)),
        Nested::Text(s) => out.push(Flat::Text(s)),
        Nested::Seq(v) => v.iter().for_each(|c| walk(c, out)),
    }
}

fn arb_nested() -> impl Strategy<Value = Nested<u8>> {
    let leaf = prop_oneof![
        any::<u8>().prop_map(Nested::Scalar),
        "[a-z]{0,4}".prop_map(Nested::Text),
    ];
    leaf.prop_recursive(4, 64, 6, |inner| {
        prop::collection::vec(inner, 0..6).prop_map(Nested::Seq)
    })
}

proptest! {
    #[test]
    fn partition_is_stable_and_lossless(xs in prop::collection::vec(any::<i32>(), 0..64), k in 1i32..7) {
        let p = |x: &i32| x.rem_euclid(k) == 0;
        let (trues, falses) = partition(p, xs.clone());

        prop_assert_eq!(trues.len() + falses.len(), xs.len());
        prop_assert!(trues.iter().all(p));
        prop_assert!(!falses.iter().any(p));

        // Relative order inside each side matches the input.
        let expect_t: Vec<i32> = xs.iter().copied().filter(p).collect();
        let expect_f: Vec<i32> = xs.iter().copied().filter(|x| !p(x)).collect();
        prop_assert_eq!(trues, expect_t);
        prop_assert_eq!(falses, expect_f);
    }

    #[test]
    fn flatten_matches_recursive_walk(items in prop::collection::vec(arb_nested(), 0..8)) {
        let mut expected = Vec::new();
        for n in &items {
            walk(n, &mut expected);
        }
        let got: Vec<_> = flatten(&items).collect();
        prop_assert_eq!(got, expected);
    }

    #[test]
    fn checksum_ignores_element_boundaries(bytes in prop::collection::vec(any::<u8>(), 0..128), cut in any::<prop::sample::Index>()) {
        let at = cut.index(bytes.len() + 1);
        let (a, b) = bytes.split_at(at);
        prop_assert_eq!(checksum([a, b]), checksum_one(&bytes));
    }
}

#[test]
fn partition_of_empty_is_empty() {
    let (t, f) = partition(|_: &i32| false, []);
    assert!(t.is_empty() && f.is_empty());
}
