//! Lazy, depth-first flattening of nested values.
//!
//! A [`Nested`] value is one of three kinds, resolved once per element:
//!
//! - `Scalar(T)`: yielded as-is;
//! - `Text(String)`: yielded whole, never split into characters;
//! - `Seq(Vec<Nested<T>>)`: recursed into, left to right.
//!
//! [`flatten`] keeps an explicit stack of slice iterators, so deep nesting
//! costs heap, not call stack, and nothing is produced before it is asked for.

use std::slice;

/// A nested value: scalar leaf, atomic text leaf, or a sequence to recurse into.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Nested<T> {
    /// Non-iterable leaf.
    Scalar(T),
    /// Text leaf; iterable in principle, but treated as atomic.
    Text(String),
    /// Container whose elements are flattened in turn.
    Seq(Vec<Nested<T>>),
}

impl<T> Nested<T> {
    /// Build a sequence from anything convertible into nested values.
    pub fn seq<I, U>(items: I) -> Self
    where
        I: IntoIterator<Item = U>,
        U: Into<Self>,
    {
        Self::Seq(items.into_iter().map(Into::into).collect())
    }

    /// Flatten this single value (a leaf yields itself).
    #[must_use]
    pub fn flatten(&self) -> Flatten<'_, T> {
        flatten(slice::from_ref(self))
    }

    /// Whether this value is a leaf (scalar or text).
    #[inline]
    #[must_use]
    pub const fn is_leaf(&self) -> bool {
        !matches!(self, Self::Seq(_))
    }
}

impl<T> From<&str> for Nested<T> {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl<T> From<String> for Nested<T> {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl<T> From<Vec<Self>> for Nested<T> {
    fn from(v: Vec<Self>) -> Self {
        Self::Seq(v)
    }
}

/// A flattened leaf borrowed from the input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flat<'a, T> {
    /// A scalar leaf.
    Scalar(&'a T),
    /// A text leaf.
    Text(&'a str),
}

impl<'a, T> Flat<'a, T> {
    /// The scalar, if this leaf is one.
    #[must_use]
    pub const fn scalar(self) -> Option<&'a T> {
        match self {
            Self::Scalar(x) => Some(x),
            Self::Text(_) => None,
        }
    }

    /// The text, if this leaf is text.
    #[must_use]
    pub const fn text(self) -> Option<&'a str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Scalar(_) => None,
        }
    }
}

/// Iterator returned by [`flatten`].
#[derive(Clone, Debug)]
pub struct Flatten<'a, T> {
    stack: Vec<slice::Iter<'a, Nested<T>>>,
}

/// Flatten `items` depth-first, left to right.
///
/// The iterator is single-pass; call `flatten` again to restart.
#[must_use]
pub fn flatten<T>(items: &[Nested<T>]) -> Flatten<'_, T> {
    Flatten { stack: vec![items.iter()] }
}

impl<'a, T> Iterator for Flatten<'a, T> {
    type Item = Flat<'a, T>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let top = self.stack.last_mut()?;
            match top.next() {
                None => {
                    self.stack.pop();
                }
                Some(Nested::Scalar(x)) => return Some(Flat::Scalar(x)),
                Some(Nested::Text(s)) => return Some(Flat::Text(s)),
                Some(Nested::Seq(inner)) => self.stack.push(inner.iter()),
            }
        }
    }
}

impl<T> std::iter::FusedIterator for Flatten<'_, T> {}
