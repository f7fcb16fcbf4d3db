//! `kpx-util`: small sequence and tree helpers used across the KPX workspace.
//!
//! Four independent building blocks:
//!
//! - `partition`: split a sequence in two by a predicate, keeping order.
//! - `flatten`: lazily flatten arbitrarily nested [`flatten::Nested`] values,
//!   treating text as atomic.
//! - `checksum`: SHA-256 over an ordered sequence of byte-strings (plain
//!   concatenation, no delimiting between elements).
//! - `tree`: render a tree of titled groups and entries as indented text.
//!
//! ```rust
//! use kpx_util::partition::partition;
//!
//! let (even, odd) = partition(|x: &u32| x % 2 == 0, [1, 2, 3, 4]);
//! assert_eq!(even, vec![2, 4]);
//! assert_eq!(odd, vec![1, 3]);
//! ```

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(
    missing_docs,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]

/// SHA-256 over ordered byte-strings.
pub mod checksum;
/// Lazy depth-first flattening of nested values.
pub mod flatten;
/// Order-preserving two-way split.
pub mod partition;
/// Indented group/entry tree rendering.
pub mod tree;

pub use checksum::{checksum, checksum_one, to_hex, Digest, DIGEST_LEN};
pub use flatten::{flatten, Flat, Flatten, Nested};
pub use partition::{partition, try_partition};
pub use tree::{print_group_tree, write_group_tree, GroupNode, Titled};
