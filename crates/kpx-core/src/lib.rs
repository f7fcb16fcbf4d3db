//! `kpx-core`: KeePassX (KDB v1) group/entry model and plaintext codecs.
//!
//! This crate owns the data the `kpx-util` helpers operate on:
//! - the group/entry tree (`Root`, `Group`, `Entry`) and its edit operations,
//! - packed 5-byte KDB timestamps,
//! - the fixed 124-byte KDB header,
//! - the TLV record codec for the database body,
//! - key derivation and AES-256-CBC body encryption, and
//! - JSON/CBOR I/O for trees plus `header || body` database files.
//!
//! ```rust
//! use kpx_core::{EntryOptions, Root};
//!
//! let mut root = Root::new();
//! let gid = root.add_group("Internet")?.group_id;
//! root.add_entry(gid, "mail", EntryOptions::default())?;
//!
//! let mut out = Vec::new();
//! root.write_tree(&mut out)?;
//! assert_eq!(String::from_utf8(out)?, "***[Internet]***\n  -mail\n");
//! # Ok::<(), anyhow::Error>(())
//! ```

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
// Small, explicit allowlist to keep docs readable and APIs ergonomic.
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::doc_markdown
)]

/// TLV record codec for the plaintext database body.
pub mod body;
/// Key derivation and AES-256-CBC body encryption.
pub mod crypto;
/// Database entries.
pub mod entry;
/// Groups and per-group edit operations.
pub mod group;
/// The fixed-size KDB header.
pub mod header;
/// Group id allocation.
pub mod ids;
/// JSON/CBOR and plaintext database file helpers.
pub mod io;
/// Packed 5-byte KDB timestamps.
pub mod packed_time;
/// The database tree root.
pub mod root;
/// Identifier newtypes and clock helpers.
pub mod types;

pub use body::{decode_body, encode_body, open, seal};
pub use entry::Entry;
pub use group::{EntryOptions, Group};
pub use header::{Cipher, Header, HEADER_SIZE};
pub use ids::GroupIds;
pub use root::Root;
pub use types::{now, EntryUuid, GroupId};
