//! SHA-256 over an ordered sequence of byte-strings.
//!
//! Elements are fed to one hasher in order with **no** length prefix or
//! separator, so `["a", "b"]` and `["ab"]` hash identically. Callers that need
//! domain separation must encode it into the elements themselves.

use sha2::{Digest as _, Sha256};

/// Digest length in bytes.
pub const DIGEST_LEN: usize = 32;

/// A SHA-256 digest.
pub type Digest = [u8; DIGEST_LEN];

/// Hash every element of `items`, in order, into a single digest.
#[must_use]
pub fn checksum<I, B>(items: I) -> Digest
where
    I: IntoIterator<Item = B>,
    B: AsRef<[u8]>,
{
    let mut h = Sha256::new();
    for item in items {
        h.update(item.as_ref());
    }
    h.finalize().into()
}

/// Hash a single byte-string (one update).
#[must_use]
pub fn checksum_one(bytes: impl AsRef<[u8]>) -> Digest {
    Sha256::digest(bytes.as_ref()).into()
}

/// Lowercase hex rendering of a digest.
#[must_use]
pub fn to_hex(d: &Digest) -> String {
    hex::encode(d)
}
