//! The fixed 124-byte KDB v1 header.
//!
//! Layout (all integers little-endian):
//!
//! | offset | size | field                |
//! |-------:|-----:|----------------------|
//! |      0 |    4 | signature1           |
//! |      4 |    4 | signature2           |
//! |      8 |    4 | flags                |
//! |     12 |    4 | version              |
//! |     16 |   16 | final_random_seed    |
//! |     32 |   16 | encryption_iv        |
//! |     48 |    4 | num_groups           |
//! |     52 |    4 | num_entries          |
//! |     56 |   32 | contents_hash        |
//! |     88 |   32 | transf_random_seed   |
//! |    120 |    4 | key_transf_rounds    |

use anyhow::{bail, Result};
use kpx_util::Digest;
use serde::{Deserialize, Serialize};

/// Encoded header size.
pub const HEADER_SIZE: usize = 124;

/// First file signature.
pub const SIGNATURE_1: u32 = 0x9AA2_D903;
/// Second file signature.
pub const SIGNATURE_2: u32 = 0xB54B_FB65;
/// Supported format version (the low byte may vary).
pub const VERSION: u32 = 0x0003_0002;
/// Flag bit: Rijndael (AES) body cipher.
pub const FLAG_RIJNDAEL: u32 = 2;
/// Flag bit: Twofish body cipher.
pub const FLAG_TWOFISH: u32 = 8;
/// Key transform rounds used for new databases.
pub const DEFAULT_KEY_ROUNDS: u32 = 50_000;

/// Body cipher named by the header flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cipher {
    /// AES-256-CBC.
    Rijndael,
    /// Twofish-CBC.
    Twofish,
}

/// Decoded header.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Header {
    /// Must equal [`SIGNATURE_1`].
    pub signature1: u32,
    /// Must equal [`SIGNATURE_2`].
    pub signature2: u32,
    /// Cipher flags.
    pub flags: u32,
    /// Format version.
    pub version: u32,
    /// Seed mixed into the final key.
    #[serde(with = "hex::serde")]
    pub final_random_seed: [u8; 16],
    /// Body cipher IV.
    #[serde(with = "hex::serde")]
    pub encryption_iv: [u8; 16],
    /// Number of group records in the body.
    pub num_groups: u32,
    /// Number of entry records in the body.
    pub num_entries: u32,
    /// SHA-256 of the plaintext body.
    #[serde(with = "hex::serde")]
    pub contents_hash: Digest,
    /// Seed for the key transform.
    #[serde(with = "hex::serde")]
    pub transf_random_seed: [u8; 32],
    /// Key transform rounds.
    pub key_transf_rounds: u32,
}

impl Default for Header {
    fn default() -> Self {
        Self::new()
    }
}

/// Little-endian cursor over a header buffer; length is checked up front.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl Reader<'_> {
    fn bytes<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.buf[self.pos..self.pos + N]);
        self.pos += N;
        out
    }

    fn u32(&mut self) -> u32 {
        u32::from_le_bytes(self.bytes())
    }
}

impl Header {
    /// A header for a new database: Rijndael, fresh random seeds and IV,
    /// [`DEFAULT_KEY_ROUNDS`], zero counts and an all-zero hash.
    #[must_use]
    pub fn new() -> Self {
        Self {
            signature1: SIGNATURE_1,
            signature2: SIGNATURE_2,
            flags: FLAG_RIJNDAEL,
            version: VERSION,
            final_random_seed: rand::random(),
            encryption_iv: rand::random(),
            num_groups: 0,
            num_entries: 0,
            contents_hash: [0u8; 32],
            transf_random_seed: rand::random(),
            key_transf_rounds: DEFAULT_KEY_ROUNDS,
        }
    }

    /// Cipher selected by the flags (Rijndael wins if both bits are set).
    pub fn cipher(&self) -> Result<Cipher> {
        if self.flags & FLAG_RIJNDAEL != 0 {
            Ok(Cipher::Rijndael)
        } else if self.flags & FLAG_TWOFISH != 0 {
            Ok(Cipher::Twofish)
        } else {
            bail!("unknown encryption algorithm (flags {:#x})", self.flags)
        }
    }

    /// Refresh the per-save randomness (final seed and IV).
    pub fn reseed(&mut self) {
        self.final_random_seed = rand::random();
        self.encryption_iv = rand::random();
    }

    /// Encode to the fixed wire layout.
    #[must_use]
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        let parts: [&[u8]; 11] = [
            &self.signature1.to_le_bytes(),
            &self.signature2.to_le_bytes(),
            &self.flags.to_le_bytes(),
            &self.version.to_le_bytes(),
            &self.final_random_seed,
            &self.encryption_iv,
            &self.num_groups.to_le_bytes(),
            &self.num_entries.to_le_bytes(),
            &self.contents_hash,
            &self.transf_random_seed,
            &self.key_transf_rounds.to_le_bytes(),
        ];
        let mut pos = 0;
        for p in parts {
            out[pos..pos + p.len()].copy_from_slice(p);
            pos += p.len();
        }
        out
    }

    /// Decode and validate the first [`HEADER_SIZE`] bytes of `data`.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            bail!(
                "unexpected file size: {} bytes is smaller than the {HEADER_SIZE}-byte header",
                data.len()
            );
        }
        let mut r = Reader { buf: &data[..HEADER_SIZE], pos: 0 };
        let h = Self {
            signature1: r.u32(),
            signature2: r.u32(),
            flags: r.u32(),
            version: r.u32(),
            final_random_seed: r.bytes(),
            encryption_iv: r.bytes(),
            num_groups: r.u32(),
            num_entries: r.u32(),
            contents_hash: r.bytes(),
            transf_random_seed: r.bytes(),
            key_transf_rounds: r.u32(),
        };

        if h.signature1 != SIGNATURE_1 || h.signature2 != SIGNATURE_2 {
            bail!("wrong signature");
        }
        if h.version & 0xFFFF_FF00 != VERSION & 0xFFFF_FF00 {
            bail!("unsupported file version {:#010x}", h.version);
        }
        h.cipher()?;
        Ok(h)
    }
}
