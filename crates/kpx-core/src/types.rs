//! Identifier newtypes shared by groups and entries.
//!
//! Serialized forms stay conservative: `GroupId` is a bare number and
//! `EntryUuid` a 32-character lowercase hex string.

use anyhow::{anyhow, Context};
use chrono::{Local, NaiveDateTime, SubsecRound};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Group identifier (non-zero for valid groups).
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct GroupId(pub u32);

impl GroupId {
    /// Whether this id may name a stored group.
    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 16-byte entry identifier.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct EntryUuid(pub [u8; 16]);

impl EntryUuid {
    /// A fresh random identifier.
    #[must_use]
    pub fn random() -> Self {
        Self(rand::random())
    }

    /// Whether this id may name a stored entry.
    #[inline]
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.0 != [0u8; 16]
    }
}

impl fmt::Display for EntryUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl From<EntryUuid> for String {
    fn from(u: EntryUuid) -> Self {
        u.to_string()
    }
}

impl TryFrom<String> for EntryUuid {
    type Error = anyhow::Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        let bytes = hex::decode(&s).with_context(|| format!("entry uuid {s:?} is not hex"))?;
        let arr: [u8; 16] = bytes
            .try_into()
            .map_err(|v: Vec<u8>| anyhow!("entry uuid must be 16 bytes, got {}", v.len()))?;
        Ok(Self(arr))
    }
}

/// Local wall-clock time truncated to whole seconds (the KDB resolution).
#[must_use]
pub fn now() -> NaiveDateTime {
    Local::now().naive_local().trunc_subsecs(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_hex_roundtrip() {
        let u = EntryUuid([0xAB; 16]);
        let s = String::from(u);
        assert_eq!(s, "ab".repeat(16));
        assert_eq!(EntryUuid::try_from(s).unwrap(), u);
    }

    #[test]
    fn uuid_rejects_bad_input() {
        assert!(EntryUuid::try_from("zz".to_string()).is_err());
        assert!(EntryUuid::try_from("abcd".to_string()).is_err());
    }

    #[test]
    fn validity() {
        assert!(!GroupId(0).is_valid());
        assert!(GroupId(7).is_valid());
        assert!(!EntryUuid::default().is_valid());
        assert!(EntryUuid::random().is_valid() || EntryUuid::random().is_valid());
    }

    #[test]
    fn now_has_no_subseconds() {
        use chrono::Timelike as _;
        assert_eq!(now().nanosecond(), 0);
    }
}
