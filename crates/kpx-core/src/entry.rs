//! Database entries (one stored credential, or a client meta stream).

use crate::types::{now, EntryUuid, GroupId};
use chrono::NaiveDateTime;
use kpx_util::Titled;
use serde::{Deserialize, Serialize};
use std::fmt;

/// `binary_desc` marking a meta stream.
pub const META_STREAM_DESC: &str = "bin-stream";
/// Title of meta-stream entries.
pub const META_STREAM_TITLE: &str = "Meta-Info";
/// Username of meta-stream entries.
pub const META_STREAM_USER: &str = "SYSTEM";
/// URL of meta-stream entries.
pub const META_STREAM_URL: &str = "$";

/// A single entry. Strings are empty when unset; `expire = None` means never.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Entry {
    /// Identifier.
    pub uuid: EntryUuid,
    /// Owning group.
    pub group_id: GroupId,
    /// Icon index.
    #[serde(default)]
    pub image: u32,
    /// Display title.
    pub title: String,
    /// URL.
    #[serde(default)]
    pub url: String,
    /// Username.
    #[serde(default)]
    pub username: String,
    /// Password.
    #[serde(default)]
    pub password: String,
    /// Free-form comment.
    #[serde(default)]
    pub comment: String,
    /// Creation time.
    pub creation: NaiveDateTime,
    /// Last modification time.
    pub last_mod: NaiveDateTime,
    /// Last access time.
    pub last_access: NaiveDateTime,
    /// Expiry time, if any.
    #[serde(default)]
    pub expire: Option<NaiveDateTime>,
    /// Attachment description.
    #[serde(default)]
    pub binary_desc: String,
    /// Attachment payload.
    #[serde(default)]
    pub binary: Vec<u8>,
}

impl Entry {
    /// Whether all mandatory fields are set.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.uuid.is_valid() && self.group_id.is_valid() && !self.title.is_empty()
    }

    /// Whether this is a KeePassX meta stream rather than a user entry.
    #[must_use]
    pub fn is_meta_stream(&self) -> bool {
        !self.binary.is_empty()
            && !self.comment.is_empty()
            && self.binary_desc == META_STREAM_DESC
            && self.title == META_STREAM_TITLE
            && self.username == META_STREAM_USER
            && self.url == META_STREAM_URL
            && self.image == 0
    }

    /// Stamp the access time.
    pub fn accessed(&mut self) {
        self.last_access = now();
    }

    /// Stamp the modification time.
    pub fn updated(&mut self) {
        self.last_mod = now();
    }

    /// Whether the entry has expired at `at`.
    #[must_use]
    pub fn expired_at(&self, at: NaiveDateTime) -> bool {
        self.expire.is_some_and(|e| at >= e)
    }

    /// Whether the entry has expired now.
    #[must_use]
    pub fn expired(&self) -> bool {
        self.expired_at(now())
    }
}

impl Titled for Entry {
    fn title(&self) -> &str {
        &self.title
    }
}

/// One-line dump with the password masked.
impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let password = if self.password.is_empty() { "" } else { "*****" };
        let expire = self.expire.map_or_else(|| "never".to_owned(), |e| e.to_string());
        write!(
            f,
            "[Entry: {}: [title: '{}', group_id: {}, image: {}, username: '{}', url: '{}', \
             comment: '{}', password: {password}, creation: {}, last_access: {}, last_mod: {}, \
             expire: {expire}, binary_desc: '{}']]",
            self.uuid,
            self.title,
            self.group_id,
            self.image,
            self.username,
            self.url,
            self.comment,
            self.creation,
            self.last_access,
            self.last_mod,
            self.binary_desc,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn t0() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2020, 5, 1).unwrap().and_hms_opt(10, 0, 0).unwrap()
    }

    fn meta() -> Entry {
        Entry {
            uuid: EntryUuid([1; 16]),
            group_id: GroupId(3),
            image: 0,
            title: META_STREAM_TITLE.into(),
            url: META_STREAM_URL.into(),
            username: META_STREAM_USER.into(),
            password: String::new(),
            comment: "KPX_CUSTOM_ICONS_4".into(),
            creation: t0(),
            last_mod: t0(),
            last_access: t0(),
            expire: None,
            binary_desc: META_STREAM_DESC.into(),
            binary: vec![0; 12],
        }
    }

    #[test]
    fn meta_stream_detection() {
        let m = meta();
        assert!(m.is_meta_stream());
        assert!(m.is_valid());

        let mut user = m.clone();
        user.image = 1;
        assert!(!user.is_meta_stream());

        let mut no_payload = m;
        no_payload.binary.clear();
        assert!(!no_payload.is_meta_stream());
    }

    #[test]
    fn expiry() {
        let mut e = meta();
        assert!(!e.expired_at(t0()));
        e.expire = Some(t0() + Duration::minutes(40));
        assert!(!e.expired_at(t0()));
        assert!(e.expired_at(t0() + Duration::minutes(40)));
    }

    #[test]
    fn dump_masks_password() {
        let mut e = meta();
        e.password = "hunter2".into();
        let s = e.to_string();
        assert!(s.contains("password: *****"));
        assert!(!s.contains("hunter2"));
    }

    #[test]
    fn stamps_move_forward() {
        let mut e = meta();
        e.accessed();
        e.updated();
        assert!(e.last_access > t0());
        assert!(e.last_mod > t0());
    }
}
