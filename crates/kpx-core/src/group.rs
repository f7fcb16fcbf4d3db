//! Groups: titled containers of entries and child groups.

use crate::entry::Entry;
use crate::ids::GroupIds;
use crate::types::{now, EntryUuid, GroupId};
use anyhow::{anyhow, bail, Result};
use chrono::NaiveDateTime;
use kpx_util::{partition, GroupNode, Titled};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Optional fields accepted by [`Group::add_entry`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EntryOptions {
    /// URL.
    pub url: String,
    /// Username.
    pub username: String,
    /// Password.
    pub password: String,
    /// Comment.
    pub comment: String,
    /// Expiry time.
    pub expire: Option<NaiveDateTime>,
}

/// A group. `level` is the depth below the root (top-level groups are 0).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Group {
    /// Identifier.
    pub group_id: GroupId,
    /// Display title.
    pub title: String,
    /// Icon index.
    #[serde(default = "default_image")]
    pub image: u32,
    /// Depth below the root.
    #[serde(default)]
    pub level: u16,
    /// Entries in stored order (meta streams included).
    #[serde(default)]
    pub entries: Vec<Entry>,
    /// Child groups in stored order.
    #[serde(default)]
    pub children: Vec<Group>,
}

const fn default_image() -> u32 {
    1
}

impl Group {
    /// A childless, entry-less group.
    #[must_use]
    pub fn new(group_id: GroupId, title: impl Into<String>, level: u16) -> Self {
        Self {
            group_id,
            title: title.into(),
            image: default_image(),
            level,
            entries: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Whether all mandatory fields are set.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.group_id.is_valid() && !self.title.is_empty()
    }

    /// Create a child group with a fresh id from `ids`.
    pub fn add_group(&mut self, ids: &mut GroupIds, title: &str) -> Result<&mut Self> {
        if title.is_empty() {
            bail!("group title can't be empty");
        }
        let child = Self::new(ids.generate(), title, self.level + 1);
        self.children.push(child);
        self.children.last_mut().ok_or_else(|| anyhow!("child vanished"))
    }

    /// Create an entry in this group.
    pub fn add_entry(&mut self, title: &str, opts: EntryOptions) -> Result<&mut Entry> {
        if title.is_empty() {
            bail!("entry title can't be empty");
        }
        let t = now();
        self.entries.push(Entry {
            uuid: EntryUuid::random(),
            group_id: self.group_id,
            image: 1,
            title: title.to_owned(),
            url: opts.url,
            username: opts.username,
            password: opts.password,
            comment: opts.comment,
            creation: t,
            last_mod: t,
            last_access: t,
            expire: opts.expire,
            binary_desc: String::new(),
            binary: Vec::new(),
        });
        self.entries.last_mut().ok_or_else(|| anyhow!("entry vanished"))
    }

    /// `(user entries, meta streams)`, each in stored order.
    #[must_use]
    pub fn split_entries(&self) -> (Vec<&Entry>, Vec<&Entry>) {
        partition(|e: &&Entry| !e.is_meta_stream(), &self.entries)
    }

    /// User-visible entries (meta streams excluded).
    #[must_use]
    pub fn visible_entries(&self) -> Vec<&Entry> {
        self.split_entries().0
    }

    /// Meta-stream entries only.
    #[must_use]
    pub fn meta_entries(&self) -> Vec<&Entry> {
        self.split_entries().1
    }

    /// Direct child groups.
    #[must_use]
    pub fn groups(&self) -> &[Self] {
        &self.children
    }

    /// Detach a direct child group.
    pub fn remove_group(&mut self, id: GroupId) -> Result<Self> {
        let pos = self
            .children
            .iter()
            .position(|g| g.group_id == id)
            .ok_or_else(|| anyhow!("group {id} is not a child of group {}", self.group_id))?;
        Ok(self.children.remove(pos))
    }

    /// Detach an entry of this group.
    pub fn remove_entry(&mut self, uuid: EntryUuid) -> Result<Entry> {
        let pos = self
            .entries
            .iter()
            .position(|e| e.uuid == uuid)
            .ok_or_else(|| anyhow!("entry {uuid} is not in group {}", self.group_id))?;
        Ok(self.entries.remove(pos))
    }

    /// Find `id` in this subtree (including `self`).
    #[must_use]
    pub fn find_group(&self, id: GroupId) -> Option<&Self> {
        if self.group_id == id {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find_group(id))
    }

    /// Mutable [`Group::find_group`].
    pub fn find_group_mut(&mut self, id: GroupId) -> Option<&mut Self> {
        if self.group_id == id {
            return Some(self);
        }
        self.children.iter_mut().find_map(|c| c.find_group_mut(id))
    }

    /// Set this group's level and re-level the whole subtree below it.
    pub fn set_level(&mut self, level: u16) {
        self.level = level;
        for c in &mut self.children {
            c.set_level(level + 1);
        }
    }
}

impl Titled for Group {
    fn title(&self) -> &str {
        &self.title
    }
}

impl GroupNode for Group {
    type Leaf = Entry;

    fn entries(&self) -> &[Entry] {
        &self.entries
    }

    fn children(&self) -> &[Self] {
        &self.children
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[Group: {}: [title: '{}', image: {}, level: {}]]",
            self.group_id, self.title, self.image, self.level
        )
    }
}
