//! The database tree root.
//!
//! The root is not a group: it has no id, no title and no entries, only
//! top-level groups (level 0). It also owns the [`GroupIds`] allocator so
//! every group created through it gets a database-unique id.

use crate::entry::Entry;
use crate::group::{EntryOptions, Group};
use crate::ids::GroupIds;
use crate::types::{EntryUuid, GroupId};
use anyhow::{anyhow, bail, Result};
use kpx_util::{print_group_tree, write_group_tree};
use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use tracing::debug;

/// Root of a group tree.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(try_from = "RootRepr")]
pub struct Root {
    groups: Vec<Group>,
    #[serde(skip)]
    ids: GroupIds,
}

/// Wire shape of [`Root`]; the id allocator is rebuilt on load.
#[derive(Deserialize)]
struct RootRepr {
    #[serde(default)]
    groups: Vec<Group>,
}

impl TryFrom<RootRepr> for Root {
    type Error = anyhow::Error;

    fn try_from(r: RootRepr) -> Result<Self> {
        Self::with_groups(r.groups)
    }
}

impl PartialEq for Root {
    fn eq(&self, other: &Self) -> bool {
        self.groups == other.groups
    }
}

impl Eq for Root {}

/// Claim every id in `groups` (recursively) and point every entry at the
/// group that holds it.
fn adopt_all(ids: &mut GroupIds, groups: &mut [Group]) -> Result<()> {
    for g in groups {
        if !g.group_id.is_valid() {
            bail!("group '{}' has id 0", g.title);
        }
        if !ids.claim(g.group_id) {
            bail!("duplicate group id {}", g.group_id);
        }
        for e in &mut g.entries {
            if e.group_id != g.group_id {
                debug!(uuid = %e.uuid, from = %e.group_id, to = %g.group_id, "re-homing entry");
                e.group_id = g.group_id;
            }
        }
        adopt_all(ids, &mut g.children)?;
    }
    Ok(())
}

/// Remove `id` from anywhere in `groups`.
fn take_group(groups: &mut Vec<Group>, id: GroupId) -> Option<Group> {
    if let Some(pos) = groups.iter().position(|g| g.group_id == id) {
        return Some(groups.remove(pos));
    }
    groups.iter_mut().find_map(|g| take_group(&mut g.children, id))
}

/// Pre-order walk collecting groups and their entries.
fn collect<'a>(groups: &'a [Group], out_g: &mut Vec<&'a Group>, out_e: &mut Vec<&'a Entry>) {
    for g in groups {
        out_g.push(g);
        out_e.extend(&g.entries);
        collect(&g.children, out_g, out_e);
    }
}

/// Parent of `id`: `Some(None)` for top-level groups, `None` if absent.
fn parent_of(groups: &[Group], parent: Option<GroupId>, id: GroupId) -> Option<Option<GroupId>> {
    groups.iter().find_map(|g| {
        if g.group_id == id {
            Some(parent)
        } else {
            parent_of(&g.children, Some(g.group_id), id)
        }
    })
}

impl Root {
    /// Empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adopt existing top-level groups: re-level them from 0, register all
    /// their ids and set each entry's `group_id` to its containing group.
    ///
    /// Fails on a zero or duplicate group id.
    pub fn with_groups(mut groups: Vec<Group>) -> Result<Self> {
        let mut ids = GroupIds::new();
        for g in &mut groups {
            g.set_level(0);
        }
        adopt_all(&mut ids, &mut groups)?;
        Ok(Self { groups, ids })
    }

    /// Top-level groups.
    #[must_use]
    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    /// Whether the tree has no groups.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Create a top-level group.
    pub fn add_group(&mut self, title: &str) -> Result<&mut Group> {
        if title.is_empty() {
            bail!("group title can't be empty");
        }
        let g = Group::new(self.ids.generate(), title, 0);
        self.groups.push(g);
        self.groups.last_mut().ok_or_else(|| anyhow!("group vanished"))
    }

    /// Create a group below `parent`.
    pub fn add_subgroup(&mut self, parent: GroupId, title: &str) -> Result<&mut Group> {
        let Self { groups, ids } = self;
        let p = groups
            .iter_mut()
            .find_map(|g| g.find_group_mut(parent))
            .ok_or_else(|| anyhow!("no group with id {parent}"))?;
        p.add_group(ids, title)
    }

    /// Create an entry in group `group`.
    pub fn add_entry(&mut self, group: GroupId, title: &str, opts: EntryOptions) -> Result<&mut Entry> {
        self.find_group_mut(group)
            .ok_or_else(|| anyhow!("no group with id {group}"))?
            .add_entry(title, opts)
    }

    /// Find a group anywhere in the tree.
    #[must_use]
    pub fn find_group(&self, id: GroupId) -> Option<&Group> {
        self.groups.iter().find_map(|g| g.find_group(id))
    }

    /// Mutable [`Root::find_group`].
    pub fn find_group_mut(&mut self, id: GroupId) -> Option<&mut Group> {
        self.groups.iter_mut().find_map(|g| g.find_group_mut(id))
    }

    /// Find an entry anywhere in the tree.
    #[must_use]
    pub fn find_entry(&self, uuid: EntryUuid) -> Option<&Entry> {
        self.groups_and_entries().1.into_iter().find(|e| e.uuid == uuid)
    }

    /// All groups in pre-order, and all entries (meta streams included) in
    /// the order their groups appear. This is the KDB file order.
    #[must_use]
    pub fn groups_and_entries(&self) -> (Vec<&Group>, Vec<&Entry>) {
        let mut groups = Vec::new();
        let mut entries = Vec::new();
        collect(&self.groups, &mut groups, &mut entries);
        (groups, entries)
    }

    /// Detach a group (with its subtree) from anywhere in the tree.
    pub fn remove_group(&mut self, id: GroupId) -> Result<Group> {
        take_group(&mut self.groups, id).ok_or_else(|| anyhow!("no group with id {id}"))
    }

    /// Detach an entry from whichever group holds it.
    pub fn remove_entry(&mut self, uuid: EntryUuid) -> Result<Entry> {
        let gid = self
            .find_entry(uuid)
            .map(|e| e.group_id)
            .ok_or_else(|| anyhow!("no entry with uuid {uuid}"))?;
        self.find_group_mut(gid)
            .ok_or_else(|| anyhow!("no group with id {gid}"))?
            .remove_entry(uuid)
    }

    /// Move group `id` below `target`, or to the top level if `target` is `None`.
    ///
    /// The moved subtree is re-levelled. Moving a group into itself, into its
    /// own subtree, or to the parent it already has is an error.
    pub fn move_group(&mut self, id: GroupId, target: Option<GroupId>) -> Result<()> {
        if target == Some(id) {
            bail!("group {id} can't be moved into itself");
        }
        let current = parent_of(&self.groups, None, id).ok_or_else(|| anyhow!("no group with id {id}"))?;
        if current == target {
            bail!("group {id} is already in this group");
        }
        let level = match target {
            None => 0,
            Some(t) => {
                let moving = self.find_group(id).ok_or_else(|| anyhow!("no group with id {id}"))?;
                if moving.find_group(t).is_some() {
                    bail!("group {id} can't be moved into its own subtree");
                }
                let dest = self.find_group(t).ok_or_else(|| anyhow!("no group with id {t}"))?;
                dest.level + 1
            }
        };

        let mut g = self.remove_group(id)?;
        g.set_level(level);
        match target {
            None => self.groups.push(g),
            Some(t) => self
                .find_group_mut(t)
                .ok_or_else(|| anyhow!("no group with id {t}"))?
                .children
                .push(g),
        }
        Ok(())
    }

    /// Move entry `uuid` into group `target`.
    pub fn move_entry(&mut self, uuid: EntryUuid, target: GroupId) -> Result<()> {
        let current = self
            .find_entry(uuid)
            .map(|e| e.group_id)
            .ok_or_else(|| anyhow!("no entry with uuid {uuid}"))?;
        if current == target {
            bail!("entry {uuid} is already in group {target}");
        }
        if self.find_group(target).is_none() {
            bail!("no group with id {target}");
        }
        let mut e = self.remove_entry(uuid)?;
        e.group_id = target;
        self.find_group_mut(target)
            .ok_or_else(|| anyhow!("no group with id {target}"))?
            .entries
            .push(e);
        Ok(())
    }

    /// Rebuild a tree from a flat, level-tagged pre-order group list and a
    /// flat entry list.
    ///
    /// A level-0 group attaches to the root; any other group attaches to the
    /// closest preceding open group one level up. Entries attach to the group
    /// named by their `group_id`, in input order. Incoming groups must have
    /// no children.
    pub fn from_flat(groups: Vec<Group>, entries: Vec<Entry>) -> Result<Self> {
        fn close_to(path: &mut Vec<Group>, top: &mut Vec<Group>, depth: usize) {
            while path.len() > depth {
                let Some(g) = path.pop() else { break };
                match path.last_mut() {
                    Some(parent) => parent.children.push(g),
                    None => top.push(g),
                }
            }
        }

        let mut top: Vec<Group> = Vec::new();
        // path[k] is the open group at level k.
        let mut path: Vec<Group> = Vec::new();

        for g in groups {
            let level = usize::from(g.level);
            if path.len() < level {
                bail!("unable to find parent for group {}", g.group_id);
            }
            close_to(&mut path, &mut top, level);
            path.push(g);
        }
        close_to(&mut path, &mut top, 0);

        let mut root = Self::with_groups(top)?;
        let n_entries = entries.len();
        for e in entries {
            let gid = e.group_id;
            root.find_group_mut(gid)
                .ok_or_else(|| anyhow!("unable to find group by id {gid}"))?
                .entries
                .push(e);
        }
        debug!(groups = root.groups_and_entries().0.len(), entries = n_entries, "assembled group tree");
        Ok(root)
    }

    /// Render every top-level group at level 0.
    pub fn write_tree<W: Write + ?Sized>(&self, w: &mut W) -> io::Result<()> {
        for g in &self.groups {
            write_group_tree(w, g, 0)?;
        }
        Ok(())
    }

    /// Print every top-level group to standard output at level 0.
    pub fn print_tree(&self) -> io::Result<()> {
        self.groups.iter().try_for_each(|g| print_group_tree(g, 0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (Root, GroupId, GroupId, GroupId) {
        let mut root = Root::new();
        let a = root.add_group("A").unwrap().group_id;
        let b = root.add_subgroup(a, "B").unwrap().group_id;
        let c = root.add_group("C").unwrap().group_id;
        (root, a, b, c)
    }

    #[test]
    fn top_level_groups_start_at_zero() {
        let (root, a, b, _) = sample();
        assert_eq!(root.find_group(a).unwrap().level, 0);
        assert_eq!(root.find_group(b).unwrap().level, 1);
        assert_eq!(root.groups().len(), 2);
    }

    #[test]
    fn remove_group_anywhere() {
        let (mut root, a, b, _) = sample();
        assert_eq!(root.remove_group(b).unwrap().title, "B");
        assert!(root.find_group(a).unwrap().children.is_empty());
        assert!(root.remove_group(b).is_err());
    }

    #[test]
    fn move_group_relevels_and_refuses_cycles() {
        let (mut root, a, b, c) = sample();
        root.add_subgroup(b, "D").unwrap();

        assert!(root.move_group(a, Some(a)).is_err());
        assert!(root.move_group(a, Some(b)).is_err());
        assert!(root.move_group(b, Some(a)).is_err());

        root.move_group(a, Some(c)).unwrap();
        let moved = root.find_group(a).unwrap();
        assert_eq!(moved.level, 1);
        assert_eq!(moved.children[0].level, 2);
        assert_eq!(moved.children[0].children[0].level, 3);

        root.move_group(b, None).unwrap();
        assert_eq!(root.find_group(b).unwrap().level, 0);
        assert_eq!(root.groups().len(), 2);
    }

    #[test]
    fn move_entry_between_groups() {
        let (mut root, a, _, c) = sample();
        let uuid = root.add_entry(a, "e", EntryOptions::default()).unwrap().uuid;

        assert!(root.move_entry(uuid, a).is_err());
        root.move_entry(uuid, c).unwrap();
        assert_eq!(root.find_entry(uuid).unwrap().group_id, c);
        assert!(root.find_group(a).unwrap().entries.is_empty());
    }

    #[test]
    fn file_order_is_preorder() {
        let (mut root, a, b, c) = sample();
        root.add_entry(c, "in C", EntryOptions::default()).unwrap();
        root.add_entry(b, "in B", EntryOptions::default()).unwrap();
        let (groups, entries) = root.groups_and_entries();
        let ids: Vec<_> = groups.iter().map(|g| g.group_id).collect();
        assert_eq!(ids, [a, b, c]);
        let titles: Vec<_> = entries.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, ["in B", "in C"]);
    }

    #[test]
    fn from_flat_rebuilds_hierarchy() {
        let flat = vec![
            Group::new(GroupId(1), "a", 0),
            Group::new(GroupId(2), "b", 1),
            Group::new(GroupId(3), "c", 2),
            Group::new(GroupId(4), "d", 1),
            Group::new(GroupId(5), "e", 0),
        ];
        let root = Root::from_flat(flat, vec![]).unwrap();
        let a = &root.groups()[0];
        assert_eq!(a.children.len(), 2);
        assert_eq!(a.children[0].children[0].title, "c");
        assert_eq!(a.children[1].title, "d");
        assert_eq!(root.groups()[1].title, "e");
    }

    #[test]
    fn from_flat_rejects_orphans() {
        let flat = vec![Group::new(GroupId(1), "a", 0), Group::new(GroupId(2), "b", 2)];
        assert!(Root::from_flat(flat, vec![]).is_err());
    }

    #[test]
    fn adopting_groups_rehomes_entries() {
        let (mut root, a, b, _) = sample();
        root.add_entry(a, "e", EntryOptions::default()).unwrap();
        let mut groups = root.groups().to_vec();
        groups[0].entries[0].group_id = b;

        let adopted = Root::with_groups(groups).unwrap();
        let e = &adopted.find_group(a).unwrap().entries[0];
        assert_eq!(e.group_id, a);
    }

    #[test]
    fn adopting_rejects_bad_ids() {
        let dup = vec![Group::new(GroupId(3), "x", 0), Group::new(GroupId(3), "y", 0)];
        assert!(Root::with_groups(dup).is_err());
        assert!(Root::with_groups(vec![Group::new(GroupId(0), "zero", 0)]).is_err());

        let flat = vec![Group::new(GroupId(1), "a", 0), Group::new(GroupId(1), "b", 1)];
        assert!(Root::from_flat(flat, vec![]).is_err());
    }

    #[test]
    fn new_ids_do_not_collide_with_loaded_ones() {
        let root = Root::with_groups(vec![Group::new(GroupId(9), "x", 4)]).unwrap();
        assert_eq!(root.groups()[0].level, 0);
        assert!(root.ids.contains(GroupId(9)));
    }
}
