//! Random, collision-free group id allocation.

use crate::types::GroupId;
use rand::Rng as _;
use std::collections::HashSet;

/// Tracks group ids in use and hands out fresh ones.
///
/// Ids are never released: a removed group's id stays reserved for the
/// lifetime of the allocator.
#[derive(Clone, Debug, Default)]
pub struct GroupIds {
    used: HashSet<GroupId>,
}

impl GroupIds {
    /// Empty allocator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an existing id. Returns `false` if it was already taken.
    pub fn claim(&mut self, id: GroupId) -> bool {
        self.used.insert(id)
    }

    /// Whether `id` is taken.
    #[must_use]
    pub fn contains(&self, id: GroupId) -> bool {
        self.used.contains(&id)
    }

    /// Draw a random non-zero id not yet in use, and claim it.
    pub fn generate(&mut self) -> GroupId {
        let mut rng = rand::rng();
        loop {
            let id = GroupId(rng.random());
            if id.is_valid() && self.used.insert(id) {
                return id;
            }
        }
    }
}
