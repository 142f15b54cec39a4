use std::collections::{HashMap, HashSet};

use log::trace;

use crate::{RefId, ROOT_REF_ID};

use super::FieldKey;

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct EntityEntry {
    parent: Option<RefId>,
    key: Option<FieldKey>,
}

impl EntityEntry {
    pub fn parent(&self) -> Option<RefId> {
        self.parent
    }

    pub fn key(&self) -> Option<&FieldKey> {
        self.key.as_ref()
    }
}

/// Tracks the structural nodes of one connection's replicated state by
/// reference id, along with where each was last attached.
#[derive(Default)]
pub struct EntityTable {
    entries: HashMap<RefId, EntityEntry>,
    children: HashMap<RefId, HashSet<RefId>>,
}

impl EntityTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking `ref_id` with no known parent. Returns false if it was
    /// already tracked.
    pub fn track(&mut self, ref_id: RefId) -> bool {
        if self.entries.contains_key(&ref_id) {
            return false;
        }
        trace!("tracking ref {}", ref_id);
        self.entries.insert(ref_id, EntityEntry::default());
        true
    }

    /// Tracks `ref_id` (if needed) as the occupant of `key` inside `parent`.
    pub fn attach(&mut self, ref_id: RefId, parent: RefId, key: FieldKey) {
        self.track(ref_id);
        if ref_id == parent {
            return;
        }

        let Some(entry) = self.entries.get_mut(&ref_id) else {
            return;
        };
        if let Some(old_parent) = entry.parent.replace(parent) {
            if let Some(siblings) = self.children.get_mut(&old_parent) {
                siblings.remove(&ref_id);
            }
        }
        entry.key = Some(key);
        self.children.entry(parent).or_default().insert(ref_id);
    }

    /// Stops tracking `ref_id` and every tracked descendant. Returns the ids
    /// that were untracked, `ref_id` first.
    pub fn untrack(&mut self, ref_id: RefId) -> Vec<RefId> {
        let mut removed = Vec::new();
        if !self.entries.contains_key(&ref_id) {
            return removed;
        }

        if let Some(parent) = self.entries.get(&ref_id).and_then(EntityEntry::parent) {
            if let Some(siblings) = self.children.get_mut(&parent) {
                siblings.remove(&ref_id);
            }
        }

        let mut pending = vec![ref_id];
        while let Some(next) = pending.pop() {
            if self.entries.remove(&next).is_none() {
                continue;
            }
            removed.push(next);
            if let Some(children) = self.children.remove(&next) {
                pending.extend(children);
            }
        }

        trace!("untracked refs {:?}", removed);
        removed
    }

    /// Unlinks `ref_id` from its parent. It stays tracked, along with its
    /// subtree, until it is attached again or untracked.
    pub fn detach(&mut self, ref_id: RefId) {
        let Some(entry) = self.entries.get_mut(&ref_id) else {
            return;
        };
        entry.key = None;
        if let Some(parent) = entry.parent.take() {
            if let Some(siblings) = self.children.get_mut(&parent) {
                siblings.remove(&ref_id);
            }
        }
    }

    /// Whether the table records `ref_id` as the occupant of `key` in `parent`.
    pub fn occupies(&self, ref_id: RefId, parent: RefId, key: &FieldKey) -> bool {
        self.entries.get(&ref_id).is_some_and(|entry| {
            entry.parent == Some(parent) && entry.key.as_ref() == Some(key)
        })
    }

    pub fn is_attached(&self, ref_id: &RefId) -> bool {
        self.entries
            .get(ref_id)
            .and_then(EntityEntry::parent)
            .is_some()
    }

    pub fn children_of(&self, parent: RefId) -> Vec<RefId> {
        let mut children: Vec<RefId> = self
            .children
            .get(&parent)
            .map(|children| children.iter().copied().collect())
            .unwrap_or_default();
        children.sort_unstable();
        children
    }

    pub fn contains(&self, ref_id: &RefId) -> bool {
        self.entries.contains_key(ref_id)
    }

    pub fn get(&self, ref_id: &RefId) -> Option<&EntityEntry> {
        self.entries.get(ref_id)
    }

    pub fn child_by_key(&self, parent: RefId, segment: &str) -> Option<RefId> {
        let children = self.children.get(&parent)?;
        children.iter().copied().find(|child| {
            self.entries
                .get(child)
                .and_then(EntityEntry::key)
                .is_some_and(|key| key.matches_segment(segment))
        })
    }

    /// Walks `segments` from `start` through attached children.
    pub fn resolve_from(&self, start: RefId, segments: &[&str]) -> Option<RefId> {
        if !self.contains(&start) {
            return None;
        }
        let mut current = start;
        for segment in segments {
            current = self.child_by_key(current, segment)?;
        }
        Some(current)
    }

    pub fn resolve_path(&self, segments: &[&str]) -> Option<RefId> {
        self.resolve_from(ROOT_REF_ID, segments)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.children.clear();
    }
}
