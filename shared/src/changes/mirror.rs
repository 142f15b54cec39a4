use std::collections::{BTreeMap, HashMap, HashSet};

use log::debug;
use serde_json::{Map, Value};

use crate::{RefId, ROOT_REF_ID};

use super::{ChangeBatch, ChangeRecord, ChangeValue, DataChange, FieldKey, Operation, Primitive};

/// A slot value in a mirrored node.
#[derive(Clone, Debug, PartialEq)]
pub enum MirrorValue {
    Primitive(Primitive),
    Reference(RefId),
}

/// One structural node of a mirrored state tree.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MirrorNode {
    is_schema: bool,
    entries: BTreeMap<FieldKey, MirrorValue>,
}

impl MirrorNode {
    pub fn is_schema(&self) -> bool {
        self.is_schema
    }

    pub fn get(&self, key: &FieldKey) -> Option<&MirrorValue> {
        self.entries.get(key)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&FieldKey, &MirrorValue)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn references(&self) -> impl Iterator<Item = RefId> + '_ {
        self.entries.values().filter_map(|value| match value {
            MirrorValue::Reference(ref_id) => Some(*ref_id),
            MirrorValue::Primitive(_) => None,
        })
    }

    fn reverse(&mut self) {
        if !self.entries.keys().all(|key| matches!(key, FieldKey::Index(_))) {
            return;
        }
        let keys: Vec<FieldKey> = self.entries.keys().cloned().collect();
        let values: Vec<MirrorValue> = self.entries.values().rev().cloned().collect();
        self.entries = keys.into_iter().zip(values).collect();
    }
}

/// A host-side reconstruction of a room's state, rebuilt purely from change
/// records. Applying every batch in order reproduces the remote tree.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MirrorState {
    nodes: HashMap<RefId, MirrorNode>,
}

impl MirrorState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one batch and drops the nodes no longer reachable from the root.
    pub fn apply_batch(&mut self, batch: &ChangeBatch) {
        for record in batch {
            self.apply_record(record);
        }
        self.prune();
    }

    pub fn apply_change(&mut self, change: &DataChange) {
        self.apply_record(&ChangeRecord::from_change(change));
    }

    pub fn apply_record(&mut self, record: &ChangeRecord) {
        let node = self.nodes.entry(record.ref_id).or_default();
        node.is_schema = record.is_schema;

        if record.op == Operation::CLEAR {
            node.entries.clear();
            return;
        }
        if record.op == Operation::REVERSE {
            node.reverse();
            return;
        }

        let slot = record.slot().clone();
        match &record.value {
            ChangeValue::Unrepresentable => {
                debug!(
                    "mirror keeps ref {} slot {} unchanged: unrepresentable value",
                    record.ref_id, slot
                );
            }
            ChangeValue::Absent => {
                node.entries.remove(&slot);
            }
            ChangeValue::Primitive(primitive) => {
                node.entries.insert(slot, MirrorValue::Primitive(primitive.clone()));
            }
            ChangeValue::Reference(child) => {
                let child = *child;
                node.entries.insert(slot, MirrorValue::Reference(child));
                self.nodes.entry(child).or_default();
            }
        }
    }

    /// Removes every node unreachable from the root.
    pub fn prune(&mut self) {
        let mut reachable = HashSet::new();
        let mut pending = vec![ROOT_REF_ID];
        while let Some(ref_id) = pending.pop() {
            if !reachable.insert(ref_id) {
                continue;
            }
            if let Some(node) = self.nodes.get(&ref_id) {
                pending.extend(node.references());
            }
        }
        self.nodes.retain(|ref_id, _| reachable.contains(ref_id));
    }

    pub fn node(&self, ref_id: RefId) -> Option<&MirrorNode> {
        self.nodes.get(&ref_id)
    }

    pub fn get(&self, ref_id: RefId, key: &FieldKey) -> Option<&MirrorValue> {
        self.nodes.get(&ref_id).and_then(|node| node.get(key))
    }

    /// Renders the subtree under `ref_id` as JSON. Collections keyed only by
    /// indices render as arrays; a node reached again through its own subtree
    /// renders as `null`.
    pub fn to_json(&self, ref_id: RefId) -> Value {
        let mut path = HashSet::new();
        self.node_json(ref_id, &mut path)
    }

    pub fn root_json(&self) -> Value {
        self.to_json(ROOT_REF_ID)
    }

    fn node_json(&self, ref_id: RefId, path: &mut HashSet<RefId>) -> Value {
        let Some(node) = self.nodes.get(&ref_id) else {
            return Value::Object(Map::new());
        };
        if !path.insert(ref_id) {
            return Value::Null;
        }

        let as_array = !node.is_schema
            && !node.entries.is_empty()
            && node.entries.keys().all(|key| matches!(key, FieldKey::Index(_)));

        let value = if as_array {
            Value::Array(
                node.entries
                    .values()
                    .map(|value| self.value_json(value, path))
                    .collect(),
            )
        } else {
            Value::Object(
                node.entries
                    .iter()
                    .map(|(key, value)| (key.to_string(), self.value_json(value, path)))
                    .collect(),
            )
        };

        path.remove(&ref_id);
        value
    }

    fn value_json(&self, value: &MirrorValue, path: &mut HashSet<RefId>) -> Value {
        match value {
            MirrorValue::Primitive(primitive) => primitive.to_json(),
            MirrorValue::Reference(child) => self.node_json(*child, path),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }
}
