use std::collections::HashMap;

use serde_json::{json, Value};

use roomlink_shared::{ChangeRecord, ChangeValue, EntityTable, MirrorState, RefId, ROOT_REF_ID};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ListenerKind {
    /// A single field, reported as `{current, previous}`
    Property,
    /// Entries landing in a collection, reported as `{item, key, refId}`
    Add,
    /// Entries leaving a collection, reported as `{item, key, refId}`
    Remove,
}

/// What a listener watches: a dotted path walked from `anchor` through the
/// tracked entities. The path is resolved again on every batch, so a
/// listener follows whatever node currently sits at that path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListenerSpec {
    kind: ListenerKind,
    anchor: RefId,
    path: Vec<String>,
}

impl ListenerSpec {
    /// Returns `None` when a property listener has no property to watch.
    pub fn new(kind: ListenerKind, anchor: RefId, path: &str) -> Option<Self> {
        let path: Vec<String> = path
            .split('.')
            .filter(|segment| !segment.is_empty())
            .map(str::to_string)
            .collect();
        if kind == ListenerKind::Property && path.is_empty() {
            return None;
        }
        Some(Self { kind, anchor, path })
    }

    pub fn describe(&self) -> String {
        let path = self.path.join(".");
        if self.anchor == ROOT_REF_ID {
            format!("{:?} '{}'", self.kind, path)
        } else {
            format!("{:?} '{}' on ref {}", self.kind, path, self.anchor)
        }
    }

    /// The node whose records this listener reacts to, and for property
    /// listeners the field inside it.
    fn target(&self, entities: &EntityTable) -> Option<(RefId, Option<&str>)> {
        let segments: Vec<&str> = self.path.iter().map(String::as_str).collect();
        match self.kind {
            ListenerKind::Property => {
                let (property, parents) = segments.split_last()?;
                let node = entities.resolve_from(self.anchor, parents)?;
                Some((node, Some(*property)))
            }
            ListenerKind::Add | ListenerKind::Remove => {
                Some((entities.resolve_from(self.anchor, &segments)?, None))
            }
        }
    }

    pub fn matches(&self, record: &ChangeRecord, entities: &EntityTable) -> bool {
        let Some((node, property)) = self.target(entities) else {
            return false;
        };
        if record.ref_id != node {
            return false;
        }

        match self.kind {
            ListenerKind::Property => {
                !record.op.is_clear()
                    && property.is_some_and(|property| record.field.matches_segment(property))
            }
            ListenerKind::Add => record.op.is_add() && record.value != ChangeValue::Absent,
            ListenerKind::Remove => {
                record.op.removes_previous()
                    && !record.op.is_clear()
                    && record.previous_value != ChangeValue::Absent
            }
        }
    }

    /// Callback payload for a matching record. `removed` holds renderings of
    /// references taken before the batch removed them.
    pub fn payload(
        &self,
        record: &ChangeRecord,
        mirror: &MirrorState,
        removed: &HashMap<RefId, Value>,
    ) -> Value {
        match self.kind {
            ListenerKind::Property => json!({
                "current": render(&record.value, mirror, removed),
                "previous": render(&record.previous_value, mirror, removed),
            }),
            ListenerKind::Add => entry_payload(&record.value, record, mirror, removed),
            ListenerKind::Remove => entry_payload(&record.previous_value, record, mirror, removed),
        }
    }
}

fn entry_payload(
    item: &ChangeValue,
    record: &ChangeRecord,
    mirror: &MirrorState,
    removed: &HashMap<RefId, Value>,
) -> Value {
    json!({
        "item": render(item, mirror, removed),
        "key": record.slot().to_string(),
        "refId": item.reference(),
    })
}

fn render(value: &ChangeValue, mirror: &MirrorState, removed: &HashMap<RefId, Value>) -> Value {
    match value {
        ChangeValue::Primitive(primitive) => primitive.to_json(),
        ChangeValue::Reference(ref_id) => match removed.get(ref_id) {
            Some(snapshot) => snapshot.clone(),
            None if mirror.node(*ref_id).is_some() => mirror.to_json(*ref_id),
            None => Value::Null,
        },
        ChangeValue::Absent | ChangeValue::Unrepresentable => Value::Null,
    }
}
