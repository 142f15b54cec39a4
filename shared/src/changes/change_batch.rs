use log::{trace, warn};

use crate::{BridgeError, RefId, ROOT_REF_ID};

use super::{
    packed, ChangeCodecError, ChangeRecord, DataChange, EntityEntry, EntityTable, Operation,
};

/// An ordered, atomically delivered sequence of change records.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChangeBatch {
    records: Vec<ChangeRecord>,
}

impl ChangeBatch {
    /// Converts a decoder batch into change records, keeping input order and
    /// updating `entities` after each record is emitted.
    ///
    /// A reference displaced from its slot is only detached while the batch
    /// runs. It is untracked, with its subtree, at the end of the batch unless
    /// a later record attached it somewhere else.
    pub fn serialize(changes: &[DataChange], entities: &mut EntityTable) -> Self {
        let mut records = Vec::with_capacity(changes.len());
        let mut displaced = Vec::new();

        for change in changes {
            let record = ChangeRecord::from_change(change);

            if record.has_unrepresentable() {
                warn!(
                    "unrepresentable value in change on ref {} field {} ({:?} / {:?}), \
                     forwarding inline",
                    record.ref_id, record.field, change.value, change.previous_value
                );
            }
            trace!(
                "change ref={} op={:?} field={} value={:?}",
                record.ref_id,
                record.op,
                record.field,
                record.value
            );

            records.push(record);
            if let Some(record) = records.last() {
                Self::update_entities(record, entities, &mut displaced);
            }
        }

        for ref_id in displaced {
            if entities.contains(&ref_id) && !entities.is_attached(&ref_id) {
                entities.untrack(ref_id);
            }
        }

        Self { records }
    }

    fn update_entities(
        record: &ChangeRecord,
        entities: &mut EntityTable,
        displaced: &mut Vec<RefId>,
    ) {
        if record.ref_id == ROOT_REF_ID {
            entities.track(ROOT_REF_ID);
        }
        if !entities.contains(&record.ref_id) {
            trace!("change on untracked ref {} leaves entities alone", record.ref_id);
            return;
        }

        if record.op.is_clear() {
            for child in entities.children_of(record.ref_id) {
                entities.detach(child);
                displaced.push(child);
            }
        }

        if let Some(previous) = record.previous_value.reference() {
            let replaced =
                record.op.removes_previous() || record.value.reference() != Some(previous);
            let in_slot = if record.op == Operation::DELETE_BY_REFID {
                entities.get(&previous).and_then(EntityEntry::parent) == Some(record.ref_id)
            } else {
                entities.occupies(previous, record.ref_id, record.slot())
            };
            if replaced && in_slot && previous != record.ref_id {
                entities.detach(previous);
                displaced.push(previous);
            }
        }

        if record.op.adds_value() {
            if let Some(child) = record.value.reference() {
                entities.attach(child, record.ref_id, record.slot().clone());
            }
        }
    }

    pub fn records(&self) -> &[ChangeRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ChangeRecord> {
        self.records.iter()
    }

    pub fn into_records(self) -> Vec<ChangeRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drift reports for every record carrying an unrepresentable value.
    pub fn unrepresentable(&self) -> impl Iterator<Item = BridgeError> + '_ {
        self.records
            .iter()
            .filter(|record| record.has_unrepresentable())
            .map(|record| BridgeError::UnrepresentableValue {
                ref_id: record.ref_id,
                field: record.field.to_string(),
            })
    }

    pub fn to_json(&self) -> Result<String, ChangeCodecError> {
        Ok(serde_json::to_string(&self.records)?)
    }

    pub fn from_json(text: &str) -> Result<Self, ChangeCodecError> {
        Ok(Self {
            records: serde_json::from_str(text)?,
        })
    }

    pub fn to_packed(&self) -> Vec<u8> {
        packed::encode(&self.records)
    }

    pub fn from_packed(bytes: &[u8]) -> Result<Self, ChangeCodecError> {
        Ok(Self {
            records: packed::decode(bytes)?,
        })
    }
}

impl From<Vec<ChangeRecord>> for ChangeBatch {
    fn from(records: Vec<ChangeRecord>) -> Self {
        Self { records }
    }
}

impl<'a> IntoIterator for &'a ChangeBatch {
    type Item = &'a ChangeRecord;
    type IntoIter = std::slice::Iter<'a, ChangeRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
