use std::{
    collections::HashMap,
    fmt,
    sync::atomic::{AtomicU64, Ordering},
};

use serde::{Deserialize, Serialize};

/// One-time key for a stored result.
#[derive(PartialEq, Eq, Hash, Clone, Copy, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultId(u64);

impl ResultId {
    pub fn value(&self) -> u64 {
        self.0
    }

    pub fn to_f64(&self) -> f64 {
        self.0 as f64
    }
}

impl From<u64> for ResultId {
    fn from(value: u64) -> Self {
        ResultId(value)
    }
}

impl fmt::Debug for ResultId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResultId({})", self.0)
    }
}

/// Pending results keyed by one-time ids, read-and-delete.
///
/// `store` writes the value before returning its id, so whoever receives the
/// id can always read it. Ids are never reused, so an unread value is never
/// overwritten.
pub struct OutcomeStore {
    next_id: AtomicU64,
    pending: HashMap<ResultId, String>,
}

impl Default for OutcomeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl OutcomeStore {
    /// Returned by `take_or_null` for unknown or already consumed ids.
    pub const NULL_RESULT: &'static str = "null";

    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            pending: HashMap::new(),
        }
    }

    pub fn store(&mut self, json: String) -> ResultId {
        let id = ResultId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.pending.insert(id, json);
        id
    }

    pub fn take(&mut self, id: &ResultId) -> Option<String> {
        self.pending.remove(id)
    }

    pub fn take_or_null(&mut self, id: &ResultId) -> String {
        self.take(id)
            .unwrap_or_else(|| Self::NULL_RESULT.to_string())
    }

    pub fn contains(&self, id: &ResultId) -> bool {
        self.pending.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
