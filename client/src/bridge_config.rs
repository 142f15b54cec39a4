use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use roomlink_shared::DEFAULT_EVENT_QUEUE_CAPACITY;

/// Contains configuration shared by the poll and callback bridges
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BridgeConfig {
    /// Capacity of the poll bridge's event queue. When full, the oldest
    /// undelivered event is dropped.
    pub event_queue_capacity: usize,
    /// Join options used when the host passes an empty options string
    pub default_join_options: Value,
    /// Whether the disconnect performed when a room handle is released is a
    /// consented leave
    pub release_disconnect_consented: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            event_queue_capacity: DEFAULT_EVENT_QUEUE_CAPACITY,
            default_join_options: Value::Object(Map::new()),
            release_disconnect_consented: true,
        }
    }
}

impl BridgeConfig {
    /// Reads a config from JSON. Missing fields keep their defaults.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Parses host-supplied join options. Empty or `null` text falls back to
    /// the configured defaults; anything unparseable is an error.
    pub fn join_options(&self, options: &str) -> Result<Value, serde_json::Error> {
        let options = options.trim();
        if options.is_empty() || options == "null" {
            return Ok(self.default_join_options.clone());
        }
        serde_json::from_str(options)
    }
}
