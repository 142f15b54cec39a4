/// Records host callback invocations in the order they happen.
use std::sync::{Arc, Mutex};

use roomlink_client::{CallbackBridge, HostCallback, OutcomeCallbacks, ResultId};
use serde_json::Value;

#[derive(Clone, Default)]
pub struct CallbackLog {
    calls: Arc<Mutex<Vec<(String, ResultId)>>>,
}

impl CallbackLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A callback that records `label` with each result id it receives.
    pub fn callback(&self, label: &str) -> HostCallback {
        let calls = self.calls.clone();
        let label = label.to_string();
        Arc::new(move |result| calls.lock().unwrap().push((label.clone(), result)))
    }

    /// `on_success` / `on_error` pair recorded as "success" and "error".
    pub fn outcome(&self) -> OutcomeCallbacks {
        OutcomeCallbacks::new(self.callback("success"), self.callback("error"))
    }

    pub fn len(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn labels(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(label, _)| label.clone())
            .collect()
    }

    /// Drains every recorded call, reading each payload from `bridge`.
    pub fn drain(&self, bridge: &CallbackBridge) -> Vec<(String, Value)> {
        let calls: Vec<_> = self.calls.lock().unwrap().drain(..).collect();
        calls
            .into_iter()
            .map(|(label, result)| {
                let json = bridge.get_result(result);
                (label, serde_json::from_str(&json).unwrap())
            })
            .collect()
    }

    /// Drains and returns the payloads recorded under `label`, dropping the rest.
    pub fn drain_label(&self, bridge: &CallbackBridge, label: &str) -> Vec<Value> {
        self.drain(bridge)
            .into_iter()
            .filter(|(recorded, _)| recorded == label)
            .map(|(_, payload)| payload)
            .collect()
    }
}
