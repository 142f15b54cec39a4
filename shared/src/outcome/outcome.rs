use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{BridgeError, Handle, StatusCode};

/// Identity of a joined connection, as reported on a successful join.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinedOutcome {
    pub handle: Handle,
    pub id: String,
    pub session_id: String,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedOutcome {
    pub code: StatusCode,
    pub message: String,
}

/// The single terminal outcome of an asynchronous join-style operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Joined(JoinedOutcome),
    Failed(FailedOutcome),
}

impl Outcome {
    pub fn failed(code: StatusCode, message: impl Into<String>) -> Self {
        Self::Failed(FailedOutcome {
            code,
            message: message.into(),
        })
    }

    /// Failure outcome carrying `error`'s host code. A connection failure
    /// keeps the remote message untouched.
    pub fn from_error(error: &BridgeError) -> Self {
        match error {
            BridgeError::ConnectionFailure { code, message } => {
                Self::failed(*code, message.clone())
            }
            other => Self::failed(other.code(), other.to_string()),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Host-facing JSON: `{"error":false,"handle":..,"id":..,"sessionId":..,"name":..}`
    /// or `{"error":true,"code":..,"message":..}`.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Joined(joined) => json!({
                "error": false,
                "handle": joined.handle,
                "id": joined.id,
                "sessionId": joined.session_id,
                "name": joined.name,
            }),
            Self::Failed(failed) => json!({
                "error": true,
                "code": failed.code,
                "message": failed.message,
            }),
        }
    }

    pub fn to_json(&self) -> String {
        self.to_value().to_string()
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(text)?;
        let is_error = value.get("error").and_then(Value::as_bool).unwrap_or(false);
        if is_error {
            Ok(Self::Failed(serde_json::from_value(value)?))
        } else {
            Ok(Self::Joined(serde_json::from_value(value)?))
        }
    }
}
