//! Protocol messages.
//!
//! Every frame is one JSON object discriminated by its `type` field. Params,
//! results and event data are opaque to the bridge.

use crate::Category;
use crate::category::empty_params;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Messages exchanged with the editor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeMessage {
    /// A command for the editor to execute.
    Request {
        id: String,
        category: Category,
        action: String,
        #[serde(default = "empty_params")]
        params: Value,
    },
    /// The editor's answer to a request with the same id.
    Response {
        id: String,
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// Unsolicited notification pushed by the editor.
    Event {
        id: String,
        event: String,
        #[serde(default)]
        data: Value,
    },
}

impl BridgeMessage {
    /// Build a request with a fresh correlation id.
    pub fn request(category: Category, action: impl Into<String>, params: Value) -> Self {
        Self::Request {
            id: uuid::Uuid::new_v4().to_string(),
            category,
            action: action.into(),
            params,
        }
    }

    /// Build a response echoing `id`.
    pub fn response(id: impl Into<String>, body: CommandResponse) -> Self {
        Self::Response {
            id: id.into(),
            success: body.success,
            result: body.result,
            error: body.error,
        }
    }

    /// Build an event with a fresh id.
    pub fn event(event: impl Into<String>, data: Value) -> Self {
        Self::Event {
            id: uuid::Uuid::new_v4().to_string(),
            event: event.into(),
            data,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Request { id, .. } | Self::Response { id, .. } | Self::Event { id, .. } => id,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

/// The outcome of one command, as reported by the editor.
///
/// A response with `success: false` is a normal result, not a client error;
/// callers branch on `success`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CommandResponse {
    pub fn ok(result: Value) -> Self {
        Self {
            success: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error.into()),
        }
    }

    /// The error text, or an empty string for successful or silent failures.
    pub fn error_text(&self) -> &str {
        self.error.as_deref().unwrap_or("")
    }
}
