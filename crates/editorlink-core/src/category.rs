//! Command categories.
//!
//! A command is addressed as `category.action`. The category is one of a fixed
//! set the editor groups its handlers by; the action is an unvalidated string
//! scoped within it.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// The handler group a command is routed to on the editor side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Category {
    Scene,
    GameObject,
    Component,
    Prefab,
    Asset,
    Project,
    Editor,
}

impl Category {
    /// Every category, in wire-name order of the protocol table.
    pub const ALL: [Category; 7] = [
        Self::Scene,
        Self::GameObject,
        Self::Component,
        Self::Prefab,
        Self::Asset,
        Self::Project,
        Self::Editor,
    ];

    /// The name used on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scene => "scene",
            Self::GameObject => "gameObject",
            Self::Component => "component",
            Self::Prefab => "prefab",
            Self::Asset => "asset",
            Self::Project => "project",
            Self::Editor => "editor",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = CategoryParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|category| category.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| CategoryParseError(s.to_string()))
    }
}

/// Error parsing a category name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown command category: {0}")]
pub struct CategoryParseError(pub String);

/// A command to send to the editor, before it is given a correlation id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeCommand {
    pub category: Category,
    pub action: String,
    #[serde(default = "empty_params")]
    pub params: Value,
}

impl BridgeCommand {
    pub fn new(category: Category, action: impl Into<String>, params: Value) -> Self {
        Self {
            category,
            action: action.into(),
            params,
        }
    }

    /// `category.action`, as used in logs and timeout errors.
    pub fn label(&self) -> String {
        format!("{}.{}", self.category, self.action)
    }
}

pub(crate) fn empty_params() -> Value {
    Value::Object(serde_json::Map::new())
}
