//! The uniform result shape every tool call returns.

use crate::error::DbError;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Tool call result.
///
/// Exactly one of `data` / `error` is present. `available_tools` only appears
/// on unknown-tool failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ToolEnvelope {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available_tools: Option<Vec<String>>,
}

impl ToolEnvelope {
    pub fn ok(data: JsonValue) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            available_tools: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            available_tools: None,
        }
    }

    pub fn unknown_tool(error: &DbError, available: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.to_string()),
            available_tools: Some(available.into_iter().map(Into::into).collect()),
        }
    }

    pub fn to_json(&self) -> JsonValue {
        serde_json::to_value(self).unwrap_or(JsonValue::Null)
    }
}
