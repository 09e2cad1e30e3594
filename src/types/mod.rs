//! Host-domain chat types and streaming deltas.

pub mod message;
pub mod stream;

pub use message::{
    ChatMessage, ChatPart, ChatRole, ToolCallPart, ToolResultPart,
};
pub use stream::{ChatOutcome, ResponsePart, StreamDelta, StreamToolCall, UsageDelta};

use serde::{Deserialize, Serialize};

/// A tool offered to the model for the duration of one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON schema for the tool's input. An empty object means the tool
    /// takes no parameters and the schema is omitted on the wire.
    pub input_schema: serde_json::Value,
}

impl ToolSpec {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

/// How the model is allowed to use the offered tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolMode {
    /// The model decides whether to call a tool (wire default).
    #[default]
    Auto,
    /// The model must call the single offered tool.
    Required,
}

/// Per-request options handed down from the host.
#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
    pub tools: Vec<ToolSpec>,
    pub tool_mode: ToolMode,
}
