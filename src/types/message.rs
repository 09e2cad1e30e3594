//! Chat messages as the host delivers them.
//!
//! The host's message model is a sequence of roles, each carrying a list of
//! heterogeneous parts. The wire translation in the chat endpoint pattern
//! matches over these variants, so every part shape is spelled out here
//! rather than carried as loose JSON.

use serde::{Deserialize, Serialize};

/// A message in a host chat conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub parts: Vec<ChatPart>,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            parts: vec![ChatPart::Text { text: text.into() }],
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            parts: vec![ChatPart::Text { text: text.into() }],
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            parts: vec![ChatPart::Text { text: text.into() }],
        }
    }

    /// Assistant message carrying tool calls (and optionally leading text).
    pub fn assistant_tool_calls(calls: Vec<ToolCallPart>) -> Self {
        Self {
            role: ChatRole::Assistant,
            parts: calls.into_iter().map(ChatPart::ToolCall).collect(),
        }
    }

    /// User message answering tool calls with their results.
    pub fn tool_results(results: Vec<ToolResultPart>) -> Self {
        Self {
            role: ChatRole::User,
            parts: results.into_iter().map(ChatPart::ToolResult).collect(),
        }
    }

    /// Concatenation of all text parts, in order.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                ChatPart::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    pub fn tool_calls(&self) -> Vec<&ToolCallPart> {
        self.parts
            .iter()
            .filter_map(|part| match part {
                ChatPart::ToolCall(call) => Some(call),
                _ => None,
            })
            .collect()
    }

    pub fn tool_results_parts(&self) -> Vec<&ToolResultPart> {
        self.parts
            .iter()
            .filter_map(|part| match part {
                ChatPart::ToolResult(result) => Some(result),
                _ => None,
            })
            .collect()
    }

    pub fn has_tool_results(&self) -> bool {
        self.parts
            .iter()
            .any(|part| matches!(part, ChatPart::ToolResult(_)))
    }
}

/// Conversation role. Anything the host invents beyond user/assistant is
/// mapped to `system` on the wire.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One part of a message's content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatPart {
    Text {
        text: String,
    },
    ToolCall(ToolCallPart),
    ToolResult(ToolResultPart),
    /// Opaque binary content (images and the like). Carried through
    /// validation but never translated to the wire.
    Data {
        mime_type: String,
        data: String,
    },
    /// Model reasoning surfaced by the host. Ignored by the wire
    /// translation.
    Thinking {
        text: String,
    },
}

/// A tool invocation the model asked for in a previous turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCallPart {
    pub call_id: String,
    pub name: String,
    pub input: serde_json::Value,
}

/// The host's answer to a tool call. Only the text parts of the result
/// contribute to the wire message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolResultPart {
    pub call_id: String,
    pub parts: Vec<ChatPart>,
}

impl ToolResultPart {
    pub fn text(call_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            parts: vec![ChatPart::Text { text: text.into() }],
        }
    }

    /// Concatenation of the result's text parts.
    pub fn joined_text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                ChatPart::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }
}
