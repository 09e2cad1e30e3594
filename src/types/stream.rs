//! Streaming deltas flowing from the chat endpoint to the host.

use serde::{Deserialize, Serialize};

/// A delta produced while consuming the gateway's SSE response.
///
/// Text and tool calls never share a delta: text is forwarded the moment it
/// arrives, while tool calls are withheld until their fragments are fully
/// assembled.
#[derive(Debug, Clone, Default)]
pub struct StreamDelta {
    /// Incremental text content, if this event carried any.
    pub text: Option<String>,
    /// Fully assembled tool calls released by a `finish_reason` or by the
    /// end of the stream.
    pub tool_calls: Vec<StreamToolCall>,
    /// Usage totals, when the gateway includes them on the final chunk.
    pub usage: Option<UsageDelta>,
}

/// A complete tool call with its arguments still in raw string form.
/// Argument validation happens one layer up, where a malformed payload can
/// be surfaced to the host as an error.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

/// Token usage reported by the gateway.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct UsageDelta {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Host-visible progress parts emitted by the stream wrapper.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponsePart {
    Text(String),
    ToolCall {
        call_id: String,
        name: String,
        input: serde_json::Value,
    },
}

/// Structured result of a chat request.
///
/// Non-success variants are results, not errors: the endpoint classifies the
/// gateway's answer and leaves it to the wrapper to decide how loudly to
/// surface it.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatOutcome {
    Success,
    /// HTTP 403: the gateway blocked this extension.
    Blocked { retry_after: Option<String> },
    /// HTTP 429 without a quota signal.
    RateLimited,
    /// HTTP 429 that names an exhausted quota.
    QuotaExceeded,
    /// Transport failures and unclassified HTTP statuses.
    Error { reason: String },
}
