//! Server-Sent Events parsing and tool-call fragment assembly.
//!
//! The gateway streams `data: <json>` lines terminated by `data: [DONE]`.
//! Chunk boundaries fall anywhere, so the line buffer keeps the trailing
//! incomplete line across reads. Tool calls arrive as fragments indexed by
//! position; the accumulator assembles them and releases only entries that
//! have both an id and a name.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::types::{StreamToolCall, UsageDelta};

/// Incremental splitter for an event-stream body.
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    buffer: String,
}

impl SseLineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk of bytes; returns the payloads of any completed
    /// `data:` lines, in arrival order. Blank lines and `:` comments are
    /// discarded.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.push_str(&String::from_utf8_lossy(chunk));
        let mut payloads = Vec::new();
        while let Some(newline) = self.buffer.find('\n') {
            let line = self.buffer[..newline].trim().to_string();
            self.buffer.drain(..=newline);
            if line.is_empty() || line.starts_with(':') {
                continue;
            }
            if let Some(data) = line.strip_prefix("data:") {
                payloads.push(data.trim().to_string());
            }
        }
        payloads
    }
}

/// One parsed SSE chunk in the OpenAI-compatible shape.
#[derive(Debug, Deserialize)]
pub struct StreamChunk {
    #[serde(default)]
    pub choices: Vec<StreamChoice>,
    #[serde(default)]
    pub usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
pub struct StreamChoice {
    #[serde(default)]
    pub delta: DeltaPayload,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeltaPayload {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCallFragment>,
}

/// A partial tool call keyed by its position in the response.
#[derive(Debug, Deserialize)]
pub struct ToolCallFragment {
    pub index: u32,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub function: Option<FunctionFragment>,
}

#[derive(Debug, Default, Deserialize)]
pub struct FunctionFragment {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct WireUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl From<WireUsage> for UsageDelta {
    fn from(usage: WireUsage) -> Self {
        UsageDelta {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
        }
    }
}

/// Assembles streamed tool-call fragments into complete invocations.
#[derive(Debug, Default)]
pub struct ToolCallAccumulator {
    entries: BTreeMap<u32, PartialToolCall>,
}

#[derive(Debug, Default)]
struct PartialToolCall {
    id: String,
    name: String,
    arguments: String,
}

impl ToolCallAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one fragment: id and name stick on first sight, arguments are
    /// append-only.
    pub fn absorb(&mut self, fragment: ToolCallFragment) {
        let entry = self.entries.entry(fragment.index).or_default();
        if let Some(id) = fragment.id {
            if entry.id.is_empty() {
                entry.id = id;
            }
        }
        if let Some(function) = fragment.function {
            if let Some(name) = function.name {
                if entry.name.is_empty() {
                    entry.name = name;
                }
            }
            if let Some(arguments) = function.arguments {
                entry.arguments.push_str(&arguments);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drain every entry, returning the complete ones in index order.
    /// Incomplete entries (missing id or name) are dropped with the rest;
    /// after a flush nothing can be emitted twice.
    pub fn flush(&mut self) -> Vec<StreamToolCall> {
        std::mem::take(&mut self.entries)
            .into_values()
            .filter(|entry| !entry.id.is_empty() && !entry.name.is_empty())
            .map(|entry| StreamToolCall {
                id: entry.id,
                name: entry.name,
                arguments: entry.arguments,
            })
            .collect()
    }
}
