//! Per-model chat endpoint.
//!
//! One endpoint exists per model id observed in the catalog. It owns the
//! wire translation of host messages, request validation, the POST to the
//! gateway's completions endpoint, HTTP error classification, and the SSE
//! consumption loop that feeds deltas to the caller's sink.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{CONTENT_TYPE, RETRY_AFTER};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::auth::AuthService;
use crate::catalog::ModelDescriptor;
use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::types::{
    ChatMessage, ChatOptions, ChatOutcome, ChatPart, ChatRole, StreamDelta, ToolMode,
};

use super::sse::{SseLineBuffer, StreamChunk, ToolCallAccumulator};
use super::tokenizer;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_TOOLS: usize = 128;

/// Model metadata an endpoint needs at request time.
#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
    pub family: String,
    pub max_input_tokens: u32,
    pub max_output_tokens: u32,
    pub supports_tool_calls: bool,
    pub supports_vision: bool,
}

impl From<&ModelDescriptor> for ModelInfo {
    fn from(descriptor: &ModelDescriptor) -> Self {
        Self {
            id: descriptor.id.clone(),
            name: descriptor.name.clone(),
            family: descriptor.capabilities.family.clone(),
            max_input_tokens: descriptor.capabilities.limits.max_prompt_tokens,
            max_output_tokens: descriptor.capabilities.limits.max_output_tokens,
            supports_tool_calls: descriptor.capabilities.supports.tool_calls,
            supports_vision: descriptor.capabilities.supports.vision,
        }
    }
}

/// Receives deltas as the SSE stream is consumed. Each call completes
/// before the next chunk is processed.
#[async_trait]
pub trait DeltaSink: Send {
    async fn on_delta(&mut self, delta: StreamDelta) -> Result<(), BridgeError>;
}

pub struct ChatEndpoint {
    info: ModelInfo,
    auth: Arc<AuthService>,
    http: reqwest::Client,
    completions_url: String,
}

impl ChatEndpoint {
    pub fn new(info: ModelInfo, auth: Arc<AuthService>, config: &BridgeConfig) -> Self {
        // Warm the auth cache so the first request does not pay for a
        // secret-store read. Failures only cost the optimization.
        let warm = auth.clone();
        tokio::spawn(async move {
            if let Err(err) = warm.get_sessions().await {
                debug!(error = %err, "token prefetch failed");
            }
        });

        Self {
            info,
            auth,
            http: reqwest::Client::new(),
            completions_url: config.completions_url(),
        }
    }

    pub fn info(&self) -> &ModelInfo {
        &self.info
    }

    /// Count tokens for `text` with the encoder matching this model's
    /// family.
    pub fn count_tokens(&self, text: &str) -> usize {
        tokenizer::count_tokens(&self.info.family, text)
    }

    /// Reject requests the gateway would reject, before any I/O happens.
    pub fn validate_request(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<(), BridgeError> {
        if messages.is_empty() {
            return Err(BridgeError::InvalidRequest(
                "a chat request needs at least one message".to_string(),
            ));
        }
        for tool in &options.tools {
            if !is_valid_tool_name(&tool.name) {
                return Err(BridgeError::InvalidToolName(tool.name.clone()));
            }
        }
        if options.tools.len() > MAX_TOOLS {
            return Err(BridgeError::TooManyTools(options.tools.len()));
        }
        if options.tool_mode == ToolMode::Required && options.tools.len() > 1 {
            return Err(BridgeError::RequiredToolModeNeedsOneTool(
                options.tools.len(),
            ));
        }
        validate_tool_pairing(messages)
    }

    /// Translate host messages and options into the OpenAI-compatible
    /// request body.
    pub fn create_request_body(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Value {
        let mut wire_messages = Vec::new();
        for message in messages {
            match message.role {
                // Tool results fan out into one wire message per result.
                ChatRole::User if message.has_tool_results() => {
                    for result in message.tool_results_parts() {
                        wire_messages.push(json!({
                            "role": "tool",
                            "tool_call_id": result.call_id,
                            "content": result.joined_text(),
                        }));
                    }
                }
                ChatRole::Assistant if !message.tool_calls().is_empty() => {
                    let text = message.text();
                    let content = if text.is_empty() {
                        Value::Null
                    } else {
                        Value::String(text)
                    };
                    let calls: Vec<Value> = message
                        .tool_calls()
                        .iter()
                        .map(|call| {
                            json!({
                                "id": call.call_id,
                                "type": "function",
                                "function": {
                                    "name": call.name,
                                    "arguments": call.input.to_string(),
                                },
                            })
                        })
                        .collect();
                    wire_messages.push(json!({
                        "role": "assistant",
                        "content": content,
                        "tool_calls": calls,
                    }));
                }
                role => {
                    let wire_role = match role {
                        ChatRole::User => "user",
                        ChatRole::Assistant => "assistant",
                        _ => "system",
                    };
                    wire_messages.push(json!({
                        "role": wire_role,
                        "content": message.text(),
                    }));
                }
            }
        }

        let mut body = json!({
            "model": self.info.id,
            "messages": wire_messages,
            "stream": true,
            "temperature": 0.7,
            "max_tokens": self.info.max_output_tokens,
        });
        let obj = body.as_object_mut().expect("body is an object");

        if !options.tools.is_empty() && self.info.supports_tool_calls {
            let tools: Vec<Value> = options
                .tools
                .iter()
                .map(|tool| {
                    let mut function = json!({
                        "name": tool.name,
                        "description": tool.description,
                    });
                    if let Value::Object(schema) = &tool.input_schema {
                        if !schema.is_empty() {
                            function
                                .as_object_mut()
                                .expect("function is an object")
                                .insert("parameters".to_string(), tool.input_schema.clone());
                        }
                    }
                    json!({"type": "function", "function": function})
                })
                .collect();
            obj.insert("tools".to_string(), tools.into());

            if options.tool_mode == ToolMode::Required && options.tools.len() == 1 {
                obj.insert(
                    "tool_choice".to_string(),
                    json!({
                        "type": "function",
                        "function": {"name": options.tools[0].name},
                    }),
                );
            }
        }

        body
    }

    /// Run one streaming chat request.
    ///
    /// Validation failures and sink errors surface as `Err`; everything
    /// the gateway itself says comes back as a [`ChatOutcome`].
    pub async fn make_chat_request(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
        sink: &mut dyn DeltaSink,
        cancel: &CancellationToken,
    ) -> Result<ChatOutcome, BridgeError> {
        self.validate_request(messages, options)?;

        let token = match self.auth.get_token().await {
            Ok(Some(token)) => token,
            Ok(None) => {
                return Ok(ChatOutcome::Error {
                    reason: "Not authenticated".to_string(),
                })
            }
            Err(err) => {
                return Ok(ChatOutcome::Error {
                    reason: err.to_string(),
                })
            }
        };

        let body = self.create_request_body(messages, options);
        debug!(model = %self.info.id, "dispatching streaming chat request");

        let request = self
            .http
            .post(&self.completions_url)
            .bearer_auth(&token)
            .header(CONTENT_TYPE, "application/json")
            .timeout(REQUEST_TIMEOUT)
            .json(&body)
            .send();

        let resp = tokio::select! {
            _ = cancel.cancelled() => {
                return Ok(ChatOutcome::Error { reason: "request cancelled".to_string() });
            }
            resp = request => match resp {
                Ok(resp) => resp,
                Err(err) => return Ok(ChatOutcome::Error { reason: err.to_string() }),
            },
        };

        if !resp.status().is_success() {
            return Ok(classify_error_response(resp).await);
        }

        self.consume_stream(resp, sink, cancel).await
    }

    async fn consume_stream(
        &self,
        resp: reqwest::Response,
        sink: &mut dyn DeltaSink,
        cancel: &CancellationToken,
    ) -> Result<ChatOutcome, BridgeError> {
        let bytes = resp.bytes_stream();
        futures::pin_mut!(bytes);
        let mut lines = SseLineBuffer::new();
        let mut calls = ToolCallAccumulator::new();
        let mut full_text = String::new();

        'read: while let Some(chunk) = bytes.next().await {
            if cancel.is_cancelled() {
                debug!(model = %self.info.id, "chat request cancelled; dropping the stream");
                return Ok(ChatOutcome::Success);
            }
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(err) => {
                    return Ok(ChatOutcome::Error {
                        reason: err.to_string(),
                    })
                }
            };

            for payload in lines.push(&chunk) {
                if payload == "[DONE]" {
                    break 'read;
                }
                let parsed: StreamChunk = match serde_json::from_str(&payload) {
                    Ok(parsed) => parsed,
                    Err(err) => {
                        debug!(error = %err, "skipping unparseable SSE chunk");
                        continue;
                    }
                };
                let usage = parsed.usage.map(Into::into);
                let Some(choice) = parsed.choices.into_iter().next() else {
                    continue;
                };

                if let Some(content) = choice.delta.content {
                    full_text.push_str(&content);
                    sink.on_delta(StreamDelta {
                        text: Some(content),
                        usage,
                        ..Default::default()
                    })
                    .await?;
                }

                for fragment in choice.delta.tool_calls {
                    calls.absorb(fragment);
                }

                if choice.finish_reason.is_some() && !calls.is_empty() {
                    sink.on_delta(StreamDelta {
                        tool_calls: calls.flush(),
                        usage,
                        ..Default::default()
                    })
                    .await?;
                }
            }
        }

        // [DONE] and truncated streams both release whatever completed;
        // the accumulator is empty if a finish_reason already flushed it.
        if !calls.is_empty() {
            sink.on_delta(StreamDelta {
                tool_calls: calls.flush(),
                ..Default::default()
            })
            .await?;
        }

        debug!(model = %self.info.id, chars = full_text.len(), "chat stream complete");
        Ok(ChatOutcome::Success)
    }
}

/// `^[\w-]+$`
fn is_valid_tool_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Every assistant tool call must be answered by exactly one result in the
/// immediately following user message, and that message may carry nothing
/// but tool results and data parts.
fn validate_tool_pairing(messages: &[ChatMessage]) -> Result<(), BridgeError> {
    use std::collections::HashMap;

    for (index, message) in messages.iter().enumerate() {
        if message.role != ChatRole::Assistant {
            continue;
        }
        let tool_calls = message.tool_calls();
        if tool_calls.is_empty() {
            continue;
        }

        let next = messages
            .get(index + 1)
            .filter(|candidate| candidate.role == ChatRole::User)
            .ok_or_else(|| BridgeError::UnmatchedToolCall(tool_calls[0].call_id.clone()))?;

        let mut result_counts: HashMap<&str, u32> = tool_calls
            .iter()
            .map(|call| (call.call_id.as_str(), 0))
            .collect();

        for part in &next.parts {
            match part {
                ChatPart::ToolResult(result) => {
                    match result_counts.get_mut(result.call_id.as_str()) {
                        Some(count) => *count += 1,
                        // A result for a call nobody made.
                        None => {
                            return Err(BridgeError::UnmatchedToolCall(result.call_id.clone()))
                        }
                    }
                }
                ChatPart::Data { .. } => {}
                _ => {
                    return Err(BridgeError::UnmatchedToolCall(
                        tool_calls[0].call_id.clone(),
                    ))
                }
            }
        }

        if let Some((call_id, _)) = result_counts.iter().find(|(_, count)| **count != 1) {
            return Err(BridgeError::UnmatchedToolCall((*call_id).to_string()));
        }
    }
    Ok(())
}

async fn classify_error_response(resp: reqwest::Response) -> ChatOutcome {
    let status = resp.status().as_u16();
    let retry_after = resp
        .headers()
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .map(String::from);
    let quota_header = resp
        .headers()
        .get("x-error-type")
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value == "quota_exceeded");
    let body = resp.text().await.unwrap_or_default();

    match status {
        403 => {
            if let Some(retry) = &retry_after {
                warn!(retry_after = %retry, "gateway blocked the request");
            }
            ChatOutcome::Blocked { retry_after }
        }
        429 => {
            if quota_header || body.to_ascii_lowercase().contains("quota") {
                ChatOutcome::QuotaExceeded
            } else {
                ChatOutcome::RateLimited
            }
        }
        code => ChatOutcome::Error {
            reason: format!("HTTP {code}: {body}"),
        },
    }
}
