//! Bridges endpoint deltas to host-visible progress parts.
//!
//! The wrapper owns the per-request emitted-id set, so a tool call id can
//! reach the host at most once even if the layers below misbehave, and it
//! is where the gateway's structured failure results become errors the
//! host can show.

use std::collections::HashSet;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::BridgeError;
use crate::types::{ChatMessage, ChatOptions, ChatOutcome, ResponsePart, StreamDelta};

use super::endpoint::{ChatEndpoint, DeltaSink};

/// Receives host-typed progress parts. Called serially, in stream order.
pub trait ProgressSink: Send {
    fn report(&mut self, part: ResponsePart);
}

impl ProgressSink for Vec<ResponsePart> {
    fn report(&mut self, part: ResponsePart) {
        self.push(part);
    }
}

/// Run one chat request end to end, emitting progress parts into `sink`.
///
/// Gateway-side failures come back as errors carrying the classification
/// the endpoint made: blocked, rate-limited, quota-exceeded, or a plain
/// failure with the gateway's reason.
pub async fn stream_chat_response(
    endpoint: &ChatEndpoint,
    messages: &[ChatMessage],
    options: &ChatOptions,
    sink: &mut dyn ProgressSink,
    cancel: &CancellationToken,
) -> Result<(), BridgeError> {
    let mut relay = DeltaRelay {
        sink,
        emitted: HashSet::new(),
    };
    let outcome = endpoint
        .make_chat_request(messages, options, &mut relay, cancel)
        .await?;

    match outcome {
        ChatOutcome::Success => Ok(()),
        ChatOutcome::Blocked { retry_after } => Err(BridgeError::Blocked {
            reason: match retry_after {
                Some(retry) => format!("access denied by policy, retry after {retry}"),
                None => "access denied by policy".to_string(),
            },
        }),
        ChatOutcome::RateLimited => Err(BridgeError::RateLimited {
            reason: "too many requests".to_string(),
        }),
        ChatOutcome::QuotaExceeded => Err(BridgeError::QuotaExceeded {
            reason: "usage quota exhausted".to_string(),
        }),
        ChatOutcome::Error { reason } => Err(BridgeError::ChatFailed { reason }),
    }
}

struct DeltaRelay<'a> {
    sink: &'a mut dyn ProgressSink,
    emitted: HashSet<String>,
}

#[async_trait]
impl DeltaSink for DeltaRelay<'_> {
    async fn on_delta(&mut self, delta: StreamDelta) -> Result<(), BridgeError> {
        if let Some(text) = delta.text {
            if !text.is_empty() {
                self.sink.report(ResponsePart::Text(text));
            }
        }

        for call in delta.tool_calls {
            if call.id.is_empty() || call.name.is_empty() {
                warn!("skipping incomplete tool call without id or name");
                continue;
            }
            if self.emitted.contains(&call.id) {
                warn!(call_id = %call.id, "DUPLICATE tool call suppressed");
                continue;
            }

            let trimmed = call.arguments.trim();
            if !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
                return Err(BridgeError::InvalidToolCallArguments {
                    name: call.name,
                    reason: "arguments do not start with an object or array".to_string(),
                });
            }
            let input: Value = serde_json::from_str(trimmed).map_err(|err| {
                BridgeError::InvalidToolCallArguments {
                    name: call.name.clone(),
                    reason: err.to_string(),
                }
            })?;
            if !matches!(input, Value::Object(_) | Value::Array(_)) {
                return Err(BridgeError::InvalidToolCallArguments {
                    name: call.name,
                    reason: "arguments are not a JSON object".to_string(),
                });
            }

            self.sink.report(ResponsePart::ToolCall {
                call_id: call.id.clone(),
                name: call.name,
                input,
            });
            self.emitted.insert(call.id);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StreamToolCall;

    fn tool_call(id: &str, name: &str, arguments: &str) -> StreamToolCall {
        StreamToolCall {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    async fn relay(deltas: Vec<StreamDelta>) -> Result<Vec<ResponsePart>, BridgeError> {
        let mut parts = Vec::new();
        let mut relay = DeltaRelay {
            sink: &mut parts,
            emitted: HashSet::new(),
        };
        for delta in deltas {
            relay.on_delta(delta).await?;
        }
        Ok(parts)
    }

    #[tokio::test]
    async fn text_deltas_become_text_parts_in_order() {
        let parts = relay(vec![
            StreamDelta {
                text: Some("hel".into()),
                ..Default::default()
            },
            StreamDelta {
                text: Some("lo".into()),
                ..Default::default()
            },
        ])
        .await
        .unwrap();
        assert_eq!(
            parts,
            vec![
                ResponsePart::Text("hel".into()),
                ResponsePart::Text("lo".into())
            ]
        );
    }

    #[tokio::test]
    async fn empty_text_is_not_emitted() {
        let parts = relay(vec![StreamDelta {
            text: Some(String::new()),
            ..Default::default()
        }])
        .await
        .unwrap();
        assert!(parts.is_empty());
    }

    #[tokio::test]
    async fn complete_tool_call_is_emitted_with_parsed_input() {
        let parts = relay(vec![StreamDelta {
            tool_calls: vec![tool_call("tc_1", "search", "{\"q\":\"hi\"}")],
            ..Default::default()
        }])
        .await
        .unwrap();
        assert_eq!(
            parts,
            vec![ResponsePart::ToolCall {
                call_id: "tc_1".into(),
                name: "search".into(),
                input: serde_json::json!({"q": "hi"}),
            }]
        );
    }

    #[tokio::test]
    async fn array_arguments_are_accepted() {
        let parts = relay(vec![StreamDelta {
            tool_calls: vec![tool_call("tc_1", "batch", "[1,2]")],
            ..Default::default()
        }])
        .await
        .unwrap();
        assert_eq!(parts.len(), 1);
    }

    #[tokio::test]
    async fn duplicate_ids_are_suppressed() {
        let parts = relay(vec![
            StreamDelta {
                tool_calls: vec![tool_call("tc_1", "search", "{}")],
                ..Default::default()
            },
            StreamDelta {
                tool_calls: vec![tool_call("tc_1", "search", "{}")],
                ..Default::default()
            },
        ])
        .await
        .unwrap();
        assert_eq!(parts.len(), 1);
    }

    #[tokio::test]
    async fn incomplete_calls_are_skipped_without_error() {
        let parts = relay(vec![StreamDelta {
            tool_calls: vec![tool_call("", "search", "{}"), tool_call("tc_2", "", "{}")],
            ..Default::default()
        }])
        .await
        .unwrap();
        assert!(parts.is_empty());
    }

    #[tokio::test]
    async fn non_json_arguments_fail_the_stream() {
        let result = relay(vec![StreamDelta {
            tool_calls: vec![tool_call("tc_1", "search", "not json")],
            ..Default::default()
        }])
        .await;
        assert!(matches!(
            result,
            Err(BridgeError::InvalidToolCallArguments { .. })
        ));
    }

    #[tokio::test]
    async fn truncated_json_arguments_fail_the_stream() {
        let result = relay(vec![StreamDelta {
            tool_calls: vec![tool_call("tc_1", "search", "{\"q\":")],
            ..Default::default()
        }])
        .await;
        assert!(matches!(
            result,
            Err(BridgeError::InvalidToolCallArguments { .. })
        ));
    }
}
