//! Error types for the chat and catalog surface.
//!
//! Authentication has its own error type owned by the auth module
//! ([`crate::auth::AuthError`]); everything the host sees from the chat
//! pipeline and the model catalog funnels through [`BridgeError`].

use thiserror::Error;

use crate::auth::AuthError;

/// Primary error type for chat and catalog operations.
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The host handed us a request we refuse to send.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Tool names must match `^[\w-]+$`.
    #[error("invalid tool name {0:?}: only letters, digits, underscores and dashes are allowed")]
    InvalidToolName(String),

    #[error("too many tools: {0} exceeds the limit of 128")]
    TooManyTools(usize),

    #[error("tool mode 'required' expects exactly one tool, got {0}")]
    RequiredToolModeNeedsOneTool(usize),

    /// An assistant tool call has no matching result in the following user
    /// message, or the results do not line up one-to-one with the calls.
    #[error("tool call {0:?} is not answered by exactly one tool result")]
    UnmatchedToolCall(String),

    /// The model streamed tool-call arguments that are not a JSON object
    /// or array.
    #[error("tool call {name:?} carries invalid JSON arguments: {reason}")]
    InvalidToolCallArguments { name: String, reason: String },

    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// The gateway refused the request at the extension level (HTTP 403).
    #[error("the extension has been blocked by the gateway: {reason}")]
    Blocked { reason: String },

    #[error("rate limited by the gateway: {reason}")]
    RateLimited { reason: String },

    #[error("quota exceeded: {reason}")]
    QuotaExceeded { reason: String },

    /// Transport failures and unclassified HTTP errors from the chat
    /// endpoint. Surfaced verbatim; the bridge never retries.
    #[error("chat request failed: {reason}")]
    ChatFailed { reason: String },

    #[error("model catalog fetch failed: {0}")]
    CatalogFetch(String),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience alias used throughout the chat pipeline.
pub type Result<T> = std::result::Result<T, BridgeError>;
