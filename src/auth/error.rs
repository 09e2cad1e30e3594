use thiserror::Error;

/// Errors produced by the authentication subsystem.
#[derive(Error, Debug)]
pub enum AuthError {
    /// No redirect arrived within the interactive flow window.
    #[error("timed out waiting for the authorization callback")]
    CallbackTimedOut,

    /// The pending callback was cancelled before the IdP answered.
    #[error("the authorization flow was cancelled")]
    FlowCancelled,

    /// The IdP redirected back with an `error` parameter.
    #[error("authorization server returned an error: {0}")]
    ServerReturnedError(String),

    /// The redirect carried neither `code` nor `error`.
    #[error("authorization callback is missing required parameters")]
    MalformedCallback,

    #[error("could not open the system browser: {0}")]
    CannotOpenBrowser(String),

    /// The flow record vanished between the callback and the exchange.
    #[error("authorization flow state was lost before completion")]
    FlowStateLost,

    #[error("token exchange failed with status {status}: {body}")]
    TokenExchangeFailed { status: u16, body: String },

    #[error("token refresh failed with status {status}: {body}")]
    TokenRefreshFailed { status: u16, body: String },

    /// The persisted token blob no longer decodes. Recovered locally by
    /// discarding the blob.
    #[error("stored token payload could not be decoded")]
    StoredTokenCorrupted,

    #[error("secret store error: {0}")]
    Store(String),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for AuthError {
    fn from(err: std::io::Error) -> Self {
        AuthError::Io(err.to_string())
    }
}
