//! Redirect-callback routing for interactive OAuth flows.
//!
//! Each sign-in registers its nonce here before the browser opens; when the
//! host dispatches the IdP's redirect URI back to the extension, the router
//! correlates the `state` query parameter to the waiting flow and resolves
//! it. Flows that never hear back are failed by a timeout at the await
//! site, and the map entry is removed so a late redirect is dropped rather
//! than resurrecting a dead flow.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::{debug, warn};
use url::Url;

use super::error::AuthError;

/// Resolution payload: the authorization code extracted from the redirect.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthorizationCode {
    pub code: String,
}

type CallbackResult = Result<AuthorizationCode, AuthError>;

/// Handle returned by [`CallbackRouter::register`], consumed by
/// [`CallbackRouter::wait`].
#[derive(Debug)]
pub struct RegisteredCallback {
    nonce: String,
    rx: oneshot::Receiver<CallbackResult>,
}

/// Routes inbound redirect URIs to pending sign-in flows by nonce.
#[derive(Debug, Default)]
pub struct CallbackRouter {
    pending: Mutex<HashMap<String, oneshot::Sender<CallbackResult>>>,
}

impl CallbackRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pending callback for `nonce`.
    ///
    /// A second registration for the same nonce replaces the first; the
    /// displaced waiter observes a cancelled flow. Nonces are 32 random
    /// bytes, so this only matters for misbehaving callers.
    pub fn register(&self, nonce: impl Into<String>) -> RegisteredCallback {
        let nonce = nonce.into();
        let (tx, rx) = oneshot::channel();
        let displaced = self
            .pending
            .lock()
            .expect("callback map poisoned")
            .insert(nonce.clone(), tx);
        if displaced.is_some() {
            warn!(%nonce, "replaced an existing pending callback");
        }
        RegisteredCallback { nonce, rx }
    }

    /// Await resolution of a registered callback.
    ///
    /// On timeout the map entry is removed and the flow fails with
    /// [`AuthError::CallbackTimedOut`]; a redirect arriving afterwards is
    /// logged and dropped by [`handle_uri`](Self::handle_uri).
    pub async fn wait(
        &self,
        registered: RegisteredCallback,
        timeout: Duration,
    ) -> CallbackResult {
        match tokio::time::timeout(timeout, registered.rx).await {
            Ok(Ok(result)) => result,
            // Sender dropped without resolving: the flow was cancelled.
            Ok(Err(_)) => Err(AuthError::FlowCancelled),
            Err(_) => {
                self.remove(&registered.nonce);
                Err(AuthError::CallbackTimedOut)
            }
        }
    }

    /// Drop a pending callback without resolving it. The waiter observes
    /// [`AuthError::FlowCancelled`].
    pub fn cancel(&self, nonce: &str) {
        self.remove(nonce);
    }

    /// Dispatch an inbound redirect URI.
    ///
    /// Redirects that cannot be correlated to a pending flow carry no
    /// authority and are dropped without side effects.
    pub fn handle_uri(&self, uri: &Url) {
        let params: HashMap<String, String> = uri.query_pairs().into_owned().collect();

        let Some(state) = params.get("state") else {
            warn!(uri = %uri.path(), "dropping callback without a state parameter");
            return;
        };

        let Some(tx) = self
            .pending
            .lock()
            .expect("callback map poisoned")
            .remove(state.as_str())
        else {
            warn!("dropping callback for unknown or already-resolved flow");
            return;
        };

        let result = if let Some(error) = params.get("error") {
            let description = params
                .get("error_description")
                .unwrap_or(error)
                .to_string();
            Err(AuthError::ServerReturnedError(description))
        } else if let Some(code) = params.get("code") {
            Ok(AuthorizationCode { code: code.clone() })
        } else {
            Err(AuthError::MalformedCallback)
        };

        // The waiter may already be gone (timed out between our map lookup
        // and this send); nothing left to do in that case.
        if tx.send(result).is_err() {
            debug!("callback resolved after its flow stopped waiting");
        }
    }

    /// Number of flows still waiting for a redirect.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().expect("callback map poisoned").len()
    }

    fn remove(&self, nonce: &str) {
        self.pending
            .lock()
            .expect("callback map poisoned")
            .remove(nonce);
    }
}
