//! Host adapter for the authentication-provider contract.
//!
//! A straight delegating facade over [`AuthService`]. It exists so host-API
//! churn lands here instead of in the service.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;
use url::Url;

use super::error::AuthError;
use super::service::AuthService;
use super::session::{Session, SessionChange};

/// The host's authentication-provider contract.
#[async_trait]
pub trait AuthenticationProvider: Send + Sync {
    async fn sessions(&self) -> Result<Vec<Session>, AuthError>;
    async fn create_session(&self) -> Result<Session, AuthError>;
    async fn remove_session(&self, id: &str) -> Result<(), AuthError>;
}

/// Registered with the host under the bridge's provider id.
pub struct BridgeAuthProvider {
    service: Arc<AuthService>,
}

impl BridgeAuthProvider {
    pub fn new(service: Arc<AuthService>) -> Self {
        Self { service }
    }

    /// Host URI-handler entry point.
    pub fn handle_uri(&self, uri: &Url) {
        self.service.handle_uri(uri);
    }

    /// Synchronous cache view for UI queries.
    pub fn cached_sessions(&self) -> Vec<Session> {
        self.service.cached_sessions()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionChange> {
        self.service.subscribe()
    }
}

#[async_trait]
impl AuthenticationProvider for BridgeAuthProvider {
    async fn sessions(&self) -> Result<Vec<Session>, AuthError> {
        self.service.get_sessions().await
    }

    async fn create_session(&self) -> Result<Session, AuthError> {
        self.service.create_session().await
    }

    async fn remove_session(&self, id: &str) -> Result<(), AuthError> {
        self.service.remove_session(id).await
    }
}
