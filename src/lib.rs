//! feima-bridge -- editor-host integration for the Feima model gateway.
//!
//! Three subsystems, wired together by the embedding host:
//!
//! - [`auth`] -- OAuth2/PKCE sign-in with redirect-callback routing,
//!   encrypted-at-rest token persistence behind a [`auth::SecretStore`],
//!   proactive refresh, and session-change events.
//! - [`catalog`] -- the gateway's model catalog, cached with a TTL and
//!   invalidated on every authentication change.
//! - [`chat`] -- per-model chat endpoints translating host messages to the
//!   OpenAI-compatible wire form, consuming SSE responses, and assembling
//!   streamed tool-call fragments into complete invocations.
//!
//! A host embeds the bridge by constructing [`auth::AuthService`] with its
//! own secret store and browser opener, then hanging
//! [`auth::BridgeAuthProvider`] and [`chat::BridgeChatProvider`] off it:
//!
//! ```no_run
//! use std::sync::Arc;
//! use feima_bridge::auth::{AuthService, BridgeAuthProvider, FileSecretStore, SystemBrowser};
//! use feima_bridge::catalog::ModelCatalog;
//! use feima_bridge::chat::BridgeChatProvider;
//! use feima_bridge::config::BridgeConfig;
//!
//! # async fn wire() {
//! let config = Arc::new(
//!     BridgeConfig::new("https://idp.example/auth", "https://api.example/v1", "client-id")
//!         .with_redirect("x-host", "pub.ext"),
//! );
//! let auth = Arc::new(
//!     AuthService::new(
//!         config.clone(),
//!         Arc::new(FileSecretStore::new_default()),
//!         Arc::new(SystemBrowser),
//!     )
//!     .await,
//! );
//! let catalog = ModelCatalog::new(config.clone(), auth.clone());
//! let auth_provider = BridgeAuthProvider::new(auth.clone());
//! let chat_provider = BridgeChatProvider::new(config, auth, catalog);
//! # let _ = (auth_provider, chat_provider);
//! # }
//! ```

pub mod auth;
pub mod catalog;
pub mod chat;
pub mod config;
pub mod error;
pub mod prelude;
pub mod types;

pub use error::BridgeError;
