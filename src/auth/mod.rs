//! OAuth2/PKCE authentication: protocol helpers, callback routing, the
//! session-owning service, and the host adapter.

pub mod browser;
pub mod callback;
pub mod error;
pub mod protocol;
pub mod provider;
pub mod service;
pub mod session;
pub mod store;

pub use browser::{BrowserOpener, SystemBrowser};
pub use callback::{AuthorizationCode, CallbackRouter};
pub use error::AuthError;
pub use protocol::AuthorizationRequest;
pub use provider::{AuthenticationProvider, BridgeAuthProvider};
pub use service::{AuthService, TOKEN_STORAGE_KEY};
pub use session::{AccountInfo, IdClaims, Session, SessionChange, StoredSession, TokenResponse};
pub use store::{FileSecretStore, MemorySecretStore, SecretStore};
