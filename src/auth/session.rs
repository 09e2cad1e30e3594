//! Token payloads and session records.

use serde::{Deserialize, Serialize};

/// Token endpoint response, kept in the wire's snake_case shape so the
/// stored blob round-trips exactly what the IdP returned.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
}

/// The single persisted session record.
///
/// Exactly one of these may exist at a time, serialized as JSON under the
/// secret-store key [`crate::auth::TOKEN_STORAGE_KEY`]. `issued_at` is the
/// local wall-clock millisecond timestamp observed when the token response
/// arrived; `issued_at + expires_in * 1000` defines expiry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoredSession {
    pub token_response: TokenResponse,
    pub issued_at: i64,
    pub session_id: String,
    pub account_id: String,
    pub account_label: String,
}

impl StoredSession {
    /// Projection handed to the host.
    pub fn to_session(&self) -> Session {
        Session {
            id: self.session_id.clone(),
            access_token: self.token_response.access_token.clone(),
            account: AccountInfo {
                id: self.account_id.clone(),
                label: self.account_label.clone(),
            },
            scopes: Vec::new(),
        }
    }
}

/// Host-facing session view.
///
/// The scope list is empty by contract: the bridge does not segment tokens
/// by scope.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub id: String,
    pub access_token: String,
    pub account: AccountInfo,
    pub scopes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AccountInfo {
    pub id: String,
    pub label: String,
}

/// Payload of a session-change event.
#[derive(Debug, Clone, Default)]
pub struct SessionChange {
    pub added: Vec<Session>,
    pub removed: Vec<Session>,
}

impl SessionChange {
    pub fn added(session: Session) -> Self {
        Self {
            added: vec![session],
            removed: Vec::new(),
        }
    }

    pub fn removed(session: Session) -> Self {
        Self {
            added: Vec::new(),
            removed: vec![session],
        }
    }
}

/// Unverified claims decoded from an ID token. Advisory only; used to
/// label the account, never to authorize anything.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IdClaims {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}
