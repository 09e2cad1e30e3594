//! Shared doubles and builders for the integration suite.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;

use feima_bridge::auth::{
    AuthService, BrowserOpener, MemorySecretStore, SecretStore, StoredSession, TokenResponse,
    TOKEN_STORAGE_KEY,
};
use feima_bridge::config::BridgeConfig;

/// Browser double that records every URL instead of opening anything.
#[derive(Debug, Default)]
pub struct RecordingBrowser {
    urls: Mutex<Vec<String>>,
    fail: bool,
}

impl RecordingBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            urls: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn opened(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

#[async_trait]
impl BrowserOpener for RecordingBrowser {
    async fn open(&self, url: &str) -> std::io::Result<()> {
        self.urls.lock().unwrap().push(url.to_string());
        if self.fail {
            Err(std::io::Error::other("no display"))
        } else {
            Ok(())
        }
    }
}

/// Config pointing both base URLs at test servers.
pub fn bridge_config(idp_base: &str, gateway_base: &str) -> BridgeConfig {
    BridgeConfig::new(idp_base, gateway_base, "vc").with_redirect("x-host", "pub.ext")
}

/// Poll until the recording browser has captured a sign-in URL.
pub async fn wait_for_opened_url(browser: &RecordingBrowser) -> String {
    for _ in 0..200 {
        if let Some(url) = browser.opened().into_iter().next() {
            return url;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("browser was never asked to open a URL");
}

/// A long-lived stored session, written the way the service persists it.
pub fn fresh_stored_session(access_token: &str) -> StoredSession {
    stored_session_with(access_token, Some("RT1"), Some(3600), 0)
}

/// Stored session with `age_secs` already elapsed since issuance.
pub fn stored_session_with(
    access_token: &str,
    refresh_token: Option<&str>,
    expires_in: Option<u64>,
    age_secs: i64,
) -> StoredSession {
    StoredSession {
        token_response: TokenResponse {
            access_token: access_token.to_string(),
            refresh_token: refresh_token.map(String::from),
            expires_in,
            token_type: Some("Bearer".to_string()),
            id_token: None,
        },
        issued_at: Utc::now().timestamp_millis() - age_secs * 1000,
        session_id: "session-test".to_string(),
        account_id: "u1".to_string(),
        account_label: "u@e".to_string(),
    }
}

pub async fn seed_session(store: &MemorySecretStore, stored: &StoredSession) {
    store
        .store(TOKEN_STORAGE_KEY, &serde_json::to_string(stored).unwrap())
        .await
        .unwrap();
}

/// Unsigned JWT with the given claims payload, shaped like an IdP id_token.
pub fn make_jwt(claims: serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string().as_bytes());
    format!("{header}.{payload}.unsigned")
}

/// `data:` frames joined the way the gateway streams them.
pub fn sse_body(events: &[&str]) -> String {
    let mut body = String::new();
    for event in events {
        body.push_str("data: ");
        body.push_str(event);
        body.push_str("\n\n");
    }
    body
}

/// Service wired to in-memory storage and a recording browser.
pub async fn auth_service(
    config: Arc<BridgeConfig>,
    store: Arc<MemorySecretStore>,
    browser: Arc<RecordingBrowser>,
) -> Arc<AuthService> {
    Arc::new(AuthService::new(config, store, browser).await)
}
