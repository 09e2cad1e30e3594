//! Stateless OAuth2/PKCE protocol helpers.
//!
//! Pure functions over [`BridgeConfig`]: build the authorize URL, exchange
//! an authorization code, refresh an access token, and decode advisory
//! claims. Nothing here owns state; the service layer threads flow records
//! and stored sessions through these calls.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::config::BridgeConfig;

use super::error::AuthError;
use super::session::{IdClaims, TokenResponse};

/// Refresh when less than this much lifetime remains.
const REFRESH_GRACE_MS: i64 = 5 * 60 * 1000;

/// Everything the service needs to start one interactive flow.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    /// Fully assembled authorize URL to open in the browser.
    pub url: String,
    /// Random value doubling as OAuth `state` and the callback
    /// correlation key.
    pub state: String,
    /// PKCE verifier to present during the code exchange.
    pub code_verifier: String,
}

/// Build the authorize URL for a new PKCE flow.
///
/// Generates a fresh 32-byte verifier and a fresh 32-byte state, both
/// base64url without padding; the challenge is `base64url(SHA-256(verifier))`.
pub fn build_authorization_url(config: &BridgeConfig, redirect_uri: &str) -> AuthorizationRequest {
    let code_verifier = random_urlsafe(32);
    let state = random_urlsafe(32);
    let challenge = compute_code_challenge(&code_verifier);

    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("client_id", &config.client_id)
        .append_pair("response_type", "code")
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("state", &state)
        .append_pair("code_challenge", &challenge)
        .append_pair("code_challenge_method", "S256")
        .append_pair("scope", &config.scope_param())
        .finish();

    AuthorizationRequest {
        url: format!("{}?{}", config.authorize_url(), query),
        state,
        code_verifier,
    }
}

/// Exchange an authorization code for tokens.
pub async fn exchange_code(
    client: &reqwest::Client,
    config: &BridgeConfig,
    code: &str,
    code_verifier: &str,
    redirect_uri: &str,
) -> Result<TokenResponse, AuthError> {
    let resp = client
        .post(config.token_url())
        .form(&[
            ("grant_type", "authorization_code"),
            ("client_id", config.client_id.as_str()),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("code_verifier", code_verifier),
        ])
        .send()
        .await?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(AuthError::TokenExchangeFailed {
            status: status.as_u16(),
            body,
        });
    }
    Ok(resp.json::<TokenResponse>().await?)
}

/// Refresh an access token using a refresh-token grant.
pub async fn refresh_access_token(
    client: &reqwest::Client,
    config: &BridgeConfig,
    refresh_token: &str,
) -> Result<TokenResponse, AuthError> {
    let resp = client
        .post(config.token_url())
        .form(&[
            ("grant_type", "refresh_token"),
            ("client_id", config.client_id.as_str()),
            ("refresh_token", refresh_token),
        ])
        .send()
        .await?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(AuthError::TokenRefreshFailed {
            status: status.as_u16(),
            body,
        });
    }
    Ok(resp.json::<TokenResponse>().await?)
}

/// Best-effort decode of the ID token's claims (falling back to the access
/// token, which some IdPs issue as a JWT).
///
/// No signature check is performed; callers treat the result as a hint for
/// labeling, never as authority. Any shape mismatch yields `None`.
pub fn decode_claims(token: &TokenResponse) -> Option<IdClaims> {
    let raw = token
        .id_token
        .as_deref()
        .unwrap_or(token.access_token.as_str());
    decode_jwt_claims(raw)
}

fn decode_jwt_claims(raw: &str) -> Option<IdClaims> {
    let mut segments = raw.split('.');
    let (_header, payload, _sig) = (segments.next()?, segments.next()?, segments.next()?);
    if segments.next().is_some() {
        return None;
    }
    let bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// True when the token has a known lifetime and less than five minutes of
/// it remain at `now`.
pub fn should_refresh(token: &TokenResponse, issued_at_ms: i64, now: DateTime<Utc>) -> bool {
    let Some(expires_in) = token.expires_in else {
        return false;
    };
    let expires_at_ms = issued_at_ms + (expires_in as i64) * 1000;
    expires_at_ms - now.timestamp_millis() < REFRESH_GRACE_MS
}

fn compute_code_challenge(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

fn random_urlsafe(byte_count: usize) -> String {
    let mut buf = vec![0u8; byte_count];
    rand::thread_rng().fill_bytes(&mut buf);
    URL_SAFE_NO_PAD.encode(buf)
}
