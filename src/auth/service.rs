//! The authentication engine.
//!
//! Owns the single stored session, the set of in-flight interactive flows,
//! and the session-change event channel. The secret store is the source of
//! truth: the in-memory cache is a derived view rebuilt from the store on
//! every [`AuthService::get_sessions`] call, which keeps sibling processes
//! and extension-host restarts consistent.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast;
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

use crate::config::BridgeConfig;

use super::browser::BrowserOpener;
use super::callback::{CallbackRouter, RegisteredCallback};
use super::error::AuthError;
use super::protocol;
use super::session::{Session, SessionChange, StoredSession};
use super::store::SecretStore;

/// The one secret-store key this crate uses.
pub const TOKEN_STORAGE_KEY: &str = "feimaAuth.tokens";

/// How long an interactive sign-in may wait for the redirect.
const CALLBACK_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Transient record of one interactive flow, keyed by nonce. Several may
/// coexist: a user who closed the browser can simply retry, and each
/// attempt owns its own verifier.
#[derive(Debug, Clone)]
struct FlowState {
    code_verifier: String,
    redirect_uri: String,
}

pub struct AuthService {
    config: Arc<BridgeConfig>,
    store: Arc<dyn SecretStore>,
    browser: Arc<dyn BrowserOpener>,
    router: CallbackRouter,
    http: reqwest::Client,
    /// Derived view of the stored session for synchronous host queries.
    cached: RwLock<Option<Session>>,
    flows: Mutex<HashMap<String, FlowState>>,
    /// Serializes store mutations, and in particular collapses concurrent
    /// lazy refreshes so a refresh token is never spent twice.
    op_gate: tokio::sync::Mutex<()>,
    events: broadcast::Sender<SessionChange>,
}

impl AuthService {
    /// Build the service and warm the cache from the secret store.
    ///
    /// No session-change event fires for the initial load; hosts poll
    /// [`get_sessions`](Self::get_sessions) on startup.
    pub async fn new(
        config: Arc<BridgeConfig>,
        store: Arc<dyn SecretStore>,
        browser: Arc<dyn BrowserOpener>,
    ) -> Self {
        let (events, _) = broadcast::channel(16);
        let service = Self {
            config,
            store,
            browser,
            router: CallbackRouter::new(),
            http: reqwest::Client::new(),
            cached: RwLock::new(None),
            flows: Mutex::new(HashMap::new()),
            op_gate: tokio::sync::Mutex::new(()),
            events,
        };
        match service.read_stored().await {
            Ok(Some(stored)) => {
                *service.cached.write().expect("cache poisoned") = Some(stored.to_session());
            }
            Ok(None) => {}
            Err(err) => warn!(error = %err, "could not load stored session at startup"),
        }
        service
    }

    /// Current sessions, refreshing the access token when it is about to
    /// expire.
    ///
    /// Always consults the secret store. A refresh that fails discards the
    /// stored token and returns an empty list without firing an event; the
    /// host simply observes "no session" on its next query.
    pub async fn get_sessions(&self) -> Result<Vec<Session>, AuthError> {
        let _gate = self.op_gate.lock().await;

        let Some(mut stored) = self.read_stored().await? else {
            *self.cached.write().expect("cache poisoned") = None;
            return Ok(Vec::new());
        };

        let refresh_due =
            protocol::should_refresh(&stored.token_response, stored.issued_at, Utc::now());
        if refresh_due {
            if let Some(refresh_token) = stored.token_response.refresh_token.clone() {
                match protocol::refresh_access_token(&self.http, &self.config, &refresh_token)
                    .await
                {
                    Ok(mut fresh) => {
                        // An IdP that omits the refresh token on renewal
                        // means "keep using the old one".
                        if fresh.refresh_token.is_none() {
                            fresh.refresh_token = Some(refresh_token);
                        }
                        stored.token_response = fresh;
                        stored.issued_at = Utc::now().timestamp_millis();
                        self.persist(&stored).await?;
                    }
                    Err(err) => {
                        warn!(error = %err, "token refresh failed; discarding stored session");
                        self.store.delete(TOKEN_STORAGE_KEY).await?;
                        *self.cached.write().expect("cache poisoned") = None;
                        return Ok(Vec::new());
                    }
                }
            }
            // Refresh due but no refresh token: keep serving the stored
            // access token until the gateway rejects it.
        }

        let session = stored.to_session();
        *self.cached.write().expect("cache poisoned") = Some(session.clone());
        Ok(vec![session])
    }

    /// Bearer token for the current session, if any.
    pub async fn get_token(&self) -> Result<Option<String>, AuthError> {
        Ok(self
            .get_sessions()
            .await?
            .into_iter()
            .next()
            .map(|session| session.access_token))
    }

    pub async fn is_authenticated(&self) -> Result<bool, AuthError> {
        Ok(self.get_token().await?.is_some())
    }

    /// Force the lazy-refresh path to run now. Returns the (possibly
    /// renewed) token.
    pub async fn refresh_token(&self) -> Result<Option<String>, AuthError> {
        self.get_token().await
    }

    /// Run one interactive sign-in: open the browser, wait for the
    /// redirect, exchange the code, persist the session, fire an `added`
    /// event.
    ///
    /// Concurrent calls are independent; each owns its own nonce, verifier
    /// and pending callback. Whichever flow completes last owns the cached
    /// session.
    pub async fn create_session(&self) -> Result<Session, AuthError> {
        let redirect_uri = self.config.redirect_uri();
        let request = protocol::build_authorization_url(&self.config, &redirect_uri);
        let nonce = request.state.clone();

        self.flows.lock().expect("flow map poisoned").insert(
            nonce.clone(),
            FlowState {
                code_verifier: request.code_verifier.clone(),
                redirect_uri,
            },
        );
        let pending = self.router.register(nonce.clone());

        let result = self.drive_flow(&nonce, &request.url, pending).await;

        // The flow record dies with the attempt, whatever the outcome.
        self.flows.lock().expect("flow map poisoned").remove(&nonce);
        result
    }

    async fn drive_flow(
        &self,
        nonce: &str,
        url: &str,
        pending: RegisteredCallback,
    ) -> Result<Session, AuthError> {
        debug!("opening browser for interactive sign-in");
        if let Err(err) = self.browser.open(url).await {
            self.router.cancel(nonce);
            return Err(AuthError::CannotOpenBrowser(err.to_string()));
        }

        let authorization = self.router.wait(pending, CALLBACK_TIMEOUT).await?;

        let flow = self
            .flows
            .lock()
            .expect("flow map poisoned")
            .get(nonce)
            .cloned()
            .ok_or(AuthError::FlowStateLost)?;

        let token = protocol::exchange_code(
            &self.http,
            &self.config,
            &authorization.code,
            &flow.code_verifier,
            &flow.redirect_uri,
        )
        .await?;

        let now = Utc::now();
        let claims = protocol::decode_claims(&token).unwrap_or_default();
        let account_id = claims
            .sub
            .unwrap_or_else(|| format!("user-{}", now.timestamp_millis()));
        let account_label = claims
            .email
            .or(claims.name)
            .unwrap_or_else(|| "Unknown User".to_string());

        let stored = StoredSession {
            token_response: token,
            issued_at: now.timestamp_millis(),
            session_id: format!("session-{}", Uuid::new_v4().simple()),
            account_id,
            account_label,
        };

        let _gate = self.op_gate.lock().await;
        self.persist(&stored).await?;
        let session = stored.to_session();
        *self.cached.write().expect("cache poisoned") = Some(session.clone());
        let _ = self.events.send(SessionChange::added(session.clone()));
        Ok(session)
    }

    /// Sign out. A non-matching id is a no-op; a match clears the store and
    /// cache and fires a `removed` event carrying the prior session.
    pub async fn remove_session(&self, id: &str) -> Result<(), AuthError> {
        let _gate = self.op_gate.lock().await;
        let Some(stored) = self.read_stored().await? else {
            return Ok(());
        };
        if stored.session_id != id {
            return Ok(());
        }
        let snapshot = stored.to_session();
        self.store.delete(TOKEN_STORAGE_KEY).await?;
        *self.cached.write().expect("cache poisoned") = None;
        let _ = self.events.send(SessionChange::removed(snapshot));
        Ok(())
    }

    /// Dispatch an inbound redirect URI to its pending flow.
    pub fn handle_uri(&self, uri: &Url) {
        self.router.handle_uri(uri);
    }

    /// Synchronous view of the cached session, for host UI queries that
    /// must not block on I/O.
    pub fn cached_sessions(&self) -> Vec<Session> {
        self.cached
            .read()
            .expect("cache poisoned")
            .iter()
            .cloned()
            .collect()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionChange> {
        self.events.subscribe()
    }

    /// Number of interactive flows currently awaiting a redirect.
    pub fn active_flow_count(&self) -> usize {
        self.flows.lock().expect("flow map poisoned").len()
    }

    async fn read_stored(&self) -> Result<Option<StoredSession>, AuthError> {
        let Some(raw) = self.store.get(TOKEN_STORAGE_KEY).await? else {
            return Ok(None);
        };
        match serde_json::from_str::<StoredSession>(&raw) {
            Ok(stored) => Ok(Some(stored)),
            Err(err) => {
                warn!(error = %err, "stored token blob is corrupted; discarding");
                self.store.delete(TOKEN_STORAGE_KEY).await?;
                Ok(None)
            }
        }
    }

    async fn persist(&self, stored: &StoredSession) -> Result<(), AuthError> {
        let raw = serde_json::to_string(stored)?;
        self.store.store(TOKEN_STORAGE_KEY, &raw).await
    }
}
