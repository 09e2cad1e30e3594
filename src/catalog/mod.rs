//! Remote model catalog: fetch, cache, categorize, invalidate.
//!
//! The catalog is keyed on authentication state: any session change clears
//! it, and a new session triggers an eager refetch. Fetches are otherwise
//! lazy with a five-minute TTL. A failed fetch keeps whatever was cached
//! before; a stale catalog beats an empty one.

pub mod descriptor;

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, Mutex};
use tracing::{debug, error};

use crate::auth::{AuthService, SessionChange};
use crate::config::BridgeConfig;
use crate::error::BridgeError;

pub use descriptor::{
    DescriptorCapabilities, DescriptorLimits, DescriptorSupports, ModelBilling, ModelDescriptor,
    ModelListResponse, ModelPolicy,
};

const CATALOG_TTL: Duration = Duration::from_secs(5 * 60);
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Fired whenever the categorized lists may have changed.
#[derive(Debug, Clone, Copy)]
pub struct ModelsChanged;

#[derive(Default)]
struct CatalogState {
    chat: Vec<ModelDescriptor>,
    completion: Vec<ModelDescriptor>,
    embeddings: Vec<ModelDescriptor>,
    last_fetch: Option<Instant>,
}

impl CatalogState {
    fn is_empty(&self) -> bool {
        self.chat.is_empty() && self.completion.is_empty() && self.embeddings.is_empty()
    }

    fn clear(&mut self) {
        self.chat.clear();
        self.completion.clear();
        self.embeddings.clear();
        self.last_fetch = None;
    }
}

pub struct ModelCatalog {
    config: Arc<BridgeConfig>,
    auth: Arc<AuthService>,
    http: reqwest::Client,
    state: Mutex<CatalogState>,
    events: broadcast::Sender<ModelsChanged>,
}

impl ModelCatalog {
    /// Build the catalog and start listening for session changes.
    pub fn new(config: Arc<BridgeConfig>, auth: Arc<AuthService>) -> Arc<Self> {
        let (events, _) = broadcast::channel(16);
        let catalog = Arc::new(Self {
            config,
            auth: auth.clone(),
            http: reqwest::Client::new(),
            state: Mutex::new(CatalogState::default()),
            events,
        });

        let weak = Arc::downgrade(&catalog);
        let mut changes = auth.subscribe();
        tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(change) => {
                        let Some(catalog) = weak.upgrade() else { break };
                        catalog.on_sessions_changed(change).await;
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "catalog lagged behind session events");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        catalog
    }

    async fn on_sessions_changed(&self, change: SessionChange) {
        self.state.lock().await.clear();
        if !change.added.is_empty() {
            self.fetch_if_needed(true).await;
        }
        let _ = self.events.send(ModelsChanged);
    }

    /// Chat-capable models, fetching first if the cache is cold.
    pub async fn chat_models(&self) -> Vec<ModelDescriptor> {
        self.fetch_if_needed(false).await;
        self.state.lock().await.chat.clone()
    }

    pub async fn completion_models(&self) -> Vec<ModelDescriptor> {
        self.fetch_if_needed(false).await;
        self.state.lock().await.completion.clone()
    }

    pub async fn embedding_models(&self) -> Vec<ModelDescriptor> {
        self.fetch_if_needed(false).await;
        self.state.lock().await.embeddings.clone()
    }

    /// First completion model in catalog order, if any.
    pub async fn default_completion_model(&self) -> Option<ModelDescriptor> {
        self.fetch_if_needed(false).await;
        self.state.lock().await.completion.first().cloned()
    }

    /// Force a refetch and notify subscribers.
    pub async fn refresh_models(&self) {
        self.fetch_if_needed(true).await;
        let _ = self.events.send(ModelsChanged);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ModelsChanged> {
        self.events.subscribe()
    }

    /// Fetch unless a warm cache makes it unnecessary.
    ///
    /// Holding the state lock across the fetch serializes concurrent
    /// callers and guarantees the categorized lists are replaced
    /// atomically; readers never observe a half-updated catalog.
    async fn fetch_if_needed(&self, force: bool) {
        let mut state = self.state.lock().await;
        let warm = state
            .last_fetch
            .is_some_and(|fetched| fetched.elapsed() < CATALOG_TTL);
        if !force && !state.is_empty() && warm {
            return;
        }

        let token = match self.auth.get_token().await {
            Ok(Some(token)) => token,
            Ok(None) => return,
            Err(err) => {
                debug!(error = %err, "skipping model fetch; authentication unavailable");
                return;
            }
        };

        match self.fetch(&token).await {
            Ok(descriptors) => {
                state.clear();
                for descriptor in descriptors {
                    let kind = descriptor.capabilities.kind.clone();
                    match kind.as_str() {
                        "chat" => state.chat.push(descriptor),
                        "completion" => state.completion.push(descriptor),
                        "embeddings" => state.embeddings.push(descriptor),
                        other => {
                            debug!(kind = other, id = %descriptor.id, "dropping model of unknown kind");
                        }
                    }
                }
                state.last_fetch = Some(Instant::now());
            }
            Err(err) => {
                // Keep serving whatever we had.
                error!(error = %err, "model catalog fetch failed");
            }
        }
    }

    async fn fetch(&self, token: &str) -> Result<Vec<ModelDescriptor>, BridgeError> {
        let resp = self
            .http
            .get(self.config.models_url())
            .bearer_auth(token)
            .timeout(FETCH_TIMEOUT)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(BridgeError::CatalogFetch(format!("HTTP {status}: {body}")));
        }

        let listing: ModelListResponse = resp
            .json()
            .await
            .map_err(|err| BridgeError::CatalogFetch(err.to_string()))?;
        Ok(listing.data)
    }
}
