//! Host adapter for the language-model-chat-provider contract.
//!
//! Projects the catalog into the host's model-picker shape, owns the
//! endpoint cache, and routes chat invocations through the stream wrapper.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{broadcast, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::auth::AuthService;
use crate::catalog::{ModelCatalog, ModelDescriptor, ModelsChanged};
use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::types::{ChatMessage, ChatOptions};

use super::endpoint::{ChatEndpoint, ModelInfo};
use super::wrapper::{stream_chat_response, ProgressSink};

/// Host-visible model descriptor for the model picker.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatModelInformation {
    pub id: String,
    pub name: String,
    pub family: String,
    pub version: String,
    pub tooltip: String,
    /// Billing hint: `"0.5x"`, `"1x"`, or `"Free"`.
    pub detail: String,
    pub max_input_tokens: u32,
    pub max_output_tokens: u32,
    pub is_user_selectable: bool,
    pub capabilities: ChatModelCapabilities,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatModelCapabilities {
    pub image_input: bool,
    pub tool_calling: bool,
}

/// Input accepted by the token counter.
#[derive(Debug, Clone)]
pub enum TokenCountInput {
    Text(String),
    Message(ChatMessage),
}

impl TokenCountInput {
    fn into_text(self) -> String {
        match self {
            TokenCountInput::Text(text) => text,
            TokenCountInput::Message(message) => message.text(),
        }
    }
}

/// The host's language-model-chat-provider contract.
#[async_trait]
pub trait LanguageModelChatProvider: Send + Sync {
    /// Models to offer in the picker.
    async fn provide_models(&self) -> Vec<ChatModelInformation>;

    /// Stream one chat response into `sink`.
    async fn provide_chat_response(
        &self,
        model_id: &str,
        messages: &[ChatMessage],
        options: &ChatOptions,
        sink: &mut dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<(), BridgeError>;

    async fn provide_token_count(
        &self,
        model_id: &str,
        input: TokenCountInput,
    ) -> Result<usize, BridgeError>;
}

/// Registered with the host as the bridge's chat provider.
pub struct BridgeChatProvider {
    config: Arc<BridgeConfig>,
    auth: Arc<AuthService>,
    catalog: Arc<ModelCatalog>,
    /// One endpoint per model id, kept for the provider's lifetime.
    endpoints: Mutex<HashMap<String, Arc<ChatEndpoint>>>,
    events: broadcast::Sender<ModelsChanged>,
}

impl BridgeChatProvider {
    /// Build the provider and forward the catalog's change events as this
    /// provider's own, so the host re-queries the model list.
    pub fn new(
        config: Arc<BridgeConfig>,
        auth: Arc<AuthService>,
        catalog: Arc<ModelCatalog>,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(16);
        let provider = Arc::new(Self {
            config,
            auth,
            catalog: catalog.clone(),
            endpoints: Mutex::new(HashMap::new()),
            events,
        });

        let weak = Arc::downgrade(&provider);
        let mut changes = catalog.subscribe();
        tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(change) => {
                        let Some(provider) = weak.upgrade() else { break };
                        let _ = provider.events.send(change);
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "chat provider lagged behind model events");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        provider
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ModelsChanged> {
        self.events.subscribe()
    }

    async fn endpoint_for(&self, model_id: &str) -> Result<Arc<ChatEndpoint>, BridgeError> {
        if let Some(endpoint) = self.endpoints.lock().await.get(model_id) {
            return Ok(endpoint.clone());
        }

        let descriptor = self
            .catalog
            .chat_models()
            .await
            .into_iter()
            .find(|descriptor| descriptor.id == model_id)
            .ok_or_else(|| BridgeError::ModelNotFound(model_id.to_string()))?;

        let endpoint = Arc::new(ChatEndpoint::new(
            ModelInfo::from(&descriptor),
            self.auth.clone(),
            &self.config,
        ));
        self.endpoints
            .lock()
            .await
            .insert(model_id.to_string(), endpoint.clone());
        Ok(endpoint)
    }
}

#[async_trait]
impl LanguageModelChatProvider for BridgeChatProvider {
    async fn provide_models(&self) -> Vec<ChatModelInformation> {
        self.catalog
            .chat_models()
            .await
            .iter()
            .filter(|descriptor| descriptor.model_picker_enabled)
            .map(project_model)
            .collect()
    }

    async fn provide_chat_response(
        &self,
        model_id: &str,
        messages: &[ChatMessage],
        options: &ChatOptions,
        sink: &mut dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<(), BridgeError> {
        let endpoint = self.endpoint_for(model_id).await?;
        stream_chat_response(&endpoint, messages, options, sink, cancel).await
    }

    async fn provide_token_count(
        &self,
        model_id: &str,
        input: TokenCountInput,
    ) -> Result<usize, BridgeError> {
        let endpoint = self.endpoint_for(model_id).await?;
        Ok(endpoint.count_tokens(&input.into_text()))
    }
}

fn project_model(descriptor: &ModelDescriptor) -> ChatModelInformation {
    let multiplier = descriptor.billing.map(|billing| billing.multiplier);
    let detail = match multiplier {
        None => "Free".to_string(),
        Some(m) if m == 0.0 => "Free".to_string(),
        Some(m) => format!("{m}x"),
    };
    let tooltip = match &descriptor.vendor {
        Some(vendor) => format!("{} ({})", descriptor.name, vendor),
        None => descriptor.name.clone(),
    };

    ChatModelInformation {
        id: descriptor.id.clone(),
        name: descriptor.name.clone(),
        family: descriptor.capabilities.family.clone(),
        version: descriptor.version.clone(),
        tooltip,
        detail,
        max_input_tokens: descriptor.capabilities.limits.max_prompt_tokens,
        max_output_tokens: descriptor.capabilities.limits.max_output_tokens,
        is_user_selectable: true,
        capabilities: ChatModelCapabilities {
            image_input: descriptor.capabilities.supports.vision,
            tool_calling: descriptor.capabilities.supports.tool_calls,
        },
    }
}
