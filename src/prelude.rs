//! One-import surface for embedding hosts.

pub use crate::auth::{
    AuthError, AuthService, AuthenticationProvider, BridgeAuthProvider, BrowserOpener,
    FileSecretStore, MemorySecretStore, SecretStore, Session, SessionChange, SystemBrowser,
    TOKEN_STORAGE_KEY,
};
pub use crate::catalog::{ModelCatalog, ModelDescriptor, ModelsChanged};
pub use crate::chat::{
    BridgeChatProvider, ChatEndpoint, ChatModelInformation, LanguageModelChatProvider, ModelInfo,
    ProgressSink, TokenCountInput,
};
pub use crate::config::BridgeConfig;
pub use crate::error::BridgeError;
pub use crate::types::{
    ChatMessage, ChatOptions, ChatPart, ChatRole, ResponsePart, ToolMode, ToolSpec,
};
