//! The chat-request pipeline: wire translation, SSE streaming, tool-call
//! assembly, and the host-facing chat provider.

pub mod endpoint;
pub mod provider;
pub mod sse;
pub mod tokenizer;
pub mod wrapper;

pub use endpoint::{ChatEndpoint, DeltaSink, ModelInfo};
pub use provider::{
    BridgeChatProvider, ChatModelCapabilities, ChatModelInformation, LanguageModelChatProvider,
    TokenCountInput,
};
pub use wrapper::{stream_chat_response, ProgressSink};
