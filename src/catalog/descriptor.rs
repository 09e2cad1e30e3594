//! Wire types for the gateway's model catalog.

use serde::Deserialize;

/// Envelope of `GET {apiBaseUrl}/models`.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelListResponse {
    pub data: Vec<ModelDescriptor>,
}

/// One model as the gateway describes it. Unknown fields are ignored;
/// unknown capability types are dropped during categorization.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ModelDescriptor {
    pub id: String,
    pub name: String,
    pub version: String,
    pub capabilities: DescriptorCapabilities,
    /// Whether the model should appear in the host's model picker.
    #[serde(default)]
    pub model_picker_enabled: bool,
    #[serde(default)]
    pub policy: Option<ModelPolicy>,
    #[serde(default)]
    pub billing: Option<ModelBilling>,
    #[serde(default)]
    pub vendor: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct DescriptorCapabilities {
    /// `chat`, `completion` or `embeddings`; anything else is dropped.
    #[serde(rename = "type")]
    pub kind: String,
    pub family: String,
    pub limits: DescriptorLimits,
    pub supports: DescriptorSupports,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
pub struct DescriptorLimits {
    pub max_prompt_tokens: u32,
    pub max_output_tokens: u32,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
pub struct DescriptorSupports {
    pub streaming: bool,
    #[serde(default)]
    pub tool_calls: bool,
    #[serde(default)]
    pub vision: bool,
    #[serde(default)]
    pub parallel_tool_calls: bool,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ModelPolicy {
    #[serde(default)]
    pub terms: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
pub struct ModelBilling {
    #[serde(default)]
    pub multiplier: f64,
}
