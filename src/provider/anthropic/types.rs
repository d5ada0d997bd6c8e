use serde::{Deserialize, Serialize};

use crate::provider::ApiErrorField;

#[derive(Debug, Serialize)]
pub(crate) struct AnthropicMessagesBody<'a> {
    pub(crate) model: &'a str,
    pub(crate) messages: Vec<AnthropicMessage<'a>>,
    /// Required by the API.
    pub(crate) max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) system: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub(crate) stream: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct AnthropicMessage<'a> {
    pub(crate) role: &'static str,
    pub(crate) content: &'a str,
}

/// Non-streaming response payload returned by Anthropic Messages.
#[derive(Debug, Deserialize)]
pub(crate) struct AnthropicMessageResponse {
    /// Ordered list of content blocks.
    #[serde(default)]
    pub(crate) content: Vec<AnthropicContentBlock>,
    #[serde(default)]
    pub(crate) usage: Option<AnthropicUsage>,
    #[serde(default)]
    pub(crate) error: Option<ApiErrorField>,
}

/// Single content block; only `text` blocks carry output text.
#[derive(Debug, Deserialize)]
pub(crate) struct AnthropicContentBlock {
    #[serde(rename = "type", default)]
    pub(crate) kind: Option<String>,
    #[serde(default)]
    pub(crate) text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AnthropicUsage {
    #[serde(default)]
    pub(crate) input_tokens: Option<u64>,
    #[serde(default)]
    pub(crate) output_tokens: Option<u64>,
}

/// Any streamed event; only `content_block_delta` events carry a `delta` with text.
#[derive(Debug, Deserialize)]
pub(crate) struct AnthropicStreamEvent {
    #[serde(default)]
    pub(crate) delta: Option<AnthropicStreamDelta>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AnthropicStreamDelta {
    #[serde(rename = "type", default)]
    pub(crate) kind: Option<String>,
    #[serde(default)]
    pub(crate) text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AnthropicModelList {
    #[serde(default)]
    pub(crate) data: Vec<AnthropicModel>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AnthropicModel {
    pub(crate) id: String,
}
