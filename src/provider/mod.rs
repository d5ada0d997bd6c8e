use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CheckError;
use crate::http::{DynHttpTransport, HttpStreamResponse, collect_body_text};
use crate::stream::ChunkCallback;
use crate::types::{ChatRequest, ChatResponse, truncate};

pub mod anthropic;
pub mod gemini;
pub mod openai;

pub use anthropic::AnthropicAdapter;
pub use gemini::GeminiAdapter;
pub use openai::OpenAiAdapter;

/// Body bytes quoted in a failed model listing.
const LIST_ERROR_BODY_LIMIT: usize = 200;

/// 协议标识 未识别的标识按 OpenAI 兼容处理
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    OpenAi,
    Anthropic,
    Gemini,
}

impl Protocol {
    /// Resolves a protocol id; anything unrecognized is OpenAI-compatible.
    ///
    /// # Examples
    ///
    /// ```
    /// use pingai::provider::Protocol;
    ///
    /// assert_eq!(Protocol::from_id("gemini"), Protocol::Gemini);
    /// assert_eq!(Protocol::from_id("Anthropic"), Protocol::Anthropic);
    /// assert_eq!(Protocol::from_id("deepseek"), Protocol::OpenAi);
    /// ```
    pub fn from_id(id: &str) -> Self {
        match id.trim().to_ascii_lowercase().as_str() {
            "anthropic" => Protocol::Anthropic,
            "gemini" => Protocol::Gemini,
            _ => Protocol::OpenAi,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::OpenAi => "openai",
            Protocol::Anthropic => "anthropic",
            Protocol::Gemini => "gemini",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 统一的协议适配接口 四项能力对应四类探测
#[async_trait]
pub trait ProtocolAdapter: Send + Sync {
    /// 非流式对话 非 2xx 与错误负载以软失败返回
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, CheckError>;

    /// 流式对话 每个非空增量在返回前按到达顺序同步交给 `on_chunk`
    async fn chat_stream(
        &self,
        request: &ChatRequest,
        on_chunk: ChunkCallback<'_>,
    ) -> Result<ChatResponse, CheckError>;

    /// 列出模型 非 2xx 视为错误
    async fn list_models(&self, base_url: &str, api_key: &str) -> Result<Vec<String>, CheckError>;

    /// 带鉴权的最廉价 GET 只返回状态码
    async fn check_connectivity(&self, base_url: &str, api_key: &str) -> Result<u16, CheckError>;

    /// 协议名称
    fn name(&self) -> &'static str;
}

/// 线程安全 Adapter
pub type DynAdapter = Arc<dyn ProtocolAdapter>;

/// Closed set of protocol adapters, chosen once from the protocol id.
pub enum Adapter {
    OpenAi(OpenAiAdapter),
    Anthropic(AnthropicAdapter),
    Gemini(GeminiAdapter),
}

impl Adapter {
    /// Builds the adapter variant for `protocol` on top of a shared transport.
    pub fn new(protocol: Protocol, transport: DynHttpTransport) -> Self {
        match protocol {
            Protocol::OpenAi => Adapter::OpenAi(OpenAiAdapter::new(transport)),
            Protocol::Anthropic => Adapter::Anthropic(AnthropicAdapter::new(transport)),
            Protocol::Gemini => Adapter::Gemini(GeminiAdapter::new(transport)),
        }
    }

    pub fn for_protocol_id(id: &str, transport: DynHttpTransport) -> Self {
        Self::new(Protocol::from_id(id), transport)
    }

    pub fn protocol(&self) -> Protocol {
        match self {
            Adapter::OpenAi(_) => Protocol::OpenAi,
            Adapter::Anthropic(_) => Protocol::Anthropic,
            Adapter::Gemini(_) => Protocol::Gemini,
        }
    }

    fn inner(&self) -> &dyn ProtocolAdapter {
        match self {
            Adapter::OpenAi(adapter) => adapter,
            Adapter::Anthropic(adapter) => adapter,
            Adapter::Gemini(adapter) => adapter,
        }
    }
}

#[async_trait]
impl ProtocolAdapter for Adapter {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, CheckError> {
        self.inner().chat(request).await
    }

    async fn chat_stream(
        &self,
        request: &ChatRequest,
        on_chunk: ChunkCallback<'_>,
    ) -> Result<ChatResponse, CheckError> {
        self.inner().chat_stream(request, on_chunk).await
    }

    async fn list_models(&self, base_url: &str, api_key: &str) -> Result<Vec<String>, CheckError> {
        self.inner().list_models(base_url, api_key).await
    }

    async fn check_connectivity(&self, base_url: &str, api_key: &str) -> Result<u16, CheckError> {
        self.inner().check_connectivity(base_url, api_key).await
    }

    fn name(&self) -> &'static str {
        self.inner().name()
    }
}

/// `error` member some providers put in an otherwise well-formed body.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum ApiErrorField {
    Object {
        #[serde(default)]
        message: Option<String>,
    },
    Text(String),
}

impl ApiErrorField {
    pub(crate) fn into_message(self) -> String {
        let message = match self {
            ApiErrorField::Object { message } => message.unwrap_or_default(),
            ApiErrorField::Text(text) => text,
        };
        if message.trim().is_empty() {
            "unknown error".to_string()
        } else {
            message
        }
    }
}

pub(crate) fn join_url(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Turns a non-2xx streaming reply into the same soft failure `chat` reports.
pub(crate) async fn stream_http_failure(response: HttpStreamResponse) -> ChatResponse {
    let status = response.status;
    let text = collect_body_text(response.body).await;
    ChatResponse::http_failure(status, &text)
}

pub(crate) fn list_models_error(provider: &'static str, status: u16, body: &str) -> CheckError {
    CheckError::provider(
        provider,
        format!("HTTP {status}: {}", truncate(body, LIST_ERROR_BODY_LIMIT)),
    )
}

pub(crate) fn list_models_parse_error(provider: &'static str, err: serde_json::Error) -> CheckError {
    CheckError::provider(provider, format!("failed to parse model list: {err}"))
}
