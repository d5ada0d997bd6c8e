use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::CheckError;
use crate::http::{
    DynHttpTransport, get_status_with_headers, get_with_headers, post_json_stream_with_headers,
    post_json_with_headers,
};
use crate::provider::{
    ProtocolAdapter, join_url, list_models_error, list_models_parse_error, stream_http_failure,
};
use crate::stream::{ChunkCallback, decode_text_stream};
use crate::types::{ChatRequest, ChatResponse};

use super::request::build_anthropic_body;
use super::response::{map_chat_response, parse_model_list};
use super::stream::extract_anthropic_deltas;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic Messages compatible adapter
pub struct AnthropicAdapter {
    transport: DynHttpTransport,
}

impl AnthropicAdapter {
    pub fn new(transport: DynHttpTransport) -> Self {
        Self { transport }
    }

    fn auth_headers(api_key: &str) -> HashMap<String, String> {
        HashMap::from([
            ("x-api-key".to_string(), api_key.to_string()),
            ("anthropic-version".to_string(), ANTHROPIC_VERSION.to_string()),
        ])
    }

    fn chat_headers(api_key: &str, stream: bool) -> HashMap<String, String> {
        let mut headers = Self::auth_headers(api_key);
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        if stream {
            headers.insert("Accept".to_string(), "text/event-stream".to_string());
        }
        headers
    }
}

#[async_trait]
impl ProtocolAdapter for AnthropicAdapter {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, CheckError> {
        let url = join_url(&request.base_url, "messages");
        tracing::debug!(protocol = self.name(), %url, model = %request.model, "chat request");
        let response = post_json_with_headers(
            self.transport.as_ref(),
            url,
            Self::chat_headers(&request.api_key, false),
            &build_anthropic_body(request, false),
        )
        .await?;
        Ok(map_chat_response(response.status, &response.text_lossy()))
    }

    async fn chat_stream(
        &self,
        request: &ChatRequest,
        on_chunk: ChunkCallback<'_>,
    ) -> Result<ChatResponse, CheckError> {
        let url = join_url(&request.base_url, "messages");
        tracing::debug!(protocol = self.name(), %url, model = %request.model, "stream request");
        let response = post_json_stream_with_headers(
            self.transport.as_ref(),
            url,
            Self::chat_headers(&request.api_key, true),
            &build_anthropic_body(request, true),
        )
        .await?;
        if !response.is_success() {
            return Ok(stream_http_failure(response).await);
        }
        let status = response.status;
        let content =
            decode_text_stream(response.body, self.name(), extract_anthropic_deltas, on_chunk)
                .await;
        Ok(ChatResponse::text(status, content))
    }

    async fn list_models(&self, base_url: &str, api_key: &str) -> Result<Vec<String>, CheckError> {
        let response = get_with_headers(
            self.transport.as_ref(),
            join_url(base_url, "models"),
            Self::auth_headers(api_key),
        )
        .await?;
        let text = response.text_lossy();
        if !response.is_success() {
            return Err(list_models_error(self.name(), response.status, &text));
        }
        parse_model_list(&text).map_err(|err| list_models_parse_error(self.name(), err))
    }

    async fn check_connectivity(&self, base_url: &str, api_key: &str) -> Result<u16, CheckError> {
        get_status_with_headers(
            self.transport.as_ref(),
            join_url(base_url, "models"),
            Self::auth_headers(api_key),
        )
        .await
    }

    fn name(&self) -> &'static str {
        "anthropic"
    }
}
