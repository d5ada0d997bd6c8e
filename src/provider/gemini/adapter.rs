use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Url;

use crate::error::CheckError;
use crate::http::{
    DynHttpTransport, get_status_with_headers, get_with_headers, post_json_stream_with_headers,
    post_json_with_headers, redact_url,
};
use crate::provider::{
    ProtocolAdapter, join_url, list_models_error, list_models_parse_error, stream_http_failure,
};
use crate::stream::{ChunkCallback, decode_text_stream};
use crate::types::{ChatRequest, ChatResponse};

use super::request::{build_gemini_body, model_path};
use super::response::{map_chat_response, parse_model_list};
use super::stream::extract_gemini_deltas;

/// Google Gemini adapter
pub struct GeminiAdapter {
    transport: DynHttpTransport,
}

impl GeminiAdapter {
    pub fn new(transport: DynHttpTransport) -> Self {
        Self { transport }
    }

    fn generate_url(request: &ChatRequest, stream: bool) -> Result<String, CheckError> {
        let path = format!("models/{}", model_path(&request.model));
        let base = join_url(&request.base_url, &path);
        if stream {
            with_query(
                &format!("{base}:streamGenerateContent"),
                &[("alt", "sse"), ("key", request.api_key.as_str())],
            )
        } else {
            with_query(&format!("{base}:generateContent"), &[("key", request.api_key.as_str())])
        }
    }

    fn models_url(base_url: &str, api_key: &str) -> Result<String, CheckError> {
        with_query(&join_url(base_url, "models"), &[("key", api_key)])
    }

    fn json_headers() -> HashMap<String, String> {
        HashMap::from([("Content-Type".to_string(), "application/json".to_string())])
    }
}

/// Appends form-encoded query pairs, so keys holding `&`, `#` or `+` survive.
fn with_query(url: &str, params: &[(&str, &str)]) -> Result<String, CheckError> {
    Url::parse_with_params(url, params)
        .map(String::from)
        .map_err(|err| CheckError::Validation {
            message: format!("invalid endpoint URL: {err}"),
        })
}

#[async_trait]
impl ProtocolAdapter for GeminiAdapter {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, CheckError> {
        let url = Self::generate_url(request, false)?;
        tracing::debug!(protocol = self.name(), url = redact_url(&url), "chat request");
        let response = post_json_with_headers(
            self.transport.as_ref(),
            url,
            Self::json_headers(),
            &build_gemini_body(request),
        )
        .await?;
        Ok(map_chat_response(response.status, &response.text_lossy()))
    }

    async fn chat_stream(
        &self,
        request: &ChatRequest,
        on_chunk: ChunkCallback<'_>,
    ) -> Result<ChatResponse, CheckError> {
        let url = Self::generate_url(request, true)?;
        tracing::debug!(protocol = self.name(), url = redact_url(&url), "stream request");
        let response = post_json_stream_with_headers(
            self.transport.as_ref(),
            url,
            Self::json_headers(),
            &build_gemini_body(request),
        )
        .await?;
        if !response.is_success() {
            return Ok(stream_http_failure(response).await);
        }
        let status = response.status;
        let content =
            decode_text_stream(response.body, self.name(), extract_gemini_deltas, on_chunk).await;
        Ok(ChatResponse::text(status, content))
    }

    async fn list_models(&self, base_url: &str, api_key: &str) -> Result<Vec<String>, CheckError> {
        let response = get_with_headers(
            self.transport.as_ref(),
            Self::models_url(base_url, api_key)?,
            HashMap::new(),
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
            Self::models_url(base_url, api_key)?,
            HashMap::new(),
        )
        .await
    }

    fn name(&self) -> &'static str {
        "gemini"
    }
}
