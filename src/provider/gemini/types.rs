use serde::{Deserialize, Serialize};

use crate::provider::ApiErrorField;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GeminiGenerateBody<'a> {
    pub(crate) contents: Vec<GeminiContent<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) system_instruction: Option<GeminiSystemInstruction<'a>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct GeminiContent<'a> {
    /// `user` or `model`.
    pub(crate) role: &'static str,
    pub(crate) parts: Vec<GeminiPart<'a>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct GeminiSystemInstruction<'a> {
    pub(crate) parts: Vec<GeminiPart<'a>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct GeminiPart<'a> {
    pub(crate) text: &'a str,
}

/// Shared by the unary reply and every streamed event.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GeminiGenerateResponse {
    #[serde(default)]
    pub(crate) candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    pub(crate) usage_metadata: Option<GeminiUsageMetadata>,
    #[serde(default)]
    pub(crate) error: Option<ApiErrorField>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GeminiCandidate {
    #[serde(default)]
    pub(crate) content: Option<GeminiCandidateContent>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GeminiCandidateContent {
    #[serde(default)]
    pub(crate) parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GeminiResponsePart {
    #[serde(default)]
    pub(crate) text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GeminiUsageMetadata {
    #[serde(default)]
    pub(crate) prompt_token_count: Option<u64>,
    #[serde(default)]
    pub(crate) candidates_token_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GeminiModelList {
    #[serde(default)]
    pub(crate) models: Vec<GeminiModel>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GeminiModel {
    /// Resource name such as `models/gemini-1.5-pro`.
    pub(crate) name: String,
}

impl GeminiGenerateResponse {
    /// Text parts of the first candidate, in order.
    pub(crate) fn first_candidate_texts(self) -> Option<Vec<String>> {
        let content = self.candidates.into_iter().next()?.content?;
        Some(content.parts.into_iter().filter_map(|part| part.text).collect())
    }
}
