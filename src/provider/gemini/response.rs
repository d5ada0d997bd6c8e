use crate::types::ChatResponse;

use super::types::{GeminiGenerateResponse, GeminiModelList};

pub(crate) fn map_chat_response(status: u16, body: &str) -> ChatResponse {
    if !(200..300).contains(&status) {
        return ChatResponse::http_failure(status, body);
    }
    let parsed: GeminiGenerateResponse = match serde_json::from_str(body) {
        Ok(parsed) => parsed,
        Err(_) => return ChatResponse::parse_failure(status, body),
    };
    if let Some(error) = parsed.error {
        return ChatResponse::provider_failure(status, error.into_message());
    }
    let (prompt, completion) = parsed
        .usage_metadata
        .as_ref()
        .map(|usage| {
            (
                usage.prompt_token_count.unwrap_or(0),
                usage.candidates_token_count.unwrap_or(0),
            )
        })
        .unwrap_or((0, 0));
    match parsed.first_candidate_texts() {
        Some(texts) if !texts.is_empty() => {
            ChatResponse::text(status, texts.concat()).with_usage(prompt, completion)
        }
        _ => ChatResponse::provider_failure(status, "empty response"),
    }
}

/// Keeps only the trailing identifier of each resource name.
pub(crate) fn parse_model_list(body: &str) -> Result<Vec<String>, serde_json::Error> {
    let parsed: GeminiModelList = serde_json::from_str(body)?;
    Ok(parsed
        .models
        .into_iter()
        .map(|model| match model.name.rsplit_once('/') {
            Some((_, id)) => id.to_string(),
            None => model.name,
        })
        .collect())
}
