use crate::types::ChatResponse;

use super::types::{AnthropicMessageResponse, AnthropicModelList};

pub(crate) fn map_chat_response(status: u16, body: &str) -> ChatResponse {
    if !(200..300).contains(&status) {
        return ChatResponse::http_failure(status, body);
    }
    let parsed: AnthropicMessageResponse = match serde_json::from_str(body) {
        Ok(parsed) => parsed,
        Err(_) => return ChatResponse::parse_failure(status, body),
    };
    if let Some(error) = parsed.error {
        return ChatResponse::provider_failure(status, error.into_message());
    }
    if parsed.content.is_empty() {
        return ChatResponse::provider_failure(status, "empty content");
    }
    // thinking / tool_use blocks may precede the first text block
    let content = parsed
        .content
        .into_iter()
        .filter(|block| block.kind.as_deref().is_none_or(|kind| kind == "text"))
        .find_map(|block| block.text)
        .unwrap_or_default();
    let (input, output) = parsed
        .usage
        .map(|usage| {
            (
                usage.input_tokens.unwrap_or(0),
                usage.output_tokens.unwrap_or(0),
            )
        })
        .unwrap_or((0, 0));
    ChatResponse::text(status, content).with_usage(input, output)
}

pub(crate) fn parse_model_list(body: &str) -> Result<Vec<String>, serde_json::Error> {
    let parsed: AnthropicModelList = serde_json::from_str(body)?;
    Ok(parsed.data.into_iter().map(|model| model.id).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_first_text_block_and_usage() {
        let body = r#"{
            "id": "msg_01",
            "type": "message",
            "role": "assistant",
            "model": "claude-3-5-haiku",
            "content": [
                {"type": "thinking", "thinking": "..."},
                {"type": "text", "text": "OK"},
                {"type": "text", "text": "ignored"}
            ],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 14, "output_tokens": 4}
        }"#;
        let resp = map_chat_response(200, body);
        assert!(resp.is_success(), "unexpected error: {}", resp.error);
        assert_eq!(resp.content, "OK");
        assert_eq!((resp.prompt_tokens, resp.completion_tokens), (14, 4));
    }

    #[test]
    fn soft_failures() {
        let resp = map_chat_response(529, r#"{"type":"error","error":{"type":"overloaded_error"}}"#);
        assert_eq!(resp.error, "HTTP 529");

        let resp = map_chat_response(200, "not json");
        assert_eq!(resp.error, "JSON parse error");
        assert_eq!(resp.raw_body, "not json");

        let resp = map_chat_response(
            200,
            r#"{"type":"error","error":{"type":"invalid_request_error","message":"max_tokens too large"}}"#,
        );
        assert_eq!(resp.error, "max_tokens too large");

        let resp = map_chat_response(200, r#"{"content":[],"usage":{"input_tokens":1}}"#);
        assert_eq!(resp.error, "empty content");
    }

    #[test]
    fn model_list_reads_ids() {
        let models = parse_model_list(
            r#"{"data":[{"id":"claude-sonnet-4","type":"model"}],"has_more":false}"#,
        )
        .expect("parse");
        assert_eq!(models, vec!["claude-sonnet-4"]);
    }
}
