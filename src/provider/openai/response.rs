use crate::types::ChatResponse;

use super::types::{OpenAiChatResponse, OpenAiModelList};

pub(crate) fn map_chat_response(status: u16, body: &str) -> ChatResponse {
    if !(200..300).contains(&status) {
        return ChatResponse::http_failure(status, body);
    }
    let parsed: OpenAiChatResponse = match serde_json::from_str(body) {
        Ok(parsed) => parsed,
        Err(_) => return ChatResponse::parse_failure(status, body),
    };
    if let Some(error) = parsed.error {
        return ChatResponse::provider_failure(status, error.into_message());
    }
    let Some(choice) = parsed.choices.into_iter().next() else {
        return ChatResponse::provider_failure(status, "empty choices");
    };
    let content = choice
        .message
        .and_then(|message| message.content)
        .unwrap_or_default();
    let (prompt, completion) = parsed
        .usage
        .map(|usage| {
            (
                usage.prompt_tokens.unwrap_or(0),
                usage.completion_tokens.unwrap_or(0),
            )
        })
        .unwrap_or((0, 0));
    ChatResponse::text(status, content).with_usage(prompt, completion)
}

pub(crate) fn parse_model_list(body: &str) -> Result<Vec<String>, serde_json::Error> {
    let parsed: OpenAiModelList = serde_json::from_str(body)?;
    Ok(parsed.data.into_iter().map(|model| model.id).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_text_and_usage() {
        let body = r#"{
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "model": "gpt-4.1",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "OK"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 1, "total_tokens": 13}
        }"#;
        let resp = map_chat_response(200, body);
        assert!(resp.is_success(), "unexpected error: {}", resp.error);
        assert_eq!(resp.content, "OK");
        assert_eq!((resp.prompt_tokens, resp.completion_tokens), (12, 1));
        assert_eq!(resp.status_code, 200);
    }

    #[test]
    fn missing_usage_defaults_to_zero() {
        let body = r#"{"choices": [{"message": {"content": "hi"}}]}"#;
        let resp = map_chat_response(200, body);
        assert_eq!(resp.content, "hi");
        assert_eq!((resp.prompt_tokens, resp.completion_tokens), (0, 0));
    }

    #[test]
    fn soft_failures() {
        let resp = map_chat_response(401, r#"{"error":{"message":"bad key"}}"#);
        assert_eq!(resp.error, "HTTP 401");
        assert_eq!(resp.raw_body, r#"{"error":{"message":"bad key"}}"#);

        let resp = map_chat_response(200, "<html>gateway</html>");
        assert_eq!(resp.error, "JSON parse error");
        assert_eq!(resp.raw_body, "<html>gateway</html>");

        let resp = map_chat_response(200, r#"{"error":{"message":"model overloaded"}}"#);
        assert_eq!(resp.error, "model overloaded");

        let resp = map_chat_response(200, r#"{"choices": []}"#);
        assert_eq!(resp.error, "empty choices");
    }

    #[test]
    fn model_list_reads_ids() {
        let models =
            parse_model_list(r#"{"object":"list","data":[{"id":"gpt-4o"},{"id":"gpt-4o-mini"}]}"#)
                .expect("parse");
        assert_eq!(models, vec!["gpt-4o", "gpt-4o-mini"]);
    }
}
