use crate::types::{ChatRequest, Role};

use super::types::{AnthropicMessage, AnthropicMessagesBody};

/// Output cap for check calls; a few tokens back are enough.
pub(crate) const CHECK_MAX_TOKENS: u32 = 256;

/// System turns are lifted into `system` (joined by blank lines when several).
pub(crate) fn build_anthropic_body(request: &ChatRequest, stream: bool) -> AnthropicMessagesBody<'_> {
    let system: Vec<&str> = request
        .messages
        .iter()
        .filter(|message| message.role == Role::System)
        .map(|message| message.content.as_str())
        .collect();
    let messages = request
        .messages
        .iter()
        .filter(|message| message.role != Role::System)
        .map(|message| AnthropicMessage {
            role: message.role.as_str(),
            content: &message.content,
        })
        .collect();

    AnthropicMessagesBody {
        model: &request.model,
        messages,
        max_tokens: CHECK_MAX_TOKENS,
        system: (!system.is_empty()).then(|| system.join("\n\n")),
        stream,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::types::Message;

    #[test]
    fn system_turns_move_to_top_level_field() {
        let request = ChatRequest::new("https://api.anthropic.com/v1", "k", "claude-3-5-haiku")
            .with_messages(vec![
                Message::system("be brief"),
                Message::user("Remember 42"),
                Message::assistant("OK"),
                Message::user("What number?"),
            ]);
        let body = serde_json::to_value(build_anthropic_body(&request, true)).expect("serialize");
        assert_eq!(
            body,
            json!({
                "model": "claude-3-5-haiku",
                "messages": [
                    {"role": "user", "content": "Remember 42"},
                    {"role": "assistant", "content": "OK"},
                    {"role": "user", "content": "What number?"}
                ],
                "max_tokens": 256,
                "system": "be brief",
                "stream": true
            })
        );
    }

    #[test]
    fn no_system_field_without_system_turns() {
        let request = ChatRequest::new("https://api.anthropic.com/v1", "k", "claude")
            .with_messages(vec![Message::user("hi")]);
        let body = serde_json::to_value(build_anthropic_body(&request, false)).expect("serialize");
        assert!(body.get("system").is_none());
        assert!(body.get("stream").is_none());
    }
}
