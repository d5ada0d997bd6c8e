use crate::types::ChatRequest;

use super::types::{OpenAiChatBody, OpenAiMessage};

/// Canonical roles map one-to-one onto Chat Completions roles.
pub(crate) fn build_openai_body(request: &ChatRequest, stream: bool) -> OpenAiChatBody<'_> {
    OpenAiChatBody {
        model: &request.model,
        messages: request
            .messages
            .iter()
            .map(|message| OpenAiMessage {
                role: message.role.as_str(),
                content: &message.content,
            })
            .collect(),
        stream,
    }
}
