use crate::types::{ChatRequest, Role};

use super::types::{GeminiContent, GeminiGenerateBody, GeminiPart, GeminiSystemInstruction};

/// Gemini names the assistant side `model`; system turns go to `systemInstruction`.
pub(crate) fn build_gemini_body(request: &ChatRequest) -> GeminiGenerateBody<'_> {
    let mut contents = Vec::with_capacity(request.messages.len());
    let mut system_parts = Vec::new();

    for message in &request.messages {
        let part = GeminiPart {
            text: &message.content,
        };
        match message.role {
            Role::System => system_parts.push(part),
            Role::User => contents.push(GeminiContent {
                role: "user",
                parts: vec![part],
            }),
            Role::Assistant => contents.push(GeminiContent {
                role: "model",
                parts: vec![part],
            }),
        }
    }

    GeminiGenerateBody {
        contents,
        system_instruction: (!system_parts.is_empty())
            .then_some(GeminiSystemInstruction { parts: system_parts }),
    }
}

/// Accepts both `gemini-1.5-pro` and `models/gemini-1.5-pro`.
pub(crate) fn model_path(model: &str) -> &str {
    model.trim().trim_start_matches("models/")
}
