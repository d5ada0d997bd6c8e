//! Protocol-neutral request and response shapes shared by every adapter.
//!
//! Adapters translate these into each provider's JSON on the way out and fold the
//! provider reply back into a [`ChatResponse`] on the way in, so the checker never
//! sees a vendor-specific payload.

use serde::{Deserialize, Serialize};

/// Upper bound on the raw body kept on a soft failure.
pub const RAW_BODY_LIMIT: usize = 300;

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

/// Single conversation turn. Order within a request is the turn history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// Chat call addressed to one endpoint with one credential.
///
/// # Examples
///
/// ```
/// use pingai::types::{ChatRequest, Message};
///
/// let request = ChatRequest::new("https://api.openai.com/v1", "sk-test", "gpt-4o-mini")
///     .with_messages(vec![Message::user("ping")])
///     .streaming();
/// assert!(request.stream);
/// assert_eq!(request.messages.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// Endpoint base, e.g. `https://api.openai.com/v1`.
    pub base_url: String,
    /// Opaque credential; never logged.
    pub api_key: String,
    pub model: String,
    pub messages: Vec<Message>,
    pub stream: bool,
}

impl ChatRequest {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            messages: Vec::new(),
            stream: false,
        }
    }

    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = messages;
        self
    }

    pub fn streaming(mut self) -> Self {
        self.stream = true;
        self
    }
}

/// Normalized chat reply.
///
/// A non-empty [`error`](Self::error) marks a soft failure reported by the provider;
/// transport failures never produce a `ChatResponse`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatResponse {
    pub content: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub status_code: u16,
    /// Trimmed, truncated body kept for diagnostics on failure.
    pub raw_body: String,
    /// Empty on success.
    pub error: String,
}

impl ChatResponse {
    /// Successful reply with the extracted text.
    pub fn text(status_code: u16, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            status_code,
            ..Self::default()
        }
    }

    /// Soft failure for a non-2xx status: `HTTP <code>` plus the head of the body.
    ///
    /// # Examples
    ///
    /// ```
    /// use pingai::types::ChatResponse;
    ///
    /// let resp = ChatResponse::http_failure(429, "slow down");
    /// assert_eq!(resp.error, "HTTP 429");
    /// assert_eq!(resp.raw_body, "slow down");
    /// assert!(!resp.is_success());
    /// ```
    pub fn http_failure(status_code: u16, body: &str) -> Self {
        Self {
            status_code,
            raw_body: truncate(body, RAW_BODY_LIMIT),
            error: format!("HTTP {status_code}"),
            ..Self::default()
        }
    }

    /// Soft failure for a 2xx reply whose body could not be decoded.
    pub fn parse_failure(status_code: u16, body: &str) -> Self {
        Self {
            status_code,
            raw_body: truncate(body, RAW_BODY_LIMIT),
            error: "JSON parse error".to_string(),
            ..Self::default()
        }
    }

    /// Soft failure carrying a provider-reported or shape-related message.
    pub fn provider_failure(status_code: u16, message: impl Into<String>) -> Self {
        Self {
            status_code,
            error: message.into(),
            ..Self::default()
        }
    }

    pub fn with_usage(mut self, prompt_tokens: u64, completion_tokens: u64) -> Self {
        self.prompt_tokens = prompt_tokens;
        self.completion_tokens = completion_tokens;
        self
    }

    pub fn is_success(&self) -> bool {
        self.error.is_empty()
    }
}

/// Trims `text` and cuts it to `max` characters, appending `...` when cut.
///
/// # Examples
///
/// ```
/// use pingai::types::truncate;
///
/// assert_eq!(truncate("  hello  ", 10), "hello");
/// assert_eq!(truncate("hello world", 5), "hello...");
/// ```
pub fn truncate(text: &str, max: usize) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("你好世界", 2), "你好...");
        assert_eq!(truncate("你好", 2), "你好");
        assert_eq!(truncate("", 5), "");
    }

    #[test]
    fn http_failure_truncates_body_to_limit() {
        let body = "x".repeat(1000);
        let resp = ChatResponse::http_failure(500, &body);
        assert_eq!(resp.error, "HTTP 500");
        assert_eq!(resp.raw_body.len(), RAW_BODY_LIMIT + 3);
        assert!(resp.raw_body.ends_with("..."));
        assert!(resp.content.is_empty());
    }

    #[test]
    fn role_serializes_lowercase() {
        let value = serde_json::to_value(Message::assistant("hi")).expect("serialize");
        assert_eq!(value["role"], "assistant");
        assert_eq!(value["content"], "hi");
    }
}
