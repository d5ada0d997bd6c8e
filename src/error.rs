use std::time::Duration;

use thiserror::Error;

/// Aggregates every failure that can propagate out of an adapter call or a config load.
///
/// Provider-reported failures (non-2xx chat replies, error payloads, unparsable chat
/// bodies) are not errors; they travel as data inside
/// [`crate::types::ChatResponse::error`] so the orchestrator can classify them.
#[derive(Debug, Error)]
pub enum CheckError {
    /// DNS, TCP, TLS, body read or deadline failures before a usable response arrived.
    #[error("transport error: {message}")]
    Transport { message: String },
    /// Signals that a request payload could not be serialized.
    #[error("invalid request: {message}")]
    Validation { message: String },
    /// Wraps failures reported by the provider on operations that have no soft form,
    /// such as a non-2xx model listing.
    #[error("provider {provider} error: {message}")]
    Provider {
        /// Protocol name, such as `openai`.
        provider: &'static str,
        /// Human-readable message, usually `HTTP <code>: <body>`.
        message: String,
    },
    /// Raised when building or validating configuration fails.
    #[error("invalid configuration for {field}: {reason}")]
    InvalidConfig {
        /// Name of the configuration field or source that failed validation.
        field: String,
        /// Additional context explaining why the field is invalid.
        reason: String,
    },
    /// A worker task panicked or was cancelled before reporting.
    #[error("check aborted: {message}")]
    Aborted { message: String },
    /// A history store could not persist a run.
    #[error("history storage error: {message}")]
    Storage { message: String },
}

impl CheckError {
    /// Creates a [`CheckError::Transport`] from a textual description.
    ///
    /// # Examples
    ///
    /// ```
    /// use pingai::error::CheckError;
    ///
    /// let err = CheckError::transport("dns lookup failed");
    /// assert!(matches!(err, CheckError::Transport { .. }));
    /// ```
    pub fn transport<T: Into<String>>(message: T) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates a [`CheckError::Provider`] with the given protocol name and message.
    ///
    /// # Examples
    ///
    /// ```
    /// use pingai::error::CheckError;
    ///
    /// let err = CheckError::provider("gemini", "HTTP 404: not found");
    /// assert!(matches!(err, CheckError::Provider { provider: "gemini", .. }));
    /// ```
    pub fn provider<T: Into<String>>(provider: &'static str, message: T) -> Self {
        Self::Provider {
            provider,
            message: message.into(),
        }
    }

    /// Creates a [`CheckError::Storage`] naming the location that failed.
    pub fn storage(location: impl std::fmt::Display, err: impl std::fmt::Display) -> Self {
        Self::Storage {
            message: format!("{location}: {err}"),
        }
    }

    /// Transport error reported when a check deadline expires.
    pub fn timeout(after: Duration) -> Self {
        Self::Transport {
            message: format!("timed out after {}s", after.as_secs()),
        }
    }

    /// Returns the bare message without the variant prefix added by `Display`.
    pub fn detail(&self) -> String {
        match self {
            Self::Transport { message }
            | Self::Validation { message }
            | Self::Provider { message, .. }
            | Self::Aborted { message }
            | Self::Storage { message } => message.clone(),
            Self::InvalidConfig { field, reason } => format!("{field}: {reason}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_is_a_transport_error() {
        let err = CheckError::timeout(Duration::from_secs(15));
        match &err {
            CheckError::Transport { message } => assert_eq!(message, "timed out after 15s"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.to_string(), "transport error: timed out after 15s");
        assert_eq!(err.detail(), "timed out after 15s");
    }

    #[test]
    fn detail_of_invalid_config_names_the_field() {
        let err = CheckError::InvalidConfig {
            field: "timeouts.chat".to_string(),
            reason: "must be positive".to_string(),
        };
        assert_eq!(err.detail(), "timeouts.chat: must be positive");
    }

    #[test]
    fn storage_error_is_not_a_transport_error() {
        let err = CheckError::storage("history.jsonl", "permission denied");
        assert!(matches!(err, CheckError::Storage { .. }));
        assert_eq!(err.to_string(), "history storage error: history.jsonl: permission denied");
        assert_eq!(err.detail(), "history.jsonl: permission denied");
    }
}
