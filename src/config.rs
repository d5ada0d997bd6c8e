use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::checker::CheckItem;
use crate::error::CheckError;
use crate::provider::Protocol;

/// 待检测的供应商配置 由调用方提供 核心只读
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(rename = "providerID", alias = "provider_id", alias = "providerId", default)]
    pub provider_id: String,
    #[serde(rename = "providerName", alias = "provider_name", default)]
    pub provider_name: String,
    /// 例如 `https://api.openai.com/v1`
    #[serde(rename = "baseURL", alias = "base_url", alias = "baseUrl")]
    pub base_url: String,
    #[serde(rename = "apiKey", alias = "api_key", default)]
    pub api_key: String,
    pub model: String,
    /// 协议标识 原样保留 未识别时按 OpenAI 兼容
    #[serde(default = "default_protocol_id")]
    pub protocol: String,
}

fn default_protocol_id() -> String {
    Protocol::OpenAi.as_str().to_string()
}

impl ProviderConfig {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        protocol: impl Into<String>,
    ) -> Self {
        Self {
            provider_id: String::new(),
            provider_name: String::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            protocol: protocol.into(),
        }
    }

    pub fn with_identity(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.provider_id = id.into();
        self.provider_name = name.into();
        self
    }

    /// Resolved protocol; unknown ids fall back to OpenAI-compatible.
    pub fn protocol(&self) -> Protocol {
        Protocol::from_id(&self.protocol)
    }
}

/// 各检测项的超时 单位秒
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckTimeouts {
    pub connectivity: u64,
    pub chat: u64,
    pub stream: u64,
    pub models: u64,
    #[serde(alias = "multiTurn")]
    pub multi_turn: u64,
}

impl Default for CheckTimeouts {
    fn default() -> Self {
        Self {
            connectivity: 15,
            chat: 30,
            stream: 30,
            models: 15,
            multi_turn: 60,
        }
    }
}

impl CheckTimeouts {
    /// Deadline applied to one check item.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use pingai::checker::CheckItem;
    /// use pingai::config::CheckTimeouts;
    ///
    /// let timeouts = CheckTimeouts::default();
    /// assert_eq!(timeouts.for_item(CheckItem::MultiTurn), Duration::from_secs(60));
    /// ```
    pub fn for_item(&self, item: CheckItem) -> Duration {
        let secs = match item {
            CheckItem::Connectivity => self.connectivity,
            CheckItem::Chat => self.chat,
            CheckItem::Stream => self.stream,
            CheckItem::Models => self.models,
            CheckItem::MultiTurn => self.multi_turn,
        };
        Duration::from_secs(secs)
    }

    fn validate(&self) -> Result<(), CheckError> {
        let fields = [
            ("timeouts.connectivity", self.connectivity),
            ("timeouts.chat", self.chat),
            ("timeouts.stream", self.stream),
            ("timeouts.models", self.models),
            ("timeouts.multi_turn", self.multi_turn),
        ];
        match fields.iter().find(|(_, secs)| *secs == 0) {
            Some((field, _)) => Err(invalid(*field, "must be at least one second")),
            None => Ok(()),
        }
    }
}

/// 探测用的固定提示词
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckPrompts {
    pub chat: String,
    pub stream: String,
    /// 第一轮 要求模型记住哨兵值
    pub multi_turn_first: String,
    /// 第二轮 询问哨兵值
    pub multi_turn_second: String,
    /// 第二轮回复中应出现的值
    pub sentinel: String,
}

impl Default for CheckPrompts {
    fn default() -> Self {
        Self {
            chat: "Hi, reply with exactly: OK".to_string(),
            stream: "Count from 1 to 5".to_string(),
            multi_turn_first: "Remember this number: 42. Just reply OK.".to_string(),
            multi_turn_second: "What number did I ask you to remember?".to_string(),
            sentinel: "42".to_string(),
        }
    }
}

/// 检测器配置
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckerConfig {
    pub timeouts: CheckTimeouts,
    pub prompts: CheckPrompts,
    /// Upper bound on concurrently running batch items; `None` runs every item at once.
    pub max_concurrency: Option<usize>,
}

impl CheckerConfig {
    /// Parses a JSON document; omitted fields keep their defaults.
    ///
    /// # Examples
    ///
    /// ```
    /// use pingai::config::CheckerConfig;
    ///
    /// let config = CheckerConfig::from_json_str(r#"{"timeouts": {"chat": 10}, "max_concurrency": 4}"#).unwrap();
    /// assert_eq!(config.timeouts.chat, 10);
    /// assert_eq!(config.timeouts.stream, 30);
    /// assert_eq!(config.max_concurrency, Some(4));
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`CheckError::InvalidConfig`] on malformed JSON, a zero timeout, an empty
    /// sentinel or a zero concurrency limit.
    pub fn from_json_str(json: &str) -> Result<Self, CheckError> {
        let value: serde_json::Value =
            serde_json::from_str(json).map_err(|err| invalid("checker config", err.to_string()))?;
        // with serde(default) a struct also deserializes from a sequence
        if !value.is_object() {
            return Err(invalid("checker config", "expected a JSON object"));
        }
        let config: Self =
            serde_json::from_value(value).map_err(|err| invalid("checker config", err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), CheckError> {
        self.timeouts.validate()?;
        if self.prompts.sentinel.trim().is_empty() {
            return Err(invalid("prompts.sentinel", "must not be empty"));
        }
        if self.max_concurrency == Some(0) {
            return Err(invalid("max_concurrency", "must be positive when set"));
        }
        Ok(())
    }
}

/// Parses a JSON array of provider configurations.
///
/// # Errors
///
/// Returns [`CheckError::InvalidConfig`] when the document is not an array of provider
/// objects or an entry has an empty `baseURL` or `model`.
pub fn load_provider_configs(json: &str) -> Result<Vec<ProviderConfig>, CheckError> {
    let configs: Vec<ProviderConfig> =
        serde_json::from_str(json).map_err(|err| invalid("providers", err.to_string()))?;
    for (index, config) in configs.iter().enumerate() {
        if config.base_url.trim().is_empty() {
            return Err(invalid(format!("providers[{index}].baseURL"), "must not be empty"));
        }
        if config.model.trim().is_empty() {
            return Err(invalid(format!("providers[{index}].model"), "must not be empty"));
        }
    }
    Ok(configs)
}

fn invalid(field: impl Into<String>, reason: impl Into<String>) -> CheckError {
    CheckError::InvalidConfig {
        field: field.into(),
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_config_reads_interchange_names() {
        let json = r#"[{
            "providerID": "openai",
            "providerName": "OpenAI",
            "baseURL": "https://api.openai.com/v1",
            "apiKey": "sk-x",
            "model": "gpt-4o-mini",
            "protocol": "openai"
        }, {
            "base_url": "https://proxy.example/v1",
            "model": "deepseek-chat",
            "protocol": "deepseek"
        }]"#;
        let configs = load_provider_configs(json).expect("parse");
        assert_eq!(configs.len(), 2);
        assert_eq!(configs[0].provider_id, "openai");
        assert_eq!(configs[0].api_key, "sk-x");
        assert_eq!(configs[1].protocol(), Protocol::OpenAi);
        assert_eq!(configs[1].protocol, "deepseek");
        assert!(configs[1].api_key.is_empty());
    }

    #[test]
    fn missing_protocol_defaults_to_openai() {
        let configs =
            load_provider_configs(r#"[{"baseURL":"https://a.example","model":"m"}]"#).expect("parse");
        assert_eq!(configs[0].protocol, "openai");
    }

    #[test]
    fn empty_base_url_is_rejected() {
        let err = load_provider_configs(r#"[{"baseURL":" ","model":"m"}]"#).expect_err("invalid");
        match err {
            CheckError::InvalidConfig { field, .. } => assert_eq!(field, "providers[0].baseURL"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn malformed_json_is_invalid_config() {
        assert!(matches!(
            load_provider_configs("{"),
            Err(CheckError::InvalidConfig { .. })
        ));
        assert!(matches!(
            CheckerConfig::from_json_str("[]"),
            Err(CheckError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn checker_config_must_be_an_object() {
        for json in ["[]", "[30, 30]", "null", "42", "\"timeouts\""] {
            let err = CheckerConfig::from_json_str(json).expect_err(json);
            assert_eq!(err.detail(), "checker config: expected a JSON object", "{json}");
        }
        assert_eq!(
            CheckerConfig::from_json_str("{}").expect("empty object"),
            CheckerConfig::default()
        );
    }

    #[test]
    fn checker_defaults_match_check_deadlines() {
        let config = CheckerConfig::default();
        let secs: Vec<u64> = CheckItem::ALL
            .iter()
            .map(|item| config.timeouts.for_item(*item).as_secs())
            .collect();
        assert_eq!(secs, vec![15, 30, 30, 15, 60]);
        assert_eq!(config.prompts.sentinel, "42");
        assert!(config.max_concurrency.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_values_are_rejected() {
        let err = CheckerConfig::from_json_str(r#"{"timeouts":{"models":0}}"#).expect_err("invalid");
        assert_eq!(err.detail(), "timeouts.models: must be at least one second");
        let err = CheckerConfig::from_json_str(r#"{"max_concurrency":0}"#).expect_err("invalid");
        assert!(matches!(err, CheckError::InvalidConfig { .. }));
        let err = CheckerConfig::from_json_str(r#"{"prompts":{"sentinel":""}}"#).expect_err("invalid");
        assert_eq!(err.detail(), "prompts.sentinel: must not be empty");
    }
}
