//! LLM 接口诊断引擎 支持 OpenAI / Anthropic / Gemini 协议

pub mod batch;
pub mod checker;
pub mod config;
pub mod error;
pub mod http;
pub mod provider;
pub mod report;
pub mod stream;
pub mod types;

#[cfg(test)]
mod test_support;

pub use batch::{BatchRunner, HistoryStore};
pub use checker::{CheckItem, CheckResult, CheckStatus, Checker, FullCheckResult};
pub use config::{CheckerConfig, ProviderConfig};
pub use error::CheckError;
pub use provider::{Adapter, Protocol, ProtocolAdapter};
pub use report::{Report, ReportSummary};
