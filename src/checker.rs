//! Check orchestration: one connectivity gate, then four independent checks.
//!
//! Every check runs on its own tokio task under its own deadline, so a hung or failing
//! check never affects its siblings. Failures leave this module as data
//! ([`CheckStatus::Failed`] plus message and detail), never as `Err`.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::config::{CheckTimeouts, CheckerConfig, CheckPrompts, ProviderConfig};
use crate::error::CheckError;
use crate::http::DynHttpTransport;
use crate::http::reqwest::default_dyn_transport;
use crate::provider::{Adapter, DynAdapter};
use crate::report::overall_status;
use crate::types::{ChatRequest, ChatResponse, Message, truncate};

/// Local timestamp layout used in results and reports.
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const PREVIEW_LIMIT: usize = 100;
const TURN_PREVIEW_LIMIT: usize = 50;
const MODEL_PREVIEW_COUNT: usize = 5;

/// 检测项 顺序即结果中的固定顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckItem {
    Connectivity,
    Chat,
    Stream,
    Models,
    MultiTurn,
}

impl CheckItem {
    pub const ALL: [CheckItem; 5] = [
        CheckItem::Connectivity,
        CheckItem::Chat,
        CheckItem::Stream,
        CheckItem::Models,
        CheckItem::MultiTurn,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CheckItem::Connectivity => "connectivity",
            CheckItem::Chat => "chat",
            CheckItem::Stream => "stream",
            CheckItem::Models => "models",
            CheckItem::MultiTurn => "multi_turn",
        }
    }
}

impl fmt::Display for CheckItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 检测状态 按严重程度排序 `Failed` 最高
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    #[default]
    Pending,
    Running,
    Success,
    Warning,
    Failed,
}

impl CheckStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckStatus::Pending => "pending",
            CheckStatus::Running => "running",
            CheckStatus::Success => "success",
            CheckStatus::Warning => "warning",
            CheckStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单项检测结果 时间单位为毫秒
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    pub item: CheckItem,
    pub status: CheckStatus,
    /// Wall time of the check.
    pub latency: u64,
    /// Time to first streamed token; zero for non-stream checks.
    pub ttft: u64,
    pub message: String,
    pub detail: String,
    #[serde(rename = "tokenIn")]
    pub token_in: u64,
    #[serde(rename = "tokenOut")]
    pub token_out: u64,
}

impl CheckResult {
    fn new(item: CheckItem, status: CheckStatus, message: impl Into<String>) -> Self {
        Self {
            item,
            status,
            latency: 0,
            ttft: 0,
            message: message.into(),
            detail: String::new(),
            token_in: 0,
            token_out: 0,
        }
    }

    fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }

    fn with_latency(mut self, started: Instant) -> Self {
        self.latency = elapsed_ms(started);
        self
    }

    fn with_tokens(mut self, token_in: u64, token_out: u64) -> Self {
        self.token_in = token_in;
        self.token_out = token_out;
        self
    }

    /// Failure for a check whose task never reported.
    fn aborted(item: CheckItem, err: CheckError) -> Self {
        Self::new(item, CheckStatus::Failed, "check aborted").with_detail(err.detail())
    }
}

/// 一次完整检测的汇总
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullCheckResult {
    #[serde(rename = "providerID")]
    pub provider_id: String,
    #[serde(rename = "providerName")]
    pub provider_name: String,
    #[serde(rename = "baseURL")]
    pub base_url: String,
    pub model: String,
    /// Protocol id exactly as configured.
    pub protocol: String,
    /// Fixed order: connectivity, chat, stream, models, multi_turn.
    pub results: Vec<CheckResult>,
    #[serde(rename = "modelList", default)]
    pub model_list: Vec<String>,
    #[serde(rename = "startTime")]
    pub start_time: String,
    #[serde(rename = "endTime")]
    pub end_time: String,
    #[serde(rename = "totalLatency")]
    pub total_latency: u64,
}

impl FullCheckResult {
    pub fn result(&self, item: CheckItem) -> Option<&CheckResult> {
        self.results.iter().find(|result| result.item == item)
    }

    /// Placeholder for a run whose task never reported.
    pub(crate) fn aborted(provider: &ProviderConfig, err: CheckError) -> Self {
        let now = now_string();
        Self {
            provider_id: provider.provider_id.clone(),
            provider_name: provider.provider_name.clone(),
            base_url: provider.base_url.clone(),
            model: provider.model.clone(),
            protocol: provider.protocol.clone(),
            results: vec![CheckResult::aborted(CheckItem::Connectivity, err)],
            model_list: Vec::new(),
            start_time: now.clone(),
            end_time: now,
            total_latency: 0,
        }
    }
}

/// Maps a connectivity outcome onto a status.
///
/// # Examples
///
/// ```
/// use pingai::checker::{classify_connectivity, CheckStatus};
///
/// assert_eq!(classify_connectivity(Ok(200)).status, CheckStatus::Success);
/// assert_eq!(classify_connectivity(Ok(401)).status, CheckStatus::Warning);
/// assert_eq!(classify_connectivity(Ok(503)).status, CheckStatus::Failed);
/// ```
pub fn classify_connectivity(outcome: Result<u16, CheckError>) -> CheckResult {
    let item = CheckItem::Connectivity;
    match outcome {
        Err(err) => CheckResult::new(item, CheckStatus::Failed, "unreachable").with_detail(err.detail()),
        Ok(code @ (401 | 403)) => CheckResult::new(
            item,
            CheckStatus::Warning,
            format!("reachable, authentication failed (HTTP {code})"),
        )
        .with_detail("check credential"),
        Ok(code @ 200..=499) => {
            CheckResult::new(item, CheckStatus::Success, format!("reachable (HTTP {code})"))
        }
        Ok(code) => CheckResult::new(item, CheckStatus::Failed, format!("service error (HTTP {code})")),
    }
}

/// 检测引擎 持有共享 transport 与配置
pub struct Checker {
    transport: DynHttpTransport,
    config: CheckerConfig,
}

impl Checker {
    pub fn new(transport: DynHttpTransport, config: CheckerConfig) -> Self {
        Self { transport, config }
    }

    /// Uses the reqwest transport.
    ///
    /// # Errors
    ///
    /// Returns [`CheckError::Transport`] when the HTTP client cannot be built.
    pub fn with_default_transport(config: CheckerConfig) -> Result<Self, CheckError> {
        Ok(Self::new(default_dyn_transport()?, config))
    }

    pub fn config(&self) -> &CheckerConfig {
        &self.config
    }

    /// Runs the full check sequence against one provider configuration.
    pub async fn run_full_check(&self, provider: &ProviderConfig) -> FullCheckResult {
        let adapter: DynAdapter = Arc::new(Adapter::new(provider.protocol(), self.transport.clone()));
        self.run_with_adapter(adapter, provider).await
    }

    /// Same as [`Checker::run_full_check`] with a caller-supplied adapter.
    pub async fn run_with_adapter(
        &self,
        adapter: DynAdapter,
        provider: &ProviderConfig,
    ) -> FullCheckResult {
        let started = Instant::now();
        let start_time = now_string();
        let target = Arc::new(CheckTarget {
            adapter,
            base_url: provider.base_url.clone(),
            api_key: provider.api_key.clone(),
            model: provider.model.clone(),
            timeouts: self.config.timeouts,
            prompts: self.config.prompts.clone(),
        });

        let mut run = FullCheckResult {
            provider_id: provider.provider_id.clone(),
            provider_name: provider.provider_name.clone(),
            base_url: provider.base_url.clone(),
            model: provider.model.clone(),
            protocol: provider.protocol.clone(),
            results: Vec::with_capacity(CheckItem::ALL.len()),
            model_list: Vec::new(),
            start_time,
            end_time: String::new(),
            total_latency: 0,
        };

        let connectivity = target.check_connectivity().await;
        let gate_failed = connectivity.status == CheckStatus::Failed;
        run.results.push(connectivity);

        if gate_failed {
            tracing::debug!(provider = %provider.provider_name, "connectivity failed, skipping remaining checks");
        } else {
            let chat = spawn_check(&target, |target| async move { target.check_chat().await });
            let stream = spawn_check(&target, |target| async move { target.check_stream().await });
            let models = spawn_check(&target, |target| async move { target.check_models().await });
            let multi_turn =
                spawn_check(&target, |target| async move { target.check_multi_turn().await });

            let (chat, stream, models, multi_turn) = tokio::join!(chat, stream, models, multi_turn);
            let (models, model_list) = match models {
                Ok(outcome) => outcome,
                Err(err) => (CheckResult::aborted(CheckItem::Models, join_error(err)), Vec::new()),
            };
            run.results.extend([
                settle(CheckItem::Chat, chat),
                settle(CheckItem::Stream, stream),
                models,
                settle(CheckItem::MultiTurn, multi_turn),
            ]);
            run.model_list = model_list;
        }

        run.end_time = now_string();
        run.total_latency = elapsed_ms(started);
        tracing::info!(
            provider = %run.provider_name,
            model = %run.model,
            status = %overall_status(&run),
            total_ms = run.total_latency,
            "check run finished"
        );
        run
    }
}

/// Read-only inputs shared by the check tasks of one run.
struct CheckTarget {
    adapter: DynAdapter,
    base_url: String,
    api_key: String,
    model: String,
    timeouts: CheckTimeouts,
    prompts: CheckPrompts,
}

impl CheckTarget {
    fn request(&self, messages: Vec<Message>) -> ChatRequest {
        ChatRequest::new(&self.base_url, &self.api_key, &self.model).with_messages(messages)
    }

    async fn check_connectivity(&self) -> CheckResult {
        let started = Instant::now();
        let outcome = with_deadline(
            self.timeouts.for_item(CheckItem::Connectivity),
            self.adapter.check_connectivity(&self.base_url, &self.api_key),
        )
        .await;
        classify_connectivity(outcome).with_latency(started)
    }

    async fn check_chat(&self) -> CheckResult {
        let item = CheckItem::Chat;
        let started = Instant::now();
        let request = self.request(vec![Message::user(&self.prompts.chat)]);
        let outcome = with_deadline(self.timeouts.for_item(item), self.adapter.chat(&request)).await;

        let result = match outcome {
            Err(err) => CheckResult::new(item, CheckStatus::Failed, "request failed").with_detail(err.detail()),
            Ok(resp) if !resp.is_success() => soft_failure(item, resp),
            Ok(resp) => CheckResult::new(item, CheckStatus::Success, "chat ok")
                .with_detail(truncate(&resp.content, PREVIEW_LIMIT))
                .with_tokens(resp.prompt_tokens, resp.completion_tokens),
        };
        result.with_latency(started)
    }

    async fn check_stream(&self) -> CheckResult {
        let item = CheckItem::Stream;
        let started = Instant::now();
        let request = self.request(vec![Message::user(&self.prompts.stream)]).streaming();

        let mut chunks = 0usize;
        let mut ttft = 0u64;
        let mut on_chunk = |_: &str, first: bool| {
            chunks += 1;
            if first {
                ttft = elapsed_ms(started);
            }
        };
        let outcome = with_deadline(
            self.timeouts.for_item(item),
            self.adapter.chat_stream(&request, &mut on_chunk),
        )
        .await;

        let mut result = match outcome {
            Err(err) => CheckResult::new(item, CheckStatus::Failed, "request failed").with_detail(err.detail()),
            Ok(resp) if !resp.is_success() => soft_failure(item, resp),
            Ok(_) if chunks == 0 => CheckResult::new(item, CheckStatus::Failed, "no streamed data"),
            Ok(resp) => CheckResult::new(
                item,
                CheckStatus::Success,
                format!("stream ok, {chunks} chunks, TTFT {ttft}ms"),
            )
            .with_detail(truncate(&resp.content, PREVIEW_LIMIT)),
        }
        .with_latency(started);
        result.ttft = ttft;
        result
    }

    async fn check_models(&self) -> (CheckResult, Vec<String>) {
        let item = CheckItem::Models;
        let started = Instant::now();
        let outcome = with_deadline(
            self.timeouts.for_item(item),
            self.adapter.list_models(&self.base_url, &self.api_key),
        )
        .await;

        match outcome {
            Err(err) => (
                CheckResult::new(item, CheckStatus::Warning, "failed to list models")
                    .with_detail(err.detail())
                    .with_latency(started),
                Vec::new(),
            ),
            Ok(models) => {
                let result = CheckResult::new(
                    item,
                    CheckStatus::Success,
                    format!("found {} models", models.len()),
                )
                .with_detail(model_preview(&models))
                .with_latency(started);
                (result, models)
            }
        }
    }

    /// Both turns share one deadline.
    async fn check_multi_turn(&self) -> CheckResult {
        let item = CheckItem::MultiTurn;
        let started = Instant::now();
        let budget = self.timeouts.for_item(item);
        let deadline = tokio::time::Instant::now() + budget;

        let first_turn = Message::user(&self.prompts.multi_turn_first);
        let first = self.request(vec![first_turn.clone()]);
        let first = match with_deadline_at(deadline, budget, self.adapter.chat(&first)).await {
            Ok(resp) if resp.is_success() => resp,
            outcome => return turn_failure(item, "first turn failed", outcome).with_latency(started),
        };

        let second = self.request(vec![
            first_turn,
            Message::assistant(&first.content),
            Message::user(&self.prompts.multi_turn_second),
        ]);
        let second = match with_deadline_at(deadline, budget, self.adapter.chat(&second)).await {
            Ok(resp) if resp.is_success() => resp,
            outcome => return turn_failure(item, "second turn failed", outcome).with_latency(started),
        };

        let (status, message) = if second.content.contains(&self.prompts.sentinel) {
            (CheckStatus::Success, "context retained")
        } else {
            (CheckStatus::Warning, "context may be lost")
        };
        CheckResult::new(item, status, message)
            .with_detail(format!(
                "R1: {} | R2: {}",
                truncate(&first.content, TURN_PREVIEW_LIMIT),
                truncate(&second.content, TURN_PREVIEW_LIMIT)
            ))
            .with_tokens(
                first.prompt_tokens + second.prompt_tokens,
                first.completion_tokens + second.completion_tokens,
            )
            .with_latency(started)
    }
}

fn spawn_check<F, Fut, T>(target: &Arc<CheckTarget>, check: F) -> JoinHandle<T>
where
    F: FnOnce(Arc<CheckTarget>) -> Fut,
    Fut: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(check(Arc::clone(target)))
}

fn settle(item: CheckItem, joined: Result<CheckResult, tokio::task::JoinError>) -> CheckResult {
    joined.unwrap_or_else(|err| CheckResult::aborted(item, join_error(err)))
}

fn join_error(err: tokio::task::JoinError) -> CheckError {
    tracing::warn!(error = %err, "check task did not complete");
    CheckError::Aborted {
        message: err.to_string(),
    }
}

fn soft_failure(item: CheckItem, resp: ChatResponse) -> CheckResult {
    CheckResult::new(item, CheckStatus::Failed, resp.error).with_detail(resp.raw_body)
}

fn turn_failure(
    item: CheckItem,
    message: &str,
    outcome: Result<ChatResponse, CheckError>,
) -> CheckResult {
    let detail = match outcome {
        Ok(resp) => resp.error,
        Err(err) => err.detail(),
    };
    CheckResult::new(item, CheckStatus::Failed, message).with_detail(detail)
}

fn model_preview(models: &[String]) -> String {
    if models.len() > MODEL_PREVIEW_COUNT {
        format!("{}...", models[..MODEL_PREVIEW_COUNT].join(", "))
    } else {
        models.join(", ")
    }
}

async fn with_deadline<T>(
    budget: Duration,
    call: impl Future<Output = Result<T, CheckError>>,
) -> Result<T, CheckError> {
    tokio::time::timeout(budget, call)
        .await
        .map_err(|_| CheckError::timeout(budget))?
}

async fn with_deadline_at<T>(
    deadline: tokio::time::Instant,
    budget: Duration,
    call: impl Future<Output = Result<T, CheckError>>,
) -> Result<T, CheckError> {
    tokio::time::timeout_at(deadline, call)
        .await
        .map_err(|_| CheckError::timeout(budget))?
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn now_string() -> String {
    chrono::Local::now().format(TIME_FORMAT).to_string()
}
