//! Concurrent fan-out of full check runs with order-preserving fan-in.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use crate::checker::{CheckStatus, Checker, FullCheckResult, TIME_FORMAT};
use crate::config::ProviderConfig;
use crate::error::CheckError;
use crate::report::overall_status;

/// One entry of a configuration batch.
pub type BatchCheckItem = ProviderConfig;

/// 历史记录存储能力 由调用方注入
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Persists one finished run. Failures are logged by the caller and never fail a run.
    async fn save(&self, result: &FullCheckResult) -> Result<(), CheckError>;
}

pub type DynHistoryStore = Arc<dyn HistoryStore>;

/// Flattened history row: the run plus its dominant status and a save timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    #[serde(flatten)]
    pub run: FullCheckResult,
    pub status: CheckStatus,
    #[serde(rename = "createdAt")]
    pub created_at: String,
}

impl HistoryRecord {
    pub fn new(run: &FullCheckResult) -> Self {
        Self {
            status: overall_status(run),
            run: run.clone(),
            created_at: chrono::Local::now().format(TIME_FORMAT).to_string(),
        }
    }
}

/// Hides all but the first 3 and last 4 characters of a credential.
///
/// # Examples
///
/// ```
/// use pingai::batch::mask_key;
///
/// assert_eq!(mask_key("sk-abcdef1234"), "sk-...1234");
/// assert_eq!(mask_key("12345678"), "***");
/// ```
pub fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "***".to_string();
    }
    let head: String = chars[..3].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

/// 批量检测 每项一个任务 输出顺序与输入一致
pub struct BatchRunner {
    checker: Arc<Checker>,
    history: Option<DynHistoryStore>,
    limiter: Option<Arc<Semaphore>>,
}

impl BatchRunner {
    /// Concurrency follows `max_concurrency` of the checker's config; a limit of zero
    /// admits nothing, so it is treated as unbounded.
    pub fn new(checker: Checker) -> Self {
        let limiter = match checker.config().max_concurrency {
            Some(0) => {
                tracing::warn!("max_concurrency of 0 ignored, batch runs unbounded");
                None
            }
            limit => limit.map(|limit| Arc::new(Semaphore::new(limit))),
        };
        Self {
            checker: Arc::new(checker),
            history: None,
            limiter,
        }
    }

    pub fn with_history(mut self, store: DynHistoryStore) -> Self {
        self.history = Some(store);
        self
    }

    pub fn checker(&self) -> &Checker {
        &self.checker
    }

    /// Checks one configuration and flushes it to history.
    pub async fn run_one(&self, provider: &ProviderConfig) -> FullCheckResult {
        let result = self.checker.run_full_check(provider).await;
        self.record(std::slice::from_ref(&result)).await;
        result
    }

    /// Checks every configuration once; `results[i]` belongs to `items[i]`.
    pub async fn run_batch(&self, items: Vec<BatchCheckItem>) -> Vec<FullCheckResult> {
        tracing::info!(items = items.len(), "starting provider batch");
        let results = self.fan_out(items).await;
        self.record(&results).await;
        results
    }

    /// Checks one configuration once per credential.
    ///
    /// Each run's provider name carries the masked credential, e.g. `OpenAI (sk-...1234)`.
    pub async fn run_key_batch(
        &self,
        template: &ProviderConfig,
        api_keys: &[String],
    ) -> Vec<FullCheckResult> {
        tracing::info!(keys = api_keys.len(), provider = %template.provider_name, "starting key batch");
        let items = api_keys
            .iter()
            .map(|key| ProviderConfig {
                api_key: key.clone(),
                provider_name: format!("{} ({})", template.provider_name, mask_key(key)),
                ..template.clone()
            })
            .collect();
        let results = self.fan_out(items).await;
        self.record(&results).await;
        results
    }

    async fn fan_out(&self, items: Vec<ProviderConfig>) -> Vec<FullCheckResult> {
        let handles = items.iter().cloned().map(|provider| {
            let checker = Arc::clone(&self.checker);
            let limiter = self.limiter.clone();
            tokio::spawn(async move {
                let _permit = match limiter {
                    Some(limiter) => limiter.acquire_owned().await.ok(),
                    None => None,
                };
                checker.run_full_check(&provider).await
            })
        });

        // join_all yields in submission order
        join_all(handles)
            .await
            .into_iter()
            .zip(&items)
            .enumerate()
            .map(|(index, (outcome, provider))| match outcome {
                Ok(result) => result,
                Err(err) => {
                    tracing::warn!(index, error = %err, "batch task did not complete");
                    let err = CheckError::Aborted {
                        message: err.to_string(),
                    };
                    FullCheckResult::aborted(provider, err)
                }
            })
            .collect()
    }

    async fn record(&self, results: &[FullCheckResult]) {
        let Some(store) = &self.history else {
            return;
        };
        for result in results {
            if let Err(err) = store.save(result).await {
                tracing::warn!(provider = %result.provider_name, error = %err, "failed to save history");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use futures_util::stream;

    use super::*;
    use crate::config::CheckerConfig;
    use crate::http::{HttpBodyStream, HttpRequest, HttpResponse, HttpStreamResponse, HttpTransport};

    /// Answers every request with 503 after a delay encoded in the host name.
    ///
    /// `http://slow-120.test/v1` waits 120ms. A 503 fails the connectivity gate, so
    /// each run issues exactly one request.
    #[derive(Default)]
    struct DelayTransport {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl DelayTransport {
        fn delay_for(url: &str) -> Duration {
            let millis = url
                .split("slow-")
                .nth(1)
                .and_then(|rest| rest.split('.').next())
                .and_then(|ms| ms.parse().ok())
                .unwrap_or(0);
            Duration::from_millis(millis)
        }
    }

    #[async_trait]
    impl HttpTransport for DelayTransport {
        async fn send(&self, _request: HttpRequest) -> Result<HttpResponse, CheckError> {
            panic!("only connectivity checks expected");
        }

        async fn send_stream(&self, request: HttpRequest) -> Result<HttpStreamResponse, CheckError> {
            if request.url.contains("panic.test") {
                panic!("transport blew up");
            }
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Self::delay_for(&request.url)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            let body: HttpBodyStream = Box::pin(stream::empty::<Result<Vec<u8>, CheckError>>());
            Ok(HttpStreamResponse { status: 503, body })
        }
    }

    #[derive(Default)]
    struct RecordingHistory {
        names: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl HistoryStore for RecordingHistory {
        async fn save(&self, result: &FullCheckResult) -> Result<(), CheckError> {
            self.names.lock().unwrap().push(result.provider_name.clone());
            if self.fail {
                Err(CheckError::transport("disk full"))
            } else {
                Ok(())
            }
        }
    }

    fn runner(transport: Arc<DelayTransport>, max_concurrency: Option<usize>) -> BatchRunner {
        let config = CheckerConfig {
            max_concurrency,
            ..CheckerConfig::default()
        };
        BatchRunner::new(Checker::new(transport, config))
    }

    fn item(index: usize, delay_ms: u64) -> BatchCheckItem {
        ProviderConfig::new(format!("http://slow-{delay_ms}.test/v1"), "k", "m", "openai")
            .with_identity(format!("p{index}"), format!("Provider {index}"))
    }

    #[test]
    fn mask_key_edges() {
        assert_eq!(mask_key("sk-1234567"), "sk-...4567");
        assert_eq!(mask_key("abcdefgh"), "***");
        assert_eq!(mask_key(""), "***");
        assert_eq!(mask_key("密钥密钥密钥密钥密钥"), "密钥密...密钥密钥");
    }

    #[tokio::test]
    async fn output_order_matches_input_when_completion_is_reversed() {
        let transport = Arc::new(DelayTransport::default());
        let history = Arc::new(RecordingHistory::default());
        let runner = runner(transport.clone(), None).with_history(history.clone());

        let items: Vec<BatchCheckItem> = (0..5).map(|i| item(i, 250 - 50 * i as u64)).collect();
        let results = runner.run_batch(items.clone()).await;

        assert_eq!(results.len(), 5);
        for (result, input) in results.iter().zip(&items) {
            assert_eq!(result.provider_id, input.provider_id);
            assert_eq!(result.base_url, input.base_url);
            assert_eq!(result.results.len(), 1);
        }
        assert_eq!(transport.peak.load(Ordering::SeqCst), 5);
        let saved = history.names.lock().unwrap().clone();
        let expected: Vec<String> = items.iter().map(|i| i.provider_name.clone()).collect();
        assert_eq!(saved, expected);
    }

    #[tokio::test]
    async fn concurrency_limit_bounds_in_flight_runs() {
        let transport = Arc::new(DelayTransport::default());
        let runner = runner(transport.clone(), Some(2));
        let items: Vec<BatchCheckItem> = (0..6).map(|i| item(i, 40)).collect();
        let results = runner.run_batch(items).await;
        assert_eq!(results.len(), 6);
        assert!(transport.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn zero_concurrency_limit_runs_unbounded() {
        let transport = Arc::new(DelayTransport::default());
        let runner = runner(transport.clone(), Some(0));
        let items: Vec<BatchCheckItem> = (0..3).map(|i| item(i, 40)).collect();

        let results = tokio::time::timeout(Duration::from_secs(5), runner.run_batch(items))
            .await
            .expect("batch must finish");
        assert_eq!(results.len(), 3);
        assert_eq!(transport.peak.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn panicked_task_becomes_aborted_run_in_its_slot() {
        let runner = runner(Arc::new(DelayTransport::default()), None);
        let broken = ProviderConfig::new("http://panic.test/v1", "k", "m", "openai")
            .with_identity("p1", "Provider 1");
        let items = vec![item(0, 30), broken, item(2, 0)];

        let results = runner.run_batch(items).await;
        let names: Vec<&str> = results.iter().map(|r| r.provider_name.as_str()).collect();
        assert_eq!(names, vec!["Provider 0", "Provider 1", "Provider 2"]);
        assert_eq!(results[1].results[0].message, "check aborted");
        assert_eq!(results[1].results[0].status, CheckStatus::Failed);
        assert_eq!(results[0].results[0].message, "service error (HTTP 503)");
    }

    #[tokio::test]
    async fn key_batch_masks_names_and_survives_history_failure() {
        let transport = Arc::new(DelayTransport::default());
        let history = Arc::new(RecordingHistory {
            fail: true,
            ..RecordingHistory::default()
        });
        let runner = runner(transport, None).with_history(history.clone());
        let template = item(0, 0).with_identity("openai", "OpenAI");
        let keys = vec!["sk-aaaa-1111".to_string(), "short".to_string()];

        let results = runner.run_key_batch(&template, &keys).await;
        let names: Vec<&str> = results.iter().map(|r| r.provider_name.as_str()).collect();
        assert_eq!(names, vec!["OpenAI (sk-...1111)", "OpenAI (***)"]);
        assert!(results.iter().all(|r| r.provider_id == "openai"));
        assert_eq!(history.names.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn run_one_records_history() {
        let history = Arc::new(RecordingHistory::default());
        let runner = runner(Arc::new(DelayTransport::default()), None).with_history(history.clone());
        let result = runner.run_one(&item(7, 0)).await;
        assert_eq!(result.provider_name, "Provider 7");
        assert_eq!(history.names.lock().unwrap().as_slice(), ["Provider 7"]);
    }

    #[tokio::test]
    async fn empty_batch_returns_empty() {
        let runner = runner(Arc::new(DelayTransport::default()), None);
        assert!(runner.run_batch(Vec::new()).await.is_empty());
    }

    #[test]
    fn history_record_flattens_run() {
        let run = FullCheckResult::aborted(
            &item(1, 0),
            CheckError::Aborted {
                message: "panicked".to_string(),
            },
        );
        let record = HistoryRecord::new(&run);
        assert_eq!(record.status, CheckStatus::Failed);
        let value = serde_json::to_value(&record).expect("serialize");
        assert_eq!(value["providerName"], "Provider 1");
        assert_eq!(value["status"], "failed");
        assert!(value["createdAt"].is_string());
    }
}
