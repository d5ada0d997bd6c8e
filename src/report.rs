//! Pure reductions over finished runs: summary counts, JSON and text renderings.

use std::fmt::Write as _;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::checker::{CheckStatus, FullCheckResult, TIME_FORMAT};
use crate::error::CheckError;

/// 汇总计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub warning: usize,
}

/// 检测报告
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    #[serde(rename = "generatedAt")]
    pub generated_at: String,
    pub results: Vec<FullCheckResult>,
    pub summary: ReportSummary,
}

/// Dominant status of one run: any failure wins over any warning, which wins over success.
///
/// Runs holding only pending or running entries count as success.
pub fn overall_status(run: &FullCheckResult) -> CheckStatus {
    run.results
        .iter()
        .map(|result| result.status)
        .max()
        .filter(|status| *status > CheckStatus::Success)
        .unwrap_or(CheckStatus::Success)
}

pub fn summarize(results: &[FullCheckResult]) -> ReportSummary {
    results.iter().fold(
        ReportSummary {
            total: results.len(),
            ..ReportSummary::default()
        },
        |mut summary, run| {
            match overall_status(run) {
                CheckStatus::Failed => summary.failed += 1,
                CheckStatus::Warning => summary.warning += 1,
                _ => summary.success += 1,
            }
            summary
        },
    )
}

impl Report {
    /// Builds a report stamped with the current local time.
    pub fn new(results: Vec<FullCheckResult>) -> Self {
        Self::generated_at(results, &Local::now())
    }

    pub fn generated_at(results: Vec<FullCheckResult>, at: &DateTime<Local>) -> Self {
        let summary = summarize(&results);
        Self {
            generated_at: at.format(TIME_FORMAT).to_string(),
            results,
            summary,
        }
    }

    /// Pretty-printed JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`CheckError::Validation`] if serialization fails.
    pub fn to_json(&self) -> Result<String, CheckError> {
        serde_json::to_string_pretty(self).map_err(|err| CheckError::Validation {
            message: format!("failed to serialize report: {err}"),
        })
    }

    /// Human-readable summary, one block per provider.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        out.push_str("=== AI API Check Report ===\n");
        let _ = writeln!(out, "Time: {}\n", self.generated_at);

        for run in &self.results {
            let _ = writeln!(out, "[{}] {} ({})", run.provider_name, run.model, run.base_url);
            for result in &run.results {
                let _ = writeln!(
                    out,
                    "  {:<15} [{}] {} ({}ms)",
                    result.item.as_str(),
                    status_glyph(result.status),
                    result.message,
                    result.latency
                );
            }
            let _ = writeln!(out, "  Total: {}ms\n", run.total_latency);
        }
        out
    }
}

fn status_glyph(status: CheckStatus) -> &'static str {
    match status {
        CheckStatus::Success => "OK",
        CheckStatus::Failed => "FAIL",
        CheckStatus::Warning => "WARN",
        CheckStatus::Pending | CheckStatus::Running => "?",
    }
}

/// Suggested file name for an exported JSON report.
///
/// # Examples
///
/// ```
/// use chrono::{Local, TimeZone};
/// use pingai::report::default_export_filename;
///
/// let at = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
/// assert_eq!(default_export_filename(&at), "ai_check_report_20240309_140507.json");
/// ```
pub fn default_export_filename(at: &DateTime<Local>) -> String {
    format!("ai_check_report_{}.json", at.format("%Y%m%d_%H%M%S"))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::checker::{CheckItem, CheckResult};

    fn check(item: CheckItem, status: CheckStatus, message: &str, latency: u64) -> CheckResult {
        CheckResult {
            item,
            status,
            latency,
            ttft: 0,
            message: message.to_string(),
            detail: String::new(),
            token_in: 0,
            token_out: 0,
        }
    }

    fn run(name: &str, results: Vec<CheckResult>) -> FullCheckResult {
        FullCheckResult {
            provider_id: name.to_lowercase(),
            provider_name: name.to_string(),
            base_url: "https://api.example.com/v1".to_string(),
            model: "m".to_string(),
            protocol: "openai".to_string(),
            results,
            model_list: Vec::new(),
            start_time: "2024-03-09 14:05:00".to_string(),
            end_time: "2024-03-09 14:05:01".to_string(),
            total_latency: 1234,
        }
    }

    fn sample() -> Vec<FullCheckResult> {
        vec![
            run(
                "Broken",
                vec![
                    check(CheckItem::Connectivity, CheckStatus::Warning, "auth", 10),
                    check(CheckItem::Chat, CheckStatus::Failed, "HTTP 401", 20),
                ],
            ),
            run(
                "Degraded",
                vec![
                    check(CheckItem::Connectivity, CheckStatus::Success, "reachable (HTTP 200)", 10),
                    check(CheckItem::Models, CheckStatus::Warning, "failed to list models", 5),
                ],
            ),
            run(
                "Healthy",
                vec![check(CheckItem::Connectivity, CheckStatus::Success, "reachable (HTTP 200)", 10)],
            ),
        ]
    }

    #[test]
    fn failed_dominates_warning_dominates_success() {
        let summary = summarize(&sample());
        assert_eq!(
            summary,
            ReportSummary {
                total: 3,
                success: 1,
                failed: 1,
                warning: 1
            }
        );
    }

    #[test]
    fn pending_only_run_counts_as_success() {
        let pending = run("P", vec![check(CheckItem::Chat, CheckStatus::Pending, "", 0)]);
        assert_eq!(overall_status(&pending), CheckStatus::Success);
        assert_eq!(overall_status(&run("Empty", Vec::new())), CheckStatus::Success);
    }

    #[test]
    fn json_uses_interchange_field_names() {
        let at = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        let report = Report::generated_at(sample(), &at);
        let json = report.to_json().expect("json");
        assert!(json.contains('\n'), "expected pretty output");
        let value: serde_json::Value = serde_json::from_str(&json).expect("parse");
        assert_eq!(value["generatedAt"], "2024-03-09 14:05:07");
        assert_eq!(value["summary"]["failed"], 1);
        assert_eq!(value["results"][0]["providerName"], "Broken");
        assert_eq!(value["results"][0]["baseURL"], "https://api.example.com/v1");
        assert_eq!(value["results"][0]["totalLatency"], 1234);
    }

    #[test]
    fn text_rendering_lists_each_check() {
        let at = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        let text = Report::generated_at(sample(), &at).to_text();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "=== AI API Check Report ===");
        assert_eq!(lines[1], "Time: 2024-03-09 14:05:07");
        assert_eq!(lines[2], "");
        assert_eq!(lines[3], "[Broken] m (https://api.example.com/v1)");
        assert_eq!(lines[4], "  connectivity    [WARN] auth (10ms)");
        assert_eq!(lines[5], "  chat            [FAIL] HTTP 401 (20ms)");
        assert_eq!(lines[6], "  Total: 1234ms");
        assert!(text.contains("  models          [WARN] failed to list models (5ms)"));
        assert!(text.contains("[OK] reachable (HTTP 200)"));
    }
}
