//! Command-line caller for the pingai diagnostic engine.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use clap::{Args, Parser, Subcommand};
use tokio::io::AsyncWriteExt;
use tracing_subscriber::EnvFilter;

use pingai::batch::{BatchRunner, HistoryRecord, HistoryStore};
use pingai::config::{CheckerConfig, ProviderConfig, load_provider_configs};
use pingai::report::{Report, default_export_filename};
use pingai::{Checker, FullCheckResult, CheckError};

/// 探测 LLM 接口的连通性、对话、流式、模型列表与多轮上下文
#[derive(Parser, Debug)]
#[command(name = "pingai", version, about)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// Checker settings (timeouts, prompts, max_concurrency) as JSON.
    #[arg(long, global = true)]
    checker_config: Option<PathBuf>,

    /// Run at most this many checks at once.
    #[arg(long, global = true)]
    max_concurrency: Option<usize>,

    /// Append every finished run to this JSON lines file.
    #[arg(long, global = true)]
    history: Option<PathBuf>,

    /// Print the JSON report instead of the text summary.
    #[arg(long, global = true, default_value_t = false)]
    json: bool,

    /// Also write the report to this file; a directory gets a timestamped file name.
    #[arg(long, global = true)]
    output: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check every provider listed in a JSON file.
    Check {
        /// JSON array of provider configurations.
        #[arg(long)]
        config: PathBuf,
    },
    /// Check one provider once per API key.
    Keys {
        #[arg(long)]
        base_url: String,
        #[arg(long)]
        model: String,
        #[arg(long, default_value = "openai")]
        protocol: String,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        id: String,
        /// One key per line; blank lines are skipped.
        #[arg(long)]
        keys_file: PathBuf,
    },
}

/// Appends history records as JSON lines.
struct JsonlHistory {
    path: PathBuf,
}

#[async_trait]
impl HistoryStore for JsonlHistory {
    async fn save(&self, result: &FullCheckResult) -> Result<(), CheckError> {
        let mut line = serde_json::to_string(&HistoryRecord::new(result))
            .map_err(|err| CheckError::storage("history record", err))?;
        line.push('\n');
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|err| CheckError::storage(self.path.display(), err))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|err| CheckError::storage(self.path.display(), err))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pingai=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let runner = build_runner(&cli.common).await?;

    let results = match cli.command {
        Command::Check { config } => {
            let text = tokio::fs::read_to_string(&config)
                .await
                .with_context(|| format!("read provider config {} failed", config.display()))?;
            let providers = load_provider_configs(&text).context("parse provider config failed")?;
            if providers.is_empty() {
                bail!("no providers in {}", config.display());
            }
            runner.run_batch(providers).await
        }
        Command::Keys {
            base_url,
            model,
            protocol,
            name,
            id,
            keys_file,
        } => {
            let keys = read_keys(&keys_file).await?;
            let template = ProviderConfig::new(base_url, "", model, protocol).with_identity(id, name);
            runner.run_key_batch(&template, &keys).await
        }
    };

    emit_report(Report::new(results), &cli.common).await
}

async fn build_runner(common: &CommonArgs) -> Result<BatchRunner> {
    let mut config = match &common.checker_config {
        Some(path) => {
            let text = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("read checker config {} failed", path.display()))?;
            CheckerConfig::from_json_str(&text).context("parse checker config failed")?
        }
        None => CheckerConfig::default(),
    };
    if common.max_concurrency.is_some() {
        config.max_concurrency = common.max_concurrency;
        config.validate().context("invalid --max-concurrency")?;
    }

    let checker = Checker::with_default_transport(config).context("create HTTP client failed")?;
    let mut runner = BatchRunner::new(checker);
    if let Some(path) = &common.history {
        runner = runner.with_history(Arc::new(JsonlHistory { path: path.clone() }));
    }
    Ok(runner)
}

async fn read_keys(path: &Path) -> Result<Vec<String>> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("read keys file {} failed", path.display()))?;
    let keys: Vec<String> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();
    if keys.is_empty() {
        bail!("no keys in {}", path.display());
    }
    Ok(keys)
}

async fn emit_report(report: Report, common: &CommonArgs) -> Result<()> {
    let rendered = if common.json {
        report.to_json().context("render JSON report failed")?
    } else {
        report.to_text()
    };
    println!("{rendered}");

    if let Some(output) = &common.output {
        let target = if output.is_dir() {
            output.join(default_export_filename(&chrono::Local::now()))
        } else {
            output.clone()
        };
        tokio::fs::write(&target, &rendered)
            .await
            .with_context(|| format!("write report {} failed", target.display()))?;
        tracing::info!(path = %target.display(), "report written");
    }

    let summary = report.summary;
    tracing::info!(
        total = summary.total,
        success = summary.success,
        warning = summary.warning,
        failed = summary.failed,
        "batch finished"
    );
    Ok(())
}
