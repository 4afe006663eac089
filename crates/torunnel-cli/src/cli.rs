//! Argument parsing, prompting, and the run itself.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::anyhow;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use torunnel_app::{RunReport, RunRequest, build_runner};
use torunnel_config::{ConfigOverrides, PipelineConfig};
use torunnel_events::EventBus;
use torunnel_telemetry::{LogFormat, LoggingConfig, Metrics, build_sha, init_logging};
use tracing::{info, warn};

use crate::error::{CliError, CliResult};
use crate::output::{render_events, summary_line};

const MAGNET_PROMPT: &str = "Enter Magnet Link: ";
const PATH_PROMPT: &str = "Enter Music Path (e.g., Twenty One Pilots/Clancy): ";
const DEFAULT_CLI_LOG_LEVEL: &str = "warn";
/// Build identifier stamped in at compile time, `dev` for local builds.
const BUILD_ID: &str = match option_env!("TORUNNEL_BUILD_SHA") {
    Some(sha) => sha,
    None => "dev",
};

#[derive(Parser, Debug)]
#[command(
    name = "torunnel",
    about = "Fetch a magnet link and publish the downloaded files to S3"
)]
pub(crate) struct Cli {
    /// Magnet link to fetch; prompted for when omitted.
    magnet: Option<String>,
    /// Logical path replacing the content name in object keys.
    logical_path: Option<String>,
    /// Destination bucket.
    #[arg(long)]
    bucket: Option<String>,
    /// Key prefix for every object.
    #[arg(long)]
    prefix: Option<String>,
    /// Local scratch directory; deleted when the run ends.
    #[arg(long)]
    scratch_root: Option<PathBuf>,
    /// Delay between transfer polls, in milliseconds.
    #[arg(long)]
    poll_interval_ms: Option<u64>,
    /// Abort the download after this many seconds.
    #[arg(long)]
    deadline_secs: Option<u64>,
    /// Keep the engine seeding while files upload; it is stopped before the scratch root is deleted.
    #[arg(long)]
    keep_seeding: bool,
    /// Use a fresh subdirectory of the scratch root for this run.
    #[arg(long)]
    per_run_scratch: bool,
    /// qBittorrent Web UI base URL.
    #[arg(long)]
    engine_url: Option<String>,
    /// Log output format (`json` or `pretty`).
    #[arg(long, env = "TORUNNEL_LOG_FORMAT", value_parser = parse_log_format)]
    log_format: Option<LogFormat>,
    /// Log level used when `RUST_LOG` is unset.
    #[arg(long, env = "TORUNNEL_LOG_LEVEL", default_value = DEFAULT_CLI_LOG_LEVEL)]
    log_level: String,
    /// Write the Prometheus text exposition here when the run ends.
    #[arg(long, env = "TORUNNEL_METRICS_FILE")]
    metrics_file: Option<PathBuf>,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            bucket: self.bucket.clone(),
            namespace_prefix: self.prefix.clone(),
            scratch_root: self.scratch_root.clone(),
            poll_interval_ms: self.poll_interval_ms,
            deadline_secs: self.deadline_secs,
            keep_seeding: self.keep_seeding.then_some(true),
            per_run_scratch: self.per_run_scratch.then_some(true),
            engine_url: self.engine_url.clone(),
        }
    }
}

fn parse_log_format(raw: &str) -> Result<LogFormat, String> {
    raw.parse::<LogFormat>().map_err(|err| err.to_string())
}

/// Parses CLI arguments, executes the run, and returns the process exit code.
pub async fn run() -> i32 {
    let cli = Cli::parse();
    let logging = LoggingConfig {
        level: &cli.log_level,
        format: cli.log_format.unwrap_or_else(LogFormat::infer),
        build_sha: BUILD_ID,
    };
    if let Err(err) = init_logging(&logging) {
        eprintln!("warning: logging disabled: {err}");
    }
    info!(
        build_sha = build_sha(),
        version = env!("CARGO_PKG_VERSION"),
        "torunnel starting"
    );

    match execute(cli).await {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("error: {}", err.display_message());
            err.exit_code()
        }
    }
}

async fn execute(cli: Cli) -> CliResult<()> {
    let config =
        PipelineConfig::load(&cli.overrides()).map_err(|err| CliError::from_config(&err))?;
    let request = {
        let stdin = io::stdin();
        let mut input = stdin.lock();
        let mut output = io::stdout();
        RunRequest {
            descriptor: value_or_prompt(cli.magnet, MAGNET_PROMPT, &mut input, &mut output)?,
            logical_segment: value_or_prompt(
                cli.logical_path,
                PATH_PROMPT,
                &mut input,
                &mut output,
            )?,
        }
    };

    let metrics = Metrics::new().map_err(CliError::failure)?;
    let report = run_pipeline(config, &request, &metrics).await;

    if let Some(path) = &cli.metrics_file {
        match metrics.persist(path) {
            Ok(_) => info!(path = %path.display(), "metrics written"),
            Err(err) => warn!(path = %path.display(), error = %err, "failed to write metrics"),
        }
    }

    let report = report?;
    println!("{}", summary_line(&report));
    if report.is_success() {
        Ok(())
    } else {
        Err(CliError::failure(anyhow!(
            "{} of {} uploads failed",
            report.batch.failed_count(),
            report.batch.len()
        )))
    }
}

async fn run_pipeline(
    config: PipelineConfig,
    request: &RunRequest,
    metrics: &Metrics,
) -> CliResult<RunReport> {
    let events = EventBus::new();
    let renderer = tokio::spawn(render_events(events.subscribe()));
    let runner = build_runner(config, events, metrics.clone())
        .await
        .map_err(CliError::from_app)?;

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; cancelling run");
            interrupt.cancel();
        }
    });

    let result = runner.run(request, &cancel).await;
    ctrl_c.abort();
    drop(runner);
    let _ = renderer.await;
    result.map_err(CliError::from_app)
}

fn value_or_prompt<R, W>(
    value: Option<String>,
    label: &str,
    input: &mut R,
    output: &mut W,
) -> CliResult<String>
where
    R: BufRead,
    W: Write,
{
    if let Some(value) = value.filter(|value| !value.trim().is_empty()) {
        return Ok(value.trim().to_string());
    }

    output
        .write_all(label.as_bytes())
        .and_then(|()| output.flush())
        .map_err(|err| CliError::failure(anyhow!("failed to write prompt: {err}")))?;
    let mut line = String::new();
    input
        .read_line(&mut line)
        .map_err(|err| CliError::failure(anyhow!("failed to read input: {err}")))?;
    let answer = line.trim();
    if answer.is_empty() {
        return Err(CliError::validation(format!(
            "no value given for '{}'",
            label.trim_end_matches([' ', ':'])
        )));
    }
    Ok(answer.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn arguments_skip_the_prompt() -> anyhow::Result<()> {
        let mut input = Cursor::new(Vec::new());
        let mut output = Vec::new();
        let value = value_or_prompt(
            Some("  magnet:?xt=urn:btih:abc ".into()),
            MAGNET_PROMPT,
            &mut input,
            &mut output,
        )
        .map_err(|err| anyhow!(err.display_message()))?;
        assert_eq!(value, "magnet:?xt=urn:btih:abc");
        assert!(output.is_empty());
        Ok(())
    }

    #[test]
    fn missing_values_are_prompted_for() -> anyhow::Result<()> {
        let mut input = Cursor::new(b"Twenty One Pilots/Clancy\n".to_vec());
        let mut output = Vec::new();
        let value = value_or_prompt(None, PATH_PROMPT, &mut input, &mut output)
            .map_err(|err| anyhow!(err.display_message()))?;
        assert_eq!(value, "Twenty One Pilots/Clancy");
        assert_eq!(String::from_utf8(output)?, PATH_PROMPT);
        Ok(())
    }

    #[test]
    fn empty_answer_is_a_validation_error() {
        let mut input = Cursor::new(b"\n".to_vec());
        let mut output = Vec::new();
        let err = value_or_prompt(None, MAGNET_PROMPT, &mut input, &mut output)
            .expect_err("empty answer");
        assert_eq!(err.exit_code(), 2);
        assert_eq!(err.display_message(), "no value given for 'Enter Magnet Link'");
    }

    #[test]
    fn flags_become_config_overrides() {
        let cli = Cli::parse_from([
            "torunnel",
            "magnet:?xt=urn:btih:abc",
            "Artist/Album",
            "--bucket",
            "other-bucket",
            "--keep-seeding",
            "--poll-interval-ms",
            "250",
        ]);
        let overrides = cli.overrides();
        assert_eq!(overrides.bucket.as_deref(), Some("other-bucket"));
        assert_eq!(overrides.keep_seeding, Some(true));
        assert_eq!(overrides.per_run_scratch, None);
        assert_eq!(overrides.poll_interval_ms, Some(250));
        assert_eq!(cli.logical_path.as_deref(), Some("Artist/Album"));
    }

    #[test]
    fn build_id_falls_back_to_dev() {
        assert_eq!(BUILD_ID, option_env!("TORUNNEL_BUILD_SHA").unwrap_or("dev"));
        assert!(!BUILD_ID.is_empty());
    }

    #[test]
    fn log_format_parser_rejects_unknown_values() {
        assert_eq!(parse_log_format("JSON"), Ok(LogFormat::Json));
        assert!(parse_log_format("xml").is_err());
    }
}
