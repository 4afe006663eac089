use std::sync::Arc;

use torunnel_config::PipelineConfig;
use torunnel_events::EventBus;
use torunnel_storage::{S3Sink, S3SinkOptions};
use torunnel_telemetry::Metrics;
use torunnel_torrent_qbt::{QbtOptions, QbtSession};
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::runner::PipelineRunner;

/// Build a runner backed by the qBittorrent Web API and S3.
///
/// # Errors
///
/// Returns an error when the engine URL is invalid or the HTTP client cannot
/// be constructed.
pub async fn build_runner(
    config: PipelineConfig,
    events: EventBus,
    metrics: Metrics,
) -> AppResult<PipelineRunner> {
    let base_url = config.engine.url().map_err(|source| AppError::Config {
        operation: "engine_url",
        source,
    })?;
    let mut options = QbtOptions::new(base_url);
    if let Some(username) = &config.engine.username {
        options = options.with_credentials(
            username.clone(),
            config.engine.password.clone().unwrap_or_default(),
        );
    }
    let session = QbtSession::new(options).map_err(AppError::transfer("connect_engine"))?;

    let sink = S3Sink::from_options(&S3SinkOptions {
        endpoint: config.sink.endpoint.clone(),
        region: config.sink.region.clone(),
        force_path_style: config.sink.force_path_style,
    })
    .await;

    info!(
        engine = %config.engine.base_url,
        bucket = %config.bucket,
        prefix = %config.normalized_prefix(),
        scratch_root = %config.scratch_root.display(),
        "pipeline wired"
    );
    Ok(PipelineRunner::new(
        config,
        Arc::new(session),
        Arc::new(sink),
        events,
        metrics,
    ))
}
