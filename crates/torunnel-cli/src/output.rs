//! Progress and status line rendering for run events.

use std::io::{self, Write};

use torunnel_app::RunReport;
use torunnel_events::{Event, EventStream, UploadStatus};

/// Turns run events into terminal lines.
///
/// Progress lines start with `\r` and overwrite each other; any other line
/// first terminates a pending progress line.
#[derive(Debug, Default)]
pub(crate) struct Renderer {
    progress_open: bool,
    upload_header_shown: bool,
}

#[allow(clippy::cast_precision_loss)]
fn kilobytes(bytes_per_sec: u64) -> f64 {
    bytes_per_sec as f64 / 1000.0
}

impl Renderer {
    pub(crate) fn render(&mut self, event: &Event) -> Option<String> {
        if let Event::Progress {
            percent,
            download_bps,
            upload_bps,
            peers,
            state,
            ..
        } = event
        {
            self.progress_open = true;
            return Some(format!(
                "\r{percent:.2}% complete (down: {:.1} kB/s up: {:.1} kB/s peers: {peers}) {state}",
                kilobytes(*download_bps),
                kilobytes(*upload_bps),
            ));
        }

        let line = match event {
            Event::RunStarted { .. } => "Metadata downloading...".to_string(),
            Event::MetadataResolved { name, .. } => format!("Metadata retrieved: {name}"),
            Event::DownloadCompleted { name, .. } => format!("Download of '{name}' complete."),
            Event::UploadStarted {
                source,
                bucket,
                key,
                ..
            } => {
                let header = if self.upload_header_shown {
                    ""
                } else {
                    self.upload_header_shown = true;
                    "Starting upload to S3...\n"
                };
                format!("{header}Uploading {source} to s3://{bucket}/{key}")
            }
            Event::UploadFinished { status, detail, .. } => upload_status_line(*status, detail.as_deref()),
            Event::BatchCompleted {
                uploaded, failed, ..
            } => format!("Upload complete. ({uploaded} uploaded, {failed} failed)"),
            Event::CleanupCompleted { .. } => "Cleanup complete.".to_string(),
            Event::CleanupFailed { message, .. } => format!("Cleanup failed: {message}"),
            Event::StateChanged { .. } | Event::RunFailed { .. } | Event::Progress { .. } => {
                return None;
            }
        };

        if self.progress_open {
            self.progress_open = false;
            Some(format!("\n{line}\n"))
        } else {
            Some(format!("{line}\n"))
        }
    }

    /// Line break owed to the terminal when the stream ends mid-progress.
    pub(crate) fn finish(&mut self) -> Option<&'static str> {
        std::mem::take(&mut self.progress_open).then_some("\n")
    }
}

fn upload_status_line(status: UploadStatus, detail: Option<&str>) -> String {
    match (status, detail) {
        (UploadStatus::Uploaded, _) => "  uploaded".to_string(),
        (UploadStatus::NotFound, _) => "  not found: the file was not found".to_string(),
        (UploadStatus::Unauthorized, _) => "  unauthorized: credentials not available".to_string(),
        (UploadStatus::Failed, Some(detail)) => format!("  failed: {detail}"),
        (UploadStatus::Failed, None) => "  failed".to_string(),
    }
}

/// Print every event of the stream to stdout until the bus closes.
pub(crate) async fn render_events(mut stream: EventStream) {
    let mut renderer = Renderer::default();
    let mut stdout = io::stdout();
    while let Some(envelope) = stream.next().await {
        if let Some(text) = renderer.render(&envelope.event) {
            let _ = stdout.write_all(text.as_bytes());
            let _ = stdout.flush();
        }
    }
    if let Some(text) = renderer.finish() {
        let _ = stdout.write_all(text.as_bytes());
        let _ = stdout.flush();
    }
}

/// Final status line for a finished run.
pub(crate) fn summary_line(report: &RunReport) -> String {
    format!(
        "Run {}: {}/{} files uploaded, {} failed, scratch {}",
        report.run_id,
        report.batch.uploaded_count(),
        report.batch.len(),
        report.batch.failed_count(),
        report.cleanup.label(),
    )
}
