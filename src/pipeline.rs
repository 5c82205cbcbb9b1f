use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::archive;
use crate::broadcast::Broadcaster;
use crate::config::Config;
use crate::error::PipelineError;
use crate::models::{parse_batch, NotificationEvent};
use crate::report;

#[derive(Debug, Clone)]
pub struct ProcessedFile {
    pub report: PathBuf,
    pub archived: PathBuf,
    pub event: NotificationEvent,
}

#[derive(Debug, Clone)]
pub struct GeneratedReport {
    pub path: PathBuf,
    pub filename: String,
    pub compact_timestamp: String,
}

/// Reads one input file and writes its report into `excel_dir`.
pub async fn generate_report(
    input: &Path,
    excel_dir: &Path,
    generated_at: DateTime<Utc>,
) -> Result<GeneratedReport, PipelineError> {
    let contents = tokio::fs::read_to_string(input)
        .await
        .map_err(|source| PipelineError::Read {
            path: input.to_path_buf(),
            source,
        })?;
    let batch = parse_batch(&contents).map_err(|source| PipelineError::Parse {
        path: input.to_path_buf(),
        source,
    })?;

    let mut workbook = report::build_workbook(&batch, generated_at)?;
    let filename = report::output_filename(Uuid::new_v4(), generated_at);
    let path = report::write_report(&mut workbook, excel_dir, &filename).await?;

    Ok(GeneratedReport {
        path,
        filename,
        compact_timestamp: report::compact_timestamp(generated_at),
    })
}

#[derive(Clone)]
pub struct Pipeline {
    excel_dir: PathBuf,
    json_dir: PathBuf,
    broadcaster: Broadcaster,
}

impl Pipeline {
    pub fn new(config: &Config, broadcaster: Broadcaster) -> Self {
        Self {
            excel_dir: config.excel_dir.clone(),
            json_dir: config.json_dir.clone(),
            broadcaster,
        }
    }

    /// Build, then archive, then notify. A failure at any step stops the
    /// remaining ones and leaves whatever was already done in place.
    pub async fn process(&self, input: &Path) -> Result<ProcessedFile, PipelineError> {
        let generated = generate_report(input, &self.excel_dir, Utc::now()).await?;
        let archived =
            archive::archive_input(input, &self.json_dir, &generated.compact_timestamp).await?;

        let event = NotificationEvent {
            name: generated.filename,
            timestamp: report::display_timestamp(Utc::now()),
        };
        let delivered = self.broadcaster.publish(&event);
        debug!(name = %event.name, clients = delivered, "notification published");

        Ok(ProcessedFile {
            report: generated.path,
            archived,
            event,
        })
    }

    pub async fn handle(&self, input: PathBuf) {
        info!(path = %input.display(), "new file detected");
        match self.process(&input).await {
            Ok(processed) => info!(
                report = %processed.report.display(),
                archived = %processed.archived.display(),
                "report {} created",
                processed.event.name
            ),
            Err(err) => error!(path = %input.display(), error = %err, "error processing file"),
        }
    }
}
