use std::path::{Path, PathBuf};

use crate::error::PipelineError;

/// `roster.json` archived at `20260314150926` becomes `roster_20260314150926.json`.
pub fn archived_name(input: &Path, compact_timestamp: &str) -> String {
    let file_name = input
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let base = file_name.strip_suffix(".json").unwrap_or(&file_name);
    format!("{base}_{compact_timestamp}.json")
}

pub async fn archive_input(
    input: &Path,
    json_dir: &Path,
    compact_timestamp: &str,
) -> Result<PathBuf, PipelineError> {
    let target = json_dir.join(archived_name(input, compact_timestamp));
    tokio::fs::rename(input, &target)
        .await
        .map_err(|source| PipelineError::Archive {
            from: input.to_path_buf(),
            to: target.clone(),
            source,
        })?;
    Ok(target)
}
