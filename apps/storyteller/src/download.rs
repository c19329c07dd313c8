use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use reqwest::header::CONTENT_DISPOSITION;
use shared::domain::{ExportFormat, StoryId};
use tracing::debug;

/// Fetches an export and writes it to `output`, or to the name the service
/// suggests, or to `story_<id>.<ext>`.
pub async fn save_export(
    url: &str,
    story_id: &StoryId,
    format: ExportFormat,
    output: Option<PathBuf>,
) -> Result<PathBuf> {
    let response = reqwest::get(url)
        .await
        .with_context(|| format!("failed to fetch {url}"))?
        .error_for_status()
        .with_context(|| format!("export of story {story_id} was rejected"))?;

    let suggested = response
        .headers()
        .get(CONTENT_DISPOSITION)
        .and_then(|value| value.to_str().ok())
        .and_then(attachment_name);
    debug!(?suggested, "export response received");

    let path = output.unwrap_or_else(|| {
        PathBuf::from(suggested.unwrap_or_else(|| fallback_name(story_id, format)))
    });
    let body = response.bytes().await.context("failed to read export body")?;
    tokio::fs::write(&path, &body)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

pub fn fallback_name(story_id: &StoryId, format: ExportFormat) -> String {
    format!("story_{story_id}.{}", format.extension())
}

/// File name from a `Content-Disposition` header, stripped of any directories.
pub fn attachment_name(header: &str) -> Option<String> {
    let raw = header
        .split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("filename="))?
        .trim_matches('"');
    Path::new(raw)
        .file_name()
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
#[path = "tests/download_tests.rs"]
mod tests;
