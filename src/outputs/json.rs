//! Snapshot JSON output.
//!
//! The snapshot is written to a sibling temporary file and renamed over the
//! destination, so readers see either the previous snapshot or the new one,
//! never a partial file.

use crate::models::Snapshot;
use std::error::Error;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info, instrument};

/// Serialize `snapshot` as pretty JSON and atomically replace `path`.
///
/// On failure the previous file at `path`, if any, is left untouched.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn write_snapshot(snapshot: &Snapshot, path: &Path) -> Result<(), Box<dyn Error>> {
    let json = serde_json::to_vec_pretty(snapshot)?;

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        if let Err(e) = fs::create_dir_all(dir).await {
            error!(dir = %dir.display(), error = %e, "Failed to create output dir");
            return Err(e.into());
        }
    }

    let tmp = temp_path(path);
    if let Err(e) = fs::write(&tmp, &json).await {
        error!(path = %tmp.display(), error = %e, "Failed writing temporary snapshot");
        let _ = fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    if let Err(e) = fs::rename(&tmp, path).await {
        error!(error = %e, "Failed to move snapshot into place");
        let _ = fs::remove_file(&tmp).await;
        return Err(e.into());
    }

    info!(
        articles = snapshot.total_articles,
        bytes = json.len(),
        "Wrote snapshot"
    );
    Ok(())
}

/// `articles.json` -> `.articles.json.tmp` in the same directory.
fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "snapshot".to_string());
    path.with_file_name(format!(".{name}.tmp"))
}
