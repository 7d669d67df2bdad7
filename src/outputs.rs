//! Optional on-disk copy of a run.
//!
//! ```text
//! output_dir/
//! ├── 2025-05-06.html                 script HTML as mailed and posted
//! ├── 2025-05-06.json                 serialized Script
//! └── noticias-do-dia-1920x1080.png   cover, when it rendered
//! ```

use std::error::Error;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info, instrument};

use crate::models::{CoverImage, Script};
use crate::utils::ensure_writable_dir;

/// Write the script (and the cover, if any) under `dir`. Returns the written paths.
#[instrument(level = "info", skip_all, fields(dir = %dir.display(), date = %script.date))]
pub async fn write_run(
    script: &Script,
    cover: Option<&CoverImage>,
    dir: &Path,
) -> Result<Vec<PathBuf>, Box<dyn Error>> {
    ensure_writable_dir(dir).await?;

    let stem = script.date.format("%Y-%m-%d").to_string();
    let mut files: Vec<(PathBuf, Vec<u8>)> = vec![
        (dir.join(format!("{stem}.html")), script.to_html().into_bytes()),
        (dir.join(format!("{stem}.json")), serde_json::to_vec_pretty(script)?),
    ];
    if let Some(cover) = cover {
        files.push((dir.join(&cover.filename), cover.bytes.clone()));
    }

    let mut written = Vec::with_capacity(files.len());
    for (path, bytes) in files {
        if let Err(e) = fs::write(&path, &bytes).await {
            error!(path = %path.display(), error = %e, "Failed to write output file");
            return Err(Box::new(e));
        }
        info!(path = %path.display(), bytes = bytes.len(), "Wrote output file");
        written.push(path);
    }
    Ok(written)
}
