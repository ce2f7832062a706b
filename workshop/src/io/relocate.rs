//! Copy a finished item out of SteamCMD's content tree.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::{debug, info, instrument};
use walkdir::WalkDir;

/// Directory name an item is copied into under the output directory.
pub fn item_dir_name(app_id: &str, workshop_id: &str) -> String {
    format!("app_{app_id}_workshop_{workshop_id}")
}

/// Recursively copy `item_path` to `<output_dir>/app_<app>_workshop_<item>`.
///
/// Existing files at the destination are overwritten. Returns the destination.
#[instrument(skip_all, fields(app_id = %app_id, workshop_id = %workshop_id))]
pub fn relocate_item(
    item_path: &Path,
    output_dir: &Path,
    app_id: &str,
    workshop_id: &str,
) -> Result<PathBuf> {
    if !item_path.is_dir() {
        bail!("downloaded item not found at {}", item_path.display());
    }
    let dest = output_dir.join(item_dir_name(app_id, workshop_id));
    fs::create_dir_all(&dest).with_context(|| format!("create {}", dest.display()))?;

    let mut files = 0usize;
    for entry in WalkDir::new(item_path).min_depth(1) {
        let entry = entry.with_context(|| format!("walk {}", item_path.display()))?;
        let rel = entry
            .path()
            .strip_prefix(item_path)
            .with_context(|| format!("relativize {}", entry.path().display()))?;
        let target = dest.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).with_context(|| format!("create {}", target.display()))?;
        } else {
            fs::copy(entry.path(), &target).with_context(|| {
                format!("copy {} to {}", entry.path().display(), target.display())
            })?;
            files += 1;
        }
    }
    debug!(files, "copied item files");
    info!(dest = %dest.display(), "item relocated");
    Ok(dest)
}
