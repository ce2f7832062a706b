//! Workshop cache inspection and cleanup.
//!
//! SteamCMD leaves partial downloads under `steamapps/workshop/{downloads,temp}`;
//! stale entries there make later runs hang or fail with thread-pool errors.
//! Removing them (and optionally the finished `content`) resets the state.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

/// `<install>/steamapps/workshop/content`, where finished items land.
pub fn workshop_content_dir(install_dir: &Path) -> PathBuf {
    workshop_base(install_dir).join("content")
}

fn workshop_base(install_dir: &Path) -> PathBuf {
    install_dir.join("steamapps").join("workshop")
}

/// Workshop directory of a desktop Steam install for this user, if the platform has one.
pub fn system_workshop_dir() -> Option<PathBuf> {
    let home = dirs::home_dir()?;
    let base = if cfg!(target_os = "macos") {
        home.join("Library").join("Application Support").join("Steam")
    } else if cfg!(windows) {
        home.join("AppData").join("Local").join("Steam")
    } else if cfg!(target_os = "linux") {
        home.join(".steam").join("steam")
    } else {
        return None;
    };
    Some(base.join("steamapps").join("workshop"))
}

/// Existing cache directories worth removing.
///
/// Local `downloads` and `temp` always qualify; local `content` only with
/// `include_content`. The desktop install's `downloads`/`temp` are added
/// when `system_workshop` exists.
pub fn cache_paths(
    install_dir: &Path,
    system_workshop: Option<&Path>,
    include_content: bool,
) -> Vec<PathBuf> {
    let local = workshop_base(install_dir);
    let mut candidates = vec![local.join("downloads"), local.join("temp")];
    if include_content {
        candidates.push(local.join("content"));
    }
    if let Some(system) = system_workshop.filter(|dir| dir.is_dir()) {
        candidates.push(system.join("downloads"));
        candidates.push(system.join("temp"));
    }
    candidates.into_iter().filter(|path| path.exists()).collect()
}

/// Outcome of [`clean_paths`]; removal keeps going past individual failures.
#[derive(Debug, Default)]
pub struct CleanReport {
    pub removed: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
}

pub fn clean_paths(paths: &[PathBuf]) -> CleanReport {
    let mut report = CleanReport::default();
    for path in paths {
        match fs::remove_dir_all(path) {
            Ok(()) => {
                info!(path = %path.display(), "removed workshop cache directory");
                report.removed.push(path.clone());
            }
            Err(err) => {
                warn!(path = %path.display(), err = %err, "failed to remove cache directory");
                report.failed.push((path.clone(), err.to_string()));
            }
        }
    }
    report
}

/// Downloaded items per app id, both sorted. Apps without items are omitted.
pub fn list_downloaded(install_dir: &Path) -> Result<BTreeMap<String, Vec<String>>> {
    let content = workshop_content_dir(install_dir);
    let mut items = BTreeMap::new();
    if !content.exists() {
        return Ok(items);
    }
    let entries = fs::read_dir(&content)
        .with_context(|| format!("read workshop directory {}", content.display()))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("read entry in {}", content.display()))?;
        if !entry.path().is_dir() {
            continue;
        }
        let app_id = entry.file_name().to_string_lossy().into_owned();
        let mut ids = match subdirectory_names(&entry.path()) {
            Ok(ids) => ids,
            Err(err) => {
                debug!(app_id = %app_id, err = %err, "skipping unreadable app directory");
                continue;
            }
        };
        if ids.is_empty() {
            continue;
        }
        ids.sort();
        items.insert(app_id, ids);
    }
    Ok(items)
}

fn subdirectory_names(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.path().is_dir() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    Ok(names)
}
