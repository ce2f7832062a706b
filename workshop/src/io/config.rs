//! Tool configuration stored in `~/.workshop.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::retry::{DEFAULT_BASE_INTERVAL, DEFAULT_MAX_RETRIES, RetryPolicy, delay_millis};

pub const CONFIG_FILE_NAME: &str = ".workshop.toml";

/// Workshop downloader configuration (TOML).
///
/// Missing fields default to the values below; command-line flags override
/// whatever the file says.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WorkshopConfig {
    /// Directory SteamCMD is installed in (and run from).
    pub steamcmd_dir: PathBuf,

    /// Default destination for copied items.
    pub download_dir: PathBuf,

    /// Wall-clock limit for a single SteamCMD run, in seconds.
    pub attempt_timeout_secs: u64,

    /// Keep at most this many bytes of SteamCMD output per run.
    pub output_limit_bytes: usize,

    /// Console log lines attached to a failed run.
    pub log_tail_lines: usize,

    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetryConfig {
    /// Base backoff interval in milliseconds, scaled by 1, 2, 3, 5, 8...
    pub base_interval_ms: u64,

    /// Retries after the first attempt.
    pub max_retries: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_interval_ms: delay_millis(DEFAULT_BASE_INTERVAL),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            Duration::from_millis(self.base_interval_ms),
            self.max_retries,
        )
    }
}

impl Default for WorkshopConfig {
    fn default() -> Self {
        let home = home_dir();
        Self {
            steamcmd_dir: home.join(".workshop").join("steamcmd"),
            download_dir: home.join("Downloads").join("Steam-Workshop"),
            attempt_timeout_secs: 30 * 60,
            output_limit_bytes: 1_000_000,
            log_tail_lines: 5,
            retry: RetryConfig::default(),
        }
    }
}

impl WorkshopConfig {
    pub fn validate(&self) -> Result<()> {
        if self.steamcmd_dir.as_os_str().is_empty() {
            return Err(anyhow!("steamcmd_dir must not be empty"));
        }
        if self.attempt_timeout_secs == 0 {
            return Err(anyhow!("attempt_timeout_secs must be > 0"));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        Ok(())
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_secs)
    }
}

/// `~/.workshop.toml`, or `./.workshop.toml` when no home directory is known.
pub fn default_config_path() -> PathBuf {
    home_dir().join(CONFIG_FILE_NAME)
}

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `WorkshopConfig::default()`.
pub fn load_config(path: &Path) -> Result<WorkshopConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "config file missing, using defaults");
        let cfg = WorkshopConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: WorkshopConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    debug!(path = %path.display(), "config loaded");
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &WorkshopConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    if !parent.as_os_str().is_empty() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, WorkshopConfig::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        let cfg = WorkshopConfig {
            steamcmd_dir: temp.path().join("steamcmd"),
            ..WorkshopConfig::default()
        };
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "[retry]\nmax_retries = 4\nbase_interval_ms = 10000\n").expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.retry.max_retries, 4);
        assert_eq!(cfg.attempt_timeout_secs, 30 * 60);
        let policy = cfg.retry.policy();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.base_interval, Duration::from_secs(10));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "attempt_timeout_secs = 0\n").expect("write");
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("attempt_timeout_secs"));
    }
}
