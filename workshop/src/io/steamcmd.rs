//! SteamCMD process adapter.
//!
//! The [`Invoker`] trait decouples orchestration from the real SteamCMD binary.
//! Tests use scripted invokers that return canned console output without
//! spawning processes.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tracing::{debug, info, instrument, warn};

use crate::core::args::{download_args, login_args, probe_args, render_command};
use crate::core::types::{AuthMode, RawAttempt};
use crate::error::WorkshopError;
use crate::io::config::WorkshopConfig;
use crate::io::process::run_merged;

#[cfg(windows)]
pub const EXECUTABLE: &str = "steamcmd.exe";
#[cfg(not(windows))]
pub const EXECUTABLE: &str = "steamcmd.sh";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30 * 60);
const DEFAULT_OUTPUT_LIMIT_BYTES: usize = 1_000_000;
const DEFAULT_LOG_TAIL_LINES: usize = 5;

/// Runs SteamCMD once per call and reports what happened.
///
/// Implementations must not fail: spawn errors, crashes and non-zero exits are
/// reported through [`RawAttempt::exec_error`].
pub trait Invoker {
    fn run(&self, args: &[String]) -> RawAttempt;

    /// Download one item under the given authentication mode.
    fn invoke(&self, mode: &AuthMode, app_id: &str, workshop_id: &str) -> RawAttempt {
        self.run(&download_args(mode, app_id, workshop_id))
    }

    /// Log in only (no download), keeping SteamCMD alive on failed commands.
    fn login(&self, username: &str, password: &str, guard_code: Option<&str>) -> RawAttempt {
        self.run(&login_args(username, password, guard_code))
    }
}

impl<T: Invoker + ?Sized> Invoker for &T {
    fn run(&self, args: &[String]) -> RawAttempt {
        (**self).run(args)
    }

    fn invoke(&self, mode: &AuthMode, app_id: &str, workshop_id: &str) -> RawAttempt {
        (**self).invoke(mode, app_id, workshop_id)
    }

    fn login(&self, username: &str, password: &str, guard_code: Option<&str>) -> RawAttempt {
        (**self).login(username, password, guard_code)
    }
}

/// A located SteamCMD installation.
#[derive(Debug, Clone)]
pub struct SteamCmd {
    program: PathBuf,
    working_dir: PathBuf,
    timeout: Duration,
    output_limit_bytes: usize,
    log_tail_lines: usize,
}

impl SteamCmd {
    /// Locate the SteamCMD launcher under `install_dir`.
    pub fn locate(install_dir: &Path) -> Result<Self, WorkshopError> {
        let program = install_dir.join(EXECUTABLE);
        if !program.is_file() {
            return Err(WorkshopError::NotInstalled { path: program });
        }
        Ok(Self {
            program,
            working_dir: install_dir.to_path_buf(),
            timeout: DEFAULT_TIMEOUT,
            output_limit_bytes: DEFAULT_OUTPUT_LIMIT_BYTES,
            log_tail_lines: DEFAULT_LOG_TAIL_LINES,
        })
    }

    pub fn from_config(cfg: &WorkshopConfig) -> Result<Self, WorkshopError> {
        Ok(Self::locate(&cfg.steamcmd_dir)?
            .with_timeout(cfg.attempt_timeout())
            .with_output_limit(cfg.output_limit_bytes)
            .with_log_tail_lines(cfg.log_tail_lines))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_output_limit(mut self, bytes: usize) -> Self {
        self.output_limit_bytes = bytes;
        self
    }

    pub fn with_log_tail_lines(mut self, lines: usize) -> Self {
        self.log_tail_lines = lines;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// SteamCMD's own console log, appended to on every run.
    pub fn console_log_path(&self) -> PathBuf {
        self.working_dir.join("logs").join("console_log.txt")
    }

    /// Printable command line with secrets masked.
    pub fn command_line(&self, args: &[String]) -> String {
        render_command(&self.program.display().to_string(), args)
    }

    /// Check that SteamCMD can reach Steam with an anonymous login.
    #[instrument(skip_all)]
    pub fn test_connection(&self) -> Result<()> {
        let attempt = self.run(&probe_args());
        if let Some(err) = attempt.exec_error {
            bail!(
                "SteamCMD connection test failed: {err}\nOutput: {}",
                attempt.output
            );
        }
        if attempt.output.contains("Waiting for user info...OK") {
            info!("connection test passed");
            return Ok(());
        }
        if attempt.output.contains("No connection") {
            bail!("no internet connection or Steam servers unreachable");
        }
        bail!("connection test inconclusive: {}", attempt.output)
    }

    /// Start SteamCMD attached to this terminal for a manual session.
    pub fn launch_interactive(&self) -> Result<ExitStatus> {
        info!(program = %self.program.display(), "launching interactive SteamCMD");
        Command::new(&self.program)
            .current_dir(&self.working_dir)
            .status()
            .with_context(|| format!("run {}", self.program.display()))
    }
}

impl Invoker for SteamCmd {
    #[instrument(skip_all, fields(timeout_secs = self.timeout.as_secs()))]
    fn run(&self, args: &[String]) -> RawAttempt {
        debug!(command = %self.command_line(args), "running steamcmd");
        let mut cmd = Command::new(&self.program);
        cmd.args(args).current_dir(&self.working_dir);

        let (output, exec_error) = match run_merged(cmd, self.timeout, self.output_limit_bytes) {
            Ok(out) => {
                let mut text = out.truncated_notice("steamcmd");
                text.push_str(&out.text());
                let exec_error = if out.timed_out {
                    Some(format!(
                        "failed to run SteamCMD: SteamCMD timeout after {}s",
                        self.timeout.as_secs()
                    ))
                } else if !out.status.success() {
                    Some(format!("failed to run SteamCMD: {}", out.status))
                } else {
                    None
                };
                (text, exec_error)
            }
            Err(err) => (String::new(), Some(format!("failed to run SteamCMD: {err:#}"))),
        };

        let log_tail = match &exec_error {
            Some(err) => {
                warn!(error = %err, log = %self.console_log_path().display(), "steamcmd run failed");
                read_log_tail(&self.console_log_path(), self.log_tail_lines)
            }
            None => None,
        };

        RawAttempt {
            output,
            exec_error,
            log_tail,
        }
    }
}

/// Last `lines` lines of a log file. Best effort: unreadable or empty logs yield `None`.
pub fn read_log_tail(path: &Path, lines: usize) -> Option<String> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) => {
            debug!(path = %path.display(), err = %err, "console log unavailable");
            return None;
        }
    };
    let all: Vec<&str> = contents.trim_end().lines().collect();
    if all.is_empty() {
        return None;
    }
    let start = all.len().saturating_sub(lines);
    Some(all[start..].join("\n"))
}
