//! Shared deterministic types for the download core.
//!
//! These types define stable contracts between core components. They should not
//! depend on external state or I/O and must remain deterministic across runs.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

/// How SteamCMD should authenticate for one orchestration call.
///
/// Resolved once per call and never changed between retries.
#[derive(Clone, PartialEq, Eq)]
pub enum AuthMode {
    /// Unauthenticated session; enough for public items.
    Anonymous,
    /// Reuse the session SteamCMD cached for this username.
    CachedUser { username: String },
    /// Log in with explicit credentials, optionally with a Steam Guard code.
    ExplicitLogin {
        username: String,
        password: String,
        guard_code: Option<String>,
    },
}

impl AuthMode {
    pub fn username(&self) -> Option<&str> {
        match self {
            AuthMode::Anonymous => None,
            AuthMode::CachedUser { username } | AuthMode::ExplicitLogin { username, .. } => {
                Some(username)
            }
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AuthMode::Anonymous => "anonymous",
            AuthMode::CachedUser { .. } => "cached",
            AuthMode::ExplicitLogin { .. } => "explicit",
        }
    }
}

// Hand-written so passwords and guard codes never reach logs.
impl fmt::Debug for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMode::Anonymous => f.write_str("Anonymous"),
            AuthMode::CachedUser { username } => f
                .debug_struct("CachedUser")
                .field("username", username)
                .finish(),
            AuthMode::ExplicitLogin {
                username,
                guard_code,
                ..
            } => f
                .debug_struct("ExplicitLogin")
                .field("username", username)
                .field("password", &"****")
                .field("guard_code", &guard_code.as_ref().map(|_| "****"))
                .finish(),
        }
    }
}

/// Raw credential inputs as supplied by the caller (flags, config).
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub username: Option<String>,
    pub password: Option<String>,
    pub guard_code: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "****"))
            .field("guard_code", &self.guard_code.as_ref().map(|_| "****"))
            .finish()
    }
}

/// One item download, immutable for the duration of an orchestration call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub app_id: String,
    pub workshop_id: String,
    pub auth_mode: AuthMode,
}

/// Captured result of a single SteamCMD process run.
///
/// Produced fresh for each attempt and dropped after classification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawAttempt {
    /// Interleaved stdout and stderr.
    pub output: String,
    /// Set when the process could not run or exited unsuccessfully.
    pub exec_error: Option<String>,
    /// Last lines of SteamCMD's console log, read only when `exec_error` is set.
    pub log_tail: Option<String>,
}

impl RawAttempt {
    pub fn from_output(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            ..Self::default()
        }
    }

    /// Output plus any log tail, for diagnostic phrase checks.
    pub fn diagnostics(&self) -> String {
        match &self.log_tail {
            Some(tail) => format!("{}\n{}", self.output, tail),
            None => self.output.clone(),
        }
    }
}

/// Classification of one attempt's captured text. Exactly one per attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success { path: PathBuf, size_bytes: u64 },
    DownloadFailure { reason: String },
    LoginFailure { reason: String },
    /// Nothing recognizable; `raw_text` is the input verbatim.
    Unknown { raw_text: String },
}

/// Final result of a download call. Built once and returned; never mutated after.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkshopItem {
    pub app_id: String,
    pub workshop_id: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path_to_file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_msg: Option<String>,
}

impl WorkshopItem {
    pub fn succeeded(
        app_id: impl Into<String>,
        workshop_id: impl Into<String>,
        path: PathBuf,
        size_bytes: u64,
    ) -> Self {
        Self {
            app_id: app_id.into(),
            workshop_id: workshop_id.into(),
            success: true,
            path_to_file: Some(path),
            size_bytes: Some(size_bytes),
            error_msg: None,
        }
    }

    pub fn failed(
        app_id: impl Into<String>,
        workshop_id: impl Into<String>,
        error_msg: impl Into<String>,
    ) -> Self {
        Self {
            app_id: app_id.into(),
            workshop_id: workshop_id.into(),
            success: false,
            path_to_file: None,
            size_bytes: None,
            error_msg: Some(error_msg.into()),
        }
    }
}

/// Loop bookkeeping owned by the orchestrator; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryState {
    /// 1-based number of the attempt about to run (or just run).
    pub attempt: u32,
    /// Delay scheduled before the next attempt, if one was scheduled.
    pub next_delay: Option<Duration>,
}

impl Default for RetryState {
    fn default() -> Self {
        Self {
            attempt: 1,
            next_delay: None,
        }
    }
}
