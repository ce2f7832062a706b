//! Deterministic classification of SteamCMD console output.
//!
//! SteamCMD has no machine-readable output, so classification is a regex search
//! over the whole captured text. Patterns are tried in a fixed order: a download
//! failure line also contains `failed`, and login failures print a bare
//! `FAILED (...)`, so the specific patterns must win over the generic one.

use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;

use crate::core::types::Outcome;

static SUCCESS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"Success\. Downloaded item (\d+) to "([^"]+)" \(([^)\s]+) bytes\)"#)
        .expect("success pattern")
});
static DOWNLOAD_FAILURE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"ERROR! Download item (\d+) failed \(([^)]+)\)").expect("download failure pattern")
});
static LOGIN_FAILURE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"FAILED \(([^)]+)\)").expect("login failure pattern"));

/// Classify the full captured output of one download attempt.
pub fn classify(text: &str) -> Outcome {
    if let Some(caps) = SUCCESS_RE.captures(text) {
        // A garbled byte count is not a classification failure.
        let size_bytes = caps[3].parse::<u64>().unwrap_or(0);
        return Outcome::Success {
            path: PathBuf::from(&caps[2]),
            size_bytes,
        };
    }

    if let Some(caps) = DOWNLOAD_FAILURE_RE.captures(text) {
        return Outcome::DownloadFailure {
            reason: caps[2].to_string(),
        };
    }

    if let Some(caps) = LOGIN_FAILURE_RE.captures(text) {
        return Outcome::LoginFailure {
            reason: caps[1].to_string(),
        };
    }

    Outcome::Unknown {
        raw_text: text.to_string(),
    }
}

const DETAIL_MAX_CHARS: usize = 200;

/// Short description of what SteamCMD printed before a process-level failure.
///
/// A recognized download or login failure reason wins; otherwise the last
/// non-empty output line, capped at 200 characters.
pub fn failure_detail(text: &str) -> Option<String> {
    match classify(text) {
        Outcome::DownloadFailure { reason } => Some(format!("download failed: {reason}")),
        Outcome::LoginFailure { reason } => Some(format!("login failed: {reason}")),
        Outcome::Success { .. } | Outcome::Unknown { .. } => text
            .lines()
            .map(str::trim)
            .rfind(|line| !line.is_empty())
            .map(|line| {
                let line: String = line.chars().take(DETAIL_MAX_CHARS).collect();
                format!("last output: {line}")
            }),
    }
}

const GUARD_CODE_MARKERS: [&str; 2] = ["steam_guard_code", "Please check your email"];
const LOGIN_OK_MARKERS: [&str; 2] = ["Waiting for user info...OK", "OK"];
const LOGIN_DENIED_MARKERS: [&str; 2] = ["FAILED", "Logon Denied"];

/// Result of inspecting the output of a login-only SteamCMD run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    /// SteamCMD is asking for a Steam Guard code (emailed or in-app).
    GuardCodeRequired,
    LoggedIn,
    Denied,
    Unclear,
}

/// Classify the output of a login run.
///
/// The guard-code prompt is checked first since SteamCMD also prints failure
/// text alongside it.
pub fn classify_login(text: &str) -> LoginOutcome {
    if GUARD_CODE_MARKERS.iter().any(|m| text.contains(m)) {
        return LoginOutcome::GuardCodeRequired;
    }
    classify_login_result(text)
}

/// Classify a login run using only the success/failure markers.
pub fn classify_login_result(text: &str) -> LoginOutcome {
    if LOGIN_OK_MARKERS.iter().any(|m| text.contains(m)) {
        return LoginOutcome::LoggedIn;
    }
    if LOGIN_DENIED_MARKERS.iter().any(|m| text.contains(m)) {
        return LoginOutcome::Denied;
    }
    LoginOutcome::Unclear
}
