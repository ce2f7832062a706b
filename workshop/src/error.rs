//! Typed failure taxonomy for the download/login core.
//!
//! The io and CLI layers wrap these in `anyhow` with context; the core keeps
//! them typed so retry decisions and exit codes can switch on the variant.

use std::path::PathBuf;

use thiserror::Error;

use crate::core::types::WorkshopItem;

/// Reason recorded for SteamCMD output that matched none of the known patterns.
pub const UNKNOWN_REASON: &str = "Unknown error occurred";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkshopError {
    /// Invalid credential combination or other unusable input.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("SteamCMD not found at {}. Install SteamCMD first", .path.display())]
    NotInstalled { path: PathBuf },

    /// SteamCMD could not be started, crashed, exited non-zero, or timed out.
    #[error("{message}")]
    Execution { message: String },

    #[error("download failed: {reason}")]
    Download { reason: String },

    #[error("login failed: {reason}")]
    Login { reason: String },

    /// Output matched none of the known patterns; the raw text is kept verbatim.
    #[error("unhandled SteamCMD output (Unknown error occurred): {raw_text}")]
    Unrecognized { raw_text: String },

    #[error(
        "not logged on to Steam ({detail}). Please run 'workshop login' first to authenticate"
    )]
    NotLoggedOn { detail: String },

    #[error(
        "Steam Guard authentication required. Please provide --guard-code with the code from your email"
    )]
    GuardCodeRequired,

    #[error("operation cancelled")]
    Cancelled,

    #[error("gave up after {attempts} attempts: {last}")]
    AttemptsExhausted {
        attempts: u32,
        last: Box<WorkshopError>,
    },
}

impl WorkshopError {
    /// Reason text fed to the retry keyword check.
    ///
    /// `None` for variants that are never retried regardless of wording.
    pub fn retry_reason(&self) -> Option<&str> {
        match self {
            WorkshopError::Execution { message } => Some(message),
            WorkshopError::Download { reason } | WorkshopError::Login { reason } => Some(reason),
            WorkshopError::Unrecognized { .. } => Some(UNKNOWN_REASON),
            WorkshopError::Configuration(_)
            | WorkshopError::NotInstalled { .. }
            | WorkshopError::NotLoggedOn { .. }
            | WorkshopError::GuardCodeRequired
            | WorkshopError::Cancelled
            | WorkshopError::AttemptsExhausted { .. } => None,
        }
    }

    /// Short message stored in `WorkshopItem::error_msg`.
    pub fn item_message(&self) -> String {
        match self {
            WorkshopError::Download { reason } => format!("Download failed: {reason}"),
            WorkshopError::Login { reason } => format!("Login failed: {reason}"),
            WorkshopError::Unrecognized { .. } => UNKNOWN_REASON.to_string(),
            WorkshopError::AttemptsExhausted { last, .. } => last.item_message(),
            other => other.to_string(),
        }
    }
}

/// A download that ended without success: the final item plus its cause.
#[derive(Debug, Clone, Error)]
#[error("{error}")]
pub struct FailedDownload {
    pub item: WorkshopItem,
    #[source]
    pub error: WorkshopError,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhausted_message_includes_last_reason() {
        let err = WorkshopError::AttemptsExhausted {
            attempts: 3,
            last: Box::new(WorkshopError::Download {
                reason: "Timeout".to_string(),
            }),
        };
        assert_eq!(
            err.to_string(),
            "gave up after 3 attempts: download failed: Timeout"
        );
        assert_eq!(err.item_message(), "Download failed: Timeout");
    }

    #[test]
    fn unrecognized_keeps_raw_text_in_message() {
        let err = WorkshopError::Unrecognized {
            raw_text: "Steam>".to_string(),
        };
        assert!(err.to_string().contains("Steam>"));
        assert_eq!(err.retry_reason(), Some(UNKNOWN_REASON));
    }

    #[test]
    fn terminal_variants_have_no_retry_reason() {
        assert_eq!(WorkshopError::Cancelled.retry_reason(), None);
        assert_eq!(WorkshopError::GuardCodeRequired.retry_reason(), None);
        assert_eq!(
            WorkshopError::Configuration("x".to_string()).retry_reason(),
            None
        );
    }
}
