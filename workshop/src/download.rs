//! Bounded, cancellable download of one Workshop item.
//!
//! Each call resolves the authentication mode once, then loops
//! invoke -> classify -> decide until the item is downloaded, the failure is
//! fatal, or the attempt budget is spent. Waits between attempts go through a
//! [`Scheduler`] and observe the caller's [`CancelToken`].

use std::path::PathBuf;

use tracing::{debug, info, instrument, warn};

use crate::core::classifier::{classify, failure_detail};
use crate::core::credentials::resolve_auth_mode;
use crate::core::retry::{RetryDecision, RetryPolicy, delay_millis, mentions_not_logged_on};
use crate::core::types::{
    AuthMode, Credentials, DownloadRequest, Outcome, RawAttempt, RetryState, WorkshopItem,
};
use crate::error::{FailedDownload, WorkshopError};
use crate::io::schedule::{CancelToken, Scheduler};
use crate::io::steamcmd::Invoker;

const GUARD_CHALLENGE_MARKERS: [&str; 2] = ["steam_guard_code", "Account Logon Denied"];

pub struct DownloadOrchestrator<I, S> {
    invoker: I,
    scheduler: S,
    policy: RetryPolicy,
}

impl<I: Invoker, S: Scheduler> DownloadOrchestrator<I, S> {
    pub fn new(invoker: I, scheduler: S, policy: RetryPolicy) -> Self {
        Self {
            invoker,
            scheduler,
            policy,
        }
    }

    /// Download `workshop_id` of `app_id`, retrying transient failures.
    ///
    /// On failure the returned [`FailedDownload`] carries the final item
    /// (`success == false`, `error_msg` set) and the typed cause.
    #[instrument(skip_all, fields(app_id = %app_id, workshop_id = %workshop_id))]
    pub fn download(
        &self,
        app_id: &str,
        workshop_id: &str,
        credentials: &Credentials,
        cancel: &CancelToken,
    ) -> Result<WorkshopItem, FailedDownload> {
        let auth_mode =
            resolve_auth_mode(credentials).map_err(|e| failure(app_id, workshop_id, e))?;
        let request = DownloadRequest {
            app_id: app_id.to_string(),
            workshop_id: workshop_id.to_string(),
            auth_mode,
        };
        info!(
            mode = request.auth_mode.label(),
            user = request.auth_mode.username().unwrap_or("anonymous"),
            max_attempts = self.policy.max_attempts,
            "starting download"
        );
        self.run_attempts(&request, cancel)
            .map_err(|e| failure(app_id, workshop_id, e))
    }

    fn run_attempts(
        &self,
        request: &DownloadRequest,
        cancel: &CancelToken,
    ) -> Result<WorkshopItem, WorkshopError> {
        let mut state = RetryState::default();
        loop {
            cancel.check()?;
            debug!(attempt = state.attempt, "invoking steamcmd");
            let raw =
                self.invoker
                    .invoke(&request.auth_mode, &request.app_id, &request.workshop_id);

            let error = match interpret_attempt(&request.auth_mode, &raw) {
                Ok((path, size_bytes)) => {
                    info!(
                        attempt = state.attempt,
                        path = %path.display(),
                        size_bytes,
                        "download succeeded"
                    );
                    return Ok(WorkshopItem::succeeded(
                        &request.app_id,
                        &request.workshop_id,
                        path,
                        size_bytes,
                    ));
                }
                Err(error) => error,
            };

            match self
                .policy
                .decide(state.attempt, &error, &raw.diagnostics())
            {
                RetryDecision::Fatal => {
                    warn!(attempt = state.attempt, error = %error, "non-retryable failure");
                    return Err(error);
                }
                RetryDecision::Exhausted => {
                    warn!(
                        attempts = state.attempt,
                        error = %error,
                        "all retry attempts exhausted"
                    );
                    return Err(WorkshopError::AttemptsExhausted {
                        attempts: state.attempt,
                        last: Box::new(error),
                    });
                }
                RetryDecision::RetryAfter(delay) => {
                    state.next_delay = Some(delay);
                    warn!(
                        attempt = state.attempt,
                        max_attempts = self.policy.max_attempts,
                        delay_ms = delay_millis(delay),
                        error = %error,
                        "transient failure, will retry"
                    );
                    self.scheduler.wait(delay, cancel)?;
                    cancel.check()?;
                    state.attempt += 1;
                }
            }
        }
    }
}

/// Turn one attempt into the downloaded path and size, or the failure it represents.
///
/// A process-level failure takes precedence over whatever text was captured.
/// Its diagnostics are checked for a missing session and, for explicit logins
/// without a code, for a Steam Guard challenge; both are reported as their own
/// fatal errors.
pub fn interpret_attempt(
    mode: &AuthMode,
    raw: &RawAttempt,
) -> Result<(PathBuf, u64), WorkshopError> {
    if let Some(message) = &raw.exec_error {
        let diagnostics = raw.diagnostics();
        if let Some(line) = not_logged_on_line(&diagnostics) {
            return Err(WorkshopError::NotLoggedOn {
                detail: line.to_string(),
            });
        }
        if needs_guard_code(mode)
            && GUARD_CHALLENGE_MARKERS
                .iter()
                .any(|m| diagnostics.contains(m))
        {
            return Err(WorkshopError::GuardCodeRequired);
        }
        return Err(execution_error(message, &raw.output));
    }

    match classify(&raw.output) {
        Outcome::Success { path, size_bytes } => Ok((path, size_bytes)),
        Outcome::DownloadFailure { reason } => Err(WorkshopError::Download { reason }),
        Outcome::LoginFailure { reason } => Err(WorkshopError::Login { reason }),
        Outcome::Unknown { raw_text } => Err(WorkshopError::Unrecognized { raw_text }),
    }
}

/// Process-level failure carrying whatever SteamCMD reported before it exited.
pub(crate) fn execution_error(message: &str, output: &str) -> WorkshopError {
    let message = match failure_detail(output) {
        Some(detail) => format!("{message} ({detail})"),
        None => message.to_string(),
    };
    WorkshopError::Execution { message }
}

fn needs_guard_code(mode: &AuthMode) -> bool {
    matches!(
        mode,
        AuthMode::ExplicitLogin {
            guard_code: None,
            ..
        }
    )
}

fn not_logged_on_line(text: &str) -> Option<&str> {
    text.lines()
        .find(|line| mentions_not_logged_on(line))
        .map(str::trim)
}

fn failure(app_id: &str, workshop_id: &str, error: WorkshopError) -> FailedDownload {
    FailedDownload {
        item: WorkshopItem::failed(app_id, workshop_id, error.item_message()),
        error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{
        RecordingScheduler, ScriptedInvoker, download_failure_output, exec_failure,
        success_output,
    };
    use std::time::Duration;

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(Duration::from_secs(2), max_retries)
    }

    fn explicit(guard_code: Option<&str>) -> AuthMode {
        AuthMode::ExplicitLogin {
            username: "alice".to_string(),
            password: "hunter2".to_string(),
            guard_code: guard_code.map(str::to_string),
        }
    }

    #[test]
    fn success_on_first_attempt() {
        let invoker = ScriptedInvoker::new(vec![RawAttempt::from_output(success_output(
            "20",
            "/steam/content/10/20",
            1234,
        ))]);
        let scheduler = RecordingScheduler::new();
        let orchestrator = DownloadOrchestrator::new(&invoker, &scheduler, policy(3));

        let item = orchestrator
            .download("10", "20", &Credentials::default(), &CancelToken::new())
            .expect("download");

        assert!(item.success);
        assert_eq!(item.path_to_file, Some(PathBuf::from("/steam/content/10/20")));
        assert_eq!(item.size_bytes, Some(1234));
        assert_eq!(item.error_msg, None);
        assert_eq!(invoker.call_count(), 1);
        assert!(scheduler.delays().is_empty());
    }

    #[test]
    fn invalid_credentials_never_invoke() {
        let invoker = ScriptedInvoker::new(Vec::new());
        let orchestrator =
            DownloadOrchestrator::new(&invoker, RecordingScheduler::new(), policy(3));
        let creds = Credentials {
            password: Some("secret".to_string()),
            ..Credentials::default()
        };

        let failed = orchestrator
            .download("10", "20", &creds, &CancelToken::new())
            .unwrap_err();

        assert!(matches!(failed.error, WorkshopError::Configuration(_)));
        assert!(!failed.item.success);
        assert_eq!(invoker.call_count(), 0);
    }

    #[test]
    fn exhaustion_reports_last_reason() {
        let timeout = || RawAttempt::from_output(download_failure_output("20", "Timeout"));
        let invoker = ScriptedInvoker::new(vec![timeout(), timeout(), timeout()]);
        let scheduler = RecordingScheduler::new();
        let orchestrator = DownloadOrchestrator::new(&invoker, &scheduler, policy(2));

        let failed = orchestrator
            .download("10", "20", &Credentials::default(), &CancelToken::new())
            .unwrap_err();

        assert_eq!(invoker.call_count(), 3);
        assert_eq!(
            scheduler.delays(),
            vec![Duration::from_secs(2), Duration::from_secs(4)]
        );
        assert!(matches!(
            failed.error,
            WorkshopError::AttemptsExhausted { attempts: 3, .. }
        ));
        assert!(failed.to_string().contains("Timeout"));
        assert_eq!(
            failed.item.error_msg.as_deref(),
            Some("Download failed: Timeout")
        );
    }

    #[test]
    fn not_logged_on_in_log_tail_is_fatal() {
        let invoker = ScriptedInvoker::new(vec![exec_failure(
            "",
            "failed to run SteamCMD: exit status: 5",
            Some("[2024-01-01] ERROR (Not logged on)"),
        )]);
        let scheduler = RecordingScheduler::new();
        let orchestrator = DownloadOrchestrator::new(&invoker, &scheduler, policy(5));

        let failed = orchestrator
            .download("10", "20", &Credentials::default(), &CancelToken::new())
            .unwrap_err();

        assert_eq!(
            failed.error,
            WorkshopError::NotLoggedOn {
                detail: "[2024-01-01] ERROR (Not logged on)".to_string()
            }
        );
        assert_eq!(invoker.call_count(), 1);
        assert!(scheduler.delays().is_empty());
    }

    #[test]
    fn exec_failure_without_session_problem_is_retried() {
        let invoker = ScriptedInvoker::new(vec![
            exec_failure("", "failed to run SteamCMD: exit status: 8", None),
            RawAttempt::from_output(success_output("20", "/c/20", 1)),
        ]);
        let scheduler = RecordingScheduler::new();
        let orchestrator = DownloadOrchestrator::new(&invoker, &scheduler, policy(5));

        let item = orchestrator
            .download("10", "20", &Credentials::default(), &CancelToken::new())
            .expect("download");

        assert!(item.success);
        assert_eq!(scheduler.delays(), vec![Duration::from_secs(2)]);
    }

    #[test]
    fn failed_exit_keeps_reported_reason() {
        let denied = || {
            exec_failure(
                &download_failure_output("20", "Access Denied"),
                "failed to run SteamCMD: exit status: 5",
                None,
            )
        };
        let invoker = ScriptedInvoker::new(vec![denied(), denied(), denied()]);
        let orchestrator =
            DownloadOrchestrator::new(&invoker, RecordingScheduler::new(), policy(2));

        let failed = orchestrator
            .download("10", "20", &Credentials::default(), &CancelToken::new())
            .unwrap_err();

        assert_eq!(invoker.call_count(), 3);
        assert!(failed.to_string().contains("Access Denied"), "{failed}");
        assert_eq!(
            failed.item.error_msg.as_deref(),
            Some("failed to run SteamCMD: exit status: 5 (download failed: Access Denied)")
        );
    }

    #[test]
    fn guard_challenge_without_code_is_fatal() {
        let raw = exec_failure(
            "",
            "failed to run SteamCMD: exit status: 5",
            Some("Logging in user 'alice' to Steam Public...\nERROR (Account Logon Denied)"),
        );
        assert_eq!(
            interpret_attempt(&explicit(None), &raw),
            Err(WorkshopError::GuardCodeRequired)
        );
        assert!(matches!(
            interpret_attempt(&explicit(Some("AB12C")), &raw),
            Err(WorkshopError::Execution { .. })
        ));
    }

    #[test]
    fn unknown_output_is_retryable_and_kept_verbatim() {
        let raw = RawAttempt::from_output("Steam>\n");
        let err = interpret_attempt(&AuthMode::Anonymous, &raw).unwrap_err();
        assert_eq!(
            err,
            WorkshopError::Unrecognized {
                raw_text: "Steam>\n".to_string()
            }
        );
        assert!(policy(3).is_retryable(&err, &raw.diagnostics()));
    }

    #[test]
    fn cancelled_before_start_never_invokes() {
        let invoker = ScriptedInvoker::new(Vec::new());
        let orchestrator =
            DownloadOrchestrator::new(&invoker, RecordingScheduler::new(), policy(3));
        let cancel = CancelToken::new();
        cancel.cancel();

        let failed = orchestrator
            .download("10", "20", &Credentials::default(), &cancel)
            .unwrap_err();

        assert_eq!(failed.error, WorkshopError::Cancelled);
        assert_eq!(failed.item.error_msg.as_deref(), Some("operation cancelled"));
        assert_eq!(invoker.call_count(), 0);
    }
}
