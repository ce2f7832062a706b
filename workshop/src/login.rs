//! Two-phase interactive login that caches a SteamCMD session.
//!
//! Phase one logs in without a Steam Guard code. If SteamCMD asks for one, the
//! code is read from a [`GuardCodeSource`] and the login is repeated once with
//! it. There is no third phase.

use tracing::{info, instrument, warn};

use crate::core::classifier::{LoginOutcome, classify, classify_login, classify_login_result};
use crate::core::types::{Outcome, RawAttempt};
use crate::download::execution_error;
use crate::error::WorkshopError;
use crate::io::guard_code::GuardCodeSource;
use crate::io::steamcmd::Invoker;

pub struct LoginFlow<I, G> {
    invoker: I,
    guard_source: G,
}

impl<I: Invoker, G: GuardCodeSource> LoginFlow<I, G> {
    pub fn new(invoker: I, guard_source: G) -> Self {
        Self {
            invoker,
            guard_source,
        }
    }

    #[instrument(skip_all, fields(username = %username))]
    pub fn login(&self, username: &str, password: &str) -> Result<(), WorkshopError> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(WorkshopError::Configuration(
                "username and password are required to log in".to_string(),
            ));
        }

        let first = self.invoker.login(username, password, None);
        if classify_login(&first.output) != LoginOutcome::GuardCodeRequired {
            return conclude(&first);
        }

        info!("Steam Guard code requested");
        let code = self.guard_source.read_guard_code().map_err(|err| {
            WorkshopError::Configuration(format!("failed to read Steam Guard code: {err:#}"))
        })?;
        if code.is_empty() {
            return Err(WorkshopError::Configuration(
                "Steam Guard code is required".to_string(),
            ));
        }

        let second = self.invoker.login(username, password, Some(&code));
        conclude(&second)
    }
}

fn conclude(raw: &RawAttempt) -> Result<(), WorkshopError> {
    match classify_login_result(&raw.output) {
        LoginOutcome::LoggedIn => {
            info!("login succeeded");
            Ok(())
        }
        LoginOutcome::Denied => {
            let reason = denial_reason(&raw.output);
            warn!(reason = %reason, "login denied");
            Err(WorkshopError::Login { reason })
        }
        LoginOutcome::GuardCodeRequired | LoginOutcome::Unclear => match &raw.exec_error {
            Some(message) => Err(execution_error(message, &raw.output)),
            None => Err(WorkshopError::Unrecognized {
                raw_text: raw.output.clone(),
            }),
        },
    }
}

/// `FAILED (<reason>)` when present, else the first line carrying a denial marker.
fn denial_reason(output: &str) -> String {
    if let Outcome::LoginFailure { reason } = classify(output) {
        return reason;
    }
    output
        .lines()
        .map(str::trim)
        .find(|line| line.contains("FAILED") || line.contains("Logon Denied"))
        .unwrap_or("Logon Denied")
        .to_string()
}
