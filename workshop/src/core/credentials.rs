//! Credential-mode resolution.

use crate::core::types::{AuthMode, Credentials};
use crate::error::WorkshopError;

/// Pick the authentication mode for one orchestration call.
///
/// Blank strings count as absent. Passwords are passed through untrimmed.
/// - username + password: `ExplicitLogin` (carrying the guard code, if any)
/// - username only: `CachedUser`, relying on SteamCMD's cached session
/// - neither: `Anonymous`
/// - password without username: configuration error
pub fn resolve_auth_mode(credentials: &Credentials) -> Result<AuthMode, WorkshopError> {
    let username = non_empty(credentials.username.as_deref()).map(str::trim);
    let password = non_empty(credentials.password.as_deref());
    let guard_code = non_empty(credentials.guard_code.as_deref()).map(str::trim);

    match (username, password) {
        (Some(username), Some(password)) => Ok(AuthMode::ExplicitLogin {
            username: username.to_string(),
            password: password.to_string(),
            guard_code: guard_code.map(str::to_string),
        }),
        (Some(username), None) => Ok(AuthMode::CachedUser {
            username: username.to_string(),
        }),
        (None, None) => Ok(AuthMode::Anonymous),
        (None, Some(_)) => Err(WorkshopError::Configuration(
            "a password was given without a username".to_string(),
        )),
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
