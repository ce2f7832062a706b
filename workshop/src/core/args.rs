//! SteamCMD argument vectors.
//!
//! SteamCMD reads `+command arg...` pairs in order. Every download vector sets
//! `@ShutdownOnFailedCommand 1` so the process exits on the first failing
//! sub-command instead of dropping to an interactive prompt.

use crate::core::types::AuthMode;

const SHUTDOWN_ON_FAILED_COMMAND: &str = "+@ShutdownOnFailedCommand";
const NO_PROMPT_FOR_PASSWORD: &str = "+@NoPromptForPassword";
const LOGIN: &str = "+login";
const SET_GUARD_CODE: &str = "+set_steam_guard_code";
const DOWNLOAD_ITEM: &str = "+workshop_download_item";
const QUIT: &str = "+quit";

const REDACTED: &str = "****";

/// Arguments for downloading one item under the given mode.
pub fn download_args(mode: &AuthMode, app_id: &str, workshop_id: &str) -> Vec<String> {
    let mut args = vec![SHUTDOWN_ON_FAILED_COMMAND.to_string(), "1".to_string()];
    match mode {
        AuthMode::Anonymous => {
            args.extend([LOGIN.to_string(), "anonymous".to_string()]);
        }
        AuthMode::CachedUser { username } => {
            args.extend([LOGIN.to_string(), username.clone()]);
        }
        AuthMode::ExplicitLogin {
            username,
            password,
            guard_code,
        } => {
            args.extend([NO_PROMPT_FOR_PASSWORD.to_string(), "1".to_string()]);
            args.extend([LOGIN.to_string(), username.clone(), password.clone()]);
            if let Some(code) = guard_code {
                args.extend([SET_GUARD_CODE.to_string(), code.clone()]);
            }
        }
    }
    args.extend([
        DOWNLOAD_ITEM.to_string(),
        app_id.to_string(),
        workshop_id.to_string(),
        QUIT.to_string(),
    ]);
    args
}

/// Arguments for the interactive login flow.
///
/// Failed commands must not shut SteamCMD down here, otherwise it exits before
/// printing the Steam Guard prompt.
pub fn login_args(username: &str, password: &str, guard_code: Option<&str>) -> Vec<String> {
    let mut args = vec![
        SHUTDOWN_ON_FAILED_COMMAND.to_string(),
        "0".to_string(),
        NO_PROMPT_FOR_PASSWORD.to_string(),
        "1".to_string(),
        LOGIN.to_string(),
        username.to_string(),
        password.to_string(),
    ];
    if let Some(code) = guard_code {
        args.extend([SET_GUARD_CODE.to_string(), code.to_string()]);
    }
    args.push(QUIT.to_string());
    args
}

/// Arguments for an anonymous connectivity probe.
pub fn probe_args() -> Vec<String> {
    vec![LOGIN.to_string(), "anonymous".to_string(), QUIT.to_string()]
}

/// Render a printable command line with secrets masked.
///
/// The login password (second value after `+login`) and any guard code are
/// replaced with `****`.
pub fn render_command(program: &str, args: &[String]) -> String {
    let mut rendered = Vec::with_capacity(args.len() + 1);
    rendered.push(program.to_string());
    let mut iter = args.iter().peekable();
    while let Some(arg) = iter.next() {
        rendered.push(arg.clone());
        match arg.as_str() {
            LOGIN => {
                // +login <user> [<password>]; the password is the next value that
                // is not itself a command.
                if let Some(user) = iter.next() {
                    rendered.push(user.clone());
                }
                if iter.peek().is_some_and(|next| !next.starts_with('+')) {
                    iter.next();
                    rendered.push(REDACTED.to_string());
                }
            }
            SET_GUARD_CODE => {
                if iter.next().is_some() {
                    rendered.push(REDACTED.to_string());
                }
            }
            _ => {}
        }
    }
    rendered.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn anonymous_download_args() {
        assert_eq!(
            download_args(&AuthMode::Anonymous, "294100", "818773962"),
            strings(&[
                "+@ShutdownOnFailedCommand",
                "1",
                "+login",
                "anonymous",
                "+workshop_download_item",
                "294100",
                "818773962",
                "+quit",
            ])
        );
    }

    #[test]
    fn cached_user_download_args() {
        let mode = AuthMode::CachedUser {
            username: "bob".to_string(),
        };
        assert_eq!(
            download_args(&mode, "1", "2"),
            strings(&[
                "+@ShutdownOnFailedCommand",
                "1",
                "+login",
                "bob",
                "+workshop_download_item",
                "1",
                "2",
                "+quit",
            ])
        );
    }

    #[test]
    fn explicit_login_download_args_with_guard_code() {
        let mode = AuthMode::ExplicitLogin {
            username: "bob".to_string(),
            password: "pw".to_string(),
            guard_code: Some("F7K2Q".to_string()),
        };
        assert_eq!(
            download_args(&mode, "1", "2"),
            strings(&[
                "+@ShutdownOnFailedCommand",
                "1",
                "+@NoPromptForPassword",
                "1",
                "+login",
                "bob",
                "pw",
                "+set_steam_guard_code",
                "F7K2Q",
                "+workshop_download_item",
                "1",
                "2",
                "+quit",
            ])
        );
    }

    #[test]
    fn explicit_login_without_guard_code_omits_set_command() {
        let mode = AuthMode::ExplicitLogin {
            username: "bob".to_string(),
            password: "pw".to_string(),
            guard_code: None,
        };
        let args = download_args(&mode, "1", "2");
        assert!(!args.iter().any(|a| a == "+set_steam_guard_code"));
    }

    #[test]
    fn login_args_disable_shutdown_on_failure() {
        let args = login_args("bob", "pw", None);
        assert_eq!(&args[..2], &strings(&["+@ShutdownOnFailedCommand", "0"])[..]);
        assert_eq!(args.last().map(String::as_str), Some("+quit"));
    }

    #[test]
    fn render_command_masks_password_and_guard_code() {
        let args = login_args("bob", "hunter2", Some("F7K2Q"));
        let rendered = render_command("steamcmd.sh", &args);
        assert!(rendered.contains("+login bob ****"));
        assert!(rendered.contains("+set_steam_guard_code ****"));
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("F7K2Q"));
    }

    #[test]
    fn render_command_leaves_cached_username_alone() {
        let mode = AuthMode::CachedUser {
            username: "bob".to_string(),
        };
        let rendered = render_command("steamcmd.sh", &download_args(&mode, "1", "2"));
        assert_eq!(
            rendered,
            "steamcmd.sh +@ShutdownOnFailedCommand 1 +login bob +workshop_download_item 1 2 +quit"
        );
    }
}
