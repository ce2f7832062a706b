//! Stable exit codes for workshop CLI commands.

use crate::error::WorkshopError;

/// Command succeeded.
pub const OK: i32 = 0;
/// Download, login or I/O failure.
pub const FAILED: i32 = 1;
/// Invalid input or configuration, or SteamCMD is not installed.
pub const CONFIG: i32 = 2;
/// The operation was cancelled.
pub const CANCELLED: i32 = 3;

/// Exit code for a typed failure.
pub fn for_error(err: &WorkshopError) -> i32 {
    match err {
        WorkshopError::Configuration(_) | WorkshopError::NotInstalled { .. } => CONFIG,
        WorkshopError::Cancelled => CANCELLED,
        _ => FAILED,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_error_kinds() {
        assert_eq!(for_error(&WorkshopError::Cancelled), CANCELLED);
        assert_eq!(
            for_error(&WorkshopError::Configuration("bad".to_string())),
            CONFIG
        );
        assert_eq!(for_error(&WorkshopError::GuardCodeRequired), FAILED);
    }
}
