//! Steam Workshop downloader driving SteamCMD.
//!
//! The crate wraps SteamCMD with a bounded, cancellable retry loop. The
//! architecture keeps a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (credential resolution, argument
//!   vectors, output classification, retry decisions). No I/O.
//! - **[`io`]**: Side-effecting adapters (SteamCMD processes, config files,
//!   cache directories, Workshop page lookups). Behind traits where tests
//!   need doubles.
//!
//! [`download`] and [`login`] compose the two into the core operations;
//! [`cli`] implements the commands of the `workshop` binary on top of them.

pub mod cli;
pub mod core;
pub mod download;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod login;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
