//! Ctrl-C handling for the CLI.
//!
//! The first interrupt cancels the shared [`CancelToken`]: a running SteamCMD
//! child shares the terminal's process group and receives the same signal, and
//! the orchestrator stops before the next attempt. A second interrupt exits.

use std::process;
use std::thread;

use anyhow::{Context, Result};
use tracing::warn;

use crate::exit_codes;
use crate::io::schedule::CancelToken;

#[cfg(unix)]
type Interrupts = tokio::signal::unix::Signal;
#[cfg(windows)]
type Interrupts = tokio::signal::windows::CtrlC;

#[cfg(unix)]
fn listen() -> std::io::Result<Interrupts> {
    use tokio::signal::unix::{SignalKind, signal};
    signal(SignalKind::interrupt())
}

#[cfg(windows)]
fn listen() -> std::io::Result<Interrupts> {
    tokio::signal::windows::ctrl_c()
}

/// Cancel `cancel` on Ctrl-C. Returns once the handler is registered.
pub fn cancel_on_interrupt(cancel: &CancelToken) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("build signal runtime")?;
    let mut interrupts = {
        let _guard = runtime.enter();
        listen().context("register Ctrl-C handler")?
    };

    let cancel = cancel.clone();
    thread::Builder::new()
        .name("interrupt".to_string())
        .spawn(move || {
            runtime.block_on(async move {
                if interrupts.recv().await.is_none() {
                    return;
                }
                warn!("interrupted, stopping after the current attempt");
                eprintln!("Interrupted. Press Ctrl-C again to exit immediately.");
                cancel.cancel();
                if interrupts.recv().await.is_some() {
                    process::exit(exit_codes::CANCELLED);
                }
            });
        })
        .context("spawn interrupt thread")?;
    Ok(())
}
