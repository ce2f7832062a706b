//! Test-only doubles and SteamCMD output fixtures.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
#[cfg(unix)]
use std::path::Path;
use std::time::Duration;

use crate::core::types::RawAttempt;
use crate::error::WorkshopError;
use crate::io::guard_code::GuardCodeSource;
use crate::io::schedule::{CancelToken, Scheduler};
use crate::io::steamcmd::Invoker;

/// Invoker that replays canned attempts in order and records every argument vector.
///
/// Panics if invoked more often than scripted.
#[derive(Debug, Default)]
pub struct ScriptedInvoker {
    attempts: RefCell<VecDeque<RawAttempt>>,
    calls: RefCell<Vec<Vec<String>>>,
}

impl ScriptedInvoker {
    pub fn new(attempts: Vec<RawAttempt>) -> Self {
        Self {
            attempts: RefCell::new(attempts.into()),
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.borrow().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }
}

impl Invoker for ScriptedInvoker {
    fn run(&self, args: &[String]) -> RawAttempt {
        self.calls.borrow_mut().push(args.to_vec());
        self.attempts
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| panic!("unexpected SteamCMD invocation: {args:?}"))
    }
}

/// Scheduler that records requested delays instead of sleeping.
///
/// With [`RecordingScheduler::cancel_on_wait`], the given wait (1-based)
/// cancels the token and reports cancellation, as a real wait interrupted by
/// the caller would.
#[derive(Debug, Default)]
pub struct RecordingScheduler {
    delays: RefCell<Vec<Duration>>,
    cancel_on: Option<usize>,
}

impl RecordingScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel_on_wait(wait: usize) -> Self {
        Self {
            delays: RefCell::new(Vec::new()),
            cancel_on: Some(wait),
        }
    }

    pub fn delays(&self) -> Vec<Duration> {
        self.delays.borrow().clone()
    }
}

impl Scheduler for RecordingScheduler {
    fn wait(&self, delay: Duration, cancel: &CancelToken) -> Result<(), WorkshopError> {
        let mut delays = self.delays.borrow_mut();
        delays.push(delay);
        if self.cancel_on == Some(delays.len()) {
            cancel.cancel();
        }
        cancel.check()
    }
}

/// Guard-code source that hands out scripted codes and counts reads.
#[derive(Debug, Default)]
pub struct ScriptedGuardCode {
    codes: RefCell<VecDeque<String>>,
    reads: Cell<usize>,
}

impl ScriptedGuardCode {
    pub fn new(codes: Vec<&str>) -> Self {
        Self {
            codes: RefCell::new(codes.into_iter().map(str::to_string).collect()),
            reads: Cell::new(0),
        }
    }

    pub fn reads(&self) -> usize {
        self.reads.get()
    }
}

impl GuardCodeSource for ScriptedGuardCode {
    fn read_guard_code(&self) -> anyhow::Result<String> {
        self.reads.set(self.reads.get() + 1);
        self.codes
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("no scripted guard code left"))
    }
}

/// Console output of a successful anonymous download.
pub fn success_output(workshop_id: &str, path: &str, size_bytes: u64) -> String {
    format!(
        "Redirecting stderr to 'logs/stderr.txt'\n\
Loading Steam API...OK\n\
Connecting anonymously to Steam Public...OK\n\
Waiting for client config...OK\n\
Waiting for user info...OK\n\
Downloading item {workshop_id} ...\n\
Success. Downloaded item {workshop_id} to \"{path}\" ({size_bytes} bytes)\n"
    )
}

/// Console output of a failed item download.
pub fn download_failure_output(workshop_id: &str, reason: &str) -> String {
    format!(
        "Loading Steam API...OK\n\
Waiting for user info...OK\n\
Downloading item {workshop_id} ...\n\
ERROR! Download item {workshop_id} failed ({reason}).\n"
    )
}

/// Console output of a rejected login.
pub fn login_failure_output(username: &str, reason: &str) -> String {
    format!("Logging in user '{username}' to Steam Public...FAILED ({reason})\n")
}

/// An attempt whose process failed, with optional console log tail.
pub fn exec_failure(output: &str, message: &str, log_tail: Option<&str>) -> RawAttempt {
    RawAttempt {
        output: output.to_string(),
        exec_error: Some(message.to_string()),
        log_tail: log_tail.map(str::to_string),
    }
}

/// Write an executable shell script standing in for SteamCMD into `dir`.
#[cfg(unix)]
pub fn install_fake_steamcmd(dir: &Path, script: &str) {
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    fs::create_dir_all(dir).expect("create fake steamcmd dir");
    let path = dir.join(crate::io::steamcmd::EXECUTABLE);
    fs::write(&path, format!("#!/bin/sh\n{script}\n")).expect("write fake steamcmd");
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod fake steamcmd");
}

/// Temporary SteamCMD install whose launcher runs `script`. Removed on drop.
#[cfg(unix)]
pub struct FakeInstall {
    dir: tempfile::TempDir,
}

#[cfg(unix)]
impl FakeInstall {
    pub fn new(script: &str) -> Self {
        let dir = tempfile::tempdir().expect("tempdir for fake steamcmd");
        install_fake_steamcmd(dir.path(), script);
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}
