//! Helpers for running child processes with timeouts and bounded, merged output.

use std::collections::VecDeque;
use std::io::Read;
use std::process::{Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow, bail};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

/// How long the pipe readers may keep draining once the child has exited.
///
/// A launcher script can leave grandchildren holding the pipes open; past this
/// grace period the readers are detached instead of joined.
pub const READER_GRACE: Duration = Duration::from_secs(1);

/// Captured child process output with stdout and stderr interleaved.
#[derive(Debug)]
pub struct MergedOutput {
    pub status: ExitStatus,
    /// The last `output_limit_bytes` bytes the child wrote.
    pub output: Vec<u8>,
    /// Bytes dropped from the front to stay within the limit.
    pub truncated: usize,
    pub timed_out: bool,
}

impl MergedOutput {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }

    pub fn truncated_notice(&self, label: &str) -> String {
        if self.truncated > 0 {
            format!("[{label} output truncated, dropped {} leading bytes]\n", self.truncated)
        } else {
            String::new()
        }
    }
}

/// Shared sink both reader threads append to, in arrival order.
///
/// Keeps the newest bytes: SteamCMD reports the outcome on its last lines.
struct MergedBuffer {
    data: VecDeque<u8>,
    truncated: usize,
    limit: usize,
}

impl MergedBuffer {
    fn push(&mut self, chunk: &[u8]) {
        self.data.extend(chunk);
        let excess = self.data.len().saturating_sub(self.limit);
        if excess > 0 {
            self.data.drain(..excess);
            self.truncated += excess;
        }
    }
}

/// Run a command with a timeout, capturing stdout and stderr into one buffer.
///
/// SteamCMD spreads its diagnostics over both streams, so they are drained
/// concurrently into a single buffer in the order chunks arrive. stdin is
/// closed so the child can never block on a prompt. `output_limit_bytes` bounds
/// what is kept in memory (the tail wins); the pipes are still drained past the
/// limit. The call returns at most [`READER_GRACE`] after the child exits or is
/// killed, even if descendants keep the pipes open.
#[instrument(
    skip_all,
    fields(timeout_secs = timeout.as_secs(), output_limit_bytes = output_limit_bytes)
)]
pub fn run_merged(
    mut cmd: Command,
    timeout: Duration,
    output_limit_bytes: usize,
) -> Result<MergedOutput> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    debug!("spawning child process");
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, "failed to spawn command");
            return Err(e).context("spawn command");
        }
    };

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    let buffer = Arc::new(Mutex::new(MergedBuffer {
        data: VecDeque::new(),
        truncated: 0,
        limit: output_limit_bytes,
    }));
    let (done_tx, done_rx) = mpsc::channel();
    let readers: [(&'static str, Box<dyn Read + Send>); 2] =
        [("stdout", Box::new(stdout)), ("stderr", Box::new(stderr))];
    for (stream, reader) in readers {
        let buffer = Arc::clone(&buffer);
        let done_tx = done_tx.clone();
        thread::spawn(move || {
            let result = drain_into(reader, &buffer);
            let _ = done_tx.send((stream, result));
        });
    }
    drop(done_tx);

    let mut timed_out = false;
    let status = match child.wait_timeout(timeout).context("wait for command")? {
        Some(status) => status,
        None => {
            warn!(
                timeout_secs = timeout.as_secs(),
                "command timed out, killing"
            );
            timed_out = true;
            child.kill().context("kill command")?;
            child.wait().context("wait command after kill")?
        }
    };

    await_readers(&done_rx, READER_GRACE)?;

    let (output, truncated) = {
        let mut guard = buffer
            .lock()
            .map_err(|_| anyhow!("output buffer lock poisoned"))?;
        (Vec::from(std::mem::take(&mut guard.data)), guard.truncated)
    };

    if truncated > 0 {
        warn!(truncated, "output truncated");
    }

    debug!(exit_code = ?status.code(), timed_out, "command finished");
    Ok(MergedOutput {
        status,
        output,
        truncated,
        timed_out,
    })
}

/// Wait for both readers to hit end of stream, giving up after `grace`.
fn await_readers(
    done_rx: &mpsc::Receiver<(&'static str, Result<()>)>,
    grace: Duration,
) -> Result<()> {
    let deadline = Instant::now() + grace;
    let mut pending = 2;
    while pending > 0 {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match done_rx.recv_timeout(remaining) {
            Ok((stream, result)) => {
                pending -= 1;
                result.with_context(|| format!("read {stream}"))?;
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(pending, "output pipes still open after exit, detaching readers");
                return Ok(());
            }
            Err(RecvTimeoutError::Disconnected) => bail!("output reader thread panicked"),
        }
    }
    Ok(())
}

fn drain_into<R: Read>(mut reader: R, buffer: &Mutex<MergedBuffer>) -> Result<()> {
    let mut chunk = [0u8; 8192];
    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        let mut guard = buffer
            .lock()
            .map_err(|_| anyhow!("output buffer lock poisoned"))?;
        guard.push(&chunk[..n]);
    }
    Ok(())
}
