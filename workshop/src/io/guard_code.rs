//! Source of Steam Guard codes for the interactive login flow.

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};

/// Blocking supplier of one Steam Guard code per call.
pub trait GuardCodeSource {
    /// Read a code. Surrounding whitespace is trimmed; an empty string means none was given.
    fn read_guard_code(&self) -> Result<String>;
}

impl<T: GuardCodeSource + ?Sized> GuardCodeSource for &T {
    fn read_guard_code(&self) -> Result<String> {
        (**self).read_guard_code()
    }
}

/// Prompts on stderr and reads one line from stdin.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdinGuardCode;

impl GuardCodeSource for StdinGuardCode {
    fn read_guard_code(&self) -> Result<String> {
        {
            let mut stderr = io::stderr().lock();
            write!(stderr, "Enter Steam Guard code: ").context("write guard code prompt")?;
            stderr.flush().context("flush guard code prompt")?;
        }
        read_code_line(io::stdin().lock())
    }
}

fn read_code_line<R: BufRead>(mut reader: R) -> Result<String> {
    let mut line = String::new();
    reader
        .read_line(&mut line)
        .context("read Steam Guard code")?;
    Ok(line.trim().to_string())
}
