//! Deterministic, pure logic shared by the download core.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data (captured text, credential inputs, attempt counters) and return
//! deterministic outputs suitable for tests.

pub mod args;
pub mod classifier;
pub mod credentials;
pub mod input;
pub mod retry;
pub mod types;
