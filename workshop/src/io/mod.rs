//! I/O adapters: SteamCMD processes, config, filesystem and network.

pub mod cache;
pub mod config;
pub mod guard_code;
pub mod interrupt;
pub mod process;
pub mod relocate;
pub mod schedule;
pub mod scraper;
pub mod steamcmd;
