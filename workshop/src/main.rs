//! Steam Workshop downloader.
//!
//! Drives SteamCMD to fetch Workshop items, retrying transient Steam failures
//! with Fibonacci backoff, and copies finished items to a download directory.

use std::path::PathBuf;
use std::process;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use workshop::cli::{self, DownloadOptions};
use workshop::core::types::Credentials;
use workshop::exit_codes;
use workshop::io::config::{WorkshopConfig, default_config_path, load_config};
use workshop::logging;

#[derive(Parser)]
#[command(
    name = "workshop",
    version,
    about = "Download Steam Workshop items with SteamCMD"
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct GlobalArgs {
    /// Config file (default: ~/.workshop.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory SteamCMD is installed in.
    #[arg(long, global = true)]
    steamcmd_dir: Option<PathBuf>,

    /// Directory finished items are copied to.
    #[arg(long, global = true)]
    download_dir: Option<PathBuf>,

    /// Debug-level diagnostics on stderr (`RUST_LOG` takes precedence).
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Download a Workshop item by URL, by item id, or by app id and item id.
    Download(DownloadArgs),
    /// Log in and cache a Steam session. Without credentials, opens SteamCMD interactively.
    Login {
        #[arg(short, long)]
        username: Option<String>,
        #[arg(short, long)]
        password: Option<String>,
    },
    /// Check the SteamCMD install and the connection to Steam.
    Check,
    /// Remove Workshop cache directories that make SteamCMD hang.
    Clean {
        /// Also remove downloaded content, not just caches.
        #[arg(short, long)]
        all: bool,
        /// Do not ask for confirmation.
        #[arg(short, long)]
        force: bool,
    },
    /// List items downloaded into the SteamCMD install.
    List,
    /// Print the effective configuration.
    Config {
        /// Write the effective configuration to the config file.
        #[arg(long)]
        init: bool,
        /// Overwrite an existing config file with `--init`.
        #[arg(long, requires = "init")]
        force: bool,
    },
}

#[derive(Args)]
struct DownloadArgs {
    /// Workshop URL, item id, or app id followed by item id.
    #[arg(required = true, num_args = 1..=2)]
    inputs: Vec<String>,

    /// App id to use when only an item id is given.
    #[arg(short, long)]
    app_id: Option<String>,

    /// Steam username (uses the cached session when no password is given).
    #[arg(short, long)]
    username: Option<String>,

    #[arg(short, long)]
    password: Option<String>,

    /// Steam Guard code for an explicit login.
    #[arg(long)]
    guard_code: Option<String>,

    /// Copy destination (default: the configured download directory).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Leave the item in SteamCMD's content directory.
    #[arg(long)]
    no_extract: bool,

    /// Retries after the first attempt.
    #[arg(long)]
    max_retries: Option<u32>,

    /// Base backoff interval in milliseconds.
    #[arg(long)]
    retry_interval_ms: Option<u64>,

    /// Print the result as JSON.
    #[arg(long)]
    json: bool,
}

fn main() {
    let args = Cli::parse();
    logging::init(args.global.verbose);
    if let Err(err) = run(args) {
        eprintln!("Error: {:#}", err);
        process::exit(cli::exit_code(&err));
    }
    process::exit(exit_codes::OK);
}

fn run(args: Cli) -> Result<()> {
    let config_path = args
        .global
        .config
        .clone()
        .unwrap_or_else(default_config_path);
    let mut cfg = load_config(&config_path)?;
    apply_global_overrides(&mut cfg, &args.global);

    match args.command {
        Command::Download(download) => {
            if let Some(max_retries) = download.max_retries {
                cfg.retry.max_retries = max_retries;
            }
            if let Some(interval) = download.retry_interval_ms {
                cfg.retry.base_interval_ms = interval;
            }
            cfg.validate()?;
            let opts = DownloadOptions {
                inputs: download.inputs,
                app_id: download.app_id,
                credentials: Credentials {
                    username: download.username,
                    password: download.password,
                    guard_code: download.guard_code,
                },
                output: download.output,
                extract: !download.no_extract,
                json: download.json,
            };
            cli::download(&cfg, &opts).map(|_| ())
        }
        Command::Login { username, password } => {
            cli::login(&cfg, username.as_deref(), password.as_deref())
        }
        Command::Check => cli::check(&cfg),
        Command::Clean { all, force } => cli::clean(&cfg, all, force),
        Command::List => cli::list(&cfg),
        Command::Config { init, force } => cli::config(&cfg, &config_path, init, force),
    }
}

fn apply_global_overrides(cfg: &mut WorkshopConfig, global: &GlobalArgs) {
    if let Some(dir) = &global.steamcmd_dir {
        cfg.steamcmd_dir = dir.clone();
    }
    if let Some(dir) = &global.download_dir {
        cfg.download_dir = dir.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_download_pair() {
        let cli = Cli::parse_from(["workshop", "download", "294100", "818773962"]);
        let Command::Download(args) = cli.command else {
            panic!("expected download");
        };
        assert_eq!(args.inputs, vec!["294100", "818773962"]);
        assert!(!args.no_extract);
    }

    #[test]
    fn parse_download_with_credentials_and_retry_overrides() {
        let cli = Cli::parse_from([
            "workshop",
            "download",
            "818773962",
            "--app-id",
            "294100",
            "-u",
            "alice",
            "-p",
            "hunter2",
            "--guard-code",
            "AB12C",
            "--max-retries",
            "4",
            "--retry-interval-ms",
            "10000",
        ]);
        let Command::Download(args) = cli.command else {
            panic!("expected download");
        };
        assert_eq!(args.app_id.as_deref(), Some("294100"));
        assert_eq!(args.username.as_deref(), Some("alice"));
        assert_eq!(args.guard_code.as_deref(), Some("AB12C"));
        assert_eq!(args.max_retries, Some(4));
        assert_eq!(args.retry_interval_ms, Some(10_000));
    }

    #[test]
    fn download_rejects_three_inputs() {
        assert!(Cli::try_parse_from(["workshop", "download", "1", "2", "3"]).is_err());
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::parse_from(["workshop", "list", "--steamcmd-dir", "/opt/steamcmd", "-v"]);
        assert!(matches!(cli.command, Command::List));
        assert!(cli.global.verbose);
        let mut cfg = WorkshopConfig::default();
        apply_global_overrides(&mut cfg, &cli.global);
        assert_eq!(cfg.steamcmd_dir, PathBuf::from("/opt/steamcmd"));
    }

    #[test]
    fn config_force_requires_init() {
        assert!(Cli::try_parse_from(["workshop", "config", "--force"]).is_err());
        let cli = Cli::parse_from(["workshop", "config", "--init", "--force"]);
        assert!(matches!(
            cli.command,
            Command::Config {
                init: true,
                force: true
            }
        ));
    }
}
