//! Command implementations behind the `workshop` binary.
//!
//! Each command takes the effective [`WorkshopConfig`] (file values with
//! command-line overrides applied) and prints its results to stdout.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::{debug, info, warn};

use crate::core::input::{DownloadTarget, parse_download_input};
use crate::core::types::{Credentials, WorkshopItem};
use crate::download::DownloadOrchestrator;
use crate::error::{FailedDownload, WorkshopError};
use crate::exit_codes;
use crate::io::cache::{cache_paths, clean_paths, list_downloaded, system_workshop_dir};
use crate::io::config::{WorkshopConfig, write_config};
use crate::io::guard_code::StdinGuardCode;
use crate::io::interrupt::cancel_on_interrupt;
use crate::io::relocate::relocate_item;
use crate::io::schedule::{CancelToken, ThreadScheduler};
use crate::io::scraper::{HttpFetcher, PageFetcher, WorkshopInfo, resolve};
use crate::io::steamcmd::SteamCmd;
use crate::login::LoginFlow;

/// Options for `workshop download`.
#[derive(Debug, Clone, Default)]
pub struct DownloadOptions {
    pub inputs: Vec<String>,
    pub app_id: Option<String>,
    pub credentials: Credentials,
    /// Copy destination; defaults to the configured download directory.
    pub output: Option<PathBuf>,
    /// Copy the item out of SteamCMD's content tree after success.
    pub extract: bool,
    /// Print the final item as JSON instead of a summary.
    pub json: bool,
}

/// Exit code for an error returned by one of the commands.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    for cause in err.chain() {
        if let Some(failed) = cause.downcast_ref::<FailedDownload>() {
            return exit_codes::for_error(&failed.error);
        }
        if let Some(typed) = cause.downcast_ref::<WorkshopError>() {
            return exit_codes::for_error(typed);
        }
    }
    exit_codes::FAILED
}

/// Resolve the target to `(app_id, workshop_id)`, looking up Workshop pages as needed.
pub fn resolve_target<F: PageFetcher>(
    target: DownloadTarget,
    fetcher: impl FnOnce() -> Result<F>,
) -> Result<(String, String)> {
    match target {
        DownloadTarget::Ids {
            app_id,
            workshop_id,
        } => Ok((app_id, workshop_id)),
        DownloadTarget::Url(url) => {
            println!("Fetching workshop page information...");
            let info = resolve(&fetcher()?, &url)?;
            print!("{}", page_summary(&info));
            Ok((info.app_id, info.workshop_id))
        }
    }
}

fn page_summary(info: &WorkshopInfo) -> String {
    let mut out = String::new();
    if let Some(title) = &info.title {
        out.push_str(&format!("Workshop item: {title}\n"));
    }
    if let Some(game) = &info.game_name {
        out.push_str(&format!("Game: {game}\n"));
    }
    out.push_str(&format!(
        "App ID: {}, Workshop ID: {}\n",
        info.app_id, info.workshop_id
    ));
    out
}

pub fn download(cfg: &WorkshopConfig, opts: &DownloadOptions) -> Result<WorkshopItem> {
    let target = parse_download_input(&opts.inputs, opts.app_id.as_deref())
        .map_err(|err| WorkshopError::Configuration(format!("{err:#}")))?;
    let steamcmd = SteamCmd::from_config(cfg)?;
    let (app_id, workshop_id) = resolve_target(target, HttpFetcher::new)?;

    let orchestrator = DownloadOrchestrator::new(steamcmd, ThreadScheduler, cfg.retry.policy());
    if !opts.json {
        println!("Downloading workshop item {workshop_id} for app {app_id}...");
    }

    let cancel = CancelToken::new();
    if let Err(err) = cancel_on_interrupt(&cancel) {
        warn!(error = %format!("{err:#}"), "Ctrl-C will not cancel cleanly");
    }
    let item = match orchestrator.download(&app_id, &workshop_id, &opts.credentials, &cancel) {
        Ok(item) => item,
        Err(failed) => {
            if opts.json {
                print_json(&failed.item)?;
            }
            return Err(failed.into());
        }
    };

    if opts.extract {
        let output_dir = opts.output.as_deref().unwrap_or(&cfg.download_dir);
        if let Err(err) = extract(&item, output_dir, opts.json) {
            warn!(error = %format!("{err:#}"), "failed to copy downloaded item");
            eprintln!("Warning: failed to copy the item to {}: {err:#}", output_dir.display());
        }
    }

    if opts.json {
        print_json(&item)?;
    } else {
        print_summary(&item);
    }
    Ok(item)
}

/// Copy a downloaded item out of SteamCMD's content tree into `output_dir`.
fn extract(item: &WorkshopItem, output_dir: &Path, quiet: bool) -> Result<()> {
    let Some(path) = &item.path_to_file else {
        return Ok(());
    };
    let dest = relocate_item(path, output_dir, &item.app_id, &item.workshop_id)?;
    if !quiet {
        println!("Workshop item extracted to: {}", dest.display());
    }
    Ok(())
}

fn print_summary(item: &WorkshopItem) {
    println!("Download completed.");
    if let Some(path) = &item.path_to_file {
        println!("Location: {}", path.display());
    }
    if let Some(size) = item.size_bytes {
        println!("Size: {}", format_bytes(size));
    }
}

fn print_json(item: &WorkshopItem) -> Result<()> {
    let payload = serde_json::to_string_pretty(item).context("serialize item json")?;
    println!("{payload}");
    Ok(())
}

/// Log in and cache the session, or open SteamCMD for a manual login.
pub fn login(cfg: &WorkshopConfig, username: Option<&str>, password: Option<&str>) -> Result<()> {
    let steamcmd = SteamCmd::from_config(cfg)?;
    match (username, password) {
        (Some(username), Some(password)) => {
            LoginFlow::new(&steamcmd, StdinGuardCode).login(username, password)?;
            println!("Logged in as {username}. The session is cached for later downloads.");
            println!("Use `workshop download --username {username}` without a password.");
            Ok(())
        }
        (Some(_), None) => Err(WorkshopError::Configuration(
            "--password is required with --username".to_string(),
        )
        .into()),
        (None, Some(_)) => Err(WorkshopError::Configuration(
            "--username is required with --password".to_string(),
        )
        .into()),
        (None, None) => {
            println!("Launching SteamCMD. Log in with: login <username>");
            println!("After a successful login, type 'quit' to exit.");
            let status = steamcmd.launch_interactive()?;
            info!(?status, "interactive SteamCMD exited");
            if !status.success() {
                bail!("SteamCMD exited with {status}");
            }
            Ok(())
        }
    }
}

/// Verify the install and an anonymous connection to Steam.
pub fn check(cfg: &WorkshopConfig) -> Result<()> {
    let steamcmd = SteamCmd::from_config(cfg)?;
    println!("SteamCMD found at {}", steamcmd.program().display());
    steamcmd.test_connection()?;
    println!("Connection to Steam OK.");
    Ok(())
}

/// Remove workshop cache directories, asking first unless `force`.
pub fn clean(cfg: &WorkshopConfig, include_content: bool, force: bool) -> Result<()> {
    let system = system_workshop_dir();
    let paths = cache_paths(&cfg.steamcmd_dir, system.as_deref(), include_content);
    if paths.is_empty() {
        println!("No workshop cache directories found to clean.");
        return Ok(());
    }

    println!("The following workshop cache directories will be removed:");
    for path in &paths {
        println!("  - {}", path.display());
    }
    if include_content {
        println!("Downloaded workshop content will also be removed.");
    }
    if !force && !confirm(io::stdin().lock(), "Are you sure you want to continue? (y/N): ")? {
        println!("Clean operation cancelled.");
        return Ok(());
    }

    let report = clean_paths(&paths);
    for (path, err) in &report.failed {
        eprintln!("Failed to remove {}: {err}", path.display());
    }
    println!(
        "Removed {} workshop cache directories.",
        report.removed.len()
    );
    if !report.failed.is_empty() {
        bail!("{} directories could not be removed", report.failed.len());
    }
    Ok(())
}

fn confirm<R: BufRead>(mut input: R, prompt: &str) -> Result<bool> {
    print!("{prompt}");
    io::stdout().flush().context("flush prompt")?;
    let mut line = String::new();
    input.read_line(&mut line).context("read confirmation")?;
    let answer = line.trim().to_lowercase();
    Ok(answer == "y" || answer == "yes")
}

/// Print downloaded items grouped by app.
pub fn list(cfg: &WorkshopConfig) -> Result<()> {
    let items = list_downloaded(&cfg.steamcmd_dir)?;
    if items.is_empty() {
        println!("No workshop items downloaded yet.");
        return Ok(());
    }
    for (app_id, ids) in &items {
        println!("App {app_id}:");
        for id in ids {
            println!("  {id}");
        }
    }
    Ok(())
}

/// Print the effective config, or write it to `path` with `init`.
pub fn config(cfg: &WorkshopConfig, path: &Path, init: bool, force: bool) -> Result<()> {
    if init {
        if path.exists() && !force {
            bail!(
                "config already exists at {} (use --force to overwrite)",
                path.display()
            );
        }
        write_config(path, cfg)?;
        debug!(path = %path.display(), "config written");
        println!("Wrote {}", path.display());
        return Ok(());
    }
    let rendered = toml::to_string_pretty(cfg).context("serialize config toml")?;
    println!("# {}", path.display());
    print!("{rendered}");
    Ok(())
}

/// Human-readable size using 1024-based units.
pub fn format_bytes(bytes: u64) -> String {
    const UNIT: u64 = 1024;
    const PREFIXES: [char; 6] = ['K', 'M', 'G', 'T', 'P', 'E'];
    if bytes < UNIT {
        return format!("{bytes} B");
    }
    let mut div = UNIT;
    let mut exp = 0;
    let mut n = bytes / UNIT;
    while n >= UNIT {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }
    format!("{:.1} {}B", bytes as f64 / div as f64, PREFIXES[exp])
}
