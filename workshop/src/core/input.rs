//! Parsing of the `download` target: a Workshop URL, a bare item id, or an
//! `<app id> <item id>` pair.

use anyhow::{Result, anyhow, bail};

/// Host accepted for Workshop page URLs.
pub const WORKSHOP_HOST: &str = "steamcommunity.com";

/// What the user asked to download, before any page lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadTarget {
    /// Both ids known up front.
    Ids { app_id: String, workshop_id: String },
    /// A Workshop page URL; the app id must be resolved from the page.
    Url(String),
}

/// Interpret positional `download` arguments.
///
/// `default_app_id` is used when only an item id is given.
pub fn parse_download_input(args: &[String], default_app_id: Option<&str>) -> Result<DownloadTarget> {
    match args {
        [] => bail!("no input provided"),
        [app_id, workshop_id] => {
            if !is_numeric(app_id) || !is_numeric(workshop_id) {
                bail!("both app ID and workshop ID must be numeric");
            }
            validate_app_id(app_id)?;
            validate_workshop_id(workshop_id)?;
            Ok(DownloadTarget::Ids {
                app_id: app_id.clone(),
                workshop_id: workshop_id.clone(),
            })
        }
        [input] if input.starts_with("http") => {
            let host = url_host(input).ok_or_else(|| anyhow!("invalid URL: {input}"))?;
            if host != WORKSHOP_HOST {
                bail!("unsupported URL host: {host}");
            }
            Ok(DownloadTarget::Url(input.clone()))
        }
        [input] if is_numeric(input) => {
            validate_workshop_id(input)?;
            let app_id = default_app_id.filter(|id| !id.is_empty()).ok_or_else(|| {
                anyhow!(
                    "app ID is required when providing only workshop ID. Use --app-id or provide both app ID and workshop ID"
                )
            })?;
            validate_app_id(app_id)?;
            Ok(DownloadTarget::Ids {
                app_id: app_id.to_string(),
                workshop_id: input.clone(),
            })
        }
        [_] => bail!("invalid input format"),
        _ => bail!("expected a URL, a workshop ID, or an app ID and a workshop ID"),
    }
}

pub fn validate_workshop_id(id: &str) -> Result<()> {
    validate_numeric_id("workshop ID", id, 20)
}

pub fn validate_app_id(id: &str) -> Result<()> {
    validate_numeric_id("app ID", id, 10)
}

fn validate_numeric_id(label: &str, id: &str, max_len: usize) -> Result<()> {
    if id.is_empty() {
        bail!("{label} cannot be empty");
    }
    if !is_numeric(id) {
        bail!("{label} must be numeric");
    }
    if id.len() > max_len {
        bail!("{label} has invalid length");
    }
    Ok(())
}

fn is_numeric(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Host part of an `http(s)://host[:port]/...` URL.
fn url_host(url: &str) -> Option<&str> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))?;
    let authority = rest.split(['/', '?', '#']).next()?;
    let host = authority.rsplit('@').next()?;
    let host = host.split(':').next()?;
    (!host.is_empty()).then_some(host)
}
