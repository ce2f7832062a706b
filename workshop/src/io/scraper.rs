//! Workshop page lookup: resolves the app id (and title) behind a Workshop URL.

use std::io::Read;
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use regex::Regex;
use tracing::{debug, instrument};

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_PAGE_BYTES: u64 = 1024 * 1024;

static ITEM_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"id=(\d+)").expect("item id regex must compile"));

static APP_ID_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r#""appid"\s*:\s*"?(\d+)"?"#,
        r"appid=(\d+)",
        r#"data-appid="(\d+)""#,
        r"/app/(\d+)/",
        r"store\.steampowered\.com/app/(\d+)",
        r"steam://nav/games/details/(\d+)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("app id regex must compile"))
    .collect()
});

static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<title>([^<]+)</title>").expect("title regex must compile"));

static GAME_NAME_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"Steam Workshop::\s*([^<>]+)",
        r#"<h1[^>]*class="apphub_AppName"[^>]*>([^<]+)</h1>"#,
    ]
    .iter()
    .map(|p| Regex::new(p).expect("game name regex must compile"))
    .collect()
});

/// What a Workshop page says about an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkshopInfo {
    pub app_id: String,
    pub workshop_id: String,
    pub title: Option<String>,
    pub game_name: Option<String>,
}

/// Fetches page bodies by URL.
pub trait PageFetcher {
    fn fetch(&self, url: &str) -> Result<String>;
}

/// Blocking HTTP fetcher with a short timeout and a capped body size.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .user_agent(concat!("workshop/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("create HTTP client")?;
        Ok(Self { client })
    }
}

impl PageFetcher for HttpFetcher {
    #[instrument(skip_all, fields(url = %url))]
    fn fetch(&self, url: &str) -> Result<String> {
        let resp = self
            .client
            .get(url)
            .send()
            .context("failed to fetch workshop page")?;
        let status = resp.status();
        if !status.is_success() {
            bail!("workshop page returned status: {status}");
        }
        let mut body = Vec::new();
        resp.take(MAX_PAGE_BYTES)
            .read_to_end(&mut body)
            .context("failed to read workshop page content")?;
        debug!(bytes = body.len(), "workshop page fetched");
        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

/// Fetch `url` and extract the item's identifiers.
pub fn resolve<F: PageFetcher>(fetcher: &F, url: &str) -> Result<WorkshopInfo> {
    let body = fetcher.fetch(url)?;
    parse_workshop_page(url, &body)
}

/// Extract identifiers from a fetched Workshop page.
///
/// The item id comes from the URL's `id=` parameter; the app id from the first
/// page pattern that matches.
pub fn parse_workshop_page(url: &str, body: &str) -> Result<WorkshopInfo> {
    let workshop_id = capture(&ITEM_ID_RE, url)
        .ok_or_else(|| anyhow!("could not extract workshop ID from URL"))?;
    let app_id = APP_ID_RES
        .iter()
        .find_map(|re| capture(re, body))
        .ok_or_else(|| anyhow!("could not extract App ID from workshop page"))?;
    let title = capture(&TITLE_RE, body).map(|t| {
        let t = t.trim();
        t.strip_prefix("Steam Workshop::").unwrap_or(t).trim().to_string()
    });
    let game_name = GAME_NAME_RES
        .iter()
        .find_map(|re| capture(re, body))
        .map(|name| name.trim().to_string());
    Ok(WorkshopInfo {
        app_id,
        workshop_id,
        title: title.filter(|t| !t.is_empty()),
        game_name: game_name.filter(|n| !n.is_empty()),
    })
}

fn capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://steamcommunity.com/sharedfiles/filedetails/?id=818773962";

    struct StaticPage(&'static str);

    impl PageFetcher for StaticPage {
        fn fetch(&self, _url: &str) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn extracts_ids_and_title() {
        let body = r#"<html><head><title>Steam Workshop::Hydroponics Expanded</title></head>
<body><a href="https://store.steampowered.com/app/294100/RimWorld/">RimWorld</a></body></html>"#;
        let info = parse_workshop_page(URL, body).expect("parse");
        assert_eq!(info.workshop_id, "818773962");
        assert_eq!(info.app_id, "294100");
        assert_eq!(info.title.as_deref(), Some("Hydroponics Expanded"));
    }

    #[test]
    fn earlier_patterns_win() {
        let body = r#"<div data-appid="4000"></div><script>{"appid": "108600"}</script>"#;
        let info = parse_workshop_page(URL, body).expect("parse");
        assert_eq!(info.app_id, "108600");
    }

    #[test]
    fn missing_app_id_is_an_error() {
        let err = parse_workshop_page(URL, "<html></html>").unwrap_err();
        assert!(err.to_string().contains("App ID"));
    }

    #[test]
    fn missing_item_id_is_an_error() {
        let err = parse_workshop_page("https://steamcommunity.com/app/4000", "appid=4000")
            .unwrap_err();
        assert!(err.to_string().contains("workshop ID"));
    }

    #[test]
    fn resolve_uses_fetcher() {
        let page = StaticPage(r#"<h1 class="apphub_AppName">Garry's Mod</h1> steam://nav/games/details/4000"#);
        let info = resolve(&page, URL).expect("resolve");
        assert_eq!(info.app_id, "4000");
        assert_eq!(info.game_name.as_deref(), Some("Garry's Mod"));
        assert_eq!(info.title, None);
    }
}
