use chrono::NaiveDate;
use reqwest::Url;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Which page fetcher backs the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetcherKind {
    Chrome,
    Http,
}

/// Business constants for the Xior Leeuwarden monitor
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Site root, used to absolutize relative links
    pub base_url: String,
    /// Path of the unfiltered student-room index
    pub index_path: String,
    /// City whose inventory is watched
    pub city: String,
    /// City id used when the index page does not reveal one
    pub fallback_city_id: String,
    /// Class token of a listing card
    pub card_marker: String,
    /// Less specific class-name substrings tried when no card matches
    pub secondary_markers: Vec<String>,
    /// A structural card must hold more than this many nested containers
    pub structural_min_nested: usize,
    /// Upper bound on structural matches
    pub structural_cap: usize,
    /// Listings starting before this date are not surfaced
    pub threshold: NaiveDate,
    pub check_period: Duration,
    pub poll_interval: Duration,
    /// Fixed wait after each navigation for client-side rendering
    pub settle_delay: Duration,
    pub challenge_timeout: Duration,
    pub challenge_poll: Duration,
    pub db_path: PathBuf,
    pub debug_dir: Option<PathBuf>,
    pub fetcher: FetcherKind,
    pub user_agent: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.xior-booking.com".to_string(),
            index_path: "/en/student-rooms".to_string(),
            city: "Leeuwarden".to_string(),
            fallback_city_id: "20".to_string(),
            card_marker: "space-item".to_string(),
            secondary_markers: [
                "listing-item",
                "residence-item",
                "room-item",
                "property-item",
                "accommodation",
            ]
            .iter()
            .map(|m| m.to_string())
            .collect(),
            structural_min_nested: 2,
            structural_cap: 20,
            threshold: NaiveDate::from_ymd_opt(2025, 8, 1).unwrap_or_default(),
            check_period: Duration::from_secs(24 * 60 * 60),
            poll_interval: Duration::from_secs(60),
            settle_delay: Duration::from_secs(10),
            challenge_timeout: Duration::from_secs(60),
            challenge_poll: Duration::from_secs(5),
            db_path: PathBuf::from("housing.db"),
            debug_dir: None,
            fetcher: FetcherKind::Chrome,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/127.0.0.0 Safari/537.36".to_string(),
        }
    }
}

impl MonitorConfig {
    /// Defaults with the `XIOR_*` environment overrides applied
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from any key lookup; malformed values are logged and ignored.
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("XIOR_DB_PATH").filter(|v| !v.trim().is_empty()) {
            self.db_path = PathBuf::from(path);
        }

        if let Some(city) = lookup("XIOR_CITY").filter(|v| !v.trim().is_empty()) {
            self.city = city.trim().to_string();
        }

        if let Some(raw) = lookup("XIOR_THRESHOLD") {
            match NaiveDate::parse_from_str(raw.trim(), "%d-%m-%Y") {
                Ok(date) => self.threshold = date,
                Err(e) => warn!("Ignoring XIOR_THRESHOLD={:?}: {}", raw, e),
            }
        }

        if let Some(dir) = lookup("XIOR_DEBUG_DIR").filter(|v| !v.trim().is_empty()) {
            self.debug_dir = Some(PathBuf::from(dir));
        }

        if let Some(kind) = lookup("XIOR_FETCHER") {
            match kind.trim().to_lowercase().as_str() {
                "chrome" => self.fetcher = FetcherKind::Chrome,
                "http" => self.fetcher = FetcherKind::Http,
                other => warn!("Ignoring unknown XIOR_FETCHER={:?}", other),
            }
        }

        self
    }

    /// Absolute URL of the unfiltered index page
    pub fn index_url(&self) -> String {
        format!("{}{}", self.base_url, self.index_path)
    }

    /// Resolves a link against the site root; `None` if it cannot be resolved.
    pub fn absolutize(&self, href: &str) -> Option<String> {
        let base = Url::parse(&self.base_url).ok()?;
        match base.join(href) {
            Ok(url) => Some(url.into()),
            Err(e) => {
                warn!("Ignoring unresolvable link {:?}: {}", href, e);
                None
            }
        }
    }

    pub fn city_slug(&self) -> String {
        self.city.to_lowercase().replace(' ', "-")
    }
}
