use anyhow::Result;
use async_trait::async_trait;

/// Rendered page HTML plus the URL it was loaded from
#[derive(Debug, Clone, PartialEq)]
pub struct PageContent {
    pub url: String,
    pub html: String,
}

impl PageContent {
    pub fn new(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            html: html.into(),
        }
    }

    /// Case-insensitive substring check over the raw HTML
    pub fn mentions(&self, needle: &str) -> bool {
        self.html.to_lowercase().contains(&needle.to_lowercase())
    }
}

/// Loads pages, waiting out any bot-challenge interstitial first.
///
/// One fetcher is one browser session; callers use it sequentially.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<PageContent>;

    /// Content of the page currently loaded
    async fn current_content(&self) -> Result<PageContent>;

    fn fetcher_name(&self) -> &'static str;
}

/// Shows a platform notification
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, title: &str, message: &str) -> Result<()>;
}

/// Receives raw page snapshots for offline inspection
pub trait DebugSink: Send + Sync {
    fn dump(&self, name: &str, content: &str);
}

/// Discards every snapshot
pub struct NoopSink;

impl DebugSink for NoopSink {
    fn dump(&self, _name: &str, _content: &str) {}
}
