use crate::config::MonitorConfig;
use crate::scrapers::challenge::ChallengeGate;
use crate::scrapers::traits::{PageContent, PageFetcher};
use anyhow::{Context, Result};
use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::ffi::OsStr;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info};

/// Page fetcher backed by one headless Chrome session.
///
/// The browser process lives as long as this value; dropping it closes Chrome.
pub struct ChromeFetcher {
    _browser: Browser,
    tab: Arc<Tab>,
    gate: ChallengeGate,
    challenge_timeout: Duration,
    challenge_poll: Duration,
    settle_delay: Duration,
}

impl ChromeFetcher {
    /// Launch headless Chrome; failure here is fatal for the process
    pub fn launch(config: &MonitorConfig) -> Result<Self> {
        info!("Launching headless Chrome...");

        let options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(false)
            // the session idles between daily checks
            .idle_browser_timeout(config.check_period * 2)
            .args(vec![
                OsStr::new("--disable-dev-shm-usage"),
                OsStr::new("--disable-gpu"),
            ])
            .build()
            .context("Failed to build launch options")?;

        let browser = Browser::new(options).context("Failed to launch Chrome browser")?;
        let tab = browser.new_tab().context("Failed to open browser tab")?;
        tab.set_default_timeout(Duration::from_secs(60));
        tab.set_user_agent(&config.user_agent, None, None)
            .context("Failed to set user agent")?;

        Ok(Self {
            _browser: browser,
            tab,
            gate: ChallengeGate::default(),
            challenge_timeout: config.challenge_timeout,
            challenge_poll: config.challenge_poll,
            settle_delay: config.settle_delay,
        })
    }
}

fn read_html(tab: &Tab) -> Result<String> {
    let result = tab
        .evaluate("document.documentElement.outerHTML", false)
        .context("Failed to read page HTML")?;
    Ok(result
        .value
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default())
}

#[async_trait]
impl PageFetcher for ChromeFetcher {
    async fn navigate(&self, url: &str) -> Result<PageContent> {
        let tab = self.tab.clone();
        let gate = self.gate.clone();
        let url = url.to_string();
        let (timeout, poll, settle) = (self.challenge_timeout, self.challenge_poll, self.settle_delay);

        tokio::task::spawn_blocking(move || -> Result<PageContent> {
            tab.navigate_to(&url)
                .with_context(|| format!("Failed to navigate to {}", url))?;
            tab.wait_until_navigated()
                .with_context(|| format!("Navigation to {} did not finish", url))?;

            gate.wait_until_clear(&url, timeout, poll, || read_html(&tab), thread::sleep)?;

            // client-side rendering has no completion signal
            debug!("Waiting {}s for {} to render", settle.as_secs(), url);
            thread::sleep(settle);

            let html = read_html(&tab)?;
            debug!("Loaded {} ({} bytes)", url, html.len());
            Ok(PageContent::new(url, html))
        })
        .await
        .context("Browser task panicked")?
    }

    async fn current_content(&self) -> Result<PageContent> {
        let tab = self.tab.clone();
        tokio::task::spawn_blocking(move || -> Result<PageContent> {
            let html = read_html(&tab)?;
            Ok(PageContent::new(tab.get_url(), html))
        })
        .await
        .context("Browser task panicked")?
    }

    fn fetcher_name(&self) -> &'static str {
        "headless Chrome"
    }
}

impl Drop for ChromeFetcher {
    fn drop(&mut self) {
        info!("Closing browser session");
    }
}
