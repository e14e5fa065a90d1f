use crate::config::MonitorConfig;
use crate::error::MonitorError;
use crate::scrapers::challenge::ChallengeGate;
use crate::scrapers::traits::{PageContent, PageFetcher};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Plain HTTP fetcher for pages served without a bot challenge.
///
/// No JavaScript runs, so a challenge page can never clear.
pub struct HttpFetcher {
    client: Client,
    gate: ChallengeGate,
    current: Mutex<Option<PageContent>>,
}

impl HttpFetcher {
    pub fn new(config: &MonitorConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(config.user_agent.as_str())
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            gate: ChallengeGate::default(),
            current: Mutex::new(None),
        })
    }
}

/// A challenge page fails as `ChallengeTimeout` whatever its status, since it
/// cannot clear without a browser. Any other non-success status is a plain error.
fn check_page(gate: &ChallengeGate, url: &str, status: StatusCode, html: &str) -> Result<()> {
    if gate.is_challenge(html) {
        return Err(MonitorError::ChallengeTimeout {
            url: url.to_string(),
            waited: Duration::ZERO,
        }
        .into());
    }

    if !status.is_success() {
        warn!("{} returned status: {}", url, status);
        anyhow::bail!("Failed to fetch {}: {}", url, status);
    }

    Ok(())
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn navigate(&self, url: &str) -> Result<PageContent> {
        debug!("Fetching URL: {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {}", url))?;

        let status = response.status();
        let html = response.text().await.context("Failed to read response body")?;
        let page = PageContent::new(url, html);
        *self.current.lock().await = Some(page.clone());

        check_page(&self.gate, url, status, &page.html)?;

        debug!("Downloaded {} bytes of HTML", page.html.len());
        Ok(page)
    }

    async fn current_content(&self) -> Result<PageContent> {
        self.current
            .lock()
            .await
            .clone()
            .context("No page loaded yet")
    }

    fn fetcher_name(&self) -> &'static str {
        "HTTP"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://www.xior-booking.com/en/student-rooms";

    #[test]
    fn test_challenge_page_is_a_challenge_even_when_forbidden() {
        let gate = ChallengeGate::default();
        let html = "<title>Just a moment...</title>";

        for status in [StatusCode::OK, StatusCode::FORBIDDEN] {
            let err = check_page(&gate, URL, status, html).unwrap_err();
            assert!(MonitorError::is_challenge_timeout(&err));
        }
    }

    #[test]
    fn test_error_status_without_challenge_is_a_plain_failure() {
        let gate = ChallengeGate::default();
        let err = check_page(&gate, URL, StatusCode::SERVICE_UNAVAILABLE, "<p>Down for maintenance</p>")
            .unwrap_err();

        assert!(!MonitorError::is_challenge_timeout(&err));
        assert!(err.to_string().contains("503"));
    }

    #[test]
    fn test_ok_page_passes() {
        let gate = ChallengeGate::default();
        assert!(check_page(&gate, URL, StatusCode::OK, r#"<div class="space-item"></div>"#).is_ok());
    }
}
