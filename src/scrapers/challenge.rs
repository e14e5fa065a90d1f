use crate::error::MonitorError;
use anyhow::Result;
use std::time::Duration;
use tracing::{debug, info};

/// Recognizes bot-challenge interstitials by their wording
#[derive(Debug, Clone)]
pub struct ChallengeGate {
    phrases: Vec<String>,
}

impl Default for ChallengeGate {
    fn default() -> Self {
        Self {
            phrases: vec!["verify you are human".to_string(), "just a moment".to_string()],
        }
    }
}

impl ChallengeGate {
    pub fn is_challenge(&self, html: &str) -> bool {
        let lower = html.to_lowercase();
        self.phrases.iter().any(|p| lower.contains(p.as_str()))
    }

    /// Re-reads the page until it is no longer a challenge.
    ///
    /// Time is counted in poll intervals slept, so the cap holds even when
    /// `read` itself is slow.
    pub fn wait_until_clear<R, S>(
        &self,
        url: &str,
        timeout: Duration,
        poll_every: Duration,
        mut read: R,
        mut sleep: S,
    ) -> Result<String>
    where
        R: FnMut() -> Result<String>,
        S: FnMut(Duration),
    {
        let mut waited = Duration::ZERO;
        loop {
            let html = read()?;
            if !self.is_challenge(&html) {
                if waited > Duration::ZERO {
                    info!("✅ Challenge passed for {} after {}s", url, waited.as_secs());
                }
                return Ok(html);
            }

            if waited >= timeout {
                return Err(MonitorError::ChallengeTimeout {
                    url: url.to_string(),
                    waited,
                }
                .into());
            }

            debug!("Still on challenge page for {}, waiting...", url);
            sleep(poll_every);
            waited += poll_every;
        }
    }
}
