use std::time::Duration;
use thiserror::Error;

/// Failures the monitor knows how to classify.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("bot challenge at {url} not cleared after {}s", .waited.as_secs())]
    ChallengeTimeout { url: String, waited: Duration },
    #[error("no listings matched any locator strategy")]
    NoListingsFound,
    #[error("listing fragment has no usable link")]
    MissingLink,
    #[error("listing {0} is already stored")]
    DuplicateKey(String),
    #[error("listing store failure: {0}")]
    Store(#[from] rusqlite::Error),
    #[error("notification failed: {0}")]
    Notify(String),
}

pub type MonitorResult<T> = Result<T, MonitorError>;

impl MonitorError {
    /// Finds a classified error inside an `anyhow` chain.
    pub fn classify(err: &anyhow::Error) -> Option<&MonitorError> {
        err.chain().find_map(|cause| cause.downcast_ref::<MonitorError>())
    }

    /// Bot challenges abort the whole run rather than a single page.
    pub fn is_challenge_timeout(err: &anyhow::Error) -> bool {
        matches!(Self::classify(err), Some(MonitorError::ChallengeTimeout { .. }))
    }
}
