use crate::config::MonitorConfig;
use crate::error::{MonitorError, MonitorResult};
use crate::models::{Listing, StoredListing};
use crate::scrapers::details::extract_all;
use crate::scrapers::locator::ListingLocator;
use crate::scrapers::traits::{DebugSink, Notifier, PageFetcher};
use crate::store::ListingStore;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use tracing::{debug, error, info, warn};

/// Stores unseen listings and returns them in input order.
///
/// Listings already present are skipped silently. A listing whose check or
/// insert fails is logged and skipped.
pub fn record_new(store: &ListingStore, listings: Vec<Listing>) -> Vec<Listing> {
    let mut fresh = Vec::new();

    for listing in listings {
        match insert_if_absent(store, &listing) {
            Ok(true) => {
                info!("🆕 New listing found: {}", listing.title);
                fresh.push(listing);
            }
            Ok(false) => debug!("Already seen listing {}", listing.id),
            Err(e) => warn!("Error storing listing {}: {}", listing.id, e),
        }
    }

    fresh
}

fn insert_if_absent(store: &ListingStore, listing: &Listing) -> MonitorResult<bool> {
    if store.has(&listing.id)? {
        return Ok(false);
    }
    match store.insert(&StoredListing::from(listing)) {
        Ok(()) => Ok(true),
        Err(MonitorError::DuplicateKey(_)) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Surfaces listings starting on or after the threshold, and undated ones
#[derive(Debug, Clone, Copy)]
pub struct NotificationFilter {
    threshold: NaiveDate,
}

impl NotificationFilter {
    pub fn new(threshold: NaiveDate) -> Self {
        Self { threshold }
    }

    pub fn should_notify(&self, listing: &Listing) -> bool {
        match listing.start_date {
            Some(date) => date >= self.threshold,
            None => true,
        }
    }

    pub fn select<'l>(&self, listings: &'l [Listing]) -> Vec<&'l Listing> {
        listings.iter().filter(|l| self.should_notify(l)).collect()
    }
}

/// Title and body of the alert for a listing
pub fn notification_text(listing: &Listing) -> (String, String) {
    (
        format!("New housing found: {}", listing.title),
        format!("Start date: {}\nLink: {}", listing.start_date_label(), listing.link),
    )
}

/// Counts from a single run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub fragments: usize,
    pub extracted: usize,
    pub new: usize,
    pub notified: usize,
}

/// One monitoring pass: locate, extract, detect changes, filter, notify
pub struct Monitor<'a> {
    config: &'a MonitorConfig,
    fetcher: &'a dyn PageFetcher,
    notifier: &'a dyn Notifier,
    sink: &'a dyn DebugSink,
}

impl<'a> Monitor<'a> {
    pub fn new(
        config: &'a MonitorConfig,
        fetcher: &'a dyn PageFetcher,
        notifier: &'a dyn Notifier,
        sink: &'a dyn DebugSink,
    ) -> Self {
        Self {
            config,
            fetcher,
            notifier,
            sink,
        }
    }

    /// Runs once and never fails; a failed run counts as zero new listings.
    pub async fn run_once(&self) -> RunReport {
        info!("🔎 Checking site at {}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S"));

        match self.try_run().await {
            Ok(report) => {
                info!(
                    "Run finished: {} cards, {} extracted, {} new, {} notified",
                    report.fragments, report.extracted, report.new, report.notified
                );
                report
            }
            Err(e) => {
                match MonitorError::classify(&e) {
                    Some(MonitorError::NoListingsFound) => info!("No listings found this run"),
                    Some(MonitorError::ChallengeTimeout { url, waited }) => {
                        warn!("Bot challenge at {} not passed after {}s, retrying next schedule", url, waited.as_secs())
                    }
                    _ => error!("Error in run: {:#}", e),
                }
                self.dump_error_page().await;
                RunReport::default()
            }
        }
    }

    pub async fn try_run(&self) -> Result<RunReport> {
        let locator = ListingLocator::new(self.config);
        let fragments = locator.locate(self.fetcher, self.sink).await?;

        let listings = extract_all(&fragments, self.fetcher, self.config, self.sink).await?;
        let extracted = listings.len();

        let fresh = {
            let store = ListingStore::open(&self.config.db_path).with_context(|| {
                format!("Failed to open listing store {}", self.config.db_path.display())
            })?;
            record_new(&store, listings)
        };

        let filter = NotificationFilter::new(self.config.threshold);
        let selected = filter.select(&fresh);
        for listing in &selected {
            self.send(listing).await;
        }

        Ok(RunReport {
            fragments: fragments.len(),
            extracted,
            new: fresh.len(),
            notified: selected.len(),
        })
    }

    async fn send(&self, listing: &Listing) {
        let (title, message) = notification_text(listing);
        match self.notifier.notify(&title, &message).await {
            Ok(()) => info!("🔔 Notification sent for: {}", listing.title),
            Err(e) => {
                warn!("Error sending notification: {:#}", e);
                info!("New listing available: {} - {}", listing.title, listing.link);
            }
        }
    }

    async fn dump_error_page(&self) {
        if let Ok(page) = self.fetcher.current_content().await {
            self.sink.dump("error_page", &page.html);
        }
    }
}
