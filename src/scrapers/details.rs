use crate::config::MonitorConfig;
use crate::error::{MonitorError, MonitorResult};
use crate::models::{Listing, START_DATE_UNKNOWN};
use crate::scrapers::debug::snapshot_name;
use crate::scrapers::dom::{Document, Predicate};
use crate::scrapers::locator::ListingFragment;
use crate::scrapers::traits::{DebugSink, PageFetcher};
use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, warn};

pub const UNTITLED: &str = "Untitled Property";

const DATE_LABELS: [&str; 4] = ["Starting date", "Start date", "Available from", "Move-in date"];

/// Text blocks scanned for a date label, in order
const DATE_BLOCK_TAGS: [&str; 11] = ["p", "div", "span", "li", "dd", "td", "h2", "h3", "h4", "h5", "h6"];

// ISO dates match whole. Day-first alone would cut `2025-08-01` to
// `25-08-01`, leave it unparsed and always notify; whole, a date before the
// threshold is filtered out like any other.
static DATE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{4}-\d{1,2}-\d{1,2}|\d{1,2}[-/.]\d{1,2}[-/.]\d{2,4})").expect("valid date regex")
});

/// What a listing card alone tells us
#[derive(Debug, Clone, PartialEq)]
pub struct ListingSummary {
    pub id: String,
    pub title: String,
    pub link: String,
}

/// Pulls title, absolute link and id out of a card.
pub fn summarize(fragment: &ListingFragment, config: &MonitorConfig) -> MonitorResult<ListingSummary> {
    let doc = Document::parse_fragment(&fragment.html);
    let root = doc.root();

    let title_query = Predicate::AnyOf(vec![
        Predicate::class_contains("title", true),
        Predicate::class_contains("name", true),
        Predicate::class_contains("heading", true),
    ]);
    let title = ["h1", "h2", "h3"]
        .iter()
        .find_map(|tag| root.find_first(&Predicate::tag(tag)))
        .or_else(|| root.find_first(&title_query))
        .map(|node| node.text())
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| UNTITLED.to_string());

    let href = root
        .find_first(&Predicate::tag("a"))
        .and_then(|a| a.attribute("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty())
        .ok_or(MonitorError::MissingLink)?;

    let link = config.absolutize(href).ok_or(MonitorError::MissingLink)?;
    let id = listing_id(&link).ok_or(MonitorError::MissingLink)?;

    Ok(ListingSummary { id, title, link })
}

/// Final path segment of a link, ignoring a trailing slash
pub fn listing_id(link: &str) -> Option<String> {
    link.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
}

/// Finds the first labelled start date in a detail page, or the unknown sentinel.
pub fn extract_start_date(html: &str) -> String {
    let doc = Document::parse(html);
    let root = doc.root();

    for label in DATE_LABELS {
        for tag in DATE_BLOCK_TAGS {
            let query = Predicate::All(vec![
                Predicate::tag(tag),
                Predicate::OwnTextContains(label.to_string()),
            ]);
            let Some(block) = root.find_first(&query) else {
                continue;
            };
            if let Some(found) = DATE_PATTERN.find(&block.text()) {
                debug!("Date found: {}", found.as_str());
                return found.as_str().to_string();
            }
        }
    }

    debug!("Date not found");
    START_DATE_UNKNOWN.to_string()
}

/// Summarizes a card, then opens its detail page for the start date.
pub async fn extract_listing(
    fragment: &ListingFragment,
    fetcher: &dyn PageFetcher,
    config: &MonitorConfig,
    sink: &dyn DebugSink,
) -> Result<Listing> {
    let summary = summarize(fragment, config)?;

    info!("Loading details page: {}", summary.link);
    let page = fetcher
        .navigate(&summary.link)
        .await
        .with_context(|| format!("Failed to load details for {}", summary.link))?;
    sink.dump(&snapshot_name(&format!("details_{}", summary.id)), &page.html);

    let start_date_raw = extract_start_date(&page.html);
    Ok(Listing::new(summary.id, summary.title, summary.link, start_date_raw))
}

/// Extracts every card in order, skipping the ones that fail.
///
/// A bot challenge on a detail page aborts the batch instead.
pub async fn extract_all(
    fragments: &[ListingFragment],
    fetcher: &dyn PageFetcher,
    config: &MonitorConfig,
    sink: &dyn DebugSink,
) -> Result<Vec<Listing>> {
    let mut listings = Vec::new();

    for (idx, fragment) in fragments.iter().enumerate() {
        match extract_listing(fragment, fetcher, config, sink).await {
            Ok(listing) => listings.push(listing),
            Err(e) if MonitorError::is_challenge_timeout(&e) => return Err(e),
            Err(e) => match MonitorError::classify(&e) {
                Some(MonitorError::MissingLink) => info!("Link not found in listing {}, skipping...", idx),
                _ => warn!("Error processing listing {}: {:#}", idx, e),
            },
        }
    }

    Ok(listings)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment(html: &str) -> ListingFragment {
        ListingFragment { html: html.to_string() }
    }

    #[test]
    fn test_summary_from_card() {
        let config = MonitorConfig::default();
        let summary = summarize(
            &fragment(r#"<div class="space-item"><h3> Studio  A </h3><a href="/rooms/123">View</a></div>"#),
            &config,
        )
        .unwrap();

        assert_eq!(summary.title, "Studio A");
        assert_eq!(summary.link, "https://www.xior-booking.com/rooms/123");
        assert_eq!(summary.id, "123");
    }

    #[test]
    fn test_title_falls_back_to_class_then_placeholder() {
        let config = MonitorConfig::default();
        let named = summarize(
            &fragment(r#"<div><span class="Property-Name">Xior Tesselschade</span><a href="https://www.xior-booking.com/rooms/9/">x</a></div>"#),
            &config,
        )
        .unwrap();
        assert_eq!(named.title, "Xior Tesselschade");
        assert_eq!(named.id, "9");

        let untitled = summarize(&fragment(r#"<div><a href="/rooms/5">x</a></div>"#), &config).unwrap();
        assert_eq!(untitled.title, UNTITLED);
    }

    #[test]
    fn test_missing_or_empty_link() {
        let config = MonitorConfig::default();
        let no_anchor = summarize(&fragment("<div><h3>Room</h3></div>"), &config).unwrap_err();
        assert!(matches!(no_anchor, MonitorError::MissingLink));

        let empty_href = summarize(&fragment(r#"<div><a href="  ">x</a></div>"#), &config).unwrap_err();
        assert!(matches!(empty_href, MonitorError::MissingLink));
    }

    #[test]
    fn test_start_date_after_label() {
        let html = "<html><body><p>Starting date: 01-09-2025</p></body></html>";
        assert_eq!(extract_start_date(html), "01-09-2025");
    }

    #[test]
    fn test_start_date_label_order_and_formats() {
        let html = r#"<html><body>
            <li>Available from 15.10.2025</li>
            <span>Move-in date 2025-08-01</span>
        </body></html>"#;
        assert_eq!(extract_start_date(html), "15.10.2025");

        let iso = "<html><body><div>Start date 2025-08-01</div></body></html>";
        assert_eq!(extract_start_date(iso), "2025-08-01");
    }

    #[test]
    fn test_iso_date_before_threshold_is_filtered() {
        let raw = extract_start_date("<html><body><p>Available from 2025-07-01</p></body></html>");
        assert_eq!(raw, "2025-07-01");
        assert_eq!(
            crate::models::parse_start_date(&raw),
            chrono::NaiveDate::from_ymd_opt(2025, 7, 1)
        );

        let listing = Listing::new("1".into(), "Room".into(), "https://x/rooms/1".into(), raw);
        let threshold = chrono::NaiveDate::from_ymd_opt(2025, 8, 1).unwrap();
        assert!(!crate::monitor::NotificationFilter::new(threshold).should_notify(&listing));
    }

    #[test]
    fn test_label_without_date_keeps_scanning() {
        let html = r#"<html><body>
            <p>Starting date to be announced</p>
            <li>Starting date: 01/09/2025</li>
        </body></html>"#;
        assert_eq!(extract_start_date(html), "01/09/2025");
    }

    #[test]
    fn test_no_label_is_unknown() {
        let html = "<html><body><p>Rent: 450 per month, 01-09-2025</p></body></html>";
        assert_eq!(extract_start_date(html), START_DATE_UNKNOWN);
    }
}
