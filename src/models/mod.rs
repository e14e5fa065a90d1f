use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Raw start-date value used when no date could be found on a detail page
pub const START_DATE_UNKNOWN: &str = "Unknown";

/// Formats tried, in order, when normalizing a raw start date
const DATE_FORMATS: [&str; 5] = ["%d-%m-%Y", "%d/%m/%Y", "%m/%d/%Y", "%Y-%m-%d", "%d.%m.%Y"];

/// A listing extracted during the current run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: String,
    pub title: String,
    pub link: String,
    pub start_date_raw: String,
    pub start_date: Option<NaiveDate>,
}

impl Listing {
    pub fn new(id: String, title: String, link: String, start_date_raw: String) -> Self {
        let start_date = parse_start_date(&start_date_raw);
        Self {
            id,
            title,
            link,
            start_date_raw,
            start_date,
        }
    }

    /// Start date as shown to the user
    pub fn start_date_label(&self) -> String {
        match self.start_date {
            Some(date) => date.format("%d-%m-%Y").to_string(),
            None => START_DATE_UNKNOWN.to_string(),
        }
    }
}

/// A row of the `listings` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredListing {
    pub id: String,
    pub title: String,
    pub start_date: String,
    pub link: String,
}

impl From<&Listing> for StoredListing {
    fn from(listing: &Listing) -> Self {
        Self {
            id: listing.id.clone(),
            title: listing.title.clone(),
            start_date: listing.start_date_raw.clone(),
            link: listing.link.clone(),
        }
    }
}

/// Parses a raw start date, trying each known format in order.
///
/// Returns `None` for the unknown sentinel or when no format fits.
pub fn parse_start_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() || raw == START_DATE_UNKNOWN {
        return None;
    }

    DATE_FORMATS.iter().find_map(|format| {
        NaiveDate::parse_from_str(raw, format)
            .ok()
            // YYYY is four digits; chrono would otherwise read "25" as year 25
            .filter(|_| has_four_digit_year(raw, format))
    })
}

fn has_four_digit_year(raw: &str, format: &str) -> bool {
    let parts: Vec<&str> = raw.split(|c: char| !c.is_ascii_digit()).collect();
    let year = if format.starts_with("%Y") {
        parts.first()
    } else {
        parts.last()
    };
    year.map(|y| y.len() == 4).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parses_every_known_format() {
        assert_eq!(parse_start_date("01-08-2025"), Some(ymd(2025, 8, 1)));
        assert_eq!(parse_start_date("01/09/2025"), Some(ymd(2025, 9, 1)));
        assert_eq!(parse_start_date("2025-08-01"), Some(ymd(2025, 8, 1)));
        assert_eq!(parse_start_date("15.10.2025"), Some(ymd(2025, 10, 15)));
    }

    #[test]
    fn test_day_first_wins_over_month_first() {
        assert_eq!(parse_start_date("02/03/2025"), Some(ymd(2025, 3, 2)));
        // only valid month-first
        assert_eq!(parse_start_date("12/31/2025"), Some(ymd(2025, 12, 31)));
    }

    #[test]
    fn test_unknown_and_garbage_yield_no_date() {
        assert_eq!(parse_start_date(START_DATE_UNKNOWN), None);
        assert_eq!(parse_start_date(""), None);
        assert_eq!(parse_start_date("next semester"), None);
        assert_eq!(parse_start_date("31-02-2025"), None);
        assert_eq!(parse_start_date("01-09-25"), None);
    }

    #[test]
    fn test_listing_label_uses_day_month_year() {
        let listing = Listing::new(
            "123".into(),
            "Studio A".into(),
            "https://www.xior-booking.com/rooms/123".into(),
            "2025-09-01".into(),
        );
        assert_eq!(listing.start_date_label(), "01-09-2025");

        let unknown = Listing::new("9".into(), "x".into(), "y".into(), START_DATE_UNKNOWN.into());
        assert_eq!(unknown.start_date_label(), "Unknown");
    }
}
