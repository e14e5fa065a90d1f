use crate::config::MonitorConfig;
use crate::error::{MonitorError, MonitorResult};
use crate::scrapers::debug::snapshot_name;
use crate::scrapers::dom::{Document, Predicate};
use crate::scrapers::traits::{DebugSink, PageContent, PageFetcher};
use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, warn};

static CITIES_ARRAY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)cities\s*=\s*(\[.*?\])\s*;?").expect("valid cities regex"));
static JS_OBJECT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{[^{}]*\}").expect("valid object regex"));
static JS_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"["']?id["']?\s*:\s*["']?(\d+)"#).expect("valid id regex"));

/// Outer HTML of one listing card
#[derive(Debug, Clone, PartialEq)]
pub struct ListingFragment {
    pub html: String,
}

/// One way of picking listing cards out of a page
#[derive(Debug, Clone)]
pub enum LocatorStrategy {
    /// Elements carrying the known card class
    CardMarker(String),
    /// Containers whose class contains any of these substrings, de-duplicated
    ClassSubstrings(Vec<String>),
    /// Containers holding a link and more than `min_nested` containers
    Structural { min_nested: usize, cap: usize },
}

impl LocatorStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            LocatorStrategy::CardMarker(_) => "card marker",
            LocatorStrategy::ClassSubstrings(_) => "class substrings",
            LocatorStrategy::Structural { .. } => "structural",
        }
    }

    pub fn apply(&self, html: &str) -> Vec<ListingFragment> {
        let doc = Document::parse(html);
        let root = doc.root();

        let nodes = match self {
            LocatorStrategy::CardMarker(marker) => {
                root.find_all(&Predicate::ClassToken(marker.clone()))
            }
            LocatorStrategy::ClassSubstrings(markers) => {
                let mut unique = Vec::new();
                for marker in markers {
                    let items = root.find_all(&Predicate::All(vec![
                        Predicate::tag("div"),
                        Predicate::class_contains(marker, false),
                    ]));
                    if !items.is_empty() {
                        debug!("Found {} items with class containing '{}'", items.len(), marker);
                    }
                    for item in items {
                        if !unique.contains(&item) {
                            unique.push(item);
                        }
                    }
                }
                unique
            }
            LocatorStrategy::Structural { min_nested, cap } => {
                let mut nodes = root.find_all(&Predicate::All(vec![
                    Predicate::tag("div"),
                    Predicate::HasDescendant(Box::new(Predicate::tag("a"))),
                    Predicate::DescendantsMoreThan {
                        inner: Box::new(Predicate::tag("div")),
                        count: *min_nested,
                    },
                ]));
                nodes.truncate(*cap);
                nodes
            }
        };

        nodes
            .into_iter()
            .map(|node| ListingFragment {
                html: node.outer_html(),
            })
            .collect()
    }
}

/// Runs strategies in rank order; the first non-empty result wins.
pub fn locate_in(html: &str, strategies: &[LocatorStrategy]) -> MonitorResult<Vec<ListingFragment>> {
    for strategy in strategies {
        let fragments = strategy.apply(html);
        if !fragments.is_empty() {
            info!("Found {} listings via {} strategy", fragments.len(), strategy.name());
            return Ok(fragments);
        }
    }
    Err(MonitorError::NoListingsFound)
}

/// Looks up the city's id in an inline `cities = [...]` script array.
pub fn detect_city_id(html: &str, city: &str) -> Option<String> {
    let doc = Document::parse(html);
    let scripts = doc.root().find_all(&Predicate::tag("script"));

    for script in scripts {
        let body = script.text();
        if !body.contains("cities") {
            continue;
        }
        let Some(array) = CITIES_ARRAY.captures(&body).and_then(|c| c.get(1)) else {
            continue;
        };
        debug!("Found script with cities data");

        if let Some(id) = city_id_from_json(array.as_str(), city) {
            return Some(id);
        }
        if let Some(id) = city_id_from_objects(array.as_str(), city) {
            return Some(id);
        }
    }
    None
}

fn city_id_from_json(array: &str, city: &str) -> Option<String> {
    let cities: Vec<serde_json::Value> = serde_json::from_str(array).ok()?;
    cities.iter().find_map(|entry| {
        let name = entry.get("name")?.as_str()?;
        if !name.eq_ignore_ascii_case(city) {
            return None;
        }
        match entry.get("id")? {
            serde_json::Value::Number(n) => Some(n.to_string()),
            serde_json::Value::String(s) => Some(s.clone()),
            _ => None,
        }
    })
}

/// Fallback for JS object literals that are not valid JSON
fn city_id_from_objects(array: &str, city: &str) -> Option<String> {
    let city = city.to_lowercase();
    JS_OBJECT
        .find_iter(array)
        .map(|m| m.as_str())
        .filter(|obj| obj.to_lowercase().contains(&city))
        .find_map(|obj| JS_ID.captures(obj).map(|c| c[1].to_string()))
}

/// Finds the page exposing the target city's listings and picks its cards
pub struct ListingLocator<'a> {
    config: &'a MonitorConfig,
}

impl<'a> ListingLocator<'a> {
    pub fn new(config: &'a MonitorConfig) -> Self {
        Self { config }
    }

    /// Card marker then class substrings
    pub fn card_strategies(&self) -> Vec<LocatorStrategy> {
        vec![
            LocatorStrategy::CardMarker(self.config.card_marker.clone()),
            LocatorStrategy::ClassSubstrings(self.config.secondary_markers.clone()),
        ]
    }

    pub fn structural_strategy(&self) -> LocatorStrategy {
        LocatorStrategy::Structural {
            min_nested: self.config.structural_min_nested,
            cap: self.config.structural_cap,
        }
    }

    /// Every strategy in rank order
    #[cfg(test)]
    pub fn all_strategies(&self) -> Vec<LocatorStrategy> {
        let mut strategies = self.card_strategies();
        strategies.push(self.structural_strategy());
        strategies
    }

    /// URLs tried for the city's inventory, most specific first
    pub fn candidate_urls(&self, city_id: &str) -> Vec<String> {
        let index = self.config.index_url();
        vec![
            format!("{}?city={}", index, city_id),
            format!("{}/{}", index, self.config.city_slug()),
            format!("{}?city_id={}", index, city_id),
            format!("{}/city/{}", index, city_id),
            index,
        ]
    }

    /// A candidate counts only if it names the city and shows listing cards
    fn city_cards(&self, page: &PageContent) -> Option<Vec<ListingFragment>> {
        if !(page.mentions(&self.config.city) && page.mentions(&self.config.card_marker)) {
            debug!("{} lacks '{}' or listing cards", page.url, self.config.city);
            return None;
        }
        locate_in(&page.html, &self.card_strategies()).ok()
    }

    fn city_links(&self, page: &PageContent) -> Vec<String> {
        let doc = Document::parse(&page.html);
        let anchors = doc.root().find_all(&Predicate::All(vec![
            Predicate::tag("a"),
            Predicate::AttrContains {
                attr: "href".to_string(),
                needle: self.config.city.clone(),
            },
        ]));

        let mut links = Vec::new();
        for href in anchors.iter().filter_map(|a| a.attribute("href")) {
            let Some(link) = self.config.absolutize(href) else {
                continue;
            };
            if !links.contains(&link) {
                links.push(link);
            }
        }
        links
    }

    /// Resolves the city's listing page and returns its cards.
    ///
    /// Fails with `NoListingsFound` when no strategy matches anywhere. A bot
    /// challenge on any page ends the search; other unreachable pages are skipped.
    pub async fn locate(
        &self,
        fetcher: &dyn PageFetcher,
        sink: &dyn DebugSink,
    ) -> Result<Vec<ListingFragment>> {
        info!("Loading main page first to analyze structure...");
        let index = fetcher.navigate(&self.config.index_url()).await?;
        sink.dump("initial_page", &index.html);

        let city_id = match detect_city_id(&index.html, &self.config.city) {
            Some(id) => {
                info!("Using detected city ID: {}", id);
                id
            }
            None => {
                info!("Using default city ID: {}", self.config.fallback_city_id);
                self.config.fallback_city_id.clone()
            }
        };

        for url in self.candidate_urls(&city_id) {
            info!("Trying URL: {}", url);
            let page = match fetcher.navigate(&url).await {
                Ok(page) => page,
                Err(e) if MonitorError::is_challenge_timeout(&e) => return Err(e),
                Err(e) => {
                    warn!("Error with URL {}: {:#}", url, e);
                    continue;
                }
            };
            let attempt = url.rsplit('/').next().unwrap_or_default();
            sink.dump(&snapshot_name(&format!("url_attempt_{}", attempt)), &page.html);

            if let Some(fragments) = self.city_cards(&page) {
                info!("✅ {} exposes {} listings", url, fragments.len());
                return Ok(fragments);
            }
        }

        info!("Trying to find direct link to {} from main page...", self.config.city);
        let index = fetcher.navigate(&self.config.index_url()).await?;
        for link in self.city_links(&index) {
            info!("Trying {} link: {}", self.config.city, link);
            let page = match fetcher.navigate(&link).await {
                Ok(page) => page,
                Err(e) if MonitorError::is_challenge_timeout(&e) => return Err(e),
                Err(e) => {
                    warn!("Error following {}: {:#}", link, e);
                    continue;
                }
            };
            sink.dump("city_link", &page.html);

            if let Ok(fragments) = locate_in(&page.html, &self.card_strategies()) {
                return Ok(fragments);
            }
        }

        info!("Using fallback method to extract any potential listings...");
        let index = fetcher.navigate(&self.config.index_url()).await?;
        let fragments = locate_in(&index.html, &[self.structural_strategy()])?;
        Ok(fragments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(id: u32) -> String {
        format!(
            r#"<div class="space-item"><h3>Room {id}</h3><a href="/en/student-rooms/leeuwarden/{id}">View</a></div>"#
        )
    }

    fn generic(id: u32) -> String {
        format!(
            r#"<div class="box"><a href="/rooms/{id}">Room</a><div>a</div><div>b</div><div>c</div></div>"#
        )
    }

    fn strategies() -> Vec<LocatorStrategy> {
        ListingLocator::new(&MonitorConfig::default()).all_strategies()
    }

    #[test]
    fn test_card_marker_preferred() {
        let html = format!(
            "<html><body>{}{}<div class=\"room-item\"><a href=\"/x\">x</a></div></body></html>",
            card(1),
            card(2)
        );
        let fragments = locate_in(&html, &strategies()).unwrap();
        assert_eq!(fragments.len(), 2);
        assert!(fragments[0].html.contains("Room 1"));
    }

    #[test]
    fn test_secondary_markers_are_unioned_without_duplicates() {
        let html = r#"<html><body>
            <div class="room-item accommodation-card"><a href="/r/1">1</a></div>
            <div class="listing-item"><a href="/r/2">2</a></div>
        </body></html>"#;

        let fragments = locate_in(html, &strategies()).unwrap();

        assert_eq!(fragments.len(), 2);
        assert!(fragments[0].html.contains("/r/2"));
        assert!(fragments[1].html.contains("/r/1"));
    }

    #[test]
    fn test_structural_fallback_matches_generic_containers() {
        let html = format!(
            "<html><body>{}{}{}<div><p>no link</p><div></div><div></div><div></div></div></body></html>",
            generic(1),
            generic(2),
            generic(3)
        );
        let fragments = locate_in(&html, &strategies()).unwrap();
        assert_eq!(fragments.len(), 3);
        assert!(fragments[2].html.contains("/rooms/3"));
    }

    #[test]
    fn test_structural_fallback_is_capped() {
        let body: String = (0..30).map(generic).collect();
        let html = format!("<html><body>{}</body></html>", body);
        let fragments = locate_in(&html, &strategies()).unwrap();
        assert_eq!(fragments.len(), 20);
    }

    #[test]
    fn test_nothing_matches() {
        let err = locate_in("<html><body><p>empty</p></body></html>", &strategies()).unwrap_err();
        assert!(matches!(err, MonitorError::NoListingsFound));
    }

    #[test]
    fn test_detect_city_id_from_json_array() {
        let html = r#"<html><head><script>
            var cities = [{"id": 12, "name": "Groningen"}, {"id": 20, "name": "Leeuwarden"}];
        </script></head><body></body></html>"#;
        assert_eq!(detect_city_id(html, "Leeuwarden"), Some("20".to_string()));
    }

    #[test]
    fn test_detect_city_id_from_js_literal() {
        let html = r#"<html><head><script>
            window.cities = [{id: '7', name: 'Delft'}, {id: '31', name: 'Leeuwarden'}];
        </script></head><body></body></html>"#;
        assert_eq!(detect_city_id(html, "leeuwarden"), Some("31".to_string()));
        assert_eq!(detect_city_id(html, "Utrecht"), None);
    }

    #[test]
    fn test_candidate_urls_most_specific_first() {
        let config = MonitorConfig::default();
        let urls = ListingLocator::new(&config).candidate_urls("20");
        assert_eq!(
            urls,
            vec![
                "https://www.xior-booking.com/en/student-rooms?city=20",
                "https://www.xior-booking.com/en/student-rooms/leeuwarden",
                "https://www.xior-booking.com/en/student-rooms?city_id=20",
                "https://www.xior-booking.com/en/student-rooms/city/20",
                "https://www.xior-booking.com/en/student-rooms",
            ]
        );
    }
}
