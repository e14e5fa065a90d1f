use scraper::{ElementRef, Html};

/// A match rule over elements, expressed as data
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Element name, lowercase
    Tag(String),
    /// Class attribute holds exactly this token
    ClassToken(String),
    /// Some class token contains the needle
    ClassContains { needle: String, ignore_case: bool },
    /// Attribute value contains the needle, case-insensitively
    AttrContains { attr: String, needle: String },
    /// Text directly inside the element contains the needle, case-insensitively
    OwnTextContains(String),
    /// At least one descendant element matches
    HasDescendant(Box<Predicate>),
    /// Strictly more than `count` descendant elements match
    DescendantsMoreThan { inner: Box<Predicate>, count: usize },
    All(Vec<Predicate>),
    AnyOf(Vec<Predicate>),
}

impl Predicate {
    pub fn tag(name: &str) -> Self {
        Predicate::Tag(name.to_lowercase())
    }

    pub fn class_contains(needle: &str, ignore_case: bool) -> Self {
        Predicate::ClassContains {
            needle: needle.to_string(),
            ignore_case,
        }
    }

    pub fn matches(&self, element: &ElementRef<'_>) -> bool {
        let value = element.value();
        match self {
            Predicate::Tag(name) => value.name() == name.as_str(),
            Predicate::ClassToken(token) => value.classes().any(|c| c == token.as_str()),
            Predicate::ClassContains { needle, ignore_case } => {
                if *ignore_case {
                    let needle = needle.to_lowercase();
                    value.classes().any(|c| c.to_lowercase().contains(&needle))
                } else {
                    value.classes().any(|c| c.contains(needle.as_str()))
                }
            }
            Predicate::AttrContains { attr, needle } => value
                .attr(attr)
                .map(|v| v.to_lowercase().contains(&needle.to_lowercase()))
                .unwrap_or(false),
            Predicate::OwnTextContains(needle) => own_text(element)
                .to_lowercase()
                .contains(&needle.to_lowercase()),
            Predicate::HasDescendant(inner) => descendants(element).any(|d| inner.matches(&d)),
            Predicate::DescendantsMoreThan { inner, count } => {
                descendants(element).filter(|d| inner.matches(d)).count() > *count
            }
            Predicate::All(preds) => preds.iter().all(|p| p.matches(element)),
            Predicate::AnyOf(preds) => preds.iter().any(|p| p.matches(element)),
        }
    }
}

/// A parsed page or fragment
pub struct Document {
    html: Html,
}

impl Document {
    pub fn parse(html: &str) -> Self {
        Self {
            html: Html::parse_document(html),
        }
    }

    pub fn parse_fragment(html: &str) -> Self {
        Self {
            html: Html::parse_fragment(html),
        }
    }

    pub fn root(&self) -> ContentNode<'_> {
        ContentNode {
            element: self.html.root_element(),
        }
    }
}

/// An element with the queries the locator and extractor need
#[derive(Clone, Copy, PartialEq)]
pub struct ContentNode<'a> {
    element: ElementRef<'a>,
}

impl<'a> ContentNode<'a> {
    /// First matching descendant in document order
    pub fn find_first(&self, predicate: &Predicate) -> Option<ContentNode<'a>> {
        descendants(&self.element)
            .find(|e| predicate.matches(e))
            .map(|element| ContentNode { element })
    }

    /// All matching descendants in document order
    pub fn find_all(&self, predicate: &Predicate) -> Vec<ContentNode<'a>> {
        descendants(&self.element)
            .filter(|e| predicate.matches(e))
            .map(|element| ContentNode { element })
            .collect()
    }

    /// All text beneath the element, whitespace-collapsed
    pub fn text(&self) -> String {
        self.element
            .text()
            .flat_map(|t| t.split_whitespace())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn attribute(&self, name: &str) -> Option<&'a str> {
        self.element.value().attr(name)
    }

    #[cfg(test)]
    pub fn tag_name(&self) -> &'a str {
        self.element.value().name()
    }

    pub fn outer_html(&self) -> String {
        self.element.html()
    }
}

fn descendants<'a>(element: &ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> {
    element.descendants().skip(1).filter_map(ElementRef::wrap)
}

fn own_text(element: &ElementRef<'_>) -> String {
    element
        .children()
        .filter_map(|child| child.value().as_text().map(|t| t.to_string()))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
          <div class="space-item featured"><h3 class="Card-Title">Studio A</h3><a href="/rooms/1">View</a></div>
          <div class="space-item-wrapper"><span>Starting date <b>soon</b></span></div>
        </body></html>
    "#;

    #[test]
    fn test_class_token_is_exact() {
        let doc = Document::parse(PAGE);
        let hits = doc.root().find_all(&Predicate::ClassToken("space-item".into()));
        assert_eq!(hits.len(), 1);

        let loose = doc.root().find_all(&Predicate::class_contains("space-item", false));
        assert_eq!(loose.len(), 2);
    }

    #[test]
    fn test_class_contains_ignores_case_when_asked() {
        let doc = Document::parse(PAGE);
        let title = doc
            .root()
            .find_first(&Predicate::class_contains("title", true))
            .unwrap();
        assert_eq!(title.text(), "Studio A");
        assert!(doc.root().find_first(&Predicate::class_contains("title", false)).is_none());
    }

    #[test]
    fn test_own_text_excludes_children() {
        let doc = Document::parse(PAGE);
        let span = doc
            .root()
            .find_first(&Predicate::OwnTextContains("starting DATE".into()))
            .unwrap();
        assert_eq!(span.tag_name(), "span");
        assert_eq!(span.text(), "Starting date soon");

        let bold = doc.root().find_first(&Predicate::OwnTextContains("soon".into())).unwrap();
        assert_eq!(bold.tag_name(), "b");
    }

    #[test]
    fn test_descendant_predicates() {
        let doc = Document::parse(PAGE);
        let with_link = doc.root().find_all(&Predicate::All(vec![
            Predicate::tag("div"),
            Predicate::HasDescendant(Box::new(Predicate::tag("a"))),
        ]));
        assert_eq!(with_link.len(), 1);
        assert_eq!(with_link[0].find_first(&Predicate::tag("a")).unwrap().attribute("href"), Some("/rooms/1"));
    }
}
