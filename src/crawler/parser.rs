//! HTML extraction for listing and detail pages
//!
//! Detail fields are extracted with ordered fallbacks: the first strategy
//! that yields something wins, and a field that no strategy fills stays empty.
//!
//! # Field strategies
//!
//! | Field | Strategies, in order |
//! |-------|----------------------|
//! | title | `h1`, then the listing title |
//! | authors | person relations, subtitle line, meta tags, JSON-LD |
//! | published date | `span.date`, `time`, then meta tags |
//! | abstract | abstract sections, then the block after an "Abstract" heading |

use crate::record::{unique_trimmed, CandidateLink, DetailRecord};
use crate::url::canonical_link;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::OnceLock;
use url::Url;

const LISTING_CARD: &str = ".result-container";
const LISTING_TITLE_LINK: &str = "h3.title a";

const AUTHOR_SELECTORS: &[&str] = &[
    ".relations.persons a[href*='/en/persons/'] span",
    ".relations.persons a[href*='/en/persons/']",
    "section#persons a[href*='/en/persons/'] span",
    "section#persons a[href*='/en/persons/']",
];

const AUTHOR_META: &[&str] = &["citation_author", "dc.contributor", "dc.contributor.author"];

const DATE_SELECTORS: &[&str] = &["span.date", "time[datetime]", "time"];

const DATE_META: &[&str] = &[
    "citation_publication_date",
    "dc.date",
    "article:published_time",
];

const ABSTRACT_SELECTORS: &[&str] = &[
    "section#abstract .textblock",
    "section.abstract .textblock",
    "div.abstract .textblock",
    "div#abstract",
    "section#abstract",
    "div.textblock",
];

/// Shorter abstract candidates are navigation crumbs, not abstracts
const MIN_ABSTRACT_CHARS: usize = 15;

/// `Surname, I.` or `Surname, I. J.` pairs
const NAME_PAIR_PATTERN: &str = r"[A-Z][A-Za-z'’\-]+,\s*[A-Z](?:\.|\b)(?:\s*[A-Z](?:\.|\b))*";

fn name_pair_regex() -> Option<&'static Regex> {
    static NAME_PAIR: OnceLock<Option<Regex>> = OnceLock::new();
    NAME_PAIR
        .get_or_init(|| Regex::new(NAME_PAIR_PATTERN).ok())
        .as_ref()
}

/// Extracts `{title, link}` rows from a listing page
///
/// Links are resolved against `page_url` and canonicalized. Rows missing a
/// title or a usable href are skipped.
///
/// # Example
///
/// ```
/// use gleaner::crawler::parse_listing;
/// use url::Url;
///
/// let html = r#"<div class="result-container"><h3 class="title"><a href="/pub/a">A</a></h3></div>"#;
/// let page = Url::parse("https://repo.example.org/list?page=0").unwrap();
/// let rows = parse_listing(html, &page);
/// assert_eq!(rows[0].link, "https://repo.example.org/pub/a");
/// ```
pub fn parse_listing(html: &str, page_url: &Url) -> Vec<CandidateLink> {
    let document = Html::parse_document(html);
    let (Ok(cards), Ok(title_link)) = (
        Selector::parse(LISTING_CARD),
        Selector::parse(LISTING_TITLE_LINK),
    ) else {
        return Vec::new();
    };

    let mut rows = Vec::new();
    for (index, card) in document.select(&cards).enumerate() {
        let Some(anchor) = card.select(&title_link).next() else {
            tracing::debug!(card = index, "Listing card has no title link");
            continue;
        };

        let title = element_text(&anchor);
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        if title.is_empty() {
            continue;
        }

        match canonical_link(href, page_url) {
            Ok(link) => rows.push(CandidateLink { title, link }),
            Err(e) => tracing::debug!(card = index, href, "Skipping listing row: {}", e),
        }
    }

    rows
}

/// Extracts the detail record for `candidate` from its detail page
///
/// Always returns a record keyed by the candidate's identity; fields that
/// could not be found are left empty.
pub fn parse_detail(html: &str, candidate: &CandidateLink) -> DetailRecord {
    let document = Html::parse_document(html);

    let title = first_text(&document, "h1")
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| candidate.title.clone());

    let authors = extract_authors(&document, &title);
    let published_date = extract_date(&document);
    let abstract_text = extract_abstract(&document).unwrap_or_default();

    DetailRecord {
        title,
        link: candidate.link.clone(),
        authors,
        published_date,
        abstract_text,
    }
}

fn extract_authors(document: &Html, title: &str) -> Vec<String> {
    for selector in AUTHOR_SELECTORS {
        let Ok(selector) = Selector::parse(selector) else {
            continue;
        };
        let names: Vec<String> = document
            .select(&selector)
            .map(|el| element_text(&el))
            .filter(|t| !t.is_empty())
            .collect();
        if !names.is_empty() {
            return unique_trimmed(names);
        }
    }

    let from_subtitle = authors_from_subtitle(document, title);
    if !from_subtitle.is_empty() {
        return from_subtitle;
    }

    let from_meta = meta_values(document, AUTHOR_META);
    if !from_meta.is_empty() {
        return from_meta;
    }

    authors_from_json_ld(document)
}

/// Parses the byline that precedes the date in the page subtitle
fn authors_from_subtitle(document: &Html, title: &str) -> Vec<String> {
    let Some(date) = Selector::parse("span.date")
        .ok()
        .and_then(|s| document.select(&s).next())
    else {
        return Vec::new();
    };

    let subtitle = date
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| {
            el.value()
                .attr("class")
                .is_some_and(|class| class.contains("subtitle"))
        })
        .or_else(|| date.parent().and_then(ElementRef::wrap));

    let Some(subtitle) = subtitle else {
        return Vec::new();
    };

    let mut line = element_text(&subtitle);
    if !title.is_empty() {
        line = line.replace(title, "");
    }
    let line = collapse_whitespace(&line);

    let byline = match line.find(|c: char| c.is_ascii_digit()) {
        Some(cut) => line[..cut].trim_matches(|c| " -—–·•,;|".contains(c)),
        None => line.as_str(),
    };
    let byline = byline.replace(" & ", ", ").replace(" and ", ", ");

    let Some(pattern) = name_pair_regex() else {
        return Vec::new();
    };
    unique_trimmed(pattern.find_iter(&byline).map(|m| m.as_str()))
}

fn authors_from_json_ld(document: &Html) -> Vec<String> {
    let Ok(scripts) = Selector::parse(r#"script[type="application/ld+json"]"#) else {
        return Vec::new();
    };

    let mut names = Vec::new();
    for script in document.select(&scripts) {
        let text: String = script.text().collect();
        let Ok(data) = serde_json::from_str::<serde_json::Value>(text.trim()) else {
            continue;
        };

        let objects = match data {
            serde_json::Value::Array(items) => items,
            other => vec![other],
        };
        for object in &objects {
            match object.get("author") {
                Some(serde_json::Value::Array(authors)) => {
                    names.extend(authors.iter().filter_map(json_ld_name));
                }
                Some(author) => names.extend(json_ld_name(author)),
                None => {}
            }
        }
    }

    unique_trimmed(names)
}

fn json_ld_name(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(name) => Some(name.clone()),
        serde_json::Value::Object(map) => map.get("name")?.as_str().map(str::to_string),
        _ => None,
    }
}

fn extract_date(document: &Html) -> Option<String> {
    for selector in DATE_SELECTORS {
        let Ok(selector) = Selector::parse(selector) else {
            continue;
        };
        if let Some(el) = document.select(&selector).next() {
            let value = el
                .value()
                .attr("datetime")
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| element_text(&el));
            if !value.is_empty() {
                return Some(value);
            }
        }
    }

    meta_values(document, DATE_META).into_iter().next()
}

fn extract_abstract(document: &Html) -> Option<String> {
    for selector in ABSTRACT_SELECTORS {
        if let Some(text) = first_text(document, selector) {
            if text.chars().count() > MIN_ABSTRACT_CHARS {
                return Some(text);
            }
        }
    }

    abstract_after_heading(document)
}

/// Text of the first `div`, `p` or `section` following an "Abstract" heading
fn abstract_after_heading(document: &Html) -> Option<String> {
    let headings = Selector::parse("h2, h3").ok()?;

    for heading in document.select(&headings) {
        if !element_text(&heading).to_lowercase().contains("abstract") {
            continue;
        }

        let heading_id = heading.id();
        let mut passed = false;
        for node in document.tree.root().descendants() {
            if node.id() == heading_id {
                passed = true;
                continue;
            }
            if !passed || node.ancestors().any(|a| a.id() == heading_id) {
                continue;
            }
            if let Some(el) = ElementRef::wrap(node) {
                if matches!(el.value().name(), "div" | "p" | "section") {
                    let text = element_text(&el);
                    if !text.is_empty() {
                        return Some(text);
                    }
                    break;
                }
            }
        }
    }

    None
}

/// Non-empty `content` values of `<meta name=..>` / `<meta property=..>` tags
fn meta_values(document: &Html, names: &[&str]) -> Vec<String> {
    let mut values = Vec::new();
    for name in names {
        let css = format!(r#"meta[name="{0}"], meta[property="{0}"]"#, name);
        let Ok(selector) = Selector::parse(&css) else {
            continue;
        };
        values.extend(
            document
                .select(&selector)
                .filter_map(|el| el.value().attr("content"))
                .map(str::to_string),
        );
    }
    unique_trimmed(values)
}

fn first_text(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document.select(&selector).next().map(|el| element_text(&el))
}

fn element_text(element: &ElementRef) -> String {
    collapse_whitespace(&element.text().collect::<String>())
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
