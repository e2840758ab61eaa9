//! Records flowing through the pipeline
//!
//! A [`CandidateLink`] is produced by the listing stage; a [`DetailRecord`] is
//! produced for every candidate by the detail stage. Both are keyed by the
//! candidate's identity (its canonical link), serialized as `link`.

use serde::{Deserialize, Serialize};

/// An item discovered on a listing page, not yet enriched
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateLink {
    pub title: String,

    /// Identity of the item; the sole deduplication key of the pipeline
    pub link: String,
}

impl CandidateLink {
    pub fn new(title: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
        }
    }

    pub fn identity(&self) -> &str {
        &self.link
    }
}

/// The enriched record for one candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailRecord {
    pub title: String,

    pub link: String,

    /// Ordered, duplicate-free author names
    #[serde(default)]
    pub authors: Vec<String>,

    #[serde(default)]
    pub published_date: Option<String>,

    #[serde(rename = "abstract", default)]
    pub abstract_text: String,
}

impl DetailRecord {
    /// Builds the record used when extraction produced nothing for a candidate
    pub fn placeholder(candidate: &CandidateLink) -> Self {
        Self {
            title: candidate.title.clone(),
            link: candidate.link.clone(),
            authors: Vec::new(),
            published_date: None,
            abstract_text: String::new(),
        }
    }

    pub fn identity(&self) -> &str {
        &self.link
    }

    /// True when no detail field was filled in
    pub fn is_placeholder(&self) -> bool {
        self.authors.is_empty() && self.published_date.is_none() && self.abstract_text.is_empty()
    }
}

/// Removes blanks and repeats from a list of names, keeping first occurrences
pub fn unique_trimmed<I, S>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for value in values {
        let value = value.as_ref().trim();
        if !value.is_empty() && seen.insert(value.to_string()) {
            out.push(value.to_string());
        }
    }
    out
}
