//! URL handling module for Gleaner
//!
//! Listing hrefs are turned into identities here. Two hrefs that point at the
//! same item must canonicalize to the same string, since the identity is the
//! deduplication key for the cache, the candidate set and the final dataset.

mod normalize;

use crate::UrlError;
use url::Url;

pub use normalize::normalize_url;

/// Resolves an href found on `base` and canonicalizes it into an identity
///
/// # Arguments
///
/// * `href` - The raw href (absolute or relative)
/// * `base` - The URL of the page the href was found on
///
/// # Examples
///
/// ```
/// use gleaner::url::canonical_link;
/// use url::Url;
///
/// let base = Url::parse("https://repo.example.org/publications/?page=2").unwrap();
/// let link = canonical_link("../pub/on-markets/#abstract", &base).unwrap();
/// assert_eq!(link, "https://repo.example.org/pub/on-markets");
/// ```
pub fn canonical_link(href: &str, base: &Url) -> Result<String, UrlError> {
    let href = href.trim();
    if href.is_empty() {
        return Err(UrlError::Malformed("empty href".to_string()));
    }

    let absolute = base
        .join(href)
        .map_err(|e| UrlError::Parse(format!("{}: {}", href, e)))?;

    Ok(normalize_url(absolute.as_str())?.to_string())
}

/// Builds the URL of listing page `page` (zero-based)
///
/// Existing query parameters on the base URL are kept; a `page` parameter is
/// replaced.
pub fn listing_page_url(base: &Url, page: u32) -> Url {
    let mut url = base.clone();
    let retained: Vec<(String, String)> = base
        .query_pairs()
        .filter(|(k, _)| k != "page")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    {
        let mut pairs = url.query_pairs_mut();
        pairs.clear();
        for (k, v) in &retained {
            pairs.append_pair(k, v);
        }
        pairs.append_pair("page", &page.to_string());
    }

    url
}
