//! URL handling module for Sumi-Harvest
//!
//! This module provides link resolution and canonicalization, listing page
//! addressing and the same-category link filter.

mod normalize;

pub use normalize::{canonicalize_url, resolve_link};

use url::Url;

/// Builds the URL of a listing page
///
/// Page 1 is the category root itself. Later pages carry the page number in
/// `page_param`, replacing any value the root already had for it.
///
/// # Examples
///
/// ```
/// use sumi_harvest::url::page_url;
/// use url::Url;
///
/// let root = Url::parse("https://shop.example.com/laptops").unwrap();
/// assert_eq!(page_url(&root, "o", 1).as_str(), "https://shop.example.com/laptops");
/// assert_eq!(page_url(&root, "o", 3).as_str(), "https://shop.example.com/laptops?o=3");
/// ```
pub fn page_url(root: &Url, page_param: &str, page: u32) -> Url {
    if page <= 1 {
        return root.clone();
    }

    let others: Vec<(String, String)> = root
        .query_pairs()
        .filter(|(key, _)| key != page_param)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut url = root.clone();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(others)
        .append_pair(page_param, &page.to_string());
    url
}

/// Checks whether a discovered link belongs to the category being harvested
///
/// The link must live on the same host as the category root and, when
/// `filters` is non-empty, contain at least one of the filter substrings.
pub fn matches_category(link: &Url, root: &Url, filters: &[String]) -> bool {
    if !same_host(link, root) {
        return false;
    }

    filters.is_empty() || filters.iter().any(|f| link.as_str().contains(f.as_str()))
}

/// Compares hosts case-insensitively; ports must match as well
fn same_host(a: &Url, b: &Url) -> bool {
    let host = |u: &Url| u.host_str().map(|h| h.to_ascii_lowercase());
    host(a).is_some()
        && host(a) == host(b)
        && a.port_or_known_default() == b.port_or_known_default()
}
