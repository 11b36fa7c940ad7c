//! Paginated item link discovery
//!
//! The frontier walks the listing pages of one category. Page 1 is the
//! category root and page N is the root with the page parameter set to N.
//! Pages are fetched one at a time through [`Frontier::next_page`], so no page
//! past a stop condition is ever requested.
//!
//! # Stop conditions
//!
//! | Condition | Page 1 | Later pages |
//! |-----------|--------|-------------|
//! | fetch fails after all attempts | `CategoryUnreachable` | end of discovery |
//! | no listing matcher finds items | `EmptyCategory` | end of discovery |
//! | fewer than `min_new_links` new links | continue | end of discovery, links discarded |
//! | `max_pages` reached | | end of discovery |

use crate::config::FrontierConfig;
use crate::crawler::fetcher::Fetcher;
use crate::extract::compile_selectors;
use crate::state::ResumeLedger;
use crate::url::{matches_category, page_url, resolve_link};
use crate::{ConfigError, HarvestError};
use rand::Rng;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::time::Duration;
use url::Url;

/// Bounds of the pause between two listing pages, in time units
pub const PAGE_PAUSE_UNITS: (f64, f64) = (1.0, 2.0);

/// Ordered item link matchers for listing pages
#[derive(Debug, Clone)]
pub struct ListingMatchers {
    selectors: Vec<Selector>,
}

impl ListingMatchers {
    pub fn compile(raw: &[String]) -> Result<Self, ConfigError> {
        if raw.is_empty() {
            return Err(ConfigError::Validation(
                "at least one listing selector is required".to_string(),
            ));
        }
        Ok(Self {
            selectors: compile_selectors(raw)?,
        })
    }

    /// Returns the `href`s of the items found by the first matcher that
    /// matches any element, in page order
    ///
    /// The first non-empty element set wins even if none of its elements
    /// carries an `href`; the result is then an empty list. Returns None when
    /// no matcher matches anything.
    pub fn item_hrefs(&self, html: &str) -> Option<Vec<String>> {
        let document = Html::parse_document(html);

        let items: Vec<_> = self
            .selectors
            .iter()
            .map(|selector| document.select(selector).collect::<Vec<_>>())
            .find(|items| !items.is_empty())?;

        Some(
            items
                .into_iter()
                .filter_map(|element| element.value().attr("href"))
                .map(str::to_string)
                .collect(),
        )
    }
}

/// Position of the frontier in the listing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrontierCursor {
    /// Last page that yielded links (0 before the first page)
    pub page_number: u32,
    pub accumulated_links: usize,
}

/// Lazy page-by-page discovery over one category
pub struct Frontier<'a> {
    fetcher: &'a Fetcher,
    matchers: &'a ListingMatchers,
    ledger: &'a ResumeLedger,
    root: Url,
    link_filters: &'a [String],
    config: &'a FrontierConfig,
    time_unit: Duration,
    cursor: FrontierCursor,
    seen: HashSet<String>,
    exhausted: bool,
}

impl<'a> Frontier<'a> {
    pub fn new(
        fetcher: &'a Fetcher,
        matchers: &'a ListingMatchers,
        ledger: &'a ResumeLedger,
        root: Url,
        link_filters: &'a [String],
        config: &'a FrontierConfig,
        time_unit: Duration,
    ) -> Self {
        Self {
            fetcher,
            matchers,
            ledger,
            root,
            link_filters,
            config,
            time_unit,
            cursor: FrontierCursor::default(),
            seen: HashSet::new(),
            exhausted: false,
        }
    }

    pub fn cursor(&self) -> FrontierCursor {
        self.cursor
    }

    /// Fetches the next listing page and returns its new item links
    ///
    /// # Returns
    ///
    /// * `Ok(Some(links))` - New canonical item links of the page (may be
    ///   empty on page 1)
    /// * `Ok(None)` - Discovery is over
    /// * `Err(HarvestError)` - Page 1 could not be fetched or had no items
    pub async fn next_page(&mut self) -> Result<Option<Vec<String>>, HarvestError> {
        if self.exhausted {
            return Ok(None);
        }

        let page = self.cursor.page_number + 1;
        if self.config.max_pages.is_some_and(|max| page > max) {
            tracing::info!("Reached the page cap of {} listing pages", page - 1);
            return Ok(self.finish());
        }

        if page > 1 {
            tokio::time::sleep(self.page_pause()).await;
        }

        let url = page_url(&self.root, &self.config.page_param, page);
        tracing::debug!("Fetching listing page {}: {}", page, url);

        let body = match self.fetcher.fetch(url.as_str()).await {
            Ok(body) => body,
            Err(failure) if page == 1 => {
                self.exhausted = true;
                return Err(HarvestError::CategoryUnreachable(failure));
            }
            Err(failure) => {
                tracing::warn!("Stopping discovery at page {}: {}", page, failure);
                return Ok(self.finish());
            }
        };

        let Some(hrefs) = self.matchers.item_hrefs(&body) else {
            if page == 1 {
                self.exhausted = true;
                return Err(HarvestError::EmptyCategory {
                    url: url.to_string(),
                });
            }
            tracing::info!("No listing items on page {}, discovery complete", page);
            return Ok(self.finish());
        };

        let fresh = self.fresh_links(&hrefs, &url);

        if page > 1 && fresh.len() < self.config.min_new_links {
            tracing::info!(
                "Page {} yielded {} new links (< {}), discovery complete",
                page,
                fresh.len(),
                self.config.min_new_links
            );
            return Ok(self.finish());
        }

        self.seen.extend(fresh.iter().cloned());
        self.cursor.page_number = page;
        self.cursor.accumulated_links += fresh.len();

        tracing::info!(
            "Page {}: {} new links ({} total)",
            page,
            fresh.len(),
            self.cursor.accumulated_links
        );

        Ok(Some(fresh))
    }

    /// Runs discovery to the end and returns every new item link
    pub async fn discover(&mut self) -> Result<Vec<String>, HarvestError> {
        let mut links = Vec::new();
        while let Some(page_links) = self.next_page().await? {
            links.extend(page_links);
        }
        Ok(links)
    }

    /// Resolves, filters and deduplicates the links of one page
    fn fresh_links(&self, hrefs: &[String], page: &Url) -> Vec<String> {
        let mut on_page = HashSet::new();

        hrefs
            .iter()
            .filter_map(|href| resolve_link(href, page))
            .filter(|link| matches_category(link, &self.root, self.link_filters))
            .map(String::from)
            .filter(|link| !self.seen.contains(link) && !self.ledger.contains(link))
            .filter(|link| on_page.insert(link.clone()))
            .collect()
    }

    fn page_pause(&self) -> Duration {
        let (low, high) = PAGE_PAUSE_UNITS;
        self.time_unit.mul_f64(rand::rng().random_range(low..=high))
    }

    fn finish(&mut self) -> Option<Vec<String>> {
        self.exhausted = true;
        None
    }
}
