//! Heuristic field extraction from item pages
//!
//! The extractor never fails: a field it cannot find is set to
//! [`NOT_AVAILABLE`]. All site knowledge (selectors, keyword tables,
//! boilerplate patterns) comes from the `[site]` configuration table and is
//! compiled once into [`SiteRules`].
//!
//! `scraper::Html` is not `Send`, so documents are parsed and dropped inside
//! the synchronous [`Extractor::extract`] call and never held across an await.

mod clean;
pub mod description;
mod record;

pub use clean::{clean_description, collapse_whitespace};
pub use record::{ExtractedRecord, RECORD_COLUMNS, SCRAPED_AT_FORMAT};

use crate::config::SiteConfig;
use crate::ConfigError;
use regex::{Regex, RegexBuilder};
use scraper::{ElementRef, Html, Selector};

/// Placeholder for a field the page did not yield
pub const NOT_AVAILABLE: &str = "N/A";

/// Elements scanned by the scored description search
const BLOCK_ELEMENTS: &str = "div, section, article";

/// Compiled site rules
#[derive(Debug)]
pub struct SiteRules {
    pub title: Selector,
    pub prices: Vec<Selector>,
    pub condition: Selector,
    pub date: Selector,
    pub description_containers: Vec<Selector>,
    pub block_elements: Selector,
    pub emoji_markers: Vec<String>,
    /// Upper-cased keyword tables
    pub spec_keywords: Vec<String>,
    pub component_keywords: Vec<String>,
    pub price_keywords: Vec<String>,
    pub delivery_keywords: Vec<String>,
    pub navigation_keywords: Vec<String>,
    pub boilerplate: Vec<Regex>,
}

impl SiteRules {
    /// Compiles every selector and pattern of the site table
    ///
    /// # Returns
    ///
    /// * `Ok(SiteRules)` - All rules compiled
    /// * `Err(ConfigError)` - The first selector or pattern that failed
    pub fn compile(site: &SiteConfig) -> Result<Self, ConfigError> {
        let upper = |keywords: &[String]| -> Vec<String> {
            keywords.iter().map(|k| k.to_uppercase()).collect()
        };

        Ok(Self {
            title: compile_selector(&site.title_selector)?,
            prices: compile_selectors(&site.price_selectors)?,
            condition: compile_selector(&site.condition_selector)?,
            date: compile_selector(&site.date_selector)?,
            description_containers: compile_selectors(&site.description_selectors)?,
            block_elements: compile_selector(BLOCK_ELEMENTS)?,
            emoji_markers: site.emoji_markers.clone(),
            spec_keywords: upper(&site.spec_keywords),
            component_keywords: upper(&site.component_keywords),
            price_keywords: upper(&site.price_keywords),
            delivery_keywords: upper(&site.delivery_keywords),
            navigation_keywords: upper(&site.navigation_keywords),
            boilerplate: site
                .boilerplate_patterns
                .iter()
                .map(|p| compile_pattern(p))
                .collect::<Result<_, _>>()?,
        })
    }
}

/// Parses a CSS selector, mapping failures to a configuration error
pub(crate) fn compile_selector(raw: &str) -> Result<Selector, ConfigError> {
    Selector::parse(raw).map_err(|e| ConfigError::InvalidSelector {
        selector: raw.to_string(),
        message: format!("{:?}", e),
    })
}

pub(crate) fn compile_selectors(raw: &[String]) -> Result<Vec<Selector>, ConfigError> {
    raw.iter().map(|s| compile_selector(s)).collect()
}

/// Boilerplate patterns match case-insensitively and across newlines
fn compile_pattern(raw: &str) -> Result<Regex, ConfigError> {
    RegexBuilder::new(raw)
        .case_insensitive(true)
        .dot_matches_new_line(true)
        .build()
        .map_err(|e| ConfigError::InvalidPattern(format!("'{}': {}", raw, e)))
}

/// Text content of an element with whitespace collapsed
pub(crate) fn element_text(element: ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "))
}

/// Extracts product records from item page HTML
#[derive(Debug)]
pub struct Extractor {
    rules: SiteRules,
}

impl Extractor {
    pub fn new(site: &SiteConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            rules: SiteRules::compile(site)?,
        })
    }

    pub fn rules(&self) -> &SiteRules {
        &self.rules
    }

    /// Extracts a record from an item page
    ///
    /// # Fields
    ///
    /// | Field | Source |
    /// |-------|--------|
    /// | title | first title selector match |
    /// | price | first price selector with non-empty text, narrow spaces normalized |
    /// | condition | condition selector |
    /// | description | two-phase search, see [`description`] |
    /// | post_date | `datetime` attribute of the date selector match |
    /// | scraped_at | local time of the call |
    pub fn extract(&self, html: &str, url: &str) -> ExtractedRecord {
        let document = Html::parse_document(html);
        let rules = &self.rules;
        let mut record = ExtractedRecord::empty(url);

        if let Some(title) = first_text(&document, &rules.title) {
            record.title = title;
        }

        if let Some(price) = rules.prices.iter().find_map(|s| first_text(&document, s)) {
            record.price = normalize_price(&price);
        }

        if let Some(condition) = first_text(&document, &rules.condition) {
            record.condition = condition;
        }

        if let Some(description) = description::find_description(&document, rules) {
            record.description = description;
        }

        let post_date = document
            .select(&rules.date)
            .next()
            .and_then(|e| e.value().attr("datetime"))
            .map(str::trim)
            .filter(|d| !d.is_empty());
        if let Some(post_date) = post_date {
            record.post_date = post_date.to_string();
        }

        record
    }
}

fn first_text(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .next()
        .map(element_text)
        .filter(|t| !t.is_empty())
}

/// Replaces no-break and narrow no-break spaces with plain spaces
pub fn normalize_price(raw: &str) -> String {
    raw.replace(['\u{00A0}', '\u{202F}'], " ").trim().to_string()
}
