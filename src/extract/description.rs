//! Two-phase description search
//!
//! Phase 1 walks the configured description containers in order and takes the
//! first one that looks like a real listing body. Phase 2 only runs when phase
//! 1 found nothing: every `div`, `section` and `article` of a plausible size is
//! scored on listing-body signals and the best candidate above the acceptance
//! threshold wins.

use super::{clean, element_text, SiteRules};
use scraper::Html;

/// Minimum length (characters) of a description in either phase
pub const MIN_DESCRIPTION_CHARS: usize = 50;

/// Maximum length (characters) of a phase 2 candidate
pub const MAX_CANDIDATE_CHARS: usize = 2000;

/// Score per emoji marker present
pub const EMOJI_WEIGHT: i32 = 2;

/// Score per technical specification keyword present
pub const SPEC_WEIGHT: i32 = 3;

/// Score per generic component keyword present
pub const COMPONENT_WEIGHT: i32 = 1;

/// Bonus when any price keyword is present
pub const PRICE_BONUS: i32 = 2;

/// Bonus when any delivery or contact keyword is present
pub const DELIVERY_BONUS: i32 = 1;

/// Penalty per navigation keyword present
pub const NAVIGATION_PENALTY: i32 = 5;

/// Lowest score a phase 2 candidate needs to be accepted
pub const ACCEPT_SCORE: i32 = 3;

#[derive(Debug)]
struct ExtractionCandidate {
    text: String,
    score: i32,
}

/// Finds, cleans and returns the description of an item page
pub(crate) fn find_description(document: &Html, rules: &SiteRules) -> Option<String> {
    let raw = structured_description(document, rules)
        .or_else(|| scored_description(document, rules))?;

    let cleaned = clean::clean_description(&raw, &rules.boilerplate);
    (!cleaned.is_empty()).then_some(cleaned)
}

fn structured_description(document: &Html, rules: &SiteRules) -> Option<String> {
    for selector in &rules.description_containers {
        for element in document.select(selector) {
            let text = element_text(element);
            if text.chars().count() < MIN_DESCRIPTION_CHARS {
                continue;
            }

            let upper = text.to_uppercase();
            let has_marker = rules.emoji_markers.iter().any(|m| text.contains(m.as_str()));
            let has_spec = rules.spec_keywords.iter().any(|k| upper.contains(k.as_str()));

            if has_marker || has_spec {
                return Some(text);
            }
        }
    }
    None
}

fn scored_description(document: &Html, rules: &SiteRules) -> Option<String> {
    let mut best: Option<ExtractionCandidate> = None;

    for element in document.select(&rules.block_elements) {
        let text = element_text(element);
        let len = text.chars().count();
        if !(MIN_DESCRIPTION_CHARS..=MAX_CANDIDATE_CHARS).contains(&len) {
            continue;
        }

        let score = score_text(&text, rules);
        if best.as_ref().map_or(true, |b| score > b.score) {
            best = Some(ExtractionCandidate { text, score });
        }
    }

    best.filter(|c| c.score >= ACCEPT_SCORE).map(|c| c.text)
}

/// Scores a block of text on listing-body signals
///
/// Each keyword counts once no matter how often it occurs. Keywords are
/// matched against the upper-cased text, emoji markers against the raw text.
pub fn score_text(text: &str, rules: &SiteRules) -> i32 {
    let upper = text.to_uppercase();
    let count = |keywords: &[String], haystack: &str| {
        keywords.iter().filter(|k| haystack.contains(k.as_str())).count() as i32
    };
    let any = |keywords: &[String]| keywords.iter().any(|k| upper.contains(k.as_str()));

    let mut score = EMOJI_WEIGHT * count(&rules.emoji_markers, text)
        + SPEC_WEIGHT * count(&rules.spec_keywords, &upper)
        + COMPONENT_WEIGHT * count(&rules.component_keywords, &upper)
        - NAVIGATION_PENALTY * count(&rules.navigation_keywords, &upper);

    if any(&rules.price_keywords) {
        score += PRICE_BONUS;
    }
    if any(&rules.delivery_keywords) {
        score += DELIVERY_BONUS;
    }

    score
}
