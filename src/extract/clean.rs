//! Description post-processing

use regex::Regex;

/// Descriptions longer than this (in characters) are summarized
pub const MAX_DESCRIPTION_CHARS: usize = 800;

/// Sentences kept when summarizing
pub const SUMMARY_SENTENCES: usize = 5;

/// Sentences of this length or shorter are skipped when summarizing
pub const MIN_SENTENCE_CHARS: usize = 10;

/// Replaces every run of whitespace with a single space and trims the ends
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cleans a raw description
///
/// # Steps
///
/// 1. Collapse whitespace
/// 2. Remove every boilerplate pattern, in order
/// 3. Trim
/// 4. Summarize if longer than [`MAX_DESCRIPTION_CHARS`]
///
/// Returns an empty string when nothing is left.
pub fn clean_description(raw: &str, boilerplate: &[Regex]) -> String {
    let mut text = collapse_whitespace(raw);

    for pattern in boilerplate {
        if let std::borrow::Cow::Owned(stripped) = pattern.replace_all(&text, "") {
            text = stripped;
        }
    }

    let text = text.trim();
    if text.chars().count() > MAX_DESCRIPTION_CHARS {
        if let Some(summary) = summarize(text) {
            return summary;
        }
    }

    text.to_string()
}

/// Keeps the first sentences longer than [`MIN_SENTENCE_CHARS`]
///
/// Returns None when no sentence qualifies, in which case the caller keeps
/// the full text.
fn summarize(text: &str) -> Option<String> {
    let sentences: Vec<&str> = text
        .split('.')
        .map(str::trim)
        .filter(|s| s.chars().count() > MIN_SENTENCE_CHARS)
        .take(SUMMARY_SENTENCES)
        .collect();

    if sentences.is_empty() {
        None
    } else {
        Some(format!("{}.", sentences.join(". ")))
    }
}
