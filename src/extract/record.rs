use super::NOT_AVAILABLE;
use serde::{Deserialize, Serialize};

/// Column names of the record sink, in write order
pub const RECORD_COLUMNS: [&str; 7] = [
    "Title",
    "Price",
    "Condition",
    "Description",
    "Post Date",
    "URL",
    "Scraped at",
];

/// Timestamp format of `scraped_at` (local time)
pub const SCRAPED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A product record extracted from one item page
///
/// The shape is fixed: every field is always present and holds
/// [`NOT_AVAILABLE`] when the page did not yield a value. The URL is the
/// record identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedRecord {
    #[serde(rename = "Title")]
    pub title: String,

    #[serde(rename = "Price")]
    pub price: String,

    #[serde(rename = "Condition")]
    pub condition: String,

    #[serde(rename = "Description")]
    pub description: String,

    #[serde(rename = "Post Date")]
    pub post_date: String,

    #[serde(rename = "URL")]
    pub url: String,

    #[serde(rename = "Scraped at")]
    pub scraped_at: String,
}

impl ExtractedRecord {
    /// Creates a record for `url` with every other field set to the sentinel
    /// and `scraped_at` set to now
    pub fn empty(url: &str) -> Self {
        Self {
            title: NOT_AVAILABLE.to_string(),
            price: NOT_AVAILABLE.to_string(),
            condition: NOT_AVAILABLE.to_string(),
            description: NOT_AVAILABLE.to_string(),
            post_date: NOT_AVAILABLE.to_string(),
            url: url.to_string(),
            scraped_at: chrono::Local::now().format(SCRAPED_AT_FORMAT).to_string(),
        }
    }

    /// Field values in column order
    pub fn values(&self) -> [&str; 7] {
        [
            &self.title,
            &self.price,
            &self.condition,
            &self.description,
            &self.post_date,
            &self.url,
            &self.scraped_at,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_record_uses_sentinel() {
        let record = ExtractedRecord::empty("https://shop.example.com/item/1");
        assert_eq!(record.title, NOT_AVAILABLE);
        assert_eq!(record.description, NOT_AVAILABLE);
        assert_eq!(record.url, "https://shop.example.com/item/1");
        assert!(chrono::NaiveDateTime::parse_from_str(&record.scraped_at, SCRAPED_AT_FORMAT).is_ok());
    }

    #[test]
    fn test_values_follow_column_order() {
        let mut record = ExtractedRecord::empty("u");
        record.title = "t".to_string();
        record.post_date = "d".to_string();
        let values = record.values();
        assert_eq!(values[0], "t");
        assert_eq!(values[4], "d");
        assert_eq!(values[5], "u");
        assert_eq!(values.len(), RECORD_COLUMNS.len());
    }
}
