//! Sumi-Harvest: a polite, resumable listing harvester
//!
//! This crate discovers item pages on a listing site, extracts a fixed-shape
//! product record from each one and persists the records in batches. Every
//! processed URL is appended to a resume ledger so that a killed run can be
//! restarted without fetching anything twice.

pub mod config;
pub mod crawler;
pub mod extract;
pub mod output;
pub mod robots;
pub mod state;
pub mod url;

use thiserror::Error;

/// Main error type for Sumi-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The first listing page could not be fetched at all
    #[error("Category endpoint unreachable: {0}")]
    CategoryUnreachable(#[source] FetchFailure),

    /// The first listing page was fetched but no listing matcher found any item
    #[error("No listing items found on the first page of {url}")]
    EmptyCategory { url: String },

    /// The sample record had no title and the run was told to stop on that
    #[error("Sample extraction from {url} found no title; check the [site] selectors")]
    BadSample { url: String },

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HarvestError {
    /// Returns true for the discovery outcomes that abort a whole category run
    pub fn is_fatal_discovery(&self) -> bool {
        matches!(
            self,
            Self::CategoryUnreachable(_) | Self::EmptyCategory { .. }
        )
    }
}

/// Outcome of a single fetch attempt that did not produce content
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Connection, TLS, timeout or body read failure
    #[error("transport failure: {0}")]
    Transport(String),

    /// The remote answered with HTTP 429
    #[error("rate limited by remote (HTTP 429)")]
    RateLimited,

    /// Any other non-success status
    #[error("unexpected HTTP status {0}")]
    UnexpectedStatus(u16),
}

/// A URL that could not be fetched within the attempt budget
#[derive(Debug, Clone, Error)]
#[error("gave up on {url} after {attempts} attempt(s): {last}")]
pub struct FetchFailure {
    pub url: String,
    pub attempts: u32,
    pub last: FetchError,
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid CSS selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,
}

// Re-export commonly used types
pub use config::Config;
pub use crawler::Harvester;
pub use extract::{ExtractedRecord, Extractor, NOT_AVAILABLE};
pub use output::RunStats;
pub use state::ResumeLedger;
