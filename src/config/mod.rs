//! Configuration module for Sumi-Harvest
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every section is optional and falls back to the reference harvesting policy;
//! only the `[[category]]` list must be provided.
//!
//! # Example
//!
//! ```no_run
//! use sumi_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Harvesting with {} workers", config.harvest.max_workers);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    CategoryEntry, Config, FrontierConfig, HarvestConfig, IdentityConfig, OutputFormat,
    RetryConfig, SiteConfig, ThrottleConfig,
};

// Re-export parser functions
pub use parser::{config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate;
