use crate::config::types::{
    CategoryEntry, Config, FrontierConfig, HarvestConfig, IdentityConfig, RetryConfig,
    ThrottleConfig,
};
use crate::crawler::ListingMatchers;
use crate::extract::SiteRules;
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
///
/// Selector and regex tables are compiled here and discarded, so that a bad
/// entry fails at load time rather than on the first page.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_harvest_config(&config.harvest)?;
    validate_throttle_config(&config.throttle)?;
    validate_retry_config(&config.retry)?;
    validate_frontier_config(&config.frontier)?;
    validate_identity_config(&config.identity)?;
    ListingMatchers::compile(&config.site.listing_selectors)?;
    SiteRules::compile(&config.site)?;
    validate_categories(&config.categories)?;
    Ok(())
}

fn validate_harvest_config(config: &HarvestConfig) -> Result<(), ConfigError> {
    if config.max_workers < 1 || config.max_workers > 64 {
        return Err(ConfigError::Validation(format!(
            "max_workers must be between 1 and 64, got {}",
            config.max_workers
        )));
    }

    if config.chunk_size < 1 {
        return Err(ConfigError::Validation(
            "chunk_size must be >= 1".to_string(),
        ));
    }

    if config.batch_size < 1 {
        return Err(ConfigError::Validation(
            "batch_size must be >= 1".to_string(),
        ));
    }

    if config.output_dir.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "output_dir cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_throttle_config(config: &ThrottleConfig) -> Result<(), ConfigError> {
    let floor = config.floor();
    if floor > config.base_delay() {
        return Err(ConfigError::Validation(format!(
            "min_delay_ms ({}ms) cannot exceed base_delay_ms ({}ms)",
            floor.as_millis(),
            config.base_delay_ms
        )));
    }

    if config.base_delay() > config.ceiling() {
        return Err(ConfigError::Validation(format!(
            "base_delay_ms ({}ms) cannot exceed max_delay_ms ({}ms)",
            config.base_delay_ms, config.max_delay_ms
        )));
    }

    Ok(())
}

fn validate_retry_config(config: &RetryConfig) -> Result<(), ConfigError> {
    if config.max_attempts < 1 {
        return Err(ConfigError::Validation(
            "max_attempts must be >= 1".to_string(),
        ));
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "request_timeout_secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_frontier_config(config: &FrontierConfig) -> Result<(), ConfigError> {
    if config.page_param.trim().is_empty() {
        return Err(ConfigError::Validation(
            "page_param cannot be empty".to_string(),
        ));
    }

    if config.max_pages == Some(0) {
        return Err(ConfigError::Validation(
            "max_pages must be >= 1 when set".to_string(),
        ));
    }

    Ok(())
}

fn validate_identity_config(config: &IdentityConfig) -> Result<(), ConfigError> {
    if config.user_agents.is_empty() {
        return Err(ConfigError::Validation(
            "at least one user agent is required".to_string(),
        ));
    }

    if let Some(blank) = config.user_agents.iter().find(|ua| ua.trim().is_empty()) {
        return Err(ConfigError::Validation(format!(
            "user agents cannot be blank, got '{}'",
            blank
        )));
    }

    Ok(())
}

/// Validates category entries: names are used as file prefixes, URLs as roots
fn validate_categories(categories: &[CategoryEntry]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();

    for entry in categories {
        validate_category_name(&entry.name)?;

        if !seen.insert(entry.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate category name '{}'",
                entry.name
            )));
        }

        let url = Url::parse(&entry.url).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid category URL '{}': {}", entry.url, e))
        })?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::InvalidUrl(format!(
                "Category URL '{}' must use http or https",
                entry.url
            )));
        }

        if url.host_str().is_none() {
            return Err(ConfigError::InvalidUrl(format!(
                "Category URL '{}' has no host",
                entry.url
            )));
        }
    }

    Ok(())
}

fn validate_category_name(name: &str) -> Result<(), ConfigError> {
    if name.is_empty() {
        return Err(ConfigError::Validation(
            "category name cannot be empty".to_string(),
        ));
    }

    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ConfigError::Validation(format!(
            "category name must contain only alphanumerics, '-' and '_', got '{}'",
            name
        )));
    }

    Ok(())
}
