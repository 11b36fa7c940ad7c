//! Integration tests for the harvester
//!
//! These tests use wiremock to stand in for a listing site and tempfile
//! directories for the link cache, ledger and record files. All delays run on
//! a 1ms time unit.

mod frontier_tests;
mod harvest_tests;

use std::path::Path;
use sumi_harvest::config::{CategoryEntry, Config};

/// Creates a test configuration writing into `output_dir`
pub fn create_test_config(output_dir: &Path) -> Config {
    let mut config = Config::default();
    config.harvest.output_dir = output_dir.to_path_buf();
    config.harvest.max_workers = 3;
    config.harvest.chunk_size = 5;
    config.harvest.respect_robots_txt = false;
    config.harvest.category_pause_secs = 0;
    config.throttle.base_delay_ms = 1;
    config.throttle.min_delay_ms = Some(1);
    config.throttle.max_delay_ms = 50;
    config.throttle.jitter_ms = 0;
    config.retry.max_attempts = 3;
    config.retry.time_unit_ms = 1;
    config.retry.request_timeout_secs = 5;
    config
}

pub fn category(server_uri: &str) -> CategoryEntry {
    CategoryEntry {
        name: "laptops".to_string(),
        url: format!("{}/laptops", server_uri),
        link_filters: vec!["/laptops/".to_string()],
    }
}

/// Item hrefs `/laptops/item_{i}.htm` for every i in `range`
pub fn item_hrefs(range: std::ops::Range<usize>) -> Vec<String> {
    range.map(|i| format!("/laptops/item_{}.htm", i)).collect()
}

/// A listing page linking to `hrefs`, plus some navigation noise
pub fn listing_page(hrefs: &[String]) -> String {
    let items: String = hrefs
        .iter()
        .map(|href| format!(r#"<li><a data-testid="item-link" href="{}">item</a></li>"#, href))
        .collect();

    format!(
        r#"<html><body>
            <nav><a href="/">Accueil</a><a href="/account">Compte</a></nav>
            <ul>{}</ul>
        </body></html>"#,
        items
    )
}

pub fn item_page(title: &str) -> String {
    format!(
        r#"<html><body>
            <h1>{}</h1>
            <p data-testid="price">3 999 DH</p>
            <span data-testid="condition">Neuf</span>
            <time datetime="2025-02-01T09:00:00Z">hier</time>
            <div data-testid="ad-description">
                ✅ Processeur Intel Core i7, RAM 16GB, SSD 512GB, livraison partout
            </div>
        </body></html>"#,
        title
    )
}
