//! Robots.txt handling module
//!
//! The harvester fetches robots.txt of the category host once per run. The
//! resulting policy filters discovered item links and may raise the throttle
//! floor through its crawl-delay.

mod policy;

pub use policy::RobotsPolicy;

use reqwest::Client;
use url::Url;

/// Fetches robots.txt for the host of `root`
///
/// Never fails: a missing file, an error status or a transport failure all
/// yield an allow-all policy.
///
/// # Arguments
///
/// * `client` - Client of the identity used for the request
/// * `root` - Any URL on the host
pub async fn fetch_robots(client: &Client, root: &Url) -> RobotsPolicy {
    let robots_url = match root.join("/robots.txt") {
        Ok(url) => url,
        Err(e) => {
            tracing::warn!("Cannot build robots.txt URL for {}: {}", root, e);
            return RobotsPolicy::allow_all();
        }
    };

    let response = match client.get(robots_url.as_str()).send().await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!("Failed to fetch {}: {}, allowing all", robots_url, e);
            return RobotsPolicy::allow_all();
        }
    };

    if !response.status().is_success() {
        tracing::info!(
            "No usable robots.txt at {} (HTTP {}), allowing all",
            robots_url,
            response.status().as_u16()
        );
        return RobotsPolicy::allow_all();
    }

    match response.text().await {
        Ok(body) => {
            tracing::info!("Loaded robots.txt from {}", robots_url);
            RobotsPolicy::from_content(&body)
        }
        Err(e) => {
            tracing::warn!("Failed to read {}: {}, allowing all", robots_url, e);
            RobotsPolicy::allow_all()
        }
    }
}
