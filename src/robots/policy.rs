//! Robots.txt policy for one host
//!
//! Allow/disallow matching is delegated to the robotstxt crate. Crawl-delay is
//! not part of the matcher, so it is read here from the agent groups.

use robotstxt::DefaultMatcher;
use std::time::Duration;
use url::Url;

/// Parsed robots.txt of the category host
#[derive(Debug, Clone, Default)]
pub struct RobotsPolicy {
    /// Raw robots.txt body; None means allow all
    content: Option<String>,
}

impl RobotsPolicy {
    pub fn from_content(content: &str) -> Self {
        Self {
            content: Some(content.to_string()),
        }
    }

    /// A policy that allows everything, used when robots.txt is missing
    pub fn allow_all() -> Self {
        Self { content: None }
    }

    pub fn is_allow_all(&self) -> bool {
        self.content.as_deref().map_or(true, |c| c.trim().is_empty())
    }

    /// Checks whether `user_agent` may fetch `url`
    ///
    /// Full browser user agents are reduced to their product token
    /// (`Mozilla/5.0 (...)` becomes `Mozilla`) before matching.
    pub fn allows(&self, url: &Url, user_agent: &str) -> bool {
        match self.content.as_deref() {
            Some(content) if !content.trim().is_empty() => {
                let mut matcher = DefaultMatcher::default();
                matcher.one_agent_allowed_by_robots(content, product_token(user_agent), url.as_str())
            }
            _ => true,
        }
    }

    /// Crawl-delay for `user_agent`
    ///
    /// A group naming the agent wins over the `*` group.
    pub fn crawl_delay(&self, user_agent: &str) -> Option<Duration> {
        let content = self.content.as_deref()?;
        let token = product_token(user_agent).to_ascii_lowercase();

        let mut group: Vec<String> = Vec::new();
        let mut collecting_agents = false;
        let mut specific = None;
        let mut wildcard = None;

        for line in content.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim().to_ascii_lowercase();
            let value = value.trim();

            if key == "user-agent" {
                if !collecting_agents {
                    group.clear();
                    collecting_agents = true;
                }
                group.push(value.to_ascii_lowercase());
                continue;
            }
            collecting_agents = false;

            if key != "crawl-delay" {
                continue;
            }
            let Some(delay) = value
                .parse::<f64>()
                .ok()
                .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
            else {
                continue;
            };
            if group.iter().any(|agent| *agent == token) {
                specific.get_or_insert(delay);
            } else if group.iter().any(|agent| agent == "*") {
                wildcard.get_or_insert(delay);
            }
        }

        specific.or(wildcard)
    }
}

/// Product token of a user agent string
fn product_token(user_agent: &str) -> &str {
    user_agent
        .split(|c: char| c == '/' || c.is_whitespace())
        .next()
        .unwrap_or(user_agent)
}
