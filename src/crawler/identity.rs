//! Identity pool for outbound requests
//!
//! An identity is a fixed header profile (user agent, language preference and
//! a few browser-like accept headers) with its own pre-built HTTP client.
//! Workers take identities from the pool in strict round-robin order.

use crate::config::IdentityConfig;
use crate::ConfigError;
use reqwest::header::{
    HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, DNT,
    UPGRADE_INSECURE_REQUESTS, USER_AGENT,
};
use reqwest::Client;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const ACCEPT_HTML: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";

/// An immutable outbound header profile
#[derive(Debug)]
pub struct Identity {
    user_agent: String,
    client: Client,
}

impl Identity {
    /// Builds an identity and its HTTP client
    pub fn new(
        user_agent: &str,
        accept_language: &str,
        timeout: Duration,
    ) -> Result<Self, crate::HarvestError> {
        let headers = identity_headers(user_agent, accept_language)?;
        let client = build_http_client(headers, timeout)?;

        Ok(Self {
            user_agent: user_agent.to_string(),
            client,
        })
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// The client carrying this identity's default headers
    pub fn client(&self) -> &Client {
        &self.client
    }
}

/// Builds the header set sent with every request of one identity
pub fn identity_headers(user_agent: &str, accept_language: &str) -> Result<HeaderMap, ConfigError> {
    let value = |raw: &str| {
        HeaderValue::from_str(raw)
            .map_err(|e| ConfigError::Validation(format!("Invalid header value '{}': {}", raw, e)))
    };

    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, value(user_agent)?);
    headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));
    headers.insert(ACCEPT_LANGUAGE, value(accept_language)?);
    headers.insert(DNT, HeaderValue::from_static("1"));
    headers.insert(UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("max-age=0"));
    Ok(headers)
}

/// Builds an HTTP client with the given default headers
///
/// Redirects are followed (listing sites commonly redirect item pages to a
/// canonical slug) and compressed bodies are decoded transparently.
pub fn build_http_client(headers: HeaderMap, timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .default_headers(headers)
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fixed-size pool of identities handed out round-robin
#[derive(Debug)]
pub struct IdentityPool {
    identities: Vec<Arc<Identity>>,
    cursor: Mutex<usize>,
}

impl IdentityPool {
    /// Creates a pool of `size` identities
    ///
    /// User agents are taken from the configuration modulo its length, so a
    /// pool larger than the agent list repeats agents in order.
    pub fn new(
        size: usize,
        config: &IdentityConfig,
        timeout: Duration,
    ) -> Result<Self, crate::HarvestError> {
        if config.user_agents.is_empty() {
            return Err(ConfigError::Validation("at least one user agent is required".into()).into());
        }

        let identities = (0..size.max(1))
            .map(|i| {
                let agent = &config.user_agents[i % config.user_agents.len()];
                Identity::new(agent, &config.accept_language, timeout).map(Arc::new)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            identities,
            cursor: Mutex::new(0),
        })
    }

    /// Returns the next identity and advances the cursor
    pub fn assign(&self) -> Arc<Identity> {
        let mut cursor = self.cursor.lock().unwrap_or_else(|e| e.into_inner());
        let identity = Arc::clone(&self.identities[*cursor]);
        *cursor = (*cursor + 1) % self.identities.len();
        identity
    }

    /// The first identity, used for one-off requests such as robots.txt
    pub fn primary(&self) -> Arc<Identity> {
        Arc::clone(&self.identities[0])
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }
}
