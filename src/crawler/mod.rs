//! Crawler module for listing discovery and item harvesting
//!
//! This module contains the core harvesting logic, including:
//! - Identity rotation for outbound requests
//! - Adaptive throttling between fetches
//! - HTTP fetching with retry logic
//! - Paginated item link discovery
//! - Per-category run coordination

mod coordinator;
mod fetcher;
mod frontier;
mod identity;
mod throttle;

pub use coordinator::{run_category, CategoryPaths, Harvester, PROGRESS_INTERVAL};
pub use fetcher::{fetch_once, Fetcher, BACKOFF_UNITS, RATE_LIMIT_COOLDOWN_UNITS};
pub use frontier::{Frontier, FrontierCursor, ListingMatchers, PAGE_PAUSE_UNITS};
pub use identity::{build_http_client, identity_headers, Identity, IdentityPool};
pub use throttle::{
    AdaptiveThrottle, ErrorSignal, ThrottleState, ERROR_GROWTH, ERROR_STREAK, RATE_LIMIT_GROWTH,
    RELIEF_FACTOR, SUCCESS_STREAK,
};
