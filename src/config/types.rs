use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for Sumi-Harvest
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub harvest: HarvestConfig,
    #[serde(default)]
    pub throttle: ThrottleConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub frontier: FrontierConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default, rename = "category")]
    pub categories: Vec<CategoryEntry>,
}

impl Config {
    /// Looks up a configured category by name
    pub fn category(&self, name: &str) -> Option<&CategoryEntry> {
        self.categories.iter().find(|c| c.name == name)
    }
}

/// Worker pool and persistence settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct HarvestConfig {
    /// Number of concurrent fetch+extract tasks per chunk, also the identity pool size
    pub max_workers: u32,

    /// Number of pending URLs handed to the worker set at a time
    pub chunk_size: usize,

    /// Number of records buffered before a sink flush
    pub batch_size: usize,

    /// Directory holding link caches, ledgers and record files
    pub output_dir: PathBuf,

    pub output_format: OutputFormat,

    /// Drop discovered links that robots.txt disallows
    pub respect_robots_txt: bool,

    /// Pause between two categories in the binary runner (seconds)
    pub category_pause_secs: u64,

    /// Stop the category when the sample record comes back without a title
    pub abort_on_bad_sample: bool,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            max_workers: 7,
            chunk_size: 100,
            batch_size: 10,
            output_dir: PathBuf::from("."),
            output_format: OutputFormat::Csv,
            respect_robots_txt: true,
            category_pause_secs: 15,
            abort_on_bad_sample: false,
        }
    }
}

/// Durable record store backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Csv,
    Sqlite,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Sqlite => "db",
        }
    }
}

/// Adaptive throttle bounds (milliseconds)
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ThrottleConfig {
    /// Starting delay before every fetch
    pub base_delay_ms: u64,

    /// Lowest delay the throttle may relax to; defaults to the base delay
    pub min_delay_ms: Option<u64>,

    /// Highest delay the throttle may escalate to
    pub max_delay_ms: u64,

    /// Upper bound of the random jitter added to every delay
    pub jitter_ms: u64,

    /// Largest robots.txt crawl-delay honoured; longer delays are cut to this
    pub max_crawl_delay_ms: u64,
}

impl ThrottleConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn floor(&self) -> Duration {
        Duration::from_millis(self.min_delay_ms.unwrap_or(self.base_delay_ms))
    }

    pub fn ceiling(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn jitter(&self) -> Duration {
        Duration::from_millis(self.jitter_ms)
    }

    pub fn max_crawl_delay(&self) -> Duration {
        Duration::from_millis(self.max_crawl_delay_ms)
    }
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 800,
            min_delay_ms: None,
            max_delay_ms: 6_000,
            jitter_ms: 500,
            max_crawl_delay_ms: 30_000,
        }
    }
}

/// Fetch retry policy
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RetryConfig {
    pub max_attempts: u32,

    /// Base unit for cooldowns and backoffs (rate-limit cooldown is `attempt * 10` units)
    pub time_unit_ms: u64,

    pub request_timeout_secs: u64,
}

impl RetryConfig {
    pub fn time_unit(&self) -> Duration {
        Duration::from_millis(self.time_unit_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            time_unit_ms: 1_000,
            request_timeout_secs: 15,
        }
    }
}

/// Listing pagination settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct FrontierConfig {
    /// Query parameter carrying the page number on pages after the first
    pub page_param: String,

    /// A page after the first yielding fewer new links than this ends discovery
    pub min_new_links: usize,

    /// Hard cap on listing pages per discovery
    pub max_pages: Option<u32>,
}

impl Default for FrontierConfig {
    fn default() -> Self {
        Self {
            page_param: "o".to_string(),
            min_new_links: 5,
            max_pages: None,
        }
    }
}

/// Outbound header profiles
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct IdentityConfig {
    /// User agents assigned round-robin to the identities of the pool
    pub user_agents: Vec<String>,

    pub accept_language: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            user_agents: vec![
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:120.0) Gecko/20100101 Firefox/120.0".to_string(),
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Safari/605.1.15".to_string(),
            ],
            accept_language: "fr-FR,fr;q=0.9,en-US;q=0.8,en;q=0.7".to_string(),
        }
    }
}

/// Per-site selector and keyword tables
///
/// Every list is ordered: selectors are tried first to last and the first hit
/// wins. Keywords are matched case-insensitively against upper-cased text.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SiteConfig {
    /// Matchers for item links on a listing page (first non-empty match wins)
    pub listing_selectors: Vec<String>,

    pub title_selector: String,
    pub price_selectors: Vec<String>,
    pub condition_selector: String,

    /// Element whose `datetime` attribute holds the post date
    pub date_selector: String,

    /// Structured description containers, tried before the scored search
    pub description_selectors: Vec<String>,

    pub emoji_markers: Vec<String>,
    pub spec_keywords: Vec<String>,
    pub component_keywords: Vec<String>,
    pub price_keywords: Vec<String>,
    pub delivery_keywords: Vec<String>,
    pub navigation_keywords: Vec<String>,

    /// Regexes removed from the chosen description, in order
    pub boilerplate_patterns: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            listing_selectors: strings(&["a[data-testid='item-link']", "article a[href]"]),
            title_selector: "h1".to_string(),
            price_selectors: strings(&["[data-testid='price']", ".price", "span[class*='price']"]),
            condition_selector: "[data-testid='condition']".to_string(),
            date_selector: "time[datetime]".to_string(),
            description_selectors: strings(&[
                "[data-testid='ad-description']",
                ".ad-description",
                "div[class*='description']",
                "[class*='AdDescription']",
                ".description-content",
            ]),
            emoji_markers: strings(&["🔴", "📍", "⚡", "🔋", "✅", "📦", "🚚", "☎️"]),
            spec_keywords: strings(&[
                "PROCESSEUR",
                "PROCESSOR",
                "RAM",
                "SSD",
                "HDD",
                "ECRAN",
                "CARTE GRAPHIQUE",
                "BATTERIE",
                "INTEL",
                "AMD",
                "NVIDIA",
            ]),
            component_keywords: strings(&[
                "RYZEN", "CORE", "DDR4", "DDR5", "NVME", "FULL HD", "4K", "IPS", "WINDOWS",
                "OFFICE",
            ]),
            price_keywords: strings(&["PRIX", "DH"]),
            delivery_keywords: strings(&["LIVRAISON", "CONTACTEZ"]),
            navigation_keywords: strings(&["ACCUEIL", "SE CONNECTER", "PUBLIER", "TOUT LE MAROC"]),
            boilerplate_patterns: strings(&[
                r"Publier une annonce",
                r"Accueil\s*[>»/].*?[>»/]\s*",
            ]),
        }
    }
}

/// A category to harvest
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CategoryEntry {
    /// Short name, used as the prefix of every file of this category
    pub name: String,

    /// First listing page of the category
    pub url: String,

    /// Substrings an item link must contain (any of them); empty accepts all
    #[serde(default)]
    pub link_filters: Vec<String>,
}
