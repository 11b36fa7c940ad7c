//! Harvester - per-category orchestration
//!
//! A run moves through five phases:
//! - INIT: open the resume ledger and the record store, read robots.txt
//! - DISCOVER: reuse the link cache, or walk the listing pages and write it
//! - SAMPLE: harvest the first pending link alone and check it has a title
//! - DRAIN: fetch and extract the other pending links in chunks with a
//!   bounded worker set
//! - DONE: flush the sink and report statistics
//!
//! Records reach the sink in completion order, which is not deterministic.

use crate::config::{CategoryEntry, Config, OutputFormat};
use crate::crawler::fetcher::Fetcher;
use crate::crawler::frontier::{Frontier, ListingMatchers};
use crate::crawler::identity::IdentityPool;
use crate::crawler::throttle::AdaptiveThrottle;
use crate::extract::{ExtractedRecord, Extractor, NOT_AVAILABLE};
use crate::output::{open_store, BatchSink, RunStats};
use crate::robots::{fetch_robots, RobotsPolicy};
use crate::state::ResumeLedger;
use crate::{ConfigError, FetchFailure, HarvestError};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use url::Url;

/// Records between two progress log lines
pub const PROGRESS_INTERVAL: usize = 25;

/// Characters of the sample title shown in the log
const SAMPLE_TITLE_CHARS: usize = 50;

/// Files of one category inside the output directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryPaths {
    /// Newline-delimited discovered item links
    pub links: PathBuf,
    /// Resume ledger
    pub progress: PathBuf,
    /// Record store
    pub records: PathBuf,
}

impl CategoryPaths {
    pub fn new(output_dir: &Path, name: &str, format: OutputFormat) -> Self {
        Self {
            links: output_dir.join(format!("{}_links.txt", name)),
            progress: output_dir.join(format!("{}_progress.txt", name)),
            records: output_dir.join(format!("{}_products.{}", name, format.extension())),
        }
    }
}

/// Harvests one category
pub struct Harvester {
    config: Arc<Config>,
    category: CategoryEntry,
    root: Url,
    paths: CategoryPaths,
    fetcher: Arc<Fetcher>,
    extractor: Arc<Extractor>,
    matchers: ListingMatchers,
}

impl Harvester {
    /// Creates a harvester for `category`
    ///
    /// Builds the identity pool (one identity per worker), the shared
    /// throttle and the compiled site rules. Nothing is read from disk or
    /// the network yet.
    ///
    /// # Returns
    ///
    /// * `Ok(Harvester)` - Ready to run
    /// * `Err(HarvestError)` - Invalid category URL, selector or HTTP client setup
    pub fn new(config: &Config, category: &CategoryEntry) -> Result<Self, HarvestError> {
        let root = Url::parse(&category.url)
            .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", category.url, e)))?;

        let identities = IdentityPool::new(
            config.harvest.max_workers as usize,
            &config.identity,
            config.retry.request_timeout(),
        )?;
        let throttle = AdaptiveThrottle::from_config(&config.throttle);
        let fetcher = Fetcher::new(Arc::new(identities), Arc::new(throttle), &config.retry);

        let paths = CategoryPaths::new(
            &config.harvest.output_dir,
            &category.name,
            config.harvest.output_format,
        );

        Ok(Self {
            config: Arc::new(config.clone()),
            category: category.clone(),
            root,
            paths,
            fetcher: Arc::new(fetcher),
            extractor: Arc::new(Extractor::new(&config.site)?),
            matchers: ListingMatchers::compile(&config.site.listing_selectors)?,
        })
    }

    pub fn paths(&self) -> &CategoryPaths {
        &self.paths
    }

    pub fn throttle(&self) -> &AdaptiveThrottle {
        self.fetcher.throttle()
    }

    /// Deletes the link cache so the next run discovers again
    ///
    /// Returns true if a cache file was removed. The ledger is left alone.
    pub fn clear_link_cache(&self) -> std::io::Result<bool> {
        match std::fs::remove_file(&self.paths.links) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Runs the whole harvest of the category
    ///
    /// # Returns
    ///
    /// * `Ok(RunStats)` - The run completed; individual fetch failures are
    ///   counted, not returned
    /// * `Err(HarvestError)` - Fatal discovery outcome, a rejected sample or a
    ///   local I/O failure
    pub async fn run(&self) -> Result<RunStats, HarvestError> {
        let started = Instant::now();
        let mut stats = RunStats::new(&self.category.name);
        tracing::info!("Starting category '{}' at {}", self.category.name, self.root);

        // INIT
        std::fs::create_dir_all(&self.config.harvest.output_dir)?;
        let ledger = Arc::new(ResumeLedger::open(&self.paths.progress)?);
        let store = open_store(self.config.harvest.output_format, &self.paths.records)?;
        let sink = Arc::new(BatchSink::new(store, self.config.harvest.batch_size));
        tracing::info!("{} URLs already processed", ledger.len());

        let robots = self.load_robots().await;

        // DISCOVER
        let links = self.discover(&ledger, &mut stats).await?;
        let pending = self.select_pending(links, &ledger, &robots, &mut stats);
        tracing::info!(
            "{} links pending ({} already processed, {} blocked by robots.txt)",
            stats.pending,
            stats.skipped,
            stats.blocked_by_robots
        );

        // SAMPLE
        let remaining: &[String] = match pending.split_first() {
            Some((first, rest)) => {
                self.harvest_sample(first, &ledger, &sink, &mut stats).await?;
                rest
            }
            None => &[],
        };

        // DRAIN
        let chunk_size = self.config.harvest.chunk_size.max(1);
        let chunk_total = remaining.len().div_ceil(chunk_size);
        for (index, chunk) in remaining.chunks(chunk_size).enumerate() {
            let chunk_started = Instant::now();
            let (harvested, failed) = self.drain_chunk(chunk, &ledger, &sink, &mut stats).await?;
            sink.drain()?;

            let elapsed = chunk_started.elapsed();
            stats.chunk_timings.push(elapsed);
            tracing::info!(
                "Chunk {}/{}: {} records, {} failed in {:.1}s (delay {:.2}s)",
                index + 1,
                chunk_total,
                harvested,
                failed,
                elapsed.as_secs_f64(),
                self.throttle().current_delay().as_secs_f64()
            );
        }

        // DONE
        sink.drain()?;
        stats.flushes = sink.flush_count();
        stats.written = sink.written();
        stats.stored = sink.persisted()?;
        stats.elapsed = started.elapsed();
        tracing::info!(
            "Category '{}' complete: {} records, {} failed in {:.1}s",
            self.category.name,
            stats.harvested,
            stats.failed,
            stats.elapsed.as_secs_f64()
        );

        Ok(stats)
    }

    async fn load_robots(&self) -> RobotsPolicy {
        if !self.config.harvest.respect_robots_txt {
            return RobotsPolicy::allow_all();
        }

        let identity = self.fetcher.identities().primary();
        let robots = fetch_robots(identity.client(), &self.root).await;
        if let Some(requested) = robots.crawl_delay(identity.user_agent()) {
            let delay = requested.min(self.config.throttle.max_crawl_delay());
            if delay < requested {
                tracing::warn!(
                    "robots.txt asks for a {:.1}s crawl-delay, capped at {:.1}s",
                    requested.as_secs_f64(),
                    delay.as_secs_f64()
                );
            } else {
                tracing::info!("Honouring robots.txt crawl-delay of {:.1}s", delay.as_secs_f64());
            }
            self.throttle().raise_floor(delay);
        }
        robots
    }

    /// Returns the known item links, from the cache or from a fresh discovery
    async fn discover(
        &self,
        ledger: &ResumeLedger,
        stats: &mut RunStats,
    ) -> Result<Vec<String>, HarvestError> {
        if let Some(cached) = read_link_cache(&self.paths.links)? {
            tracing::info!(
                "Reusing {} cached links from {}",
                cached.len(),
                self.paths.links.display()
            );
            stats.from_cache = true;
            stats.discovered = cached.len();
            return Ok(cached);
        }

        let mut frontier = Frontier::new(
            &self.fetcher,
            &self.matchers,
            ledger,
            self.root.clone(),
            &self.category.link_filters,
            &self.config.frontier,
            self.config.retry.time_unit(),
        );
        let links = frontier.discover().await?;

        write_link_cache(&self.paths.links, &links)?;
        tracing::info!(
            "Discovered {} new links over {} pages",
            links.len(),
            frontier.cursor().page_number
        );

        stats.discovered = links.len();
        Ok(links)
    }

    /// Drops robots-disallowed, already processed and duplicate links
    fn select_pending(
        &self,
        links: Vec<String>,
        ledger: &ResumeLedger,
        robots: &RobotsPolicy,
        stats: &mut RunStats,
    ) -> Vec<String> {
        let agent = self.fetcher.identities().primary();
        let mut unique = HashSet::new();
        let mut pending = Vec::with_capacity(links.len());

        for link in links {
            if !unique.insert(link.clone()) {
                continue;
            }
            if ledger.contains(&link) {
                stats.skipped += 1;
                continue;
            }
            let allowed = Url::parse(&link)
                .map(|url| robots.allows(&url, agent.user_agent()))
                .unwrap_or(false);
            if !allowed {
                stats.blocked_by_robots += 1;
                continue;
            }
            pending.push(link);
        }

        stats.pending = pending.len();
        pending
    }

    /// Harvests `url` on its own before the bulk drain
    ///
    /// A record without a title usually means the `[site]` selectors no
    /// longer match the pages. That is logged as a warning, or returned as
    /// `BadSample` when `abort-on-bad-sample` is set. Otherwise the sample
    /// is kept as the first record of the run.
    async fn harvest_sample(
        &self,
        url: &str,
        ledger: &ResumeLedger,
        sink: &BatchSink,
        stats: &mut RunStats,
    ) -> Result<(), HarvestError> {
        tracing::info!("Testing extraction on {}", url);

        let body = match self.fetcher.fetch(url).await {
            Ok(body) => body,
            Err(failure) => {
                tracing::warn!("Sample fetch failed, extraction not checked: {}", failure);
                stats.failed += 1;
                return Ok(());
            }
        };

        let record = self.extractor.extract(&body, url);
        if record.title == NOT_AVAILABLE {
            if self.config.harvest.abort_on_bad_sample {
                return Err(HarvestError::BadSample {
                    url: url.to_string(),
                });
            }
            tracing::warn!(
                "Sample has no title, extraction might have issues. Check the [site] selectors."
            );
        } else {
            let shown: String = record.title.chars().take(SAMPLE_TITLE_CHARS).collect();
            tracing::info!("Extraction working, sample: {}", shown);
        }

        stats.sample_title = Some(record.title.clone());
        self.accept(url, record, ledger, sink, stats)?;
        Ok(())
    }

    /// Records a harvested link in the ledger, then hands its record to the sink
    fn accept(
        &self,
        url: &str,
        record: ExtractedRecord,
        ledger: &ResumeLedger,
        sink: &BatchSink,
        stats: &mut RunStats,
    ) -> Result<(), HarvestError> {
        ledger.record(url)?;
        sink.submit(record)?;
        stats.harvested += 1;
        if stats.harvested % PROGRESS_INTERVAL == 0 {
            tracing::info!("{} records harvested...", stats.harvested);
        }
        Ok(())
    }

    /// Fetches and extracts one chunk with at most `max_workers` tasks in flight
    ///
    /// Returns the number of records harvested and failed in this chunk.
    async fn drain_chunk(
        &self,
        chunk: &[String],
        ledger: &ResumeLedger,
        sink: &BatchSink,
        stats: &mut RunStats,
    ) -> Result<(usize, usize), HarvestError> {
        let semaphore = Arc::new(Semaphore::new(self.config.harvest.max_workers as usize));
        let mut tasks = JoinSet::new();

        for url in chunk {
            let url = url.clone();
            let semaphore = Arc::clone(&semaphore);
            let fetcher = Arc::clone(&self.fetcher);
            let extractor = Arc::clone(&self.extractor);

            tasks.spawn(async move {
                let outcome = harvest_one(&url, &semaphore, &fetcher, &extractor).await;
                (url, outcome)
            });
        }

        let (mut harvested, mut failed) = (0, 0);
        while let Some(joined) = tasks.join_next().await {
            let (url, outcome) = joined?;
            match outcome {
                Ok(record) => {
                    self.accept(&url, record, ledger, sink, stats)?;
                    harvested += 1;
                }
                Err(failure) => {
                    tracing::warn!("{}", failure);
                    failed += 1;
                    stats.failed += 1;
                }
            }
        }

        Ok((harvested, failed))
    }
}

async fn harvest_one(
    url: &str,
    semaphore: &Semaphore,
    fetcher: &Fetcher,
    extractor: &Extractor,
) -> Result<ExtractedRecord, FetchFailure> {
    // The semaphore is never closed
    let _permit = semaphore.acquire().await.ok();
    let body = fetcher.fetch(url).await?;
    Ok(extractor.extract(&body, url))
}

/// Harvests a single category with a fresh harvester
pub async fn run_category(
    config: &Config,
    category: &CategoryEntry,
) -> Result<RunStats, HarvestError> {
    Harvester::new(config, category)?.run().await
}

/// Reads the link cache; None when it is missing or holds no links
fn read_link_cache(path: &Path) -> std::io::Result<Option<Vec<String>>> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };

    let links: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect();

    Ok((!links.is_empty()).then_some(links))
}

fn write_link_cache(path: &Path, links: &[String]) -> std::io::Result<()> {
    let mut content = links.join("\n");
    if !content.is_empty() {
        content.push('\n');
    }
    std::fs::write(path, content)
}
