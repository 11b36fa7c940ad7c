//! Run statistics
//!
//! This module provides the counters a harvesting run reports and the
//! formatted summary printed by the binary.

use std::time::Duration;

/// Counters of one category run
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    pub category: String,

    /// Item links known after discovery (cache or frontier), before the ledger filter
    pub discovered: usize,

    /// True when discovery was served from the link cache
    pub from_cache: bool,

    /// Links dropped because robots.txt disallows them
    pub blocked_by_robots: usize,

    /// Links skipped because the ledger already holds them
    pub skipped: usize,

    /// Links handed to the workers
    pub pending: usize,

    /// Records extracted and submitted to the sink
    pub harvested: usize,

    /// Links that could not be fetched within the attempt budget
    pub failed: usize,

    /// Title extracted from the sample link, None when no sample was taken
    /// or its fetch failed
    pub sample_title: Option<String>,

    /// Records written to the store by this run
    pub written: usize,

    /// Records the store holds at the end of the run
    pub stored: usize,

    /// Sink flushes performed during the run
    pub flushes: usize,

    /// Wall time of every chunk, in order
    pub chunk_timings: Vec<Duration>,

    pub elapsed: Duration,
}

impl RunStats {
    pub fn new(category: &str) -> Self {
        Self {
            category: category.to_string(),
            ..Self::default()
        }
    }

    /// Share of pending links that produced a record, in percent
    pub fn success_rate(&self) -> f64 {
        if self.pending == 0 {
            0.0
        } else {
            self.harvested as f64 / self.pending as f64 * 100.0
        }
    }

    pub fn records_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.harvested as f64 / secs
        } else {
            0.0
        }
    }
}

/// Prints run statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_run_stats(stats: &RunStats) {
    println!("=== Harvest Statistics: {} ===\n", stats.category);

    println!("Discovery:");
    println!(
        "  Item links: {}{}",
        stats.discovered,
        if stats.from_cache { " (from link cache)" } else { "" }
    );
    if stats.blocked_by_robots > 0 {
        println!("  Blocked by robots.txt: {}", stats.blocked_by_robots);
    }
    println!("  Already processed: {}", stats.skipped);
    println!("  Pending: {}", stats.pending);
    println!();

    println!("Harvest:");
    if let Some(title) = &stats.sample_title {
        println!("  Sample: {}", title);
    }
    println!("  Records: {}", stats.harvested);
    println!("  Failed: {}", stats.failed);
    println!("  Written: {} in {} flushes ({} in store)", stats.written, stats.flushes, stats.stored);
    println!();

    if !stats.chunk_timings.is_empty() {
        println!("Chunks ({}):", stats.chunk_timings.len());
        for (i, timing) in stats.chunk_timings.iter().enumerate() {
            println!("  #{}: {:.1}s", i + 1, timing.as_secs_f64());
        }
        println!();
    }

    println!(
        "Success Rate: {:.1}% ({} / {} links) in {:.1}s, {:.2} records/sec",
        stats.success_rate(),
        stats.harvested,
        stats.pending,
        stats.elapsed.as_secs_f64(),
        stats.records_per_sec()
    );
}
