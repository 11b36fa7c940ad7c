//! End-to-end category runs against a mock listing site

use crate::{category, create_test_config, item_hrefs, item_page, listing_page};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use sumi_harvest::config::{Config, OutputFormat};
use sumi_harvest::output::{RecordStore, SqliteStore};
use sumi_harvest::{ExtractedRecord, HarvestError, Harvester, ResumeLedger, NOT_AVAILABLE};
use tempfile::TempDir;
use wiremock::matchers::{method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Mounts a two-page listing (`first` on page 1, nothing on page 2) and a
/// catch-all item page handler
async fn mount_site(server: &MockServer, first: &[String]) {
    Mock::given(method("GET"))
        .and(path("/laptops"))
        .and(query_param("o", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_page(&[])))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/laptops"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_page(first)))
        .mount(server)
        .await;
}

async fn mount_items(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path_regex(r"^/laptops/item_\d+\.htm$"))
        .respond_with(ResponseTemplate::new(200).set_body_string(item_page("Dell Latitude 7490")))
        .mount(server)
        .await;
}

/// Item responder that notes when each request arrived and answers after `delay`
struct SlowItems {
    arrivals: Arc<Mutex<Vec<Instant>>>,
    delay: Duration,
}

impl Respond for SlowItems {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        self.arrivals.lock().unwrap().push(Instant::now());
        ResponseTemplate::new(200)
            .set_body_string(item_page("ThinkPad T480"))
            .set_delay(self.delay)
    }
}

/// Largest number of requests that arrived within `window` of each other
fn peak_in_flight(arrivals: &[Instant], window: Duration) -> usize {
    arrivals
        .iter()
        .map(|start| {
            arrivals
                .iter()
                .filter(|t| **t >= *start && t.duration_since(*start) < window)
                .count()
        })
        .max()
        .unwrap_or(0)
}

fn read_csv(config: &Config) -> Vec<ExtractedRecord> {
    let path = config.harvest.output_dir.join("laptops_products.csv");
    let mut reader = csv::Reader::from_path(path).unwrap();
    reader.deserialize().map(|r| r.unwrap()).collect()
}

#[tokio::test]
async fn test_full_run_writes_records_ledger_and_cache() {
    let server = MockServer::start().await;
    mount_site(&server, &item_hrefs(0..12)).await;
    mount_items(&server).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path());
    let harvester = Harvester::new(&config, &category(&server.uri())).unwrap();
    let stats = harvester.run().await.unwrap();

    assert_eq!(stats.discovered, 12);
    assert!(!stats.from_cache);
    assert_eq!(stats.pending, 12);
    assert_eq!(stats.harvested, 12);
    assert_eq!(stats.failed, 0);
    assert_eq!(stats.sample_title.as_deref(), Some("Dell Latitude 7490"));
    // One sample, then chunks of 5: 5 + 5 + 1
    assert_eq!(stats.chunk_timings.len(), 3);
    assert_eq!(stats.written, 12);
    assert_eq!(stats.stored, 12);

    let records = read_csv(&config);
    assert_eq!(records.len(), 12);
    assert!(records.iter().all(|r| r.title == "Dell Latitude 7490"));
    assert!(records.iter().all(|r| r.price == "3 999 DH"));
    assert!(records.iter().all(|r| r.post_date == "2025-02-01T09:00:00Z"));

    let ledger = ResumeLedger::open(&harvester.paths().progress).unwrap();
    assert_eq!(ledger.len(), 12);
    for record in &records {
        assert!(ledger.contains(&record.url));
    }

    let cache = std::fs::read_to_string(&harvester.paths().links).unwrap();
    assert_eq!(cache.lines().count(), 12);
}

#[tokio::test]
async fn test_second_run_leaves_row_count_unchanged() {
    let server = MockServer::start().await;
    mount_site(&server, &item_hrefs(0..8)).await;
    mount_items(&server).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path());
    let category = category(&server.uri());

    let first = Harvester::new(&config, &category).unwrap().run().await.unwrap();
    assert_eq!(first.harvested, 8);
    assert_eq!(read_csv(&config).len(), 8);

    let second = Harvester::new(&config, &category).unwrap().run().await.unwrap();
    assert!(second.from_cache);
    assert_eq!(second.skipped, 8);
    assert_eq!(second.pending, 0);
    assert_eq!(second.harvested, 0);
    assert_eq!(read_csv(&config).len(), 8);
}

#[tokio::test]
async fn test_failed_fetch_not_recorded() {
    let server = MockServer::start().await;
    mount_site(&server, &item_hrefs(0..6)).await;
    Mock::given(method("GET"))
        .and(path("/laptops/item_3.htm"))
        .respond_with(ResponseTemplate::new(404))
        // three attempts on the first run, one on the rerun
        .expect(4)
        .mount(&server)
        .await;
    mount_items(&server).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path());
    let category = category(&server.uri());
    let harvester = Harvester::new(&config, &category).unwrap();
    let stats = harvester.run().await.unwrap();

    assert_eq!(stats.harvested, 5);
    assert_eq!(stats.failed, 1);

    let failed_url = format!("{}/laptops/item_3.htm", server.uri());
    let ledger = ResumeLedger::open(&harvester.paths().progress).unwrap();
    assert_eq!(ledger.len(), 5);
    assert!(!ledger.contains(&failed_url));
    assert!(read_csv(&config).iter().all(|r| r.url != failed_url));

    // The failed link is still pending on the next run
    drop(ledger);
    let mut retry = config.clone();
    retry.retry.max_attempts = 1;
    let rerun = Harvester::new(&retry, &category).unwrap().run().await.unwrap();
    assert_eq!(rerun.pending, 1);
    assert_eq!(rerun.skipped, 5);
}

#[tokio::test]
async fn test_rate_limited_item_is_retried() {
    let server = MockServer::start().await;
    mount_site(&server, &item_hrefs(0..5)).await;
    Mock::given(method("GET"))
        .and(path("/laptops/item_2.htm"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    mount_items(&server).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path());
    let harvester = Harvester::new(&config, &category(&server.uri())).unwrap();
    let stats = harvester.run().await.unwrap();

    assert_eq!(stats.harvested, 5);
    assert_eq!(stats.failed, 0);
    assert!(harvester.throttle().current_delay() >= std::time::Duration::from_millis(2));
}

#[tokio::test]
async fn test_empty_first_page_is_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/laptops"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body></body></html>"))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path());
    let harvester = Harvester::new(&config, &category(&server.uri())).unwrap();
    let err = harvester.run().await.unwrap_err();

    assert!(matches!(err, HarvestError::EmptyCategory { .. }));
    assert!(!harvester.paths().links.exists());
}

#[tokio::test]
async fn test_sqlite_output() {
    let server = MockServer::start().await;
    mount_site(&server, &item_hrefs(0..7)).await;
    mount_items(&server).await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(dir.path());
    config.harvest.output_format = OutputFormat::Sqlite;
    let category = category(&server.uri());

    let harvester = Harvester::new(&config, &category).unwrap();
    harvester.run().await.unwrap();
    assert!(harvester.paths().records.ends_with("laptops_products.db"));

    let store = SqliteStore::open(&harvester.paths().records).unwrap();
    assert_eq!(store.count().unwrap(), 7);
    drop(store);

    Harvester::new(&config, &category).unwrap().run().await.unwrap();
    let store = SqliteStore::open(&harvester.paths().records).unwrap();
    assert_eq!(store.count().unwrap(), 7);
}

#[tokio::test]
async fn test_robots_disallowed_links_skipped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("User-agent: *\nDisallow: /laptops/item_0.htm\n"),
        )
        .mount(&server)
        .await;
    mount_site(&server, &item_hrefs(0..6)).await;
    Mock::given(method("GET"))
        .and(path("/laptops/item_0.htm"))
        .respond_with(ResponseTemplate::new(200).set_body_string(item_page("blocked")))
        .expect(0)
        .mount(&server)
        .await;
    mount_items(&server).await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(dir.path());
    config.harvest.respect_robots_txt = true;
    let harvester = Harvester::new(&config, &category(&server.uri())).unwrap();
    let stats = harvester.run().await.unwrap();

    assert_eq!(stats.blocked_by_robots, 1);
    assert_eq!(stats.harvested, 5);
}

#[tokio::test]
async fn test_fresh_discovery_after_cache_cleared() {
    let server = MockServer::start().await;
    mount_site(&server, &item_hrefs(0..6)).await;
    mount_items(&server).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path());
    let category = category(&server.uri());

    Harvester::new(&config, &category).unwrap().run().await.unwrap();

    let harvester = Harvester::new(&config, &category).unwrap();
    assert!(harvester.clear_link_cache().unwrap());
    let stats = harvester.run().await.unwrap();

    // Discovery ran again and every listed link is already in the ledger
    assert!(!stats.from_cache);
    assert_eq!(stats.discovered, 0);
    assert_eq!(stats.harvested, 0);
    assert_eq!(read_csv(&config).len(), 6);
}

#[tokio::test]
async fn test_workers_bounded_by_max_workers() {
    let server = MockServer::start().await;
    mount_site(&server, &item_hrefs(0..13)).await;
    let arrivals = Arc::new(Mutex::new(Vec::new()));
    let delay = Duration::from_millis(150);
    Mock::given(method("GET"))
        .and(path_regex(r"^/laptops/item_\d+\.htm$"))
        .respond_with(SlowItems {
            arrivals: Arc::clone(&arrivals),
            delay,
        })
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(dir.path());
    config.harvest.chunk_size = 12;
    let harvester = Harvester::new(&config, &category(&server.uri())).unwrap();
    let stats = harvester.run().await.unwrap();
    assert_eq!(stats.harvested, 13);

    // A worker only sends its next request after the previous response, at
    // least `delay` later, so any window shorter than `delay` sees at most one
    // request per worker
    let arrivals = arrivals.lock().unwrap();
    assert_eq!(arrivals.len(), 13);
    let peak = peak_in_flight(&arrivals, delay);
    assert!(peak <= 3, "peak of {} requests in flight", peak);
    assert!(peak >= 2, "requests were never concurrent");
}

#[tokio::test]
async fn test_sample_without_title_is_kept_and_fetched_once() {
    let server = MockServer::start().await;
    mount_site(&server, &item_hrefs(0..4)).await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/laptops/item_\d+\.htm$"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"<html><body><p data-testid="price">900 DH</p></body></html>"#),
        )
        .expect(4)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(dir.path());
    let stats = Harvester::new(&config, &category(&server.uri()))
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(stats.sample_title.as_deref(), Some(NOT_AVAILABLE));
    assert_eq!(stats.harvested, 4);

    let records = read_csv(&config);
    assert_eq!(records.len(), 4);
    assert!(records.iter().all(|r| r.title == NOT_AVAILABLE && r.price == "900 DH"));
}

#[tokio::test]
async fn test_bad_sample_aborts_when_strict() {
    let server = MockServer::start().await;
    mount_site(&server, &item_hrefs(0..4)).await;
    Mock::given(method("GET"))
        .and(path("/laptops/item_0.htm"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body></body></html>"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/laptops/item_[1-3]\.htm$"))
        .respond_with(ResponseTemplate::new(200).set_body_string(item_page("never")))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(dir.path());
    config.harvest.abort_on_bad_sample = true;
    let harvester = Harvester::new(&config, &category(&server.uri())).unwrap();
    let err = harvester.run().await.unwrap_err();

    assert!(matches!(err, HarvestError::BadSample { .. }));
    assert!(ResumeLedger::open(&harvester.paths().progress).unwrap().is_empty());
}

#[tokio::test]
async fn test_robots_crawl_delay_is_capped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("User-agent: *\nCrawl-delay: 86400\n"),
        )
        .mount(&server)
        .await;
    mount_site(&server, &item_hrefs(0..5)).await;
    mount_items(&server).await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(dir.path());
    config.harvest.respect_robots_txt = true;
    config.throttle.max_crawl_delay_ms = 5;
    let harvester = Harvester::new(&config, &category(&server.uri())).unwrap();
    let stats = harvester.run().await.unwrap();

    assert_eq!(stats.harvested, 5);
    let throttle = harvester.throttle().snapshot();
    assert_eq!(throttle.floor, Duration::from_millis(5));
    assert!(throttle.ceiling >= throttle.floor);
}
