//! Listing discovery against a mock listing site

use crate::{category, create_test_config, item_hrefs, listing_page};
use std::sync::Arc;
use sumi_harvest::config::Config;
use sumi_harvest::crawler::{AdaptiveThrottle, Fetcher, Frontier, IdentityPool, ListingMatchers};
use sumi_harvest::{HarvestError, ResumeLedger};
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Harness {
    fetcher: Fetcher,
    matchers: ListingMatchers,
    ledger: ResumeLedger,
    config: Config,
    root: Url,
    filters: Vec<String>,
    _dir: TempDir,
}

impl Harness {
    fn new(server: &MockServer) -> Self {
        let dir = TempDir::new().unwrap();
        let mut config = create_test_config(dir.path());
        config.retry.max_attempts = 2;

        let identities = IdentityPool::new(2, &config.identity, config.retry.request_timeout()).unwrap();
        let throttle = AdaptiveThrottle::from_config(&config.throttle);
        let fetcher = Fetcher::new(Arc::new(identities), Arc::new(throttle), &config.retry);
        let matchers = ListingMatchers::compile(&config.site.listing_selectors).unwrap();
        let ledger = ResumeLedger::open(dir.path().join("laptops_progress.txt")).unwrap();
        let category = category(&server.uri());

        Self {
            fetcher,
            matchers,
            ledger,
            root: Url::parse(&category.url).unwrap(),
            filters: category.link_filters,
            config,
            _dir: dir,
        }
    }

    fn frontier(&self) -> Frontier<'_> {
        Frontier::new(
            &self.fetcher,
            &self.matchers,
            &self.ledger,
            self.root.clone(),
            &self.filters,
            &self.config.frontier,
            self.config.retry.time_unit(),
        )
    }

    fn absolute(&self, hrefs: &[String]) -> Vec<String> {
        hrefs
            .iter()
            .map(|h| self.root.join(h).unwrap().to_string())
            .collect()
    }
}

async fn mount_page(server: &MockServer, page: Option<&str>, body: String) {
    let mock = Mock::given(method("GET")).and(path("/laptops"));
    let mock = match page {
        Some(n) => mock.and(query_param("o", n)),
        None => mock,
    };
    mock.respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_stops_on_page_with_too_few_new_links() {
    let server = MockServer::start().await;

    mount_page(&server, Some("2"), listing_page(&item_hrefs(6..10))).await;
    Mock::given(method("GET"))
        .and(path("/laptops"))
        .and(query_param("o", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_page(&item_hrefs(10..20))))
        .expect(0)
        .mount(&server)
        .await;
    mount_page(&server, None, listing_page(&item_hrefs(0..6))).await;

    let harness = Harness::new(&server);
    let links = harness.frontier().discover().await.unwrap();

    // Page 2 only had 4 new links: it ends discovery and its links are dropped
    assert_eq!(links, harness.absolute(&item_hrefs(0..6)));
}

#[tokio::test]
async fn test_walks_pages_until_no_items() {
    let server = MockServer::start().await;

    mount_page(&server, Some("2"), listing_page(&item_hrefs(6..12))).await;
    mount_page(&server, Some("3"), "<html><body>Aucune annonce</body></html>".to_string()).await;
    mount_page(&server, None, listing_page(&item_hrefs(0..6))).await;

    let harness = Harness::new(&server);
    let mut frontier = harness.frontier();
    let links = frontier.discover().await.unwrap();

    assert_eq!(links, harness.absolute(&item_hrefs(0..12)));
    assert_eq!(frontier.cursor().page_number, 2);
    assert_eq!(frontier.cursor().accumulated_links, 12);
}

#[tokio::test]
async fn test_repeated_links_are_not_new() {
    let server = MockServer::start().await;

    // Page 2 repeats page 1 plus three new items: 3 < 5 new links
    let mut page_two = item_hrefs(0..6);
    page_two.extend(item_hrefs(6..9));
    mount_page(&server, Some("2"), listing_page(&page_two)).await;
    mount_page(&server, None, listing_page(&item_hrefs(0..6))).await;

    let harness = Harness::new(&server);
    let links = harness.frontier().discover().await.unwrap();
    assert_eq!(links.len(), 6);
}

#[tokio::test]
async fn test_first_page_empty_is_fatal() {
    let server = MockServer::start().await;
    mount_page(&server, None, "<html><body><p>Rien ici</p></body></html>".to_string()).await;

    let harness = Harness::new(&server);
    let err = harness.frontier().discover().await.unwrap_err();

    assert!(matches!(err, HarvestError::EmptyCategory { .. }));
    assert!(err.is_fatal_discovery());
}

#[tokio::test]
async fn test_first_page_unreachable_is_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/laptops"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&server)
        .await;

    let harness = Harness::new(&server);
    let err = harness.frontier().discover().await.unwrap_err();

    match err {
        HarvestError::CategoryUnreachable(failure) => assert_eq!(failure.attempts, 2),
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test]
async fn test_later_page_failure_ends_discovery() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/laptops"))
        .and(query_param("o", "2"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    mount_page(&server, None, listing_page(&item_hrefs(0..7))).await;

    let harness = Harness::new(&server);
    let links = harness.frontier().discover().await.unwrap();
    assert_eq!(links.len(), 7);
}

#[tokio::test]
async fn test_ledger_and_category_filters_applied() {
    let server = MockServer::start().await;

    let mut hrefs = item_hrefs(0..4);
    hrefs.push("/voitures/car_1.htm".to_string());
    hrefs.push("https://elsewhere.example.com/laptops/item_9.htm".to_string());
    hrefs.push("/laptops/item_1.htm#photos".to_string());
    mount_page(&server, Some("2"), listing_page(&[])).await;
    mount_page(&server, None, listing_page(&hrefs)).await;

    let harness = Harness::new(&server);
    let done = harness.absolute(&item_hrefs(0..1));
    harness.ledger.record(&done[0]).unwrap();

    let links = harness.frontier().discover().await.unwrap();
    assert_eq!(links, harness.absolute(&item_hrefs(1..4)));
}

#[tokio::test]
async fn test_next_page_is_lazy() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/laptops"))
        .and(query_param("o", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_page(&item_hrefs(5..10))))
        .expect(0)
        .mount(&server)
        .await;
    mount_page(&server, None, listing_page(&item_hrefs(0..5))).await;

    let harness = Harness::new(&server);
    let mut frontier = harness.frontier();
    let first = frontier.next_page().await.unwrap().unwrap();

    assert_eq!(first.len(), 5);
    assert_eq!(frontier.cursor().page_number, 1);
}

#[tokio::test]
async fn test_max_pages_cap() {
    let server = MockServer::start().await;
    mount_page(&server, Some("2"), listing_page(&item_hrefs(6..12))).await;
    Mock::given(method("GET"))
        .and(path("/laptops"))
        .and(query_param("o", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_page(&item_hrefs(12..18))))
        .expect(0)
        .mount(&server)
        .await;
    mount_page(&server, None, listing_page(&item_hrefs(0..6))).await;

    let mut harness = Harness::new(&server);
    harness.config.frontier.max_pages = Some(2);
    let links = harness.frontier().discover().await.unwrap();
    assert_eq!(links.len(), 12);
}
