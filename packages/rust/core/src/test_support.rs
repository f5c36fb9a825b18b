//! Helpers shared by the pipeline, guard, and handler tests.

use std::time::Duration;

use drugwatch_scraper::{GifAdapter, HttpFetcher, UrplAdapter};
use drugwatch_shared::{Clock, ScrapeConfig};
use drugwatch_storage::Storage;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::ingest::IngestContext;

pub fn load_fixture(name: &str) -> String {
    let path = format!("../../../fixtures/html/{name}");
    std::fs::read_to_string(&path).unwrap_or_else(|_| panic!("missing fixture: {path}"))
}

pub async fn temp_storage() -> Storage {
    let tmp = std::env::temp_dir().join(format!("dw_core_test_{}.db", uuid::Uuid::now_v7()));
    Storage::open(&tmp).await.expect("open test db")
}

pub fn test_fetcher() -> HttpFetcher {
    HttpFetcher::new(&ScrapeConfig {
        timeout: Duration::from_secs(5),
        lookback_days: 10,
        user_agent: "drugwatch-test".into(),
    })
    .expect("build fetcher")
}

pub fn context<'a>(
    fetcher: &'a HttpFetcher,
    storage: &'a Storage,
    clock: &'a dyn Clock,
) -> IngestContext<'a> {
    IngestContext {
        fetcher,
        storage,
        clock,
        lookback_days: 10,
    }
}

/// Start a server answering `GET route` with a fixture page.
pub async fn serve_fixture(route: &str, fixture: &str) -> MockServer {
    let server = MockServer::start().await;
    mount_fixture(&server, route, fixture).await;
    server
}

pub async fn mount_fixture(server: &MockServer, route: &str, fixture: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html; charset=utf-8")
                .set_body_string(load_fixture(fixture)),
        )
        .mount(server)
        .await;
}

pub fn gif_adapter(server: &MockServer) -> GifAdapter {
    GifAdapter::new(Url::parse(&format!("{}/", server.uri())).unwrap())
}

pub fn urpl_adapter(server: &MockServer) -> UrplAdapter {
    UrplAdapter::new(Url::parse(&format!("{}/pl/decyzje", server.uri())).unwrap())
}
