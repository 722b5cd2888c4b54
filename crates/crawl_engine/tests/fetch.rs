use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crawl_engine::{
    ConnectionObserver, ContentCategory, FailureKind, FetchResponse, FetchSettings, Fetcher,
    ReqwestFetcher, WorkItem,
};
use futures_util::StreamExt;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Default)]
struct TestConnections {
    opened: AtomicU64,
}

impl TestConnections {
    fn take(&self) -> u64 {
        self.opened.swap(0, Ordering::SeqCst)
    }
}

impl ConnectionObserver for TestConnections {
    fn connections_established(&self, count: u64) {
        self.opened.fetch_add(count, Ordering::SeqCst);
    }
}

async fn read_body(response: FetchResponse) -> Vec<u8> {
    let mut body = Vec::new();
    let mut stream = response.body;
    while let Some(chunk) = stream.next().await {
        body.extend_from_slice(&chunk.unwrap());
    }
    body
}

fn item(server: &MockServer, route: &str) -> WorkItem {
    WorkItem::parse(&format!("{}{route}", server.uri())).unwrap()
}

#[tokio::test]
async fn fetcher_streams_body_and_reports_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/doc"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw("<html>ok</html>", "text/html; charset=utf-8"),
        )
        .mount(&server)
        .await;

    let fetcher = ReqwestFetcher::new(FetchSettings::default()).unwrap();
    let connections = TestConnections::default();

    let response = fetcher
        .fetch(&item(&server, "/doc"), &connections)
        .await
        .expect("fetch ok");
    assert_eq!(response.status, 200);
    assert_eq!(response.protocol, "HTTP/1.1");
    assert_eq!(response.category(), ContentCategory::Hypertext);
    assert!(!response.is_error_status());

    assert_eq!(read_body(response).await, b"<html>ok</html>");
    assert_eq!(connections.take(), 1);
}

#[tokio::test]
async fn sequential_requests_reuse_a_pooled_connection() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("x"))
        .mount(&server)
        .await;

    let fetcher = ReqwestFetcher::new(FetchSettings::default()).unwrap();
    let connections = TestConnections::default();
    for route in ["/a", "/b", "/c"] {
        let response = fetcher
            .fetch(&item(&server, route), &connections)
            .await
            .unwrap();
        assert_eq!(read_body(response).await, b"x");
    }

    assert_eq!(connections.take(), 1);
}

#[tokio::test]
async fn error_status_is_returned_not_raised() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let fetcher = ReqwestFetcher::new(FetchSettings::default()).unwrap();
    let response = fetcher
        .fetch(&item(&server, "/missing"), &TestConnections::default())
        .await
        .unwrap();

    assert_eq!(response.status, 404);
    assert!(response.is_error_status());
}

#[tokio::test]
async fn fetcher_times_out_on_slow_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(250))
                .set_body_string("slow"),
        )
        .mount(&server)
        .await;

    let settings = FetchSettings {
        request_timeout: Duration::from_millis(50),
        ..FetchSettings::default()
    };
    let fetcher = ReqwestFetcher::new(settings).unwrap();

    let err = fetcher
        .fetch(&item(&server, "/slow"), &TestConnections::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::Timeout);
}

#[tokio::test]
async fn fetcher_sends_configured_user_agent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ua"))
        .and(header("user-agent", "perf-check/1.0"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let settings = FetchSettings {
        user_agent: "perf-check/1.0".to_string(),
        ..FetchSettings::default()
    };
    let fetcher = ReqwestFetcher::new(settings).unwrap();

    let response = fetcher
        .fetch(&item(&server, "/ua"), &TestConnections::default())
        .await
        .unwrap();
    assert_eq!(response.status, 204);
}

#[tokio::test]
async fn unreachable_origin_is_a_network_error() {
    let fetcher = ReqwestFetcher::new(FetchSettings {
        connect_timeout: Duration::from_millis(200),
        ..FetchSettings::default()
    })
    .unwrap();
    let connections = TestConnections::default();

    // Port 9 (discard) is closed on test machines.
    let err = fetcher
        .fetch(&WorkItem::parse("http://127.0.0.1:9/").unwrap(), &connections)
        .await
        .unwrap_err();
    assert!(matches!(err.kind, FailureKind::Network | FailureKind::Timeout));
    assert_eq!(connections.take(), 0);
}
