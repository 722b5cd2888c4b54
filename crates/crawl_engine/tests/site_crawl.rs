use std::sync::Arc;

use crawl_engine::{CrawlConfig, Crawler, FetchSettings, ReqwestFetcher, RequisiteExtractor};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn serve(server: &MockServer, route: &str, content_type: &str, body: &str, hits: u64) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, content_type))
        .expect(hits)
        .mount(server)
        .await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn crawls_a_served_site_with_real_fetcher() {
    crawl_logging::initialize_for_tests();
    let server = MockServer::start().await;
    let index = r#"<!doctype html>
<html>
  <head>
    <link rel="stylesheet" href="/css/site.css">
    <link rel="canonical" href="/index.html">
    <script src="app.js"></script>
  </head>
  <body>
    <a href="/about.html">about</a>
    <img src="img/logo.png" srcset="img/logo.png 1x, img/logo@2x.png 2x">
  </body>
</html>"#;
    let css = "@import 'print.css'; body { background: url(../img/bg.png) }";

    serve(&server, "/index.html", "text/html; charset=utf-8", index, 1).await;
    serve(&server, "/css/site.css", "text/css", css, 1).await;
    serve(&server, "/css/print.css", "text/css", "p { color: red }", 1).await;
    serve(&server, "/app.js", "application/javascript", "void 0;", 1).await;
    serve(&server, "/img/logo.png", "image/png", "logo", 1).await;
    serve(&server, "/img/logo@2x.png", "image/png", "logo@2x", 1).await;
    serve(&server, "/img/bg.png", "image/png", "bg", 1).await;
    serve(&server, "/about.html", "text/html", "<p>about</p>", 0).await;

    let mut config = CrawlConfig::from_urls([format!("{}/index.html", server.uri())]).unwrap();
    config.page_requisites = true;
    config.parallel_requests = 3;
    let fetcher = ReqwestFetcher::new(FetchSettings::default()).unwrap();
    let crawler = Crawler::new(config, Arc::new(fetcher), Arc::new(RequisiteExtractor::new()));

    let summary = crawler.run().await.unwrap();

    let expected_bytes = index.len() + css.len() + "p { color: red }".len() + "void 0;".len()
        + "logo".len()
        + "logo@2x".len()
        + "bg".len();
    assert_eq!(summary.metrics.requests, 7);
    assert_eq!(summary.metrics.errors, 0);
    assert_eq!(summary.metrics.bytes_received, expected_bytes as u64);
    // Pooled keep-alive connections, at most one per worker.
    assert!(
        (1..=3).contains(&summary.metrics.connections),
        "connections={}",
        summary.metrics.connections
    );
    assert_eq!(summary.items_seen, 7);
    // `expect` counts are verified when the server drops.
}
