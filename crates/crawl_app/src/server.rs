//! Static file server for hosting test sites.
//!
//! In multi-domain mode every subdirectory of the served directory is a
//! virtual host: `www/example.com/index.html` answers
//! `GET http://example.com/index.html`.

use std::collections::HashMap;
use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::header::{CONTENT_SECURITY_POLICY, HOST};
use axum::http::{HeaderValue, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use crawl_logging::{crawl_debug, crawl_info};
use tokio::net::TcpListener;
use tower::ServiceExt;
use tower_http::services::ServeDir;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: String,
    pub serve_dir: PathBuf,
    pub multi_domain: bool,
    pub query_in_filename: bool,
}

enum Sites {
    Single(ServeDir),
    PerHost(HashMap<String, ServeDir>),
}

struct SiteState {
    sites: Sites,
    query_in_filename: bool,
}

pub fn router(config: &ServerConfig) -> Result<Router> {
    let sites = if config.multi_domain {
        let hosts = host_directories(&config.serve_dir)?;
        let mut names: Vec<&String> = hosts.keys().collect();
        names.sort();
        crawl_info!("serving hostnames {:?}", names);
        Sites::PerHost(hosts)
    } else {
        Sites::Single(ServeDir::new(&config.serve_dir))
    };
    let state = Arc::new(SiteState {
        sites,
        query_in_filename: config.query_in_filename,
    });
    Ok(Router::new().fallback(serve).with_state(state))
}

pub async fn run<F>(config: ServerConfig, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = router(&config)?;
    let listener = TcpListener::bind(&config.addr)
        .await
        .with_context(|| format!("failed to listen on {}", config.addr))?;
    crawl_info!(
        "listening on {}, serving {}",
        listener.local_addr()?,
        config.serve_dir.display()
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("server error")
}

fn host_directories(root: &Path) -> Result<HashMap<String, ServeDir>> {
    let entries = fs::read_dir(root)
        .with_context(|| format!("failed to list hostname directory {}", root.display()))?;
    let mut hosts = HashMap::new();
    for entry in entries {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            let hostname = entry.file_name().to_string_lossy().to_ascii_lowercase();
            hosts.insert(hostname, ServeDir::new(entry.path()));
        }
    }
    Ok(hosts)
}

async fn serve(State(state): State<Arc<SiteState>>, mut request: Request) -> Response {
    if state.query_in_filename {
        if let Some(uri) = fold_query_into_path(request.uri()) {
            *request.uri_mut() = uri;
        }
    }

    match &state.sites {
        Sites::Single(dir) => serve_from(dir, request).await,
        Sites::PerHost(hosts) => {
            let Some(hostname) = request_hostname(&request) else {
                crawl_debug!("failed to multiplex hostname for {}", request.uri());
                return StatusCode::BAD_REQUEST.into_response();
            };
            let Some(dir) = hosts.get(&hostname) else {
                return StatusCode::NOT_FOUND.into_response();
            };
            let mut response = serve_from(dir, request).await;
            response
                .headers_mut()
                .insert(CONTENT_SECURITY_POLICY, HeaderValue::from_static("default-src *"));
            response
        }
    }
}

async fn serve_from(dir: &ServeDir, request: Request) -> Response {
    match dir.clone().oneshot(request).await {
        Ok(response) => response.map(Body::new),
        Err(never) => match never {},
    }
}

/// Hostname of the request without port, lowercased.
fn request_hostname(request: &Request) -> Option<String> {
    let authority = match request.headers().get(HOST) {
        Some(value) => value.to_str().ok()?.to_string(),
        None => request.uri().authority()?.to_string(),
    };
    strip_port(&authority).map(|host| host.to_ascii_lowercase())
}

fn strip_port(authority: &str) -> Option<&str> {
    if let Some(rest) = authority.strip_prefix('[') {
        let (host, port) = rest.split_once(']')?;
        return match port {
            "" => Some(host),
            _ => port
                .strip_prefix(':')
                .filter(|port| is_port(port))
                .map(|_| host),
        };
    }
    let host = match authority.rsplit_once(':') {
        Some((host, port)) if is_port(port) && !host.contains(':') => host,
        Some(_) => return None,
        None => authority,
    };
    (!host.is_empty()).then_some(host)
}

fn is_port(port: &str) -> bool {
    !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit())
}

/// `/a?b=c` becomes `/a%3Fb=c`, so the file named `a?b=c` is served.
fn fold_query_into_path(uri: &Uri) -> Option<Uri> {
    let query = uri.query()?;
    let folded = format!("{}%3F{}", uri.path(), query);
    folded.parse().ok()
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;
    use tempfile::TempDir;

    use super::*;

    fn config(dir: &Path, multi_domain: bool, query_in_filename: bool) -> ServerConfig {
        ServerConfig {
            addr: "127.0.0.1:0".to_string(),
            serve_dir: dir.to_path_buf(),
            multi_domain,
            query_in_filename,
        }
    }

    async fn get(app: Router, host: &str, uri: &str) -> (StatusCode, Option<String>, String) {
        let request = Request::builder()
            .uri(uri)
            .header(HOST, host)
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let csp = response
            .headers()
            .get(CONTENT_SECURITY_POLICY)
            .map(|value| value.to_str().unwrap().to_string());
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, csp, String::from_utf8_lossy(&body).into_owned())
    }

    #[tokio::test]
    async fn serves_single_directory() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("index.html"), "<p>hi</p>").unwrap();
        let app = router(&config(temp.path(), false, false)).unwrap();

        let (status, csp, body) = get(app, "anything", "/index.html").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(csp, None);
        assert_eq!(body, "<p>hi</p>");
    }

    #[tokio::test]
    async fn multiplexes_by_hostname() {
        let temp = TempDir::new().unwrap();
        for host in ["a.example", "b.example"] {
            fs::create_dir(temp.path().join(host)).unwrap();
            fs::write(temp.path().join(host).join("index.html"), host).unwrap();
        }

        let app = router(&config(temp.path(), true, false)).unwrap();
        let (status, csp, body) = get(app.clone(), "b.example:8080", "/index.html").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(csp.as_deref(), Some("default-src *"));
        assert_eq!(body, "b.example");

        let (status, _, _) = get(app.clone(), "c.example", "/index.html").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _, _) = get(app, "a.example:port", "/index.html").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn query_can_be_part_of_the_filename() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("style.css?v=2"), "v2").unwrap();
        let app = router(&config(temp.path(), false, true)).unwrap();

        let (status, _, body) = get(app, "localhost", "/style.css?v=2").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "v2");
    }

    #[test]
    fn strips_ports_from_authorities() {
        assert_eq!(strip_port("example.com"), Some("example.com"));
        assert_eq!(strip_port("example.com:443"), Some("example.com"));
        assert_eq!(strip_port("[::1]:8080"), Some("::1"));
        assert_eq!(strip_port("[::1]"), Some("::1"));
        assert_eq!(strip_port("example.com:http"), None);
        assert_eq!(strip_port(":80"), None);
    }

    #[test]
    fn missing_host_directory_fails_setup() {
        let temp = TempDir::new().unwrap();
        let err = router(&config(&temp.path().join("nope"), true, false)).unwrap_err();
        assert!(err.to_string().starts_with("failed to list hostname directory"));
    }
}
