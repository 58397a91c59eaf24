//! HTTP page fetcher.

use std::net::IpAddr;
use std::time::Duration;

use reqwest::Client;
use scraper::{Html, Selector};
use tracing::{debug, instrument};
use url::Url;

use docsift_shared::{DocsiftError, Result};

use crate::{FetchedPage, PageFetcher};

/// User-Agent string for fetch requests.
const USER_AGENT: &str = concat!("docsift/", env!("CARGO_PKG_VERSION"));

/// Maximum redirects followed per request.
const MAX_REDIRECTS: usize = 5;

/// Fetches pages over HTTP(S), refusing private and local targets.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    timeout: Duration,
    /// Allow localhost/private IPs (for integration tests with mock servers).
    allow_localhost: bool,
}

impl HttpFetcher {
    /// Create a fetcher whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(timeout)
            .build()
            .map_err(|e| DocsiftError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            timeout,
            allow_localhost: false,
        })
    }

    /// Allow fetching localhost/private IPs (for integration tests).
    #[cfg(test)]
    pub fn allow_localhost(mut self) -> Self {
        self.allow_localhost = true;
        self
    }

    fn request_error(&self, url: &Url, e: reqwest::Error) -> DocsiftError {
        if e.is_timeout() {
            DocsiftError::Timeout {
                what: format!("fetching {url}"),
                secs: self.timeout.as_secs(),
            }
        } else {
            DocsiftError::Network(format!("{url}: {e}"))
        }
    }
}

impl PageFetcher for HttpFetcher {
    #[instrument(skip(self))]
    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        let url = Url::parse(url)
            .map_err(|e| DocsiftError::validation(format!("invalid URL '{url}': {e}")))?;

        if !self.allow_localhost && is_ssrf_target(&url) {
            return Err(DocsiftError::validation(format!(
                "refusing to fetch private or non-HTTP target {url}"
            )));
        }

        debug!(%url, "fetching page");

        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| self.request_error(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DocsiftError::Network(format!("{url}: HTTP {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| self.request_error(&url, e))?;

        let title = extract_title(&body);
        debug!(%url, bytes = body.len(), ?title, "page fetched");

        Ok(FetchedPage {
            url: url.to_string(),
            body,
            title,
        })
    }
}

/// Pull a display title from `<title>`, falling back to the first `<h1>`.
fn extract_title(body: &str) -> Option<String> {
    let doc = Html::parse_document(body);

    ["title", "h1"].iter().find_map(|sel| {
        let selector = Selector::parse(sel).ok()?;
        doc.select(&selector)
            .next()
            .map(|el| el.text().collect::<Vec<_>>().join(" "))
            .map(|t| t.split_whitespace().collect::<Vec<_>>().join(" "))
            .filter(|t| !t.is_empty())
    })
}

// ---------------------------------------------------------------------------
// SSRF protection
// ---------------------------------------------------------------------------

/// Check if a URL targets a potentially dangerous resource.
pub fn is_ssrf_target(url: &Url) -> bool {
    match url.scheme() {
        "http" | "https" => {}
        _ => return true,
    }

    match url.host() {
        Some(url::Host::Ipv4(v4)) => is_private_ip(&IpAddr::V4(v4)),
        Some(url::Host::Ipv6(v6)) => is_private_ip(&IpAddr::V6(v6)),
        Some(url::Host::Domain(host)) => {
            host == "localhost" || host.ends_with(".local") || host.ends_with(".internal")
        }
        None => true,
    }
}

/// Check if an IP is in a private/reserved range.
fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_unspecified()
                // 100.64.0.0/10 (Carrier-grade NAT)
                || (v4.octets()[0] == 100 && (v4.octets()[1] & 0xC0) == 64)
                // 192.0.0.0/24
                || (v4.octets()[0] == 192 && v4.octets()[1] == 0 && v4.octets()[2] == 0)
        }
        IpAddr::V6(v6) => v6.is_loopback() || v6.is_unspecified(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher(timeout: Duration) -> HttpFetcher {
        HttpFetcher::new(timeout).unwrap().allow_localhost()
    }

    #[test]
    fn ssrf_blocks_file_scheme() {
        let url = Url::parse("file:///etc/passwd").unwrap();
        assert!(is_ssrf_target(&url));
    }

    #[test]
    fn ssrf_blocks_private_ips() {
        for raw in [
            "http://192.168.1.1/admin",
            "http://10.0.0.1/",
            "http://127.0.0.1:8080/",
            "http://100.64.1.1/",
            "http://[::1]/",
        ] {
            let url = Url::parse(raw).unwrap();
            assert!(is_ssrf_target(&url), "{raw} should be blocked");
        }
    }

    #[test]
    fn ssrf_blocks_local_hostnames() {
        let url = Url::parse("http://localhost:3000/api").unwrap();
        assert!(is_ssrf_target(&url));
        let url = Url::parse("https://db.internal/").unwrap();
        assert!(is_ssrf_target(&url));
    }

    #[test]
    fn ssrf_allows_public() {
        let url = Url::parse("https://example.com/agent-reflection").unwrap();
        assert!(!is_ssrf_target(&url));
    }

    #[test]
    fn title_prefers_title_element() {
        let html = "<html><head><title>  Loops \n Paper </title></head><body><h1>H</h1></body></html>";
        assert_eq!(extract_title(html).as_deref(), Some("Loops Paper"));
    }

    #[test]
    fn title_falls_back_to_h1() {
        let html = "<html><body><h1>Common <em>Pitfalls</em></h1></body></html>";
        assert_eq!(extract_title(html).as_deref(), Some("Common Pitfalls"));
        assert_eq!(extract_title("<p>no heading</p>"), None);
    }

    #[tokio::test]
    async fn fetch_returns_body_and_title() {
        let server = MockServer::start().await;
        let page = "<html><head><title>ADK Workflows</title></head>\
                    <body><p>The orchestrator uses a JSON graph.</p></body></html>";

        Mock::given(method("GET"))
            .and(path("/adk-blog"))
            .respond_with(ResponseTemplate::new(200).set_body_string(page))
            .mount(&server)
            .await;

        let url = format!("{}/adk-blog", server.uri());
        let fetched = fetcher(Duration::from_secs(5)).fetch(&url).await.unwrap();

        assert_eq!(fetched.body, page);
        assert_eq!(fetched.title.as_deref(), Some("ADK Workflows"));
    }

    #[tokio::test]
    async fn fetch_reports_http_errors() {
        let server = MockServer::start().await;
        Mock::given(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let url = format!("{}/missing", server.uri());
        let err = fetcher(Duration::from_secs(5)).fetch(&url).await.unwrap_err();

        assert!(matches!(err, DocsiftError::Network(_)));
        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn fetch_times_out() {
        let server = MockServer::start().await;
        Mock::given(path("/slow"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("late")
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let url = format!("{}/slow", server.uri());
        let err = fetcher(Duration::from_millis(200))
            .fetch(&url)
            .await
            .unwrap_err();

        assert!(matches!(err, DocsiftError::Timeout { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn fetch_refuses_localhost_by_default() {
        let server = MockServer::start().await;
        let strict = HttpFetcher::new(Duration::from_secs(5)).unwrap();

        let err = strict.fetch(&server.uri()).await.unwrap_err();
        assert!(matches!(err, DocsiftError::Validation { .. }));
    }

    #[tokio::test]
    async fn fetch_rejects_unparseable_url() {
        let err = fetcher(Duration::from_secs(5))
            .fetch("not a url")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("invalid URL"));
    }
}
