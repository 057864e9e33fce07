//! Minimal HTTP client for fetching third-party pages, with safe logging.
//!
//! - Per-request overrides of timeout and retry budget
//! - Timeouts, non-2xx statuses and transport failures are distinct errors
//! - Retries 429/5xx with exponential backoff and `Retry-After` support
//! - Optional *raw* request/response logging via `ESCOLA_HTTP_RAW=1`
//!
//! Example (no_run):
//! ```no_run
//! # async fn demo() -> Result<(), escola_http::HttpError> {
//! let client = escola_http::HttpClient::builder().build()?;
//! let page = client
//!     .get_text("https://blog.example.com/aula-1", escola_http::RequestOpts::default())
//!     .await?;
//! println!("{} bytes from {}", page.body.len(), page.url);
//! # Ok(()) }
//! ```
//!
//! Every attempt logs `http.request.start` and `http.response`; retries and
//! final failures log at warn with a truncated body snippet. Raw lines go to
//! target `http.raw` and never include secret query values.

use reqwest::header::{
    ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue, RETRY_AFTER, USER_AGENT,
};
use reqwest::{Client, Method};
pub use reqwest::{StatusCode, Url};
use std::env;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time::sleep;

const RAW_ENV: &str = "ESCOLA_HTTP_RAW";
const RAW_MAX_BODY: usize = 64 * 1024;
const SNIPPET_LEN: usize = 500;
const ACCEPT_HTML: &str = "text/html,application/xhtml+xml;q=0.9,*/*;q=0.5";
const SECRET_PARAMS: &[&str] = &[
    "access_token",
    "authorization",
    "auth",
    "key",
    "api_key",
    "token",
    "secret",
    "client_secret",
    "bearer",
];

fn raw_enabled() -> bool {
    env::var(RAW_ENV).is_ok_and(|v| matches!(v.as_str(), "1" | "true" | "yes"))
}

fn is_secret_param(name: &str) -> bool {
    SECRET_PARAMS.contains(&name.to_ascii_lowercase().as_str())
}

/// Copy of `url` with secret query values replaced by `<redacted>`.
fn redact_url(url: &Url) -> Url {
    if url.query().is_none() {
        return url.clone();
    }
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let v = if is_secret_param(&k) {
                "<redacted>".to_string()
            } else {
                v.into_owned()
            };
            (k.into_owned(), v)
        })
        .collect();
    let mut out = url.clone();
    out.query_pairs_mut().clear().extend_pairs(pairs);
    out
}

/// Equivalent curl command for reproducing a fetch, secrets redacted.
fn make_curl(method: &Method, url: &Url, headers: &HeaderMap) -> String {
    let mut cmd = format!("curl -X{method}");
    for (name, val) in headers {
        let shown = if *name == AUTHORIZATION {
            "<redacted>"
        } else {
            val.to_str().unwrap_or("")
        };
        let header = format!("{}: {shown}", name.as_str()).replace('\'', r"'\''");
        cmd.push_str(&format!(" -H '{header}'"));
    }
    cmd.push_str(&format!(" '{}'", redact_url(url)));
    cmd
}

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("invalid URL: {0}")]
    Url(String),
    #[error("could not build HTTP client: {0}")]
    Build(String),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("network error: {0}")]
    Network(String),
    #[error("HTTP {status} ({message}), request_id={request_id}")]
    Status {
        status: StatusCode,
        message: String,
        request_id: String,
    },
}

/// Per-request overrides of the client defaults.
///
/// ```
/// use escola_http::RequestOpts;
/// use std::time::Duration;
///
/// let opts = RequestOpts {
///     timeout: Some(Duration::from_secs(30)),
///     ..Default::default()
/// };
/// assert_eq!(opts.retries, None);
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct RequestOpts {
    pub timeout: Option<Duration>,
    pub retries: Option<usize>,
}

/// A successfully fetched text body.
#[derive(Clone, Debug)]
pub struct TextResponse {
    /// Final URL after redirects.
    pub url: Url,
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: String,
}

/// Builder for [`HttpClient`].
#[derive(Clone, Debug)]
pub struct HttpClientBuilder {
    user_agent: Option<String>,
    connect_timeout: Duration,
    timeout: Duration,
    retries: usize,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self {
            user_agent: None,
            connect_timeout: Duration::from_secs(5),
            timeout: Duration::from_secs(15),
            retries: 2,
        }
    }
}

impl HttpClientBuilder {
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    pub fn connect_timeout(mut self, dur: Duration) -> Self {
        self.connect_timeout = dur;
        self
    }

    pub fn timeout(mut self, dur: Duration) -> Self {
        self.timeout = dur;
        self
    }

    pub fn retries(mut self, n: usize) -> Self {
        self.retries = n;
        self
    }

    /// ```
    /// use escola_http::{HttpClient, HttpError};
    /// use std::time::Duration;
    ///
    /// let client = HttpClient::builder()
    ///     .timeout(Duration::from_secs(2))
    ///     .retries(0)
    ///     .build()?;
    /// assert_eq!(client.default_timeout, Duration::from_secs(2));
    /// assert_eq!(client.max_retries, 0);
    /// # Ok::<(), HttpError>(())
    /// ```
    pub fn build(self) -> Result<HttpClient, HttpError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));
        if let Some(ua) = &self.user_agent {
            let value = HeaderValue::from_str(ua).map_err(|e| HttpError::Build(e.to_string()))?;
            headers.insert(USER_AGENT, value);
        }
        let inner = Client::builder()
            .connect_timeout(self.connect_timeout)
            .default_headers(headers.clone())
            .build()
            .map_err(|e| HttpError::Build(e.to_string()))?;

        Ok(HttpClient {
            inner,
            headers,
            default_timeout: self.timeout,
            max_retries: self.retries,
        })
    }
}

#[derive(Clone, Debug)]
pub struct HttpClient {
    inner: Client,
    /// Headers sent with every request; kept for curl rendering.
    headers: HeaderMap,
    pub default_timeout: Duration,
    pub max_retries: usize,
}

/// One attempt's outcome before status handling.
struct Exchange {
    url: Url,
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl HttpClient {
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    /// GET a text body (HTML, plain text…) from an absolute http(s) URL.
    pub async fn get_text(&self, path: &str, opts: RequestOpts) -> Result<TextResponse, HttpError> {
        let url = page_url(path)?;
        let ex = self.get_with_retries(url, opts).await?;
        let content_type = ex
            .headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        Ok(TextResponse {
            url: ex.url,
            status: ex.status,
            content_type,
            body: String::from_utf8_lossy(&ex.body).into_owned(),
        })
    }

    async fn get_with_retries(&self, url: Url, opts: RequestOpts) -> Result<Exchange, HttpError> {
        let max_retries = opts.retries.unwrap_or(self.max_retries);
        let timeout = opts.timeout.unwrap_or(self.default_timeout);
        let mut attempt = 0usize;

        loop {
            let req_id = uuid::Uuid::new_v4().simple().to_string();
            let outcome = self.exchange(&url, timeout, &req_id, attempt).await;

            // Decide whether this attempt is final, and how long to wait otherwise.
            let delay = match &outcome {
                Ok(ex) if ex.status.is_success() => None,
                Ok(ex) if ex.status == StatusCode::TOO_MANY_REQUESTS => Some(
                    retry_after(&ex.headers, timeout)
                        .unwrap_or_else(|| backoff(attempt + 1).max(Duration::from_millis(1100))),
                ),
                Ok(ex) if ex.status.is_server_error() => {
                    Some(retry_after(&ex.headers, timeout).unwrap_or_else(|| backoff(attempt + 1)))
                }
                Ok(_) => None,
                Err(HttpError::Timeout(_) | HttpError::Network(_)) => Some(backoff(attempt + 1)),
                Err(_) => None,
            };

            match delay {
                Some(delay) if attempt < max_retries => {
                    attempt += 1;
                    tracing::warn!(
                        req_id=%req_id,
                        attempt,
                        max_retries,
                        backoff_ms=delay.as_millis() as u64,
                        outcome=%describe(&outcome),
                        "http.retrying"
                    );
                    sleep(delay).await;
                }
                _ => return finish(outcome, &req_id),
            }
        }
    }

    async fn exchange(
        &self,
        url: &Url,
        timeout: Duration,
        req_id: &str,
        attempt: usize,
    ) -> Result<Exchange, HttpError> {
        tracing::debug!(
            req_id,
            attempt = attempt + 1,
            url=%redact_url(url),
            timeout_ms=timeout.as_millis() as u64,
            "http.request.start"
        );
        if raw_enabled() {
            let curl = make_curl(&Method::GET, url, &self.headers);
            tracing::debug!(target: "http.raw", req_id, %curl, "request");
        }

        let t0 = Instant::now();
        let resp = self
            .inner
            .get(url.clone())
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify(e, timeout))?;
        let status = resp.status();
        let final_url = resp.url().clone();
        let headers = resp.headers().clone();
        let body = resp
            .bytes()
            .await
            .map_err(|e| classify(e, timeout))?
            .to_vec();
        let duration_ms = t0.elapsed().as_millis() as u64;

        tracing::debug!(
            req_id,
            %status,
            duration_ms,
            body_len = body.len(),
            final_url=%redact_url(&final_url),
            "http.response"
        );
        if raw_enabled() {
            let shown = &body[..body.len().min(RAW_MAX_BODY)];
            tracing::info!(
                target: "http.raw",
                req_id,
                %status,
                duration_ms,
                body=%String::from_utf8_lossy(shown),
                truncated = body.len() > RAW_MAX_BODY
            );
        }

        Ok(Exchange {
            url: final_url,
            status,
            headers,
            body,
        })
    }
}

fn page_url(raw: &str) -> Result<Url, HttpError> {
    let url = Url::parse(raw).map_err(|e| HttpError::Url(format!("{raw}: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(HttpError::Url(format!("unsupported scheme: {other}"))),
    }
}

/// Turn the last attempt into the caller's result.
fn finish(outcome: Result<Exchange, HttpError>, req_id: &str) -> Result<Exchange, HttpError> {
    let ex = match outcome {
        Ok(ex) if ex.status.is_success() => return Ok(ex),
        Ok(ex) => ex,
        Err(err) => {
            tracing::warn!(req_id, error=%err, "http.failed");
            return Err(err);
        }
    };
    let upstream_id = ex
        .headers
        .get("x-request-id")
        .or_else(|| ex.headers.get("x-correlation-id"))
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();
    let snippet = snip_body(&ex.body);
    tracing::warn!(
        req_id,
        status=%ex.status,
        x_request_id=%upstream_id,
        body_snippet=%snippet,
        "http.error"
    );
    Err(HttpError::Status {
        status: ex.status,
        message: ex
            .status
            .canonical_reason()
            .map(str::to_string)
            .unwrap_or(snippet),
        request_id: upstream_id,
    })
}

fn describe(outcome: &Result<Exchange, HttpError>) -> String {
    match outcome {
        Ok(ex) => ex.status.to_string(),
        Err(err) => err.to_string(),
    }
}

fn classify(err: reqwest::Error, timeout: Duration) -> HttpError {
    if err.is_timeout() {
        HttpError::Timeout(timeout)
    } else if err.is_builder() {
        HttpError::Url(err.to_string())
    } else {
        HttpError::Network(err.to_string())
    }
}

/// 200ms doubling per attempt, capped at 2^10.
fn backoff(attempt: usize) -> Duration {
    let shift = attempt.saturating_sub(1).min(10) as u32;
    Duration::from_millis(200u64.saturating_mul(1 << shift))
}

/// Server-requested wait, never longer than `cap`.
fn retry_after(h: &HeaderMap, cap: Duration) -> Option<Duration> {
    let secs: u64 = h.get(RETRY_AFTER)?.to_str().ok()?.trim().parse().ok()?;
    Some(Duration::from_secs(secs).min(cap))
}

fn snip_body(body: &[u8]) -> String {
    let cut = body.len().min(SNIPPET_LEN);
    let mut snip = String::from_utf8_lossy(&body[..cut]).into_owned();
    if body.len() > cut {
        snip.push('…');
    }
    snip
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_query_values_are_redacted() {
        let url = Url::parse("https://x.example/p?api_key=abc&page=2&Token=t").unwrap();
        let red = redact_url(&url);
        let pairs: Vec<(String, String)> = red.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("api_key".into(), "<redacted>".into()),
                ("page".into(), "2".into()),
                ("Token".into(), "<redacted>".into()),
            ]
        );
    }

    #[test]
    fn curl_never_leaks_authorization() {
        let url = Url::parse("https://x.example/p?secret=s").unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, "Bearer top".parse().unwrap());
        headers.insert(USER_AGENT, "escola's agent".parse().unwrap());
        let curl = make_curl(&Method::GET, &url, &headers);
        assert!(!curl.contains("top"));
        assert!(!curl.contains("secret=s"));
        assert!(curl.starts_with("curl -XGET"));
        assert!(curl.contains(r"-H 'user-agent: escola'\''s agent'"));
    }

    #[test]
    fn backoff_grows_and_saturates() {
        assert_eq!(backoff(1), Duration::from_millis(200));
        assert_eq!(backoff(2), Duration::from_millis(400));
        assert_eq!(backoff(100), backoff(11));
    }

    #[test]
    fn snippets_are_truncated() {
        let body = vec![b'a'; 600];
        let s = snip_body(&body);
        assert_eq!(s.chars().count(), SNIPPET_LEN + 1);
        assert!(s.ends_with('…'));
        assert_eq!(snip_body(b"short"), "short");
    }

    #[test]
    fn retry_after_is_read_in_seconds() {
        let cap = Duration::from_secs(15);
        let mut h = HeaderMap::new();
        assert_eq!(retry_after(&h, cap), None);
        h.insert(RETRY_AFTER, " 3 ".parse().unwrap());
        assert_eq!(retry_after(&h, cap), Some(Duration::from_secs(3)));
        h.insert(RETRY_AFTER, "Wed, 21 Oct 2026 07:28:00 GMT".parse().unwrap());
        assert_eq!(retry_after(&h, cap), None);
    }

    #[test]
    fn retry_after_is_capped() {
        let mut h = HeaderMap::new();
        h.insert(RETRY_AFTER, "86400".parse().unwrap());
        assert_eq!(
            retry_after(&h, Duration::from_secs(15)),
            Some(Duration::from_secs(15))
        );
    }

    #[test]
    fn page_urls_must_be_absolute_http() {
        assert!(matches!(page_url("aula/1"), Err(HttpError::Url(_))));
        assert!(matches!(page_url("ftp://x.example/a"), Err(HttpError::Url(_))));
        assert_eq!(
            page_url("https://blog.example.com/materias/aula/1").unwrap().path(),
            "/materias/aula/1"
        );
    }
}
