use async_trait::async_trait;
use escola_config::ContentSettings;
use escola_http::{HttpClient, HttpError, RequestOpts};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Raw page as fetched; lives for one pipeline run.
#[derive(Debug, Clone)]
pub struct RemoteDocument {
    /// Final URL after redirects.
    pub url: Url,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
    /// blake3 of the body, hex encoded.
    pub checksum: String,
}

impl RemoteDocument {
    pub fn new(url: Url, status: u16, content_type: Option<String>, body: String) -> Self {
        let checksum = blake3::hash(body.as_bytes()).to_hex().to_string();
        Self {
            url,
            status,
            content_type,
            body,
            checksum,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("server answered HTTP {status}")]
    Status { status: u16 },
    #[error("network error: {0}")]
    Network(String),
}

impl From<HttpError> for FetchError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::Url(m) => FetchError::InvalidUrl(m),
            HttpError::Timeout(d) => FetchError::Timeout(d),
            HttpError::Status { status, .. } => FetchError::Status {
                status: status.as_u16(),
            },
            HttpError::Network(m) | HttpError::Build(m) => FetchError::Network(m),
        }
    }
}

/// Source of remote pages for the material viewer.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<RemoteDocument, FetchError>;
}

/// [`PageFetcher`] backed by the shared HTTP client.
#[derive(Clone, Debug)]
pub struct HttpFetcher {
    client: HttpClient,
}

impl HttpFetcher {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }

    pub fn from_settings(settings: &ContentSettings) -> Result<Self, FetchError> {
        let client = HttpClient::builder()
            .user_agent(settings.user_agent.clone())
            .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
            .timeout(Duration::from_secs(settings.timeout_secs))
            .retries(settings.retries)
            .build()?;
        Ok(Self::new(client))
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<RemoteDocument, FetchError> {
        let resp = self
            .client
            .get_text(url.as_str(), RequestOpts::default())
            .await?;
        let is_html = resp
            .content_type
            .as_deref()
            .is_none_or(|ct| ct.contains("html") || ct.starts_with("text/"));
        if !is_html {
            tracing::warn!(
                url = %resp.url,
                content_type = ?resp.content_type,
                "content.fetch.unexpected_type"
            );
        }
        let doc = RemoteDocument::new(resp.url, resp.status.as_u16(), resp.content_type, resp.body);
        tracing::debug!(
            url = %doc.url,
            status = doc.status,
            bytes = doc.body.len(),
            checksum = %doc.checksum,
            "content.fetch.done"
        );
        Ok(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_is_blake3_of_body() {
        let url = Url::parse("https://blog.example.com/").unwrap();
        let doc = RemoteDocument::new(url, 200, None, "<p>x</p>".into());
        assert_eq!(doc.checksum, blake3::hash(b"<p>x</p>").to_hex().to_string());
        assert_eq!(doc.checksum.len(), 64);
    }

    #[test]
    fn http_errors_keep_their_kind() {
        let status = HttpError::Status {
            status: escola_http::StatusCode::BAD_GATEWAY,
            message: "Bad Gateway".into(),
            request_id: "-".into(),
        };
        assert_eq!(FetchError::from(status), FetchError::Status { status: 502 });
        assert_eq!(
            FetchError::from(HttpError::Timeout(Duration::from_secs(3))),
            FetchError::Timeout(Duration::from_secs(3))
        );
        assert!(matches!(
            FetchError::from(HttpError::Network("reset".into())),
            FetchError::Network(_)
        ));
    }
}
