//! Payload sources for the collector.
//!
//! [`Fetch`] is the seam between the collector and the transport. The
//! collector only needs "the current payload or an error"; timeouts, auth and
//! query parameters are the fetcher's business.

use async_trait::async_trait;
use reqwest::Url;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, instrument};

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("invalid endpoint url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("failed to read payload file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("transport already released")]
    Closed,
}

/// Source of exposition payloads.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self) -> Result<String, FetchError>;

    /// Human-readable description of the source, for logs.
    fn describe(&self) -> String;
}

/// Options for [`HttpFetcher`].
#[derive(Debug, Clone)]
pub struct HttpOptions {
    pub url: String,
    pub timeout: Duration,
    /// Exporter collectors to request via `collect[]` query parameters.
    /// Empty means "whatever the exporter has enabled".
    pub collectors: Vec<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl HttpOptions {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout: Duration::from_secs(5),
            collectors: Vec::new(),
            username: None,
            password: None,
        }
    }
}

/// Scrapes an exporter endpoint over HTTP(S).
pub struct HttpFetcher {
    client: reqwest::Client,
    url: Url,
    username: Option<String>,
    password: Option<String>,
}

impl HttpFetcher {
    pub fn new(options: HttpOptions) -> Result<Self, FetchError> {
        let mut url = Url::parse(&options.url).map_err(|e| FetchError::InvalidUrl {
            url: options.url.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(FetchError::InvalidUrl {
                url: options.url,
                reason: format!("unsupported scheme '{}'", url.scheme()),
            });
        }

        if !options.collectors.is_empty() {
            let mut query = url.query_pairs_mut();
            for collector in &options.collectors {
                query.append_pair("collect[]", collector);
            }
        }

        let client = reqwest::Client::builder()
            .timeout(options.timeout)
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .build()?;

        Ok(Self {
            client,
            url,
            username: options.username,
            password: options.password,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    #[instrument(skip(self), fields(url = %self.url))]
    async fn fetch(&self) -> Result<String, FetchError> {
        let mut request = self.client.get(self.url.clone());
        if let Some(username) = &self.username {
            request = request.basic_auth(username, self.password.as_ref());
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: self.url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        debug!("Fetched {} bytes", body.len());
        Ok(body)
    }

    fn describe(&self) -> String {
        self.url.to_string()
    }
}

/// Reads the payload from a file on every poll.
pub struct FileFetcher {
    path: PathBuf,
}

impl FileFetcher {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl Fetch for FileFetcher {
    async fn fetch(&self) -> Result<String, FetchError> {
        tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| FetchError::Io {
                path: self.path.clone(),
                source,
            })
    }

    fn describe(&self) -> String {
        format!("file://{}", self.path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_http_fetcher_appends_collect_params() {
        let mut options = HttpOptions::new("http://127.0.0.1:9182/metrics");
        options.collectors = vec!["cpu".into(), "net".into()];

        let fetcher = HttpFetcher::new(options).unwrap();
        assert_eq!(
            fetcher.url().as_str(),
            "http://127.0.0.1:9182/metrics?collect%5B%5D=cpu&collect%5B%5D=net"
        );
    }

    #[test]
    fn test_http_fetcher_rejects_bad_urls() {
        assert!(matches!(
            HttpFetcher::new(HttpOptions::new("not a url")),
            Err(FetchError::InvalidUrl { .. })
        ));
        assert!(matches!(
            HttpFetcher::new(HttpOptions::new("ftp://host/metrics")),
            Err(FetchError::InvalidUrl { .. })
        ));
    }

    #[tokio::test]
    async fn test_file_fetcher_reads_payload() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "windows_os_processes 12").unwrap();

        let fetcher = FileFetcher::new(file.path());
        let body = fetcher.fetch().await.unwrap();
        assert_eq!(body, "windows_os_processes 12\n");
    }

    #[tokio::test]
    async fn test_file_fetcher_missing_file() {
        let fetcher = FileFetcher::new("/nonexistent/payload.prom");
        assert!(matches!(fetcher.fetch().await, Err(FetchError::Io { .. })));
    }
}
