//! Download of the source PDF into a temporary local file.
//!
//! A single bounded-timeout GET; any transport error, timeout, or non-2xx
//! status fails the download. There is no retry.

use std::path::{Path, PathBuf};
use std::time::Duration;

use pdfrag_shared::{PdfRagError, Result};
use reqwest::Client;
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument};
use url::Url;
use uuid::Uuid;

/// Maximum number of redirects to follow when fetching a document.
const MAX_REDIRECTS: usize = 5;

/// Default timeout in seconds for the download.
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Maximum response size we accept (50 MB).
const MAX_RESPONSE_SIZE: u64 = 50 * 1024 * 1024;

/// User-Agent string for download requests.
const USER_AGENT: &str = concat!("pdfrag/", env!("CARGO_PKG_VERSION"));

/// Configuration for the downloader.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Timeout for the whole request in seconds.
    pub timeout_secs: u64,
    /// Directory receiving the temp files.
    pub temp_dir: PathBuf,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            temp_dir: std::env::temp_dir(),
        }
    }
}

/// A downloaded document waiting to be loaded.
#[derive(Debug, Clone)]
pub struct FetchedFile {
    pub path: PathBuf,
    pub size: u64,
    /// Hex SHA-256 of the downloaded bytes.
    pub content_hash: String,
}

/// HTTP downloader writing responses to temp files.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    temp_dir: PathBuf,
}

impl Fetcher {
    pub fn new(opts: &FetchOptions) -> Result<Self> {
        Ok(Self {
            client: build_client(opts)?,
            temp_dir: opts.temp_dir.clone(),
        })
    }

    /// Download `url` into a new `pdfrag-<uuid>.pdf` temp file.
    ///
    /// The caller owns the returned file and must remove it.
    #[instrument(skip(self))]
    pub async fn fetch(&self, url: &str) -> Result<FetchedFile> {
        let parsed = Url::parse(url)
            .map_err(|e| PdfRagError::validation(format!("invalid source URL '{url}': {e}")))?;

        let response = self
            .client
            .get(parsed.as_str())
            .send()
            .await
            .map_err(|e| PdfRagError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PdfRagError::Network(format!("{url}: HTTP {status}")));
        }

        // Check content-length if available
        if let Some(len) = response.content_length() {
            if len > MAX_RESPONSE_SIZE {
                return Err(PdfRagError::validation(format!(
                    "{url}: response too large ({len} bytes, max {MAX_RESPONSE_SIZE})"
                )));
            }
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| PdfRagError::Network(format!("{url}: failed to read body: {e}")))?;

        let path = temp_file_path(&self.temp_dir);
        if let Err(e) = tokio::fs::write(&path, &body).await {
            // A partial write must not leave an orphan behind.
            let _ = tokio::fs::remove_file(&path).await;
            return Err(PdfRagError::io(&path, e));
        }

        let content_hash = {
            let mut hasher = Sha256::new();
            hasher.update(&body);
            format!("{:x}", hasher.finalize())
        };

        info!(path = %path.display(), bytes = body.len(), "document downloaded");

        Ok(FetchedFile {
            path,
            size: body.len() as u64,
            content_hash,
        })
    }
}

/// Build a reqwest client with appropriate settings.
fn build_client(opts: &FetchOptions) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .timeout(Duration::from_secs(opts.timeout_secs))
        .build()
        .map_err(|e| PdfRagError::Network(format!("failed to build HTTP client: {e}")))
}

fn temp_file_path(dir: &Path) -> PathBuf {
    let path = dir.join(format!("pdfrag-{}.pdf", Uuid::now_v7()));
    debug!(path = %path.display(), "allocated temp file");
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_options(timeout_secs: u64) -> FetchOptions {
        let temp_dir = std::env::temp_dir().join(format!("pdfrag-fetch-test-{}", Uuid::now_v7()));
        std::fs::create_dir_all(&temp_dir).expect("create temp dir");
        FetchOptions {
            timeout_secs,
            temp_dir,
        }
    }

    fn dir_is_empty(dir: &Path) -> bool {
        std::fs::read_dir(dir).unwrap().next().is_none()
    }

    #[tokio::test]
    async fn test_fetch_writes_temp_file() {
        let server = wiremock::MockServer::start().await;
        let body = b"%PDF-1.4 fake document bytes".to_vec();

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/doc.pdf"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_bytes(body.clone()))
            .mount(&server)
            .await;

        let opts = test_options(10);
        let fetcher = Fetcher::new(&opts).unwrap();
        let fetched = fetcher
            .fetch(&format!("{}/doc.pdf", server.uri()))
            .await
            .unwrap();

        assert!(fetched.path.starts_with(&opts.temp_dir));
        assert!(fetched.path.to_string_lossy().ends_with(".pdf"));
        assert_eq!(std::fs::read(&fetched.path).unwrap(), body);
        assert_eq!(fetched.size, body.len() as u64);
        assert_eq!(fetched.content_hash.len(), 64);

        let _ = std::fs::remove_dir_all(&opts.temp_dir);
    }

    #[tokio::test]
    async fn test_fetch_non_success_status() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let opts = test_options(10);
        let fetcher = Fetcher::new(&opts).unwrap();
        let err = fetcher
            .fetch(&format!("{}/missing.pdf", server.uri()))
            .await
            .unwrap_err();

        assert!(matches!(err, PdfRagError::Network(_)));
        assert!(err.to_string().contains("404"));
        assert!(dir_is_empty(&opts.temp_dir));

        let _ = std::fs::remove_dir_all(&opts.temp_dir);
    }

    #[tokio::test]
    async fn test_fetch_times_out() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(
                wiremock::ResponseTemplate::new(200)
                    .set_body_bytes(b"late".to_vec())
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let opts = test_options(1);
        let fetcher = Fetcher::new(&opts).unwrap();
        let err = fetcher
            .fetch(&format!("{}/slow.pdf", server.uri()))
            .await
            .unwrap_err();

        assert!(matches!(err, PdfRagError::Network(_)));
        assert!(dir_is_empty(&opts.temp_dir));

        let _ = std::fs::remove_dir_all(&opts.temp_dir);
    }

    #[tokio::test]
    async fn test_fetch_rejects_invalid_url() {
        let fetcher = Fetcher::new(&FetchOptions::default()).unwrap();
        let err = fetcher.fetch("not a url").await.unwrap_err();
        assert!(matches!(err, PdfRagError::Validation { .. }));
    }
}
