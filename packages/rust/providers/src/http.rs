//! Shared HTTP plumbing for OpenAI-compatible endpoints.

use pdfrag_shared::{PdfRagError, Result};
use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// User-Agent string for provider requests.
const USER_AGENT: &str = concat!("pdfrag/", env!("CARGO_PKG_VERSION"));

/// Longest error-body excerpt carried into an error message.
const ERROR_BODY_EXCERPT: usize = 300;

/// Authenticated client for one OpenAI-compatible API base URL.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl OpenAiClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| PdfRagError::Provider(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    /// POST `body` as JSON to `{base_url}/{endpoint}` and decode the reply.
    pub(crate) async fn post_json<B, R>(&self, endpoint: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let url = format!("{}/{endpoint}", self.base_url);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| PdfRagError::Provider(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let excerpt: String = text.chars().take(ERROR_BODY_EXCERPT).collect();
            return Err(PdfRagError::Provider(format!(
                "{url}: HTTP {status}: {excerpt}"
            )));
        }

        response
            .json::<R>()
            .await
            .map_err(|e| PdfRagError::Provider(format!("{url}: invalid response body: {e}")))
    }
}
