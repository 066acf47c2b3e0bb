//! HTTP fetching for the upstream providers.
//!
//! Every failure is translated into a [`FetchError`] carrying the HTTP status
//! (when there was one) and the upstream message. There is no retry here;
//! ingesters decide what a failure means for their run.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::error::FetchError;

/// Maximum length of the upstream body echoed into an error message.
const BODY_PREVIEW_LEN: usize = 500;

/// A GET request: URL plus ordered query parameters and headers.
///
/// Query keys may repeat (`datatypeid=TMAX&datatypeid=TMIN`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Request {
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
}

impl Request {
    // ---
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }
}

#[async_trait]
pub trait Fetch: Send + Sync {
    /// Fetch the response body as text.
    async fn get_text(&self, request: &Request) -> Result<String, FetchError>;

    /// Stream the response body into `dest`, creating parent directories.
    /// Returns the number of bytes written.
    async fn download(&self, request: &Request, dest: &Path) -> Result<u64, FetchError>;

    /// Fetch and decode a JSON body.
    async fn get_json(&self, request: &Request) -> Result<serde_json::Value, FetchError> {
        // ---
        let text = self.get_text(request).await?;
        serde_json::from_str(&text).map_err(|e| {
            FetchError::transport(&request.url, format!("invalid JSON body: {e}"))
        })
    }
}

/// [`Fetch`] over a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    // ---
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .build()
            .map_err(|e| FetchError::transport("<client>", e))?;
        Ok(Self { client })
    }

    async fn send(&self, request: &Request) -> Result<reqwest::Response, FetchError> {
        // ---
        let mut builder = self.client.get(&request.url).query(&request.query);
        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }

        tracing::debug!("GET {} ({} query params)", request.url, request.query.len());

        let response = builder
            .send()
            .await
            .map_err(|e| FetchError::transport(&request.url, e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let url = response.url().to_string();
        let body = response.text().await.unwrap_or_default();
        let message = if body.trim().is_empty() {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        } else {
            preview(&body)
        };
        Err(FetchError::status(url, status.as_u16(), message))
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    // ---
    async fn get_text(&self, request: &Request) -> Result<String, FetchError> {
        let response = self.send(request).await?;
        response
            .text()
            .await
            .map_err(|e| FetchError::transport(&request.url, e))
    }

    async fn download(&self, request: &Request, dest: &Path) -> Result<u64, FetchError> {
        // ---
        let io_err = |e: std::io::Error| {
            FetchError::transport(&request.url, format!("{}: {e}", dest.display()))
        };

        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }

        let mut response = self.send(request).await?;
        let mut file = tokio::fs::File::create(dest).await.map_err(io_err)?;
        let mut written: u64 = 0;

        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| FetchError::transport(&request.url, e))?
        {
            file.write_all(&chunk).await.map_err(io_err)?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(io_err)?;

        tracing::info!("Downloaded {} bytes to {}", written, dest.display());
        Ok(written)
    }
}

fn preview(body: &str) -> String {
    // ---
    if body.len() <= BODY_PREVIEW_LEN {
        return body.trim().to_string();
    }
    let mut end = BODY_PREVIEW_LEN;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}
