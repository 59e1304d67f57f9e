//! HTTP access to the watch page, the player script and the media streams.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::reference::VideoId;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use std::fmt;
use std::future::Future;

/// Source of watch-page markup.
///
/// The pipeline depends on this trait only, so tests and callers can plug in their own transport.
pub trait PageFetcher {
    /// Retrieves the raw markup of the watch page of `id`.
    fn fetch_page(&self, id: &VideoId) -> impl Future<Output = Result<String>> + Send;

    /// Host whose watch pages are fetched, used to build absolute player script URLs.
    fn host(&self) -> &str;
}

/// A page and stream fetcher backed by `reqwest`.
#[derive(Clone, Debug)]
pub struct HttpFetcher {
    client: reqwest::Client,
    host: String,
}

impl fmt::Display for HttpFetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HttpFetcher(host={})", self.host)
    }
}

impl HttpFetcher {
    /// Creates a fetcher that identifies itself with the configured browser user agent.
    ///
    /// # Errors
    ///
    /// This function will return an error if the user agent is not a valid header value or the
    /// client cannot be built.
    pub fn new(config: &Config) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let agent = HeaderValue::from_str(&config.user_agent)
            .map_err(|e| Error::Config(format!("invalid user agent: {}", e)))?;
        headers.insert(USER_AGENT, agent);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            host: config.host.clone(),
        })
    }

    /// The watch page URL of a video.
    pub fn watch_url(&self, id: &VideoId) -> String {
        format!("https://{}/watch?v={}", self.host, id)
    }

    /// Fetches a text document, such as the player script.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FetchFailed`] on transport errors and non-success statuses.
    pub async fn fetch_text(&self, url: &str) -> Result<String> {
        log::debug!("Fetching {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| Error::FetchFailed(e.to_string()))?;

        response
            .text()
            .await
            .map_err(|e| Error::FetchFailed(e.to_string()))
    }

    /// Opens a media URL for streaming. The body is read by the caller.
    ///
    /// # Errors
    ///
    /// This function will return an error if the request fails or the server answers with an error status.
    pub async fn fetch_bytes(&self, url: &str) -> Result<reqwest::Response> {
        log::debug!("Opening stream {}", url);

        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response)
    }
}

impl PageFetcher for HttpFetcher {
    async fn fetch_page(&self, id: &VideoId) -> Result<String> {
        self.fetch_text(&self.watch_url(id)).await
    }

    fn host(&self) -> &str {
        &self.host
    }
}
