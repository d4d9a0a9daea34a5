//! HTTP session shared by all fetchers
//!
//! The session owns the browser-like header set and the cookie jar for the
//! whole run. It performs exactly one GET per call; retries belong to the
//! fetchers in [`crate::fetch`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::cookie::Jar;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};

use crate::error::{HarvestError, NetworkError, Result};
use crate::parser::is_challenge_page;

/// Default User-Agent mimicking a desktop browser
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Default Accept header for HTML navigation
const DEFAULT_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";

/// Default Accept-Language header
const DEFAULT_ACCEPT_LANGUAGE: &str = "en-US,en;q=0.5";

/// Something that can perform a single GET and return the body.
///
/// [`SessionContext`] is the production implementation; tests substitute
/// scripted transports.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn request(&self, url: &str) -> std::result::Result<String, NetworkError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn request(&self, url: &str) -> std::result::Result<String, NetworkError> {
        (**self).request(url).await
    }
}

/// Configuration for the HTTP session
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Request timeout in seconds (default: 15)
    pub timeout_secs: u64,
    /// User-Agent header value
    pub user_agent: String,
    /// Accept header value
    pub accept: String,
    /// Accept-Language header value
    pub accept_language: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            accept: DEFAULT_ACCEPT.to_string(),
            accept_language: DEFAULT_ACCEPT_LANGUAGE.to_string(),
        }
    }
}

impl ClientConfig {
    fn headers(&self) -> Result<HeaderMap> {
        let value = |name: &str, v: &str| {
            HeaderValue::from_str(v)
                .map_err(|_| HarvestError::Config(format!("invalid {name} header value")))
        };
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, value("User-Agent", &self.user_agent)?);
        headers.insert(ACCEPT, value("Accept", &self.accept)?);
        headers.insert(ACCEPT_LANGUAGE, value("Accept-Language", &self.accept_language)?);
        Ok(headers)
    }
}

/// Cookie-persisting HTTP session
pub struct SessionContext {
    client: reqwest::Client,
    cookies: Arc<Jar>,
}

impl SessionContext {
    /// Create a session with default configuration
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be created
    pub fn new() -> Result<Self> {
        Self::with_config(ClientConfig::default())
    }

    /// Create a session with custom configuration
    ///
    /// # Errors
    /// Returns an error if a header value is invalid or the HTTP client
    /// cannot be created
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        let cookies = Arc::new(Jar::default());
        let client = reqwest::Client::builder()
            .default_headers(config.headers()?)
            .cookie_provider(Arc::clone(&cookies))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { client, cookies })
    }

    /// Cookie jar shared by every request of this session
    pub fn cookie_jar(&self) -> &Arc<Jar> {
        &self.cookies
    }
}

#[async_trait]
impl Transport for SessionContext {
    async fn request(&self, url: &str) -> std::result::Result<String, NetworkError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(NetworkError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        if is_challenge_page(&body) {
            return Err(NetworkError::Challenge);
        }
        Ok(body)
    }
}
