use std::time::Duration;

use async_trait::async_trait;
use reqwest::{redirect::Policy, Client};
use tracing::debug;
use url::Url;

use crate::{
    config::FetchConfig,
    domain::{ErrorKind, FetchOutcome},
};

/// Retrieves one site's HTML. Implementations never fail outright; every
/// problem is reported through [`FetchOutcome::Failure`].
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, address: &str, timeout: Duration) -> FetchOutcome;
}

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> reqwest::Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .redirect(Policy::limited(config.max_redirects))
            .build()?;
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, address: &str, timeout: Duration) -> FetchOutcome {
        let url = match normalize_address(address) {
            Ok(url) => url,
            Err(message) => {
                return FetchOutcome::failure(ErrorKind::OtherError(message.clone()), message)
            }
        };

        let response = match self.client.get(url.clone()).timeout(timeout).send().await {
            Ok(response) => response,
            Err(err) => {
                debug!(target: "fetcher", url = %url, error = %err, "request failed");
                return FetchOutcome::failure(classify_error(&err), err.to_string());
            }
        };

        let status = response.status();
        if !(status.is_success() || status.is_redirection()) {
            debug!(target: "fetcher", url = %url, status = status.as_u16(), "unsuccessful status");
            return FetchOutcome::failure(
                ErrorKind::HttpError(status.as_u16()),
                format!("{} returned {}", response.url(), status),
            );
        }

        let final_url = response.url().to_string();
        match response.text().await {
            Ok(body) => FetchOutcome::Success { body, final_url },
            Err(err) => {
                debug!(target: "fetcher", url = %final_url, error = %err, "failed to read body");
                FetchOutcome::failure(classify_error(&err), err.to_string())
            }
        }
    }
}

/// Prefixes `https://` when the address carries no scheme and checks that the
/// result is an http(s) URL.
pub fn normalize_address(address: &str) -> Result<Url, String> {
    let trimmed = address.trim();
    if trimmed.is_empty() {
        return Err("empty address".to_string());
    }

    let lowered = trimmed.to_ascii_lowercase();
    let candidate = if lowered.starts_with("http://") || lowered.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };

    match Url::parse(&candidate) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.host().is_some() => Ok(url),
        Ok(url) => Err(format!("unsupported address: {url}")),
        Err(err) => Err(format!("invalid address {trimmed:?}: {err}")),
    }
}

fn classify_error(err: &reqwest::Error) -> ErrorKind {
    if err.is_timeout() {
        ErrorKind::Timeout
    } else if err.is_connect() {
        ErrorKind::ConnectionError
    } else if let Some(status) = err.status() {
        ErrorKind::HttpError(status.as_u16())
    } else {
        ErrorKind::OtherError(err.to_string())
    }
}
