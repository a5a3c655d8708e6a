use std::sync::Arc;
use std::time::Duration;

use reqwest::header::HOST;
use reqwest::{Client, Response};
use thiserror::Error;
use tokio::sync::Semaphore;

use crate::config::{HttpConfig, UpstreamConfig};
use crate::error::Result;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("upstream responded {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("upstream unreachable: {0}")]
    Transport(String),
}

/// Fetches `<base>/<name>/rss` from the upstream nitter instance.
///
/// One instance is shared by the request handlers and the refresh scheduler.
/// `max_connections` bounds the number of requests in flight across both.
pub struct FeedFetcher {
    client: Client,
    base_url: String,
    virtual_host: Option<String>,
    credentials: Option<(String, Option<String>)>,
    permits: Arc<Semaphore>,
    connect_attempts: u32,
}

impl FeedFetcher {
    pub fn new(upstream: &UpstreamConfig, http: &HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(http.connect_timeout_secs))
            .read_timeout(Duration::from_secs(http.read_timeout_secs))
            .pool_max_idle_per_host(http.max_connections_per_route)
            .pool_idle_timeout(Duration::from_millis(http.keep_alive_ms))
            .user_agent(concat!("nitter-filter/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let credentials = upstream.basic_auth.as_ref().map(|auth| match auth.split_once(':') {
            Some((user, pass)) => (user.to_string(), Some(pass.to_string())),
            None => (auth.clone(), None),
        });

        Ok(Self {
            client,
            base_url: upstream.url.trim_end_matches('/').to_string(),
            virtual_host: upstream.virtual_host.clone(),
            credentials,
            permits: Arc::new(Semaphore::new(http.max_connections)),
            connect_attempts: http.connect_attempts.max(1),
        })
    }

    pub fn feed_url(&self, name: &str) -> String {
        format!("{}/{}/rss", self.base_url, urlencoding::encode(name))
    }

    /// Fetch the raw feed text for `name`. Non-2xx responses and network
    /// failures are classified separately; neither is retried here beyond
    /// re-establishing a refused connection.
    pub async fn fetch(&self, name: &str) -> std::result::Result<String, FetchError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let url = self.feed_url(name);
        let response = self.send(&url).await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Upstream {
                status: status.as_u16(),
                message: format!("{} returned {}", url, status),
            });
        }

        response
            .text()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))
    }

    async fn send(&self, url: &str) -> std::result::Result<Response, FetchError> {
        let mut attempt = 1;
        loop {
            let mut request = self.client.get(url);
            if let Some(host) = &self.virtual_host {
                request = request.header(HOST, host);
            }
            if let Some((user, pass)) = &self.credentials {
                request = request.basic_auth(user, pass.as_ref());
            }

            match request.send().await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_connect() && attempt < self.connect_attempts => {
                    tracing::debug!("connect to {} failed (attempt {}): {}", url, attempt, e);
                    attempt += 1;
                }
                Err(e) => return Err(FetchError::Transport(e.to_string())),
            }
        }
    }
}
