//! HTTP snapshot client with retries and optional authentication

use std::time::Duration;

use async_trait::async_trait;
use color_eyre::{eyre::WrapErr, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, COOKIE};
use tracing::{debug, info, instrument};

use crate::capture::source::{Snapshot, SnapshotSource};
use crate::error::FetchError;
use crate::utils::cookie_header;
use crate::{AuthConfig, ClientConfig};

/// Pulls snapshots over HTTP(S)
pub struct HttpSnapshotClient {
    client: reqwest::Client,
    auth: Option<HeaderValue>,
    cookie: Option<HeaderValue>,
    retry_count: u32,
    retry_wait: Duration,
}

impl HttpSnapshotClient {
    pub fn new(config: &ClientConfig, auth: &AuthConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("image/jpeg"));

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .pool_idle_timeout(Duration::from_millis(config.pool_idle_timeout_ms))
            .build()
            .wrap_err("failed to build HTTP client")?;

        let token = auth.token.trim();
        let auth_header = if token.is_empty() {
            None
        } else {
            let mut value =
                HeaderValue::from_str(token).wrap_err("auth.token is not a valid header value")?;
            value.set_sensitive(true);
            Some(value)
        };

        let cookie = match cookie_header(&auth.cookie, &auth.cookie_name) {
            Some(cookie) => {
                let mut value = HeaderValue::from_str(&cookie)
                    .wrap_err("auth.cookie is not a valid header value")?;
                value.set_sensitive(true);
                Some(value)
            }
            None => None,
        };

        info!(
            "Snapshot client ready (timeout {}ms, {} retries, auth: {}, cookie: {})",
            config.timeout_ms,
            config.retry_count,
            auth_header.is_some(),
            cookie.is_some()
        );

        Ok(Self {
            client,
            auth: auth_header,
            cookie,
            retry_count: config.retry_count,
            retry_wait: Duration::from_millis(config.retry_wait_ms),
        })
    }

    async fn try_get(&self, url: &str) -> std::result::Result<Snapshot, reqwest::Error> {
        let mut request = self.client.get(url);
        if let Some(auth) = &self.auth {
            request = request.header(AUTHORIZATION, auth.clone());
        }
        if let Some(cookie) = &self.cookie {
            request = request.header(COOKIE, cookie.clone());
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;
        Ok(Snapshot { status, body })
    }
}

#[async_trait]
impl SnapshotSource for HttpSnapshotClient {
    /// Transport errors are retried; any HTTP response, whatever its status, is returned as is.
    #[instrument(skip(self))]
    async fn get_image(&self, url: &str) -> std::result::Result<Snapshot, FetchError> {
        let mut attempt = 0;
        loop {
            match self.try_get(url).await {
                Ok(snapshot) => return Ok(snapshot),
                Err(e) if attempt < self.retry_count => {
                    attempt += 1;
                    debug!("Retrying {} ({}/{}): {}", url, attempt, self.retry_count, e);
                    tokio::time::sleep(self.retry_wait).await;
                }
                Err(e) => return Err(FetchError::transport(e)),
            }
        }
    }
}
