use std::time::Duration;

use coinwatch_core::config::{DEFAULT_USER_AGENT, validate_target_url};
use coinwatch_core::error::AppError;
use coinwatch_core::traits::Fetcher;
use reqwest::Client;
use reqwest::redirect::Policy;

const MAX_REDIRECTS: usize = 10;

/// HTTP fetcher using reqwest.
///
/// Every call builds its own client with idle pooling disabled, so no
/// connection outlives the fetch that opened it. Redirects are followed.
/// Non-2xx responses are returned like any other body: only transport
/// failures are errors.
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    user_agent: String,
    timeout: Option<Duration>,
    max_body_bytes: Option<usize>,
}

impl ReqwestFetcher {
    pub fn new() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: None,
            max_body_bytes: None,
        }
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Abort a fetch that takes longer than `timeout`. Unset by default.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Fail a fetch whose body grows past `limit` bytes. Unset by default.
    pub fn with_max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = Some(limit);
        self
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    fn build_client(&self) -> Result<Client, AppError> {
        let mut builder = Client::builder()
            .user_agent(self.user_agent.as_str())
            .redirect(Policy::limited(MAX_REDIRECTS))
            .pool_max_idle_per_host(0);

        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        builder
            .build()
            .map_err(|e| AppError::InitError(format!("Failed to create HTTP client: {e}")))
    }

    async fn read_capped(
        &self,
        mut response: reqwest::Response,
        limit: usize,
    ) -> Result<String, AppError> {
        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(transfer_error)? {
            if body.len() + chunk.len() > limit {
                return Err(AppError::NetworkError(format!(
                    "Response body exceeds {limit} bytes"
                )));
            }
            body.extend_from_slice(&chunk);
        }
        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

impl Default for ReqwestFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, url: &str) -> Result<String, AppError> {
        let target = validate_target_url(url).map_err(|e| match e {
            AppError::ConfigError(msg) => AppError::InitError(msg),
            other => other,
        })?;
        let client = self.build_client()?;

        let response = client.get(target).send().await.map_err(send_error)?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), %url, "Non-success status, using body anyway");
        }

        match self.max_body_bytes {
            Some(limit) => self.read_capped(response, limit).await,
            None => response.text().await.map_err(transfer_error),
        }
    }
}

fn send_error(e: reqwest::Error) -> AppError {
    if e.is_builder() {
        AppError::InitError(format!("Failed to build request: {e}"))
    } else if e.is_connect() {
        AppError::NetworkError(format!("Connection failed: {e}"))
    } else if e.is_timeout() {
        AppError::NetworkError(format!("Request timed out: {e}"))
    } else if e.is_redirect() {
        AppError::NetworkError(format!("Redirect failed: {e}"))
    } else {
        AppError::NetworkError(e.to_string())
    }
}

fn transfer_error(e: reqwest::Error) -> AppError {
    AppError::NetworkError(format!("Transfer interrupted: {e}"))
}
