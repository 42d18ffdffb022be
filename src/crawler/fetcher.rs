//! HTTP fetcher implementation
//!
//! This module handles the network side of a single fetch attempt:
//! - Building the shared HTTP client (connection reuse, no cookie store)
//! - The fixed header template sent with every request
//! - User-agent rotation across attempts
//! - Status classification into accepted, retryable and terminal classes

use crate::config::HttpConfig;
use crate::ConfigError;
use rand::seq::IndexedRandom;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

/// Statuses whose body is handed to the extractor
pub const ACCEPTED_STATUSES: [u16; 2] = [200, 201];

/// Statuses treated as transient and retried
pub const RETRYABLE_STATUSES: [u16; 6] = [403, 429, 500, 502, 503, 504];

/// Failure of a single fetch attempt
#[derive(Debug, Error)]
pub enum FetchError {
    /// Timeout, connection failure, DNS failure, or a broken body stream
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("status {0}")]
    RetryableStatus(u16),

    #[error("status {0}")]
    NonRetryableStatus(u16),
}

impl FetchError {
    /// Returns true if another attempt may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::RetryableStatus(_))
    }
}

/// How a response status is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Accepted,
    Retryable,
    Terminal,
}

/// Classifies a response status code
///
/// | Status | Class |
/// |--------|-------|
/// | 200, 201 | Accepted (extract) |
/// | 403, 429, 500, 502, 503, 504 | Retryable |
/// | anything else | Terminal |
pub fn classify_status(status: u16) -> StatusClass {
    if ACCEPTED_STATUSES.contains(&status) {
        StatusClass::Accepted
    } else if RETRYABLE_STATUSES.contains(&status) {
        StatusClass::Retryable
    } else {
        StatusClass::Terminal
    }
}

/// A response that passed status classification
#[derive(Debug)]
pub struct FetchedPage {
    pub status: u16,
    pub body: String,
}

/// Builds the HTTP client shared by all attempts
///
/// Redirects are followed by reqwest's default policy. The User-Agent is set
/// per request, so the client carries none of its own.
pub fn build_http_client(config: &HttpConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(config.request_timeout())
        .connect_timeout(config.request_timeout().min(Duration::from_secs(10)))
        .pool_idle_timeout(Duration::from_secs(90))
        .gzip(true)
        .brotli(true)
        .deflate(true)
        .build()
}

/// The fixed header set plus the rotating user-agent pool
#[derive(Debug, Clone)]
pub struct RequestTemplate {
    headers: HeaderMap,
    user_agents: Vec<HeaderValue>,
    timeout: Duration,
}

impl RequestTemplate {
    /// Builds a template from configuration
    pub fn from_config(config: &HttpConfig) -> Result<Self, ConfigError> {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.header_template {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| ConfigError::InvalidHeader(format!("name '{}'", name)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|_| ConfigError::InvalidHeader(format!("value for '{}'", name)))?;
            headers.insert(name, value);
        }

        let user_agents = config
            .user_agent_pool
            .iter()
            .map(|ua| {
                HeaderValue::from_str(ua)
                    .map_err(|_| ConfigError::InvalidHeader(format!("User-Agent '{}'", ua)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        if user_agents.is_empty() {
            return Err(ConfigError::Validation(
                "user_agent_pool must contain at least one user agent".to_string(),
            ));
        }

        Ok(Self {
            headers,
            user_agents,
            timeout: config.request_timeout(),
        })
    }

    /// Picks a user agent this candidate has not tried yet
    ///
    /// `tried` holds the agents already used by the candidate and is updated
    /// with the pick. Once every agent has been tried, the history collapses
    /// to the most recent one, so the next pick still differs from the
    /// previous attempt whenever the pool allows it.
    pub fn pick_user_agent(&self, tried: &mut Vec<HeaderValue>) -> HeaderValue {
        if self.user_agents.iter().all(|ua| tried.contains(ua)) {
            let last = tried.pop();
            tried.clear();
            tried.extend(last);
        }

        let mut rng = rand::rng();
        let fresh: Vec<&HeaderValue> = self
            .user_agents
            .iter()
            .filter(|ua| !tried.contains(ua))
            .collect();

        let chosen = if fresh.is_empty() {
            self.user_agents.choose(&mut rng)
        } else {
            fresh.choose(&mut rng).copied()
        };

        // The pool is non-empty by construction
        let chosen = chosen
            .cloned()
            .unwrap_or_else(|| HeaderValue::from_static("harvest-relay"));
        tried.push(chosen.clone());
        chosen
    }

    /// Full header set for one attempt
    pub fn headers_with(&self, user_agent: HeaderValue) -> HeaderMap {
        let mut headers = self.headers.clone();
        headers.insert(USER_AGENT, user_agent);
        headers
    }

    /// Per-request timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Performs one GET and classifies the response
///
/// # Returns
///
/// * `Ok(FetchedPage)` - Accepted status with the decoded body
/// * `Err(FetchError)` - Transport failure or a rejected status
pub async fn fetch_once(
    client: &Client,
    template: &RequestTemplate,
    url: &str,
    user_agent: HeaderValue,
) -> Result<FetchedPage, FetchError> {
    let response = client
        .get(url)
        .headers(template.headers_with(user_agent))
        .timeout(template.timeout())
        .send()
        .await?;

    let status = response.status().as_u16();
    match classify_status(status) {
        StatusClass::Retryable => return Err(FetchError::RetryableStatus(status)),
        StatusClass::Terminal => return Err(FetchError::NonRetryableStatus(status)),
        StatusClass::Accepted => {}
    }

    let bytes = response.bytes().await?;
    let body = String::from_utf8_lossy(&bytes).into_owned();

    Ok(FetchedPage { status, body })
}
