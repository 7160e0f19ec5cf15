//! HTTP fetcher implementation
//!
//! This module performs single navigation steps against the portal:
//! - Building HTTP clients with the configured user agent and a cookie store
//! - GET and form POST requests with the session token applied
//! - Retry with exponential backoff for transient failures
//! - Structural checks (expected content marker, expired session marker)

use crate::config::{FetchConfig, PortalConfig, UserAgentConfig};
use crate::crawler::session::Session;
use crate::url::with_query_param;
use reqwest::{redirect::Policy, Client};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// HTTP method of a navigation step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// One navigation step to perform
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub url: Url,
    pub method: Method,
    /// Form fields sent as `application/x-www-form-urlencoded` on POST
    pub form: Vec<(String, String)>,
    /// Text the response body must contain to count as the expected page
    pub expected_marker: Option<String>,
}

impl RequestSpec {
    pub fn get(url: Url) -> Self {
        Self {
            url,
            method: Method::Get,
            form: Vec::new(),
            expected_marker: None,
        }
    }

    pub fn post(url: Url, form: Vec<(String, String)>) -> Self {
        Self {
            url,
            method: Method::Post,
            form,
            expected_marker: None,
        }
    }

    pub fn expecting(mut self, marker: impl Into<String>) -> Self {
        self.expected_marker = Some(marker.into());
        self
    }
}

/// Raw content of a fetched page
#[derive(Debug, Clone)]
pub struct PageContent {
    /// Final URL after redirects
    pub url: Url,
    pub status: u16,
    pub body: String,
}

/// Why a fetch failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchErrorKind {
    /// The request timed out on every attempt
    Timeout,
    /// The portal answered with a non-success status
    HttpError { status: u16 },
    /// Connection refused, reset or otherwise not established
    Unreachable,
    /// The page loaded but lacks the expected content marker
    MissingMarker,
    /// The portal reports that the session has expired
    SessionExpired,
}

impl FetchErrorKind {
    /// Transient failures are retried; structural ones never are
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout | Self::Unreachable => true,
            Self::HttpError { status } => *status >= 500,
            Self::MissingMarker | Self::SessionExpired => false,
        }
    }
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => f.write_str("timeout"),
            Self::HttpError { status } => write!(f, "HTTP {}", status),
            Self::Unreachable => f.write_str("unreachable"),
            Self::MissingMarker => f.write_str("expected content missing"),
            Self::SessionExpired => f.write_str("session expired"),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("{kind} fetching {url}: {detail}")]
pub struct FetchError {
    pub url: String,
    pub kind: FetchErrorKind,
    pub detail: String,
}

impl FetchError {
    fn new(url: &Url, kind: FetchErrorKind, detail: impl Into<String>) -> Self {
        Self {
            url: url.to_string(),
            kind,
            detail: detail.into(),
        }
    }
}

/// Builds an HTTP client with proper configuration
///
/// Every client has its own cookie store; one client belongs to exactly one
/// session.
pub fn build_http_client(
    user_agent: &UserAgentConfig,
    fetch: &FetchConfig,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent.header_value())
        .timeout(Duration::from_secs(fetch.timeout_secs))
        .connect_timeout(Duration::from_secs(fetch.timeout_secs.min(10)))
        .redirect(Policy::limited(10))
        .cookie_store(true)
        .gzip(true)
        .brotli(true)
        .build()
}

/// Performs navigation steps with retry and backoff
///
/// # Retry Logic
///
/// | Condition | Action |
/// |-----------|--------|
/// | HTTP 4xx | Immediate failure |
/// | HTTP 5xx | Retry up to `retry-count` times |
/// | Timeout | Retry up to `retry-count` times |
/// | Connection refused/reset | Retry up to `retry-count` times |
/// | Session-expired marker in body | Immediate `SessionExpired` |
/// | Expected marker missing | Immediate `MissingMarker` |
///
/// The delay before retry `n` (0-based) is `backoff-base-ms * 2^n`.
#[derive(Debug, Clone)]
pub struct PageFetcher {
    retry_count: u32,
    backoff_base: Duration,
    token_param: Option<String>,
    expired_marker: String,
}

impl PageFetcher {
    pub fn new(fetch: &FetchConfig, portal: &PortalConfig) -> Self {
        Self {
            retry_count: fetch.retry_count,
            backoff_base: Duration::from_millis(fetch.backoff_base_ms),
            token_param: portal.token_param.clone(),
            expired_marker: portal.session_expired_marker.clone(),
        }
    }

    /// Fetches a page within `session`
    ///
    /// The session is only read: its client and token are used, but marking
    /// it used or revoked is left to the caller.
    pub async fn fetch(
        &self,
        session: &Session,
        spec: &RequestSpec,
    ) -> Result<PageContent, FetchError> {
        self.fetch_with(session.client(), session.token_value(), spec)
            .await
    }

    /// Fetches a page with an explicit client and token (used while a session
    /// is still being established)
    pub(crate) async fn fetch_with(
        &self,
        client: &Client,
        token: Option<&str>,
        spec: &RequestSpec,
    ) -> Result<PageContent, FetchError> {
        let url = self.authorize(&spec.url, token);

        let mut attempt = 0;
        loop {
            match self.attempt(client, &url, spec).await {
                Ok(page) => return self.check_content(page, spec),
                Err(e) if e.kind.is_transient() && attempt < self.retry_count => {
                    let delay = self.backoff_base * 2u32.saturating_pow(attempt);
                    tracing::debug!(
                        "Attempt {} for {} failed ({}), retrying in {:?}",
                        attempt + 1,
                        spec.url,
                        e.kind,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::debug!("Giving up on {} after {} attempts: {}", spec.url, attempt + 1, e);
                    return Err(e);
                }
            }
        }
    }

    /// Applies the session token to an outgoing URL
    fn authorize(&self, url: &Url, token: Option<&str>) -> Url {
        match (&self.token_param, token) {
            (Some(param), Some(value)) => with_query_param(url, param, value),
            _ => url.clone(),
        }
    }

    async fn attempt(
        &self,
        client: &Client,
        url: &Url,
        spec: &RequestSpec,
    ) -> Result<PageContent, FetchError> {
        let request = match spec.method {
            Method::Get => client.get(url.clone()),
            Method::Post => client.post(url.clone()).form(&spec.form),
        };

        let response = request.send().await.map_err(|e| classify(url, &e))?;

        let status = response.status();
        let final_url = response.url().clone();

        if !status.is_success() {
            return Err(FetchError::new(
                url,
                FetchErrorKind::HttpError {
                    status: status.as_u16(),
                },
                status.canonical_reason().unwrap_or("unexpected status"),
            ));
        }

        let body = response.text().await.map_err(|e| classify(url, &e))?;

        Ok(PageContent {
            url: final_url,
            status: status.as_u16(),
            body,
        })
    }

    fn check_content(&self, page: PageContent, spec: &RequestSpec) -> Result<PageContent, FetchError> {
        if page.body.contains(&self.expired_marker) {
            return Err(FetchError::new(
                &spec.url,
                FetchErrorKind::SessionExpired,
                format!("body contains '{}'", self.expired_marker),
            ));
        }

        if let Some(marker) = &spec.expected_marker {
            if !page.body.contains(marker.as_str()) {
                return Err(FetchError::new(
                    &spec.url,
                    FetchErrorKind::MissingMarker,
                    format!("body lacks '{}'", marker),
                ));
            }
        }

        Ok(page)
    }
}

fn classify(url: &Url, error: &reqwest::Error) -> FetchError {
    let kind = if error.is_timeout() {
        FetchErrorKind::Timeout
    } else {
        FetchErrorKind::Unreachable
    };
    FetchError::new(url, kind, error.to_string())
}
