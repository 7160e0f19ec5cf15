//! Portal sessions
//!
//! A [`Session`] is the cookie jar and hidden token the portal requires, plus
//! the URL of the selected semester's catalog root. The [`SessionManager`]
//! performs the handshake that produces one; the [`SessionHandle`] shares the
//! current session across the tasks of a run and serializes its renewal.

use crate::config::{Config, NavigationStep};
use crate::crawler::fetcher::{build_http_client, PageContent, PageFetcher, RequestSpec};
use crate::crawler::parser::{compile_selector, extract_token, find_links, LinkRef};
use crate::model::Semester;
use crate::url::page_key;
use reqwest::Client;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;
use url::Url;

/// Handshake failures; fatal to a run
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("portal unreachable: {0}")]
    Unreachable(String),

    #[error("unexpected handshake response: {0}")]
    Malformed(String),

    #[error("semester {0} is not offered by the portal")]
    SemesterNotFound(Semester),

    #[error("session renewed {0} times, giving up")]
    RenewalLimit(u32),
}

/// An established navigation session
#[derive(Debug)]
pub struct Session {
    client: Client,
    token: Option<(String, String)>,
    catalog_url: Url,
    semester: Semester,
    generation: u64,
    acquired_at: Instant,
    last_success: Mutex<Instant>,
    max_idle: Duration,
    revoked: AtomicBool,
}

impl Session {
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Value of the hidden session token, if the portal uses one
    pub fn token_value(&self) -> Option<&str> {
        self.token.as_ref().map(|(_, value)| value.as_str())
    }

    pub fn token_param(&self) -> Option<&str> {
        self.token.as_ref().map(|(param, _)| param.as_str())
    }

    /// Root of the semester's catalog tree
    pub fn catalog_url(&self) -> &Url {
        &self.catalog_url
    }

    pub fn semester(&self) -> Semester {
        self.semester
    }

    /// Increases with every acquisition; identifies the session in renewals
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn age(&self) -> Duration {
        self.acquired_at.elapsed()
    }

    /// Cheap validity check: not revoked and used recently enough
    pub fn is_valid(&self) -> bool {
        if self.revoked.load(Ordering::SeqCst) {
            return false;
        }
        let last = *self.last_success.lock().unwrap_or_else(|e| e.into_inner());
        last.elapsed() < self.max_idle
    }

    /// Records a successful request
    pub fn touch(&self) {
        let mut last = self.last_success.lock().unwrap_or_else(|e| e.into_inner());
        *last = Instant::now();
    }

    /// Marks the session unusable, e.g. after the portal reported it expired
    pub fn revoke(&self) {
        self.revoked.store(true, Ordering::SeqCst);
    }

    /// Visited-set key of `url`, independent of this session's token
    pub fn page_key(&self, url: &Url) -> String {
        page_key(url, self.token_param())
    }
}

/// Performs the portal handshake
#[derive(Debug)]
pub struct SessionManager {
    config: Arc<Config>,
    fetcher: PageFetcher,
    generations: AtomicU64,
}

impl SessionManager {
    pub fn new(config: Arc<Config>) -> Self {
        let fetcher = PageFetcher::new(&config.fetch, &config.portal);
        Self {
            config,
            fetcher,
            generations: AtomicU64::new(0),
        }
    }

    /// Establishes a new session positioned at `semester`'s catalog root
    ///
    /// Opens the entry page with a fresh cookie store, reads the session
    /// token and follows the configured navigation steps.
    pub async fn acquire(&self, semester: Semester) -> Result<Session, SessionError> {
        let (client, token, mut page) = self.open().await?;

        for step in &self.config.portal.navigation {
            let links = step_links(&page, step)?;

            let target = if step.semester {
                links
                    .into_iter()
                    .find(|link| Semester::find_in(&link.text) == Some(semester))
                    .ok_or(SessionError::SemesterNotFound(semester))?
            } else {
                match links.into_iter().next() {
                    Some(link) => link,
                    None if step.optional => {
                        tracing::debug!("Optional navigation step '{}' skipped", describe(step));
                        continue;
                    }
                    None => {
                        return Err(SessionError::Malformed(format!(
                            "no link for navigation step '{}' on {}",
                            describe(step),
                            page.url
                        )))
                    }
                }
            };

            tracing::trace!("Navigation step '{}' -> {}", describe(step), target.url);
            page = self.follow(&client, &token, target.url).await?;
        }

        let generation = self.generations.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::info!(
            "Session {} acquired for {} (catalog root {})",
            generation,
            semester,
            page.url
        );

        let now = Instant::now();
        Ok(Session {
            client,
            token,
            catalog_url: page.url,
            semester,
            generation,
            acquired_at: now,
            last_success: Mutex::new(now),
            max_idle: Duration::from_secs(self.config.portal.max_session_idle_secs),
            revoked: AtomicBool::new(false),
        })
    }

    /// Semesters the portal offers, newest first
    ///
    /// Runs the handshake up to the semester-selection step and reads the
    /// semester names from its links.
    pub async fn available_semesters(&self) -> Result<Vec<Semester>, SessionError> {
        let (client, token, mut page) = self.open().await?;

        for step in &self.config.portal.navigation {
            let links = step_links(&page, step)?;

            if step.semester {
                let mut semesters: Vec<Semester> = links
                    .iter()
                    .filter_map(|link| Semester::find_in(&link.text))
                    .collect();
                semesters.sort_by(|a, b| b.cmp(a));
                semesters.dedup();
                return Ok(semesters);
            }

            match links.into_iter().next() {
                Some(link) => page = self.follow(&client, &token, link.url).await?,
                None if step.optional => continue,
                None => {
                    return Err(SessionError::Malformed(format!(
                        "no link for navigation step '{}' on {}",
                        describe(step),
                        page.url
                    )))
                }
            }
        }

        Err(SessionError::Malformed(
            "no navigation step selects the semester".to_string(),
        ))
    }

    async fn open(&self) -> Result<(Client, Option<(String, String)>, PageContent), SessionError> {
        let portal = &self.config.portal;
        let client = build_http_client(&self.config.user_agent, &self.config.fetch)
            .map_err(|e| SessionError::Unreachable(e.to_string()))?;

        let entry = Url::parse(&portal.base_url)
            .and_then(|base| base.join(&portal.entry_path))
            .map_err(|e| SessionError::Malformed(format!("entry URL: {}", e)))?;

        tracing::debug!("Opening session at {}", entry);
        let page = self
            .fetcher
            .fetch_with(&client, None, &RequestSpec::get(entry))
            .await
            .map_err(|e| SessionError::Unreachable(e.to_string()))?;

        let token = match &portal.token_param {
            Some(param) => {
                let value = extract_token(&page.body, &page.url, param).ok_or_else(|| {
                    SessionError::Malformed(format!("entry page carries no '{}' token", param))
                })?;
                Some((param.clone(), value))
            }
            None => None,
        };

        Ok((client, token, page))
    }

    async fn follow(
        &self,
        client: &Client,
        token: &Option<(String, String)>,
        url: Url,
    ) -> Result<PageContent, SessionError> {
        let value = token.as_ref().map(|(_, v)| v.as_str());
        self.fetcher
            .fetch_with(client, value, &RequestSpec::get(url))
            .await
            .map_err(|e| SessionError::Unreachable(e.to_string()))
    }
}

fn step_links(page: &PageContent, step: &NavigationStep) -> Result<Vec<LinkRef>, SessionError> {
    let selector =
        compile_selector(&step.selector).map_err(|e| SessionError::Malformed(e.to_string()))?;
    Ok(find_links(
        &page.body,
        &page.url,
        &selector,
        step.link_text.as_deref(),
    ))
}

fn describe(step: &NavigationStep) -> String {
    match &step.link_text {
        Some(text) => format!("{} \"{}\"", step.selector, text),
        None => step.selector.clone(),
    }
}

/// The current session of one run, shared by all of its tasks
///
/// Readers clone the current `Arc<Session>`; renewal happens under a
/// single-writer lock so that several tasks noticing the same expiry cause
/// only one re-acquisition.
#[derive(Debug)]
pub struct SessionHandle {
    manager: SessionManager,
    semester: Semester,
    max_renewals: u32,
    current: RwLock<Arc<Session>>,
    renewals: tokio::sync::Mutex<u32>,
}

impl SessionHandle {
    pub async fn open(manager: SessionManager, semester: Semester) -> Result<Self, SessionError> {
        let session = manager.acquire(semester).await?;
        let max_renewals = manager.config.portal.max_session_renewals;
        Ok(Self {
            manager,
            semester,
            max_renewals,
            current: RwLock::new(Arc::new(session)),
            renewals: tokio::sync::Mutex::new(0),
        })
    }

    pub async fn current(&self) -> Arc<Session> {
        self.current.read().await.clone()
    }

    /// Re-acquires the session if generation `seen` is still current and no
    /// longer valid; returns the session to continue with
    pub async fn renew_if_stale(&self, seen: u64) -> Result<Arc<Session>, SessionError> {
        let mut renewals = self.renewals.lock().await;

        let current = self.current().await;
        if current.generation() != seen || current.is_valid() {
            return Ok(current);
        }

        if *renewals >= self.max_renewals {
            return Err(SessionError::RenewalLimit(*renewals));
        }

        tracing::warn!(
            "Session {} is no longer valid, renewing ({} of {})",
            seen,
            *renewals + 1,
            self.max_renewals
        );
        let fresh = Arc::new(self.manager.acquire(self.semester).await?);
        *renewals += 1;
        *self.current.write().await = fresh.clone();
        Ok(fresh)
    }

    /// Makes sure the current session has not gone idle
    pub async fn ensure_valid(&self) -> Result<Arc<Session>, SessionError> {
        let current = self.current().await;
        if current.is_valid() {
            return Ok(current);
        }
        self.renew_if_stale(current.generation()).await
    }

    pub async fn renewals(&self) -> u32 {
        *self.renewals.lock().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::testing::{config, html, mount_handshake, winter_2024};
    use crate::model::Term;
    use wiremock::matchers::path;
    use wiremock::{Mock, MockServer};

    async fn portal() -> MockServer {
        let server = MockServer::start().await;
        mount_handshake(&server).await;
        Mock::given(path("/root"))
            .respond_with(html("<h1>Katalog</h1>"))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn test_acquire_follows_navigation() {
        let server = portal().await;

        let manager = SessionManager::new(Arc::new(config(&server.uri())));
        let session = manager.acquire(winter_2024()).await.unwrap();

        assert_eq!(session.token_value(), Some("T1"));
        assert_eq!(session.generation(), 1);
        assert_eq!(session.catalog_url().path(), "/root");
        assert_eq!(
            session.page_key(session.catalog_url()),
            format!("{}/root", server.uri())
        );
        assert!(session.is_valid());
    }

    #[tokio::test]
    async fn test_acquire_unknown_semester() {
        let server = portal().await;

        let manager = SessionManager::new(Arc::new(config(&server.uri())));
        let semester = Semester::new(2019, Term::Summer);
        let err = manager.acquire(semester).await.unwrap_err();
        assert!(matches!(err, SessionError::SemesterNotFound(s) if s == semester));
    }

    #[tokio::test]
    async fn test_acquire_without_token_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(path("/start"))
            .respond_with(html("<p>Wartung</p>"))
            .mount(&server)
            .await;

        let manager = SessionManager::new(Arc::new(config(&server.uri())));
        let err = manager.acquire(winter_2024()).await.unwrap_err();
        assert!(matches!(err, SessionError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_acquire_unreachable_portal() {
        let server = MockServer::start().await;
        let uri = server.uri();
        drop(server);

        let mut config = config(&uri);
        config.fetch.retry_count = 0;
        let manager = SessionManager::new(Arc::new(config));
        let err = manager.acquire(winter_2024()).await.unwrap_err();
        assert!(matches!(err, SessionError::Unreachable(_)));
    }

    #[tokio::test]
    async fn test_available_semesters_newest_first() {
        let server = portal().await;

        let manager = SessionManager::new(Arc::new(config(&server.uri())));
        let semesters = manager.available_semesters().await.unwrap();
        let keys: Vec<String> = semesters.iter().map(|s| s.key()).collect();
        assert_eq!(keys, vec!["2024w", "2024s"]);
    }

    #[tokio::test]
    async fn test_idle_session_is_renewed() {
        let server = portal().await;

        let mut config = config(&server.uri());
        config.portal.max_session_idle_secs = 0;
        let manager = SessionManager::new(Arc::new(config));
        let handle = SessionHandle::open(manager, winter_2024()).await.unwrap();

        let first = handle.current().await;
        assert!(!first.is_valid());

        let renewed = handle.ensure_valid().await.unwrap();
        assert_eq!(renewed.generation(), first.generation() + 1);
        assert_eq!(handle.current().await.generation(), renewed.generation());
        assert_eq!(handle.renewals().await, 1);
    }

    #[tokio::test]
    async fn test_renewal_is_serialized_and_bounded() {
        let server = portal().await;

        let mut config = config(&server.uri());
        config.portal.max_session_renewals = 1;
        let manager = SessionManager::new(Arc::new(config));
        let handle = SessionHandle::open(manager, winter_2024()).await.unwrap();

        let first = handle.current().await;
        // still valid: nothing to renew
        let same = handle.renew_if_stale(first.generation()).await.unwrap();
        assert_eq!(same.generation(), first.generation());

        first.revoke();
        let renewed = handle.renew_if_stale(first.generation()).await.unwrap();
        assert_eq!(renewed.generation(), first.generation() + 1);

        // a second task that saw the old generation gets the new session
        let again = handle.renew_if_stale(first.generation()).await.unwrap();
        assert_eq!(again.generation(), renewed.generation());
        assert_eq!(handle.renewals().await, 1);

        renewed.revoke();
        let err = handle.renew_if_stale(renewed.generation()).await.unwrap_err();
        assert!(matches!(err, SessionError::RenewalLimit(1)));
    }
}
