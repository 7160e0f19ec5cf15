//! Catalog walker
//!
//! Discovers the course-detail pages of one semester by walking the catalog
//! tree depth-first. Within one course list, pagination is followed before
//! any sub-directory of that list. Pages are handed out lazily through
//! [`CatalogWalker::next_page`]; each list page is fetched only when the
//! consumer asks for more references than are already known.

use crate::crawler::fetcher::{FetchErrorKind, PageContent, PageFetcher, RequestSpec};
use crate::crawler::parser::{parse_listing, CatalogSelectors};
use crate::crawler::session::{SessionError, SessionHandle};
use crate::model::{FailureStage, PageFailure, Semester};
use crate::state::{VisitedSet, WalkState};
use std::collections::VecDeque;
use std::sync::Arc;
use url::Url;

/// A course-detail page to fetch, numbered in discovery order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageReference {
    pub seq: u64,
    pub url: Url,
}

#[derive(Debug)]
struct PendingList {
    url: Url,
    depth: usize,
}

/// Lazy, finite, non-restartable discovery of course-detail pages
pub struct CatalogWalker {
    sessions: Arc<SessionHandle>,
    fetcher: Arc<PageFetcher>,
    selectors: CatalogSelectors,
    semester: Semester,
    visited: VisitedSet,
    pending: Vec<PendingList>,
    ready: VecDeque<PageReference>,
    state: WalkState,
    next_seq: u64,
    lists_visited: u64,
    failures: Vec<PageFailure>,
}

impl CatalogWalker {
    /// Starts a walk at `root`, the catalog root of the session's semester
    pub fn new(
        sessions: Arc<SessionHandle>,
        fetcher: Arc<PageFetcher>,
        selectors: CatalogSelectors,
        semester: Semester,
        visited: VisitedSet,
        root: Url,
        root_key: &str,
    ) -> Self {
        let mut pending = Vec::new();
        if visited.claim(root_key) {
            pending.push(PendingList {
                url: root,
                depth: 0,
            });
        }

        Self {
            sessions,
            fetcher,
            selectors,
            semester,
            visited,
            pending,
            ready: VecDeque::new(),
            state: WalkState::AtRoot,
            next_seq: 0,
            lists_visited: 0,
            failures: Vec::new(),
        }
    }

    /// Returns the next course-detail page, or `None` once the catalog is
    /// exhausted
    ///
    /// Fails only when the session cannot be renewed.
    pub async fn next_page(&mut self) -> Result<Option<PageReference>, SessionError> {
        loop {
            if let Some(reference) = self.ready.pop_front() {
                self.transition(WalkState::AtCourseDetail);
                return Ok(Some(reference));
            }

            let Some(list) = self.pending.pop() else {
                if !self.state.is_terminal() {
                    self.transition(WalkState::Done);
                    tracing::debug!(
                        "Catalog walk done: {} lists, {} course pages",
                        self.lists_visited,
                        self.next_seq
                    );
                }
                return Ok(None);
            };

            self.visit_list(list).await?;
        }
    }

    pub fn state(&self) -> WalkState {
        self.state
    }

    /// List pages fetched so far (successfully or not)
    pub fn lists_visited(&self) -> u64 {
        self.lists_visited
    }

    /// Course-detail pages discovered so far
    pub fn discovered(&self) -> u64 {
        self.next_seq
    }

    /// Failures recorded since the last call
    pub fn take_failures(&mut self) -> Vec<PageFailure> {
        std::mem::take(&mut self.failures)
    }

    async fn visit_list(&mut self, list: PendingList) -> Result<(), SessionError> {
        self.lists_visited += 1;

        let Some(page) = self.fetch_list(&list.url).await? else {
            return Ok(());
        };

        let listing = parse_listing(&page.body, &page.url, &self.selectors);

        if let Some(found) = listing.semester {
            if found != self.semester {
                self.failures.push(PageFailure::new(
                    list.url.as_str(),
                    FailureStage::Listing,
                    format!("page belongs to {} instead of {}", found, self.semester),
                ));
                return Ok(());
            }
        }

        self.transition(WalkState::for_listing(
            list.depth,
            !listing.courses.is_empty(),
        ));

        let session = self.sessions.current().await;
        let mut new_courses = 0;
        for link in listing.courses {
            if self.visited.claim(&session.page_key(&link.url)) {
                tracing::trace!("Course page #{}: {}", self.next_seq, link.url);
                self.ready.push_back(PageReference {
                    seq: self.next_seq,
                    url: link.url,
                });
                self.next_seq += 1;
                new_courses += 1;
            }
        }

        for link in listing.directories.into_iter().rev() {
            if self.visited.claim(&session.page_key(&link.url)) {
                tracing::trace!("Directory '{}': {}", link.text, link.url);
                self.pending.push(PendingList {
                    url: link.url,
                    depth: list.depth + 1,
                });
            }
        }

        // pushed last so it is popped before the sub-directories
        if let Some(next) = listing.next_page {
            if self.visited.claim(&session.page_key(&next)) {
                tracing::trace!("Next page: {}", next);
                self.pending.push(PendingList {
                    url: next,
                    depth: list.depth,
                });
            } else {
                tracing::debug!("Pagination of {} points to a visited page", list.url);
            }
        }

        tracing::debug!(
            "Listed {} ({} new course pages, {} lists pending)",
            list.url,
            new_courses,
            self.pending.len()
        );
        Ok(())
    }

    /// Fetches a list page, renewing the session when the portal reports
    /// it expired; `None` if the page failed for any other reason
    async fn fetch_list(&mut self, url: &Url) -> Result<Option<PageContent>, SessionError> {
        let spec = RequestSpec::get(url.clone());
        loop {
            let session = self.sessions.current().await;
            match self.fetcher.fetch(&session, &spec).await {
                Ok(page) => {
                    session.touch();
                    return Ok(Some(page));
                }
                Err(e) if e.kind == FetchErrorKind::SessionExpired => {
                    session.revoke();
                    self.sessions.renew_if_stale(session.generation()).await?;
                }
                Err(e) => {
                    self.failures
                        .push(PageFailure::new(url.as_str(), FailureStage::Listing, &e));
                    return Ok(None);
                }
            }
        }
    }

    fn transition(&mut self, next: WalkState) {
        if !self.state.can_transition_to(next) {
            tracing::debug!("Unexpected walk transition {} -> {}", self.state, next);
        }
        self.state = next;
    }
}
