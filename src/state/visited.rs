//! Run-wide set of visited pages
//!
//! Keys are normalized URLs, so two links that differ only in session token,
//! fragment or query order count as the same page.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Shared, synchronized visited-set
///
/// Cloning yields another handle to the same set; every walker of a run
/// checks against it, so each page is claimed at most once.
#[derive(Debug, Clone, Default)]
pub struct VisitedSet {
    inner: Arc<Mutex<HashSet<String>>>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims a page; returns false if it was claimed before
    pub fn claim(&self, key: &str) -> bool {
        let mut set = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        set.insert(key.to_string())
    }

    pub fn contains(&self, key: &str) -> bool {
        let set = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        set.contains(key)
    }

    pub fn len(&self) -> usize {
        let set = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
