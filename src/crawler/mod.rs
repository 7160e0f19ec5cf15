//! Crawler module for the course catalog
//!
//! This module contains the core crawling logic, including:
//! - Session handshake and serialized renewal
//! - HTTP fetching with retry logic
//! - Listing parsing and the depth-first catalog walk
//! - Record extraction from course-detail pages
//! - De-duplication and overall run control

mod aggregator;
mod controller;
mod extractor;
mod fetcher;
mod parser;
mod session;
mod walker;

#[cfg(test)]
pub(crate) mod testing;

pub use aggregator::{AddOutcome, Aggregator};
pub use controller::{run_for, ProgressCallback, RunController, StopSignal};
pub use extractor::{clean_text, reorder_name, ExtractError, ExtractErrorKind, RecordExtractor};
pub use fetcher::{
    build_http_client, FetchError, FetchErrorKind, Method, PageContent, PageFetcher, RequestSpec,
};
pub use parser::{extract_token, find_links, parse_listing, CatalogSelectors, LinkRef, ListingPage};
pub use session::{Session, SessionError, SessionHandle, SessionManager};
pub use walker::{CatalogWalker, PageReference};
