//! URL handling for catalog pages
//!
//! Normalization, link resolution and session-token handling. Every URL that
//! enters the visited-set goes through [`page_key`].

mod normalize;

pub use normalize::{normalize_url, page_key, query_param, resolve_link, with_query_param};
