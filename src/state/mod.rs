//! State module for tracking walk progress
//!
//! # Components
//!
//! - `WalkState`: navigation state machine of the catalog walk
//! - `VisitedSet`: run-wide, synchronized set of pages already claimed

mod visited;
mod walk_state;

// Re-export main types
pub use visited::VisitedSet;
pub use walk_state::WalkState;
