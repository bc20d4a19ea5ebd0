//! crates/domains/src/lib.rs
//!
//! The central domain types and port definitions for the feed core.
//! No I/O happens here; adapters implement the traits in [`ports`].

pub mod errors;
pub mod models;
pub mod pagination;
pub mod ports;

// Re-exporting for easier access in other crates
pub use errors::*;
pub use models::*;
pub use pagination::*;
pub use ports::*;
