//! crates/storage-adapters/src/lib.rs
//!
//! Store adapters for the feed core. The in-memory store is always
//! available; Postgres and local avatar storage sit behind features.

pub mod memory;

#[cfg(feature = "db-postgres")]
pub mod postgres;

#[cfg(feature = "media-local")]
pub mod local_avatars;

pub use memory::{InMemoryAvatars, InMemoryProfiles, InMemoryStore};

#[cfg(feature = "db-postgres")]
pub use postgres::PgStore;

#[cfg(feature = "media-local")]
pub use local_avatars::LocalAvatarStore;
