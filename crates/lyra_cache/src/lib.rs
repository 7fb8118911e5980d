//! SQLite persistence for media metadata records.

pub mod config;
pub mod store;

pub use config::CacheConfig;
pub use store::{CachedMedia, MediaCache};
