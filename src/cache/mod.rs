//! Cache module for storing API responses to disk
//!
//! This module provides a cache store that persists raw API responses to the
//! filesystem, one file per request fingerprint. Entries never expire; callers
//! bypass the cache when they want fresh data, and the fresh response then
//! replaces the stored one.

mod key;
mod store;

pub use key::CacheKey;
pub use store::{CacheError, CacheStore, CachedPayload};
