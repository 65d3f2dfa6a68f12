//! Cache module - Fingerprint cache and build state
//!
//! Provides:
//! - Session-scoped artifact fingerprint cache
//! - Snapshot stores (in-memory and .cpdigest/ on disk)
//! - Build-state metadata

pub mod artifacts;
pub mod meta;
pub mod store;
