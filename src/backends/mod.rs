//! Backends module - Filesystem access
//!
//! Provides:
//! - scan: Directory member scanning with walkdir
//! - extract: Fingerprint extraction for files and directories

pub mod extract;
pub mod scan;
