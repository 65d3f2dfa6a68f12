//! Flows module - Change detection passes
//!
//! Provides:
//! - digest: Classpath dependency change detection

pub mod digest;
