//! Core module - Contains the fundamental data structures and utilities
//!
//! This module provides:
//! - Fingerprint and report model
//! - Error types
//! - Configuration
//! - Rendering functions for different output formats
//! - Path normalization utilities
//! - Common utilities

pub mod config;
pub mod error;
pub mod model;
pub mod paths;
pub mod render;
pub mod util;
