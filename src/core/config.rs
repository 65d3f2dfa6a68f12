//! Digest configuration
//!
//! Collected from the command line (and `CPDIGEST_*` environment variables)
//! and turned into the library pieces a digest run needs.

use std::path::PathBuf;

use crate::backends::scan::{MemberFilter, DEFAULT_MEMBER_PATTERN};
use crate::cache::store::JsonlSnapshotStore;
use crate::core::error::DigestError;
use crate::core::paths::STATE_DIR;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestConfig {
    /// Directory holding the persisted build state
    pub state_dir: PathBuf,

    /// Glob patterns selecting build-output members of directory dependencies
    pub include: Vec<String>,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from(STATE_DIR),
            include: vec![DEFAULT_MEMBER_PATTERN.to_string()],
        }
    }
}

impl DigestConfig {
    /// Member filter for the configured include patterns
    pub fn member_filter(&self) -> Result<MemberFilter, DigestError> {
        if self.include.is_empty() {
            return Ok(MemberFilter::default());
        }
        MemberFilter::from_patterns(self.include.iter().cloned())
    }

    /// Open the state store for fingerprints produced under `filter`
    pub fn open_store(&self, filter: &MemberFilter) -> Result<JsonlSnapshotStore, DigestError> {
        JsonlSnapshotStore::open(&self.state_dir, filter.policy_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DigestConfig::default();
        assert_eq!(config.state_dir, PathBuf::from(".cpdigest"));
        assert_eq!(
            config.member_filter().unwrap().policy_key(),
            "patterns:**/*.class"
        );
    }

    #[test]
    fn test_empty_include_falls_back_to_default() {
        let config = DigestConfig {
            include: Vec::new(),
            ..Default::default()
        };
        assert!(config.member_filter().unwrap().matches("a/B.class"));
    }

    #[test]
    fn test_invalid_include_is_error() {
        let config = DigestConfig {
            include: vec!["**/{a,b".to_string()],
            ..Default::default()
        };
        assert!(matches!(
            config.member_filter(),
            Err(DigestError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_custom_include() {
        let config = DigestConfig {
            include: vec!["**/*.o".to_string(), "**/*.a".to_string()],
            ..Default::default()
        };
        let filter = config.member_filter().unwrap();
        assert!(filter.matches("obj/main.o"));
        assert!(filter.matches("libx.a"));
        assert!(!filter.matches("Main.class"));
    }
}
