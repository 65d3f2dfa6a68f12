//! Build-state metadata

use serde::{Deserialize, Serialize};

use crate::core::util::{hash_bytes, now_ms};

/// State format version; bump when the inputs file layout changes
pub const STATE_VERSION: &str = "1";

/// State metadata stored in .cpdigest/meta.json
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateMeta {
    /// State format version
    pub state_version: String,

    /// Hash of the member filter policy that produced the fingerprints
    pub policy_hash: String,

    /// Timestamp when the state was committed (ms since epoch)
    pub generated_at: i64,
}

impl StateMeta {
    pub fn new(policy_key: &str) -> Self {
        Self {
            state_version: STATE_VERSION.to_string(),
            policy_hash: policy_hash(policy_key),
            generated_at: now_ms(),
        }
    }

    /// Whether fingerprints recorded under this metadata are comparable
    /// with fingerprints produced under `policy_key`
    pub fn is_compatible(&self, policy_key: &str) -> bool {
        self.state_version == STATE_VERSION && self.policy_hash == policy_hash(policy_key)
    }
}

pub fn policy_hash(policy_key: &str) -> String {
    hash_bytes(policy_key.as_bytes())
}
