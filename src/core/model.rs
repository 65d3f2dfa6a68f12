//! Fingerprint and report model
//!
//! Every dependency path is reduced to an [`ArtifactFingerprint`] before it is
//! compared, cached or persisted. A digest pass produces a [`DigestReport`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Whether a dependency is a single file or a directory of build outputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    File,
    Directory,
}

/// Cheap, comparable summary of a dependency's filesystem state.
///
/// For a file, `size_or_count` is its byte length and `timestamp_ms` its
/// modification time. For a directory, `size_or_count` is the number of
/// matching members and `timestamp_ms` the newest member modification time
/// (0 when no member matches).
///
/// Directory fingerprints cannot see an in-place rewrite that keeps the
/// member count and does not advance any modification time. This is an
/// accepted limitation of the count/max-mtime proxy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactFingerprint {
    path: PathBuf,
    kind: ArtifactKind,
    size_or_count: u64,
    timestamp_ms: i64,
}

impl ArtifactFingerprint {
    /// Fingerprint of a regular file
    pub fn file(path: impl Into<PathBuf>, len: u64, mtime_ms: i64) -> Self {
        Self {
            path: path.into(),
            kind: ArtifactKind::File,
            size_or_count: len,
            timestamp_ms: mtime_ms,
        }
    }

    /// Fingerprint of a directory of build outputs
    pub fn directory(path: impl Into<PathBuf>, member_count: u64, max_mtime_ms: i64) -> Self {
        Self {
            path: path.into(),
            kind: ArtifactKind::Directory,
            size_or_count: member_count,
            timestamp_ms: max_mtime_ms,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    pub fn is_file(&self) -> bool {
        self.kind == ArtifactKind::File
    }

    pub fn size_or_count(&self) -> u64 {
        self.size_or_count
    }

    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp_ms
    }

    /// True when `other` describes the same observable state.
    ///
    /// The kind is not compared: it is assumed stable for a path within a build.
    pub fn is_equivalent(&self, other: &ArtifactFingerprint) -> bool {
        self.timestamp_ms == other.timestamp_ms && self.size_or_count == other.size_or_count
    }
}

/// Fingerprints registered by one build invocation, keyed by normalized path
pub type Snapshot = BTreeMap<PathBuf, ArtifactFingerprint>;

/// Why a dependency contributed to a changed verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Added => "added",
            ChangeKind::Modified => "modified",
            ChangeKind::Removed => "removed",
        }
    }
}

/// One entry of the diagnostic trail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyChange {
    pub path: PathBuf,
    pub kind: ChangeKind,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous: Option<ArtifactFingerprint>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<ArtifactFingerprint>,

    /// Member-level notes for modified directories
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
}

/// Result of one change detection pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigestReport {
    /// Whether any dependency was added, modified or removed
    pub changed: bool,

    /// Number of dependency paths supplied by the caller
    pub analyzed: usize,

    /// Paths skipped because they do not exist
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<PathBuf>,

    /// Added and modified entries in caller order, then removed entries
    #[serde(default)]
    pub changes: Vec<DependencyChange>,

    /// The stored baseline was unusable and dropped, which alone makes the
    /// dependencies count as changed
    #[serde(default, skip_serializing_if = "is_false")]
    pub baseline_discarded: bool,

    pub elapsed_ms: u64,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl DigestReport {
    /// Record a change; the verdict never flips back to unchanged.
    pub fn push(&mut self, change: DependencyChange) {
        self.changed = true;
        self.changes.push(change);
    }

    pub fn changes_of(&self, kind: ChangeKind) -> impl Iterator<Item = &DependencyChange> {
        self.changes.iter().filter(move |c| c.kind == kind)
    }
}
