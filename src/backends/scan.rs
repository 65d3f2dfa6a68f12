//! Directory scanning backend
//!
//! Walks a build-output directory with walkdir and aggregates the members
//! accepted by a [`MemberFilter`] into a count and newest modification time.

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use once_cell::sync::Lazy;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

use crate::core::error::DigestError;
use crate::core::paths::make_relative;
use crate::core::util::mtime_ms;

/// Pattern used when no include pattern is configured
pub const DEFAULT_MEMBER_PATTERN: &str = "**/*.class";

static DEFAULT_MEMBER_SET: Lazy<GlobSet> = Lazy::new(|| {
    build_glob_set(&[DEFAULT_MEMBER_PATTERN.to_string()]).expect("Invalid DEFAULT_MEMBER_SET glob")
});

type MemberPredicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Decides which directory members count as build outputs.
///
/// Members are matched by their path relative to the scanned directory,
/// always with `/` separators.
#[derive(Clone)]
pub enum MemberFilter {
    /// Include globs; `*` and `?` never cross a `/`, `**/` spans directories
    Patterns { patterns: Vec<String>, set: GlobSet },
    /// Arbitrary predicate, identified by a policy key
    Custom {
        key: String,
        predicate: MemberPredicate,
    },
}

impl MemberFilter {
    /// Build a filter from include patterns
    pub fn from_patterns<I, S>(patterns: I) -> Result<Self, DigestError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let patterns: Vec<String> = patterns.into_iter().map(Into::into).collect();
        let set = build_glob_set(&patterns)?;
        Ok(MemberFilter::Patterns { patterns, set })
    }

    /// Build a filter from a predicate over relative member paths.
    ///
    /// `key` identifies the predicate in persisted build state, so two
    /// different predicates must not share a key.
    pub fn from_fn<F>(key: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        MemberFilter::Custom {
            key: key.into(),
            predicate: Arc::new(predicate),
        }
    }

    /// Whether a member (relative path, `/` separated) is a build output
    pub fn matches(&self, relative: &str) -> bool {
        match self {
            MemberFilter::Patterns { set, .. } => set.is_match(relative),
            MemberFilter::Custom { predicate, .. } => predicate(relative),
        }
    }

    /// Stable description of the filter, used in the state policy hash
    pub fn policy_key(&self) -> String {
        match self {
            MemberFilter::Patterns { patterns, .. } => format!("patterns:{}", patterns.join(",")),
            MemberFilter::Custom { key, .. } => format!("custom:{}", key),
        }
    }
}

impl Default for MemberFilter {
    fn default() -> Self {
        MemberFilter::Patterns {
            patterns: vec![DEFAULT_MEMBER_PATTERN.to_string()],
            set: DEFAULT_MEMBER_SET.clone(),
        }
    }
}

impl fmt::Debug for MemberFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemberFilter::Patterns { patterns, .. } => {
                f.debug_tuple("Patterns").field(patterns).finish()
            }
            MemberFilter::Custom { key, .. } => f.debug_tuple("Custom").field(key).finish(),
        }
    }
}

fn build_glob_set(patterns: &[String]) -> Result<GlobSet, DigestError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .map_err(|source| DigestError::InvalidPattern {
                pattern: pattern.clone(),
                source,
            })?;
        builder.add(glob);
    }
    builder.build().map_err(|source| DigestError::InvalidPattern {
        pattern: patterns.join(","),
        source,
    })
}

/// Aggregate state of a scanned directory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryScan {
    /// Number of members accepted by the filter
    pub member_count: u64,
    /// Newest member modification time, 0 when there are no members
    pub max_mtime_ms: i64,
    /// Members modified after the `newer_than` threshold, if one was given
    pub newer_members: Vec<PathBuf>,
}

/// Scan `dir` recursively.
///
/// Returns `Ok(None)` when `dir` itself no longer exists. Members that
/// disappear while the walk is running are skipped; the scan is a best-effort
/// snapshot. Any other read failure is returned as an error.
pub fn scan_directory(
    dir: &Path,
    filter: &MemberFilter,
    newer_than: Option<i64>,
) -> Result<Option<DirectoryScan>, DigestError> {
    let mut scan = DirectoryScan::default();

    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = match entry {
            Ok(e) => e,
            Err(err) => {
                if err.depth() > 0 && is_transient(&err) {
                    continue;
                }
                if err.depth() == 0 && is_not_found(&err) {
                    return Ok(None);
                }
                let path = err.path().unwrap_or(dir).to_path_buf();
                return Err(DigestError::io(path, walk_io_error(err)));
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let relative = match make_relative(entry.path(), dir) {
            Some(r) => r,
            None => continue,
        };
        if !filter.matches(&relative) {
            continue;
        }

        let metadata = match entry.metadata() {
            Ok(m) => m,
            Err(err) if is_transient(&err) => continue,
            Err(err) => return Err(DigestError::io(entry.path(), walk_io_error(err))),
        };
        let mtime = mtime_ms(&metadata).map_err(|e| DigestError::io(entry.path(), e))?;

        scan.member_count += 1;
        scan.max_mtime_ms = scan.max_mtime_ms.max(mtime);
        if newer_than.is_some_and(|threshold| mtime > threshold) {
            scan.newer_members.push(entry.path().to_path_buf());
        }
    }

    Ok(Some(scan))
}

/// Vanished entries and symlink loops do not fail the scan
fn is_transient(err: &walkdir::Error) -> bool {
    err.loop_ancestor().is_some() || is_not_found(err)
}

fn is_not_found(err: &walkdir::Error) -> bool {
    err.io_error()
        .map(|e| e.kind() == ErrorKind::NotFound)
        .unwrap_or(false)
}

fn walk_io_error(err: walkdir::Error) -> std::io::Error {
    let message = err.to_string();
    err.into_io_error()
        .unwrap_or_else(|| std::io::Error::new(ErrorKind::Other, message))
}
