//! Artifact metadata extraction
//!
//! Turns a dependency path into an [`ArtifactFingerprint`] from filesystem
//! metadata only; artifact bytes are never read.

use std::io::ErrorKind;
use std::path::Path;

use crate::backends::scan::{scan_directory, MemberFilter};
use crate::core::error::DigestError;
use crate::core::model::ArtifactFingerprint;
use crate::core::util::mtime_ms;

/// A fingerprint together with member-level notes gathered while computing it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub fingerprint: ArtifactFingerprint,
    /// Members modified after the previous fingerprint's timestamp
    pub notes: Vec<String>,
}

/// Produces fingerprints for dependency paths.
///
/// `Ok(None)` means the path is neither a file nor a directory, e.g. the
/// output folder of a sibling module that has not been built yet. Callers
/// skip such paths instead of failing.
pub trait Extractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<Option<ArtifactFingerprint>, DigestError>;

    /// Like [`extract`](Self::extract), also noting which members are newer
    /// than `previous`. The notes describe the same walk that produced the
    /// fingerprint; implementations may return none.
    fn extract_against(
        &self,
        path: &Path,
        _previous: Option<&ArtifactFingerprint>,
    ) -> Result<Option<Extraction>, DigestError> {
        Ok(self.extract(path)?.map(|fingerprint| Extraction {
            fingerprint,
            notes: Vec::new(),
        }))
    }
}

/// Filesystem-backed extractor
#[derive(Debug, Clone, Default)]
pub struct FsExtractor {
    filter: MemberFilter,
}

impl FsExtractor {
    pub fn new(filter: MemberFilter) -> Self {
        Self { filter }
    }

    pub fn filter(&self) -> &MemberFilter {
        &self.filter
    }

    /// Fingerprint a directory; `None` if it vanished before the walk
    fn extract_directory(
        &self,
        path: &Path,
        previous: Option<&ArtifactFingerprint>,
    ) -> Result<Option<Extraction>, DigestError> {
        let newer_than = previous
            .filter(|p| !p.is_file())
            .map(|p| p.timestamp_ms());
        let Some(scan) = scan_directory(path, &self.filter, newer_than)? else {
            tracing::trace!("Directory {} vanished before scanning", path.display());
            return Ok(None);
        };

        let notes = scan
            .newer_members
            .iter()
            .map(|member| format!("new or modified member {}", member.display()))
            .collect();
        Ok(Some(Extraction {
            fingerprint: ArtifactFingerprint::directory(path, scan.member_count, scan.max_mtime_ms),
            notes,
        }))
    }
}

impl Extractor for FsExtractor {
    fn extract(&self, path: &Path) -> Result<Option<ArtifactFingerprint>, DigestError> {
        Ok(self.extract_against(path, None)?.map(|e| e.fingerprint))
    }

    fn extract_against(
        &self,
        path: &Path,
        previous: Option<&ArtifactFingerprint>,
    ) -> Result<Option<Extraction>, DigestError> {
        let metadata = match std::fs::metadata(path) {
            Ok(m) => m,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(DigestError::io(path, e)),
        };

        if metadata.is_file() {
            let mtime = mtime_ms(&metadata).map_err(|e| DigestError::io(path, e))?;
            Ok(Some(Extraction {
                fingerprint: ArtifactFingerprint::file(path, metadata.len(), mtime),
                notes: Vec::new(),
            }))
        } else if metadata.is_dir() {
            self.extract_directory(path, previous)
        } else {
            Ok(None)
        }
    }
}
