//! cpdigest - classpath dependency change detection for incremental builds
//!
//! cpdigest provides:
//! - Cheap fingerprints of dependency files and class-output directories
//! - A session-scoped fingerprint cache shared by compilation units
//! - Snapshot stores remembering the previous build's fingerprints
//! - A digester deciding whether the dependency set changed

pub mod backends;
pub mod cache;
pub mod cli;
pub mod core;
pub mod flows;

pub use crate::backends::extract::{Extraction, Extractor, FsExtractor};
pub use crate::backends::scan::MemberFilter;
pub use crate::cache::artifacts::{ArtifactCache, CacheLookup};
pub use crate::cache::store::{JsonlSnapshotStore, MemorySnapshotStore, SnapshotStore};
pub use crate::core::error::DigestError;
pub use crate::core::model::{
    ArtifactFingerprint, ArtifactKind, ChangeKind, DependencyChange, DigestReport, Snapshot,
};
pub use crate::flows::digest::{ClasspathDigester, Session};
