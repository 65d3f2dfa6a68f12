//! Classpath digest flow
//!
//! Decides whether the dependency set of one compilation unit changed since
//! the previous build:
//!
//! 1. Load the previous snapshot from the store
//! 2. Fingerprint each dependency through the session cache, skipping paths
//!    that do not exist, and register it for the next run
//! 3. Compare against the previous fingerprint (new or modified → changed)
//! 4. Every previous entry not registered again is a removed dependency
//!
//! A baseline the store had to discard counts as a change on its own.

use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::backends::extract::{Extractor, FsExtractor};
use crate::backends::scan::MemberFilter;
use crate::cache::artifacts::ArtifactCache;
use crate::cache::store::SnapshotStore;
use crate::core::error::DigestError;
use crate::core::model::{ArtifactFingerprint, ChangeKind, DependencyChange, DigestReport};
use crate::core::paths::normalize_dependency_path;

/// Change detector for one compilation unit.
///
/// Cheap to construct; the cache it borrows is shared by every digester of
/// the build session.
pub struct ClasspathDigester<'a> {
    cache: &'a ArtifactCache,
    extractor: &'a dyn Extractor,
}

impl<'a> ClasspathDigester<'a> {
    pub fn new(cache: &'a ArtifactCache, extractor: &'a dyn Extractor) -> Self {
        Self { cache, extractor }
    }

    /// Detect whether the dependencies changed compared to the previous build.
    pub fn digest_dependencies<P: AsRef<Path>>(
        &self,
        store: &mut dyn SnapshotStore,
        dependencies: &[P],
    ) -> Result<bool, DigestError> {
        Ok(self.detect_changes(store, dependencies)?.changed)
    }

    /// Run a full detection pass and return the verdict with its trail.
    ///
    /// Registrations are left pending in `store`; committing them is the
    /// caller's decision (usually after a successful build).
    pub fn detect_changes<P: AsRef<Path>>(
        &self,
        store: &mut dyn SnapshotStore,
        dependencies: &[P],
    ) -> Result<DigestReport, DigestError> {
        let started = Instant::now();
        let previous_inputs = store.previous_inputs();
        let mut report = DigestReport {
            analyzed: dependencies.len(),
            ..Default::default()
        };

        if store.baseline_discarded() {
            tracing::debug!("Previous build state was discarded");
            report.baseline_discarded = true;
            report.changed = true;
        }

        for dependency in dependencies {
            let dependency: &Path = dependency.as_ref();
            let path =
                normalize_dependency_path(dependency).map_err(|e| DigestError::io(dependency, e))?;

            let previous = previous_inputs.get(&path);
            let Some(lookup) = self.cache.lookup(&path, previous, self.extractor)? else {
                // output folder of a reactor sibling that has not been built
                tracing::trace!("Skipping absent classpath entry {}", path.display());
                report.skipped.push(path);
                continue;
            };
            let artifact = lookup.fingerprint;

            store.register_input(artifact.as_ref().clone());

            match previous {
                None => {
                    tracing::debug!("New classpath entry {}", path.display());
                    let current = Some(artifact.as_ref());
                    report.push(change(path, ChangeKind::Added, None, current, Vec::new()));
                }
                Some(previous) if !artifact.is_equivalent(previous) => {
                    let details = change_details(lookup.notes, &artifact, previous);
                    if details.is_empty() {
                        tracing::debug!("Changed classpath entry {}", path.display());
                    } else {
                        tracing::debug!(
                            "Changed classpath entry {}:\n   {}",
                            path.display(),
                            details.join("\n   ")
                        );
                    }
                    report.push(change(
                        path,
                        ChangeKind::Modified,
                        Some(previous),
                        Some(artifact.as_ref()),
                        details,
                    ));
                }
                Some(_) => {}
            }
        }

        for removed in store.removed_inputs() {
            tracing::debug!("Removed classpath entry {}", removed.path().display());
            let path = removed.path().to_path_buf();
            report.push(change(path, ChangeKind::Removed, Some(&removed), None, Vec::new()));
        }

        report.elapsed_ms = started.elapsed().as_millis() as u64;
        tracing::debug!(
            "Analyzed {} classpath dependencies ({} ms)",
            report.analyzed,
            report.elapsed_ms
        );

        Ok(report)
    }
}

/// Member notes from the extraction plus the member count delta of a
/// directory
fn change_details(
    mut notes: Vec<String>,
    current: &ArtifactFingerprint,
    previous: &ArtifactFingerprint,
) -> Vec<String> {
    if !current.is_file() && current.size_or_count() != previous.size_or_count() {
        notes.push(format!(
            "member count changed (new {} previous {})",
            current.size_or_count(),
            previous.size_or_count()
        ));
    }
    notes
}

fn change(
    path: PathBuf,
    kind: ChangeKind,
    previous: Option<&ArtifactFingerprint>,
    current: Option<&ArtifactFingerprint>,
    details: Vec<String>,
) -> DependencyChange {
    DependencyChange {
        path,
        kind,
        previous: previous.cloned(),
        current: current.cloned(),
        details,
    }
}

/// One build session: a fingerprint cache and filesystem extractor shared
/// by every compilation unit digested in it.
///
/// Drop the session when the build ends; nothing outlives it.
#[derive(Debug, Default)]
pub struct Session {
    cache: ArtifactCache,
    extractor: FsExtractor,
}

impl Session {
    pub fn new(filter: MemberFilter) -> Self {
        Self {
            cache: ArtifactCache::new(),
            extractor: FsExtractor::new(filter),
        }
    }

    pub fn digester(&self) -> ClasspathDigester<'_> {
        ClasspathDigester::new(&self.cache, &self.extractor)
    }

    pub fn cache(&self) -> &ArtifactCache {
        &self.cache
    }

    pub fn extractor(&self) -> &FsExtractor {
        &self.extractor
    }

    /// Tell the session a unit rewrote its output directory, so later units
    /// depending on it see the new contents.
    pub fn output_rebuilt(&self, output_dir: &Path) -> Result<bool, DigestError> {
        let path =
            normalize_dependency_path(output_dir).map_err(|e| DigestError::io(output_dir, e))?;
        Ok(self.cache.evict(&path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::store::MemorySnapshotStore;
    use crate::core::model::Snapshot;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Extractor over a fake filesystem: path -> (size, time)
    #[derive(Default)]
    struct FakeFs {
        files: Mutex<HashMap<PathBuf, (u64, i64)>>,
    }

    impl FakeFs {
        fn set(&self, path: &str, size: u64, time: i64) {
            self.files
                .lock()
                .unwrap()
                .insert(PathBuf::from(path), (size, time));
        }
    }

    impl Extractor for FakeFs {
        fn extract(&self, path: &Path) -> Result<Option<ArtifactFingerprint>, DigestError> {
            Ok(self
                .files
                .lock()
                .unwrap()
                .get(path)
                .map(|(size, time)| ArtifactFingerprint::file(path, *size, *time)))
        }
    }

    fn snapshot(entries: &[(&str, u64, i64)]) -> Snapshot {
        entries
            .iter()
            .map(|(p, s, t)| (PathBuf::from(p), ArtifactFingerprint::file(*p, *s, *t)))
            .collect()
    }

    #[test]
    fn test_unchanged_dependency() {
        let fs = FakeFs::default();
        fs.set("/out/lib.jar", 1000, 100);
        let cache = ArtifactCache::new();
        let mut store = MemorySnapshotStore::with_previous(snapshot(&[("/out/lib.jar", 1000, 100)]));

        let changed = ClasspathDigester::new(&cache, &fs)
            .digest_dependencies(&mut store, &["/out/lib.jar"])
            .unwrap();
        assert!(!changed);
        assert_eq!(store.current_inputs().len(), 1);
    }

    #[test]
    fn test_modified_timestamp() {
        let fs = FakeFs::default();
        fs.set("/out/lib.jar", 1000, 150);
        let cache = ArtifactCache::new();
        let mut store = MemorySnapshotStore::with_previous(snapshot(&[("/out/lib.jar", 1000, 100)]));

        let report = ClasspathDigester::new(&cache, &fs)
            .detect_changes(&mut store, &["/out/lib.jar"])
            .unwrap();
        assert!(report.changed);
        assert_eq!(report.changes.len(), 1);
        assert_eq!(report.changes[0].kind, ChangeKind::Modified);
        assert_eq!(report.changes[0].previous.as_ref().unwrap().timestamp_ms(), 100);
        assert_eq!(report.changes[0].current.as_ref().unwrap().timestamp_ms(), 150);
    }

    #[test]
    fn test_added_dependency() {
        let fs = FakeFs::default();
        fs.set("/a.jar", 1, 1);
        fs.set("/b.jar", 2, 2);
        let cache = ArtifactCache::new();
        let mut store = MemorySnapshotStore::with_previous(snapshot(&[("/a.jar", 1, 1)]));

        let report = ClasspathDigester::new(&cache, &fs)
            .detect_changes(&mut store, &["/a.jar", "/b.jar"])
            .unwrap();
        assert!(report.changed);
        let added: Vec<_> = report.changes_of(ChangeKind::Added).collect();
        assert_eq!(added.len(), 1);
        assert_eq!(added[0].path, PathBuf::from("/b.jar"));
    }

    #[test]
    fn test_removed_dependency() {
        let fs = FakeFs::default();
        fs.set("/a.jar", 1, 1);
        let cache = ArtifactCache::new();
        let mut store =
            MemorySnapshotStore::with_previous(snapshot(&[("/a.jar", 1, 1), ("/b.jar", 2, 2)]));

        let report = ClasspathDigester::new(&cache, &fs)
            .detect_changes(&mut store, &["/a.jar"])
            .unwrap();
        assert!(report.changed);
        let removed: Vec<_> = report.changes_of(ChangeKind::Removed).collect();
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].path, PathBuf::from("/b.jar"));
    }

    #[test]
    fn test_absent_dependency_is_skipped() {
        let fs = FakeFs::default();
        fs.set("/a.jar", 1, 1);
        let cache = ArtifactCache::new();
        let mut store = MemorySnapshotStore::with_previous(snapshot(&[("/a.jar", 1, 1)]));

        let report = ClasspathDigester::new(&cache, &fs)
            .detect_changes(&mut store, &["/a.jar", "/sibling/target/classes"])
            .unwrap();
        assert!(!report.changed);
        assert_eq!(report.analyzed, 2);
        assert_eq!(report.skipped, vec![PathBuf::from("/sibling/target/classes")]);
        assert_eq!(store.current_inputs().len(), 1);
    }

    #[test]
    fn test_later_equal_entries_do_not_reset_verdict() {
        let fs = FakeFs::default();
        fs.set("/new.jar", 1, 1);
        fs.set("/same.jar", 2, 2);
        let cache = ArtifactCache::new();
        let mut store = MemorySnapshotStore::with_previous(snapshot(&[("/same.jar", 2, 2)]));

        let changed = ClasspathDigester::new(&cache, &fs)
            .digest_dependencies(&mut store, &["/new.jar", "/same.jar"])
            .unwrap();
        assert!(changed);
    }

    #[test]
    fn test_paths_are_normalized() {
        let fs = FakeFs::default();
        fs.set("/out/lib.jar", 1, 1);
        let cache = ArtifactCache::new();
        let mut store = MemorySnapshotStore::with_previous(snapshot(&[("/out/lib.jar", 1, 1)]));

        let changed = ClasspathDigester::new(&cache, &fs)
            .digest_dependencies(&mut store, &["/out/./tmp/../lib.jar"])
            .unwrap();
        assert!(!changed);
        assert!(cache.contains(Path::new("/out/lib.jar")));
    }

    #[test]
    fn test_cached_fingerprint_masks_change_until_evicted() {
        let fs = FakeFs::default();
        fs.set("/out/classes", 3, 100);
        let session_cache = ArtifactCache::new();
        let digester = ClasspathDigester::new(&session_cache, &fs);

        let mut store = MemorySnapshotStore::new();
        assert!(digester.digest_dependencies(&mut store, &["/out/classes"]).unwrap());
        store.commit().unwrap();

        fs.set("/out/classes", 4, 200);
        assert!(!digester.digest_dependencies(&mut store, &["/out/classes"]).unwrap());
        store.commit().unwrap();

        session_cache.evict(Path::new("/out/classes"));
        assert!(digester.digest_dependencies(&mut store, &["/out/classes"]).unwrap());
    }

    /// Store whose baseline was dropped on open
    struct DiscardedStore(MemorySnapshotStore);

    impl SnapshotStore for DiscardedStore {
        fn register_input(&mut self, fingerprint: ArtifactFingerprint) {
            self.0.register_input(fingerprint);
        }

        fn previous_inputs(&self) -> Snapshot {
            self.0.previous_inputs()
        }

        fn removed_inputs(&self) -> Vec<ArtifactFingerprint> {
            self.0.removed_inputs()
        }

        fn commit(&mut self) -> Result<(), DigestError> {
            self.0.commit()
        }

        fn baseline_discarded(&self) -> bool {
            true
        }
    }

    #[test]
    fn test_discarded_baseline_is_a_change() {
        let fs = FakeFs::default();
        let cache = ArtifactCache::new();
        let mut store = DiscardedStore(MemorySnapshotStore::new());

        let report = ClasspathDigester::new(&cache, &fs)
            .detect_changes(&mut store, &["/sibling/target/classes"])
            .unwrap();
        assert!(report.changed);
        assert!(report.baseline_discarded);
        assert!(report.changes.is_empty());
    }

    #[test]
    fn test_session_output_rebuilt() {
        let session = Session::default();
        assert!(!session.output_rebuilt(Path::new("/nowhere/classes")).unwrap());
        assert!(session.cache().is_empty());
    }
}
