//! Session-scoped artifact cache
//!
//! Memoizes fingerprints per normalized dependency path so that a library or
//! sibling output directory shared by many compilation units is scanned once
//! per build session. The cache is an explicit value; create one per session
//! and hand it to every digester of that session.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::backends::extract::{Extraction, Extractor};
use crate::core::error::DigestError;
use crate::core::model::ArtifactFingerprint;

/// Hit/miss counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// Outcome of [`ArtifactCache::lookup`]
#[derive(Debug, Clone)]
pub struct CacheLookup {
    pub fingerprint: Arc<ArtifactFingerprint>,
    /// Member notes from the extraction that filled the entry; empty on a hit
    pub notes: Vec<String>,
    pub hit: bool,
}

/// Thread-safe fingerprint cache.
///
/// Entries are never refreshed automatically. A collaborator that knows a
/// path is about to change within the session (a module's own output
/// directory once it has compiled) must [`evict`](Self::evict) it.
#[derive(Debug, Default)]
pub struct ArtifactCache {
    entries: DashMap<PathBuf, Arc<ArtifactFingerprint>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ArtifactCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached fingerprint for `path`, extracting it on a miss.
    ///
    /// Absent paths are not cached: a sibling output may appear later in the
    /// same session.
    pub fn get_or_compute(
        &self,
        path: &Path,
        extractor: &dyn Extractor,
    ) -> Result<Option<Arc<ArtifactFingerprint>>, DigestError> {
        Ok(self.lookup(path, None, extractor)?.map(|l| l.fingerprint))
    }

    /// Like [`get_or_compute`](Self::get_or_compute), also returning the
    /// member notes against `previous` when this call did the extraction.
    ///
    /// A hit never touches the filesystem, so it carries no notes.
    pub fn lookup(
        &self,
        path: &Path,
        previous: Option<&ArtifactFingerprint>,
        extractor: &dyn Extractor,
    ) -> Result<Option<CacheLookup>, DigestError> {
        if let Some(entry) = self.entries.get(path) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            tracing::trace!("artifact cache hit {}", path.display());
            return Ok(Some(CacheLookup {
                fingerprint: Arc::clone(entry.value()),
                notes: Vec::new(),
                hit: true,
            }));
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        tracing::trace!("artifact cache miss {}", path.display());

        // Extraction runs without holding a shard lock; on a concurrent miss
        // for the same path the first insert wins and later notes are dropped.
        let Some(Extraction { fingerprint, notes }) = extractor.extract_against(path, previous)?
        else {
            return Ok(None);
        };
        let lookup = match self.entries.entry(path.to_path_buf()) {
            Entry::Occupied(entry) => CacheLookup {
                fingerprint: Arc::clone(entry.get()),
                notes: Vec::new(),
                hit: true,
            },
            Entry::Vacant(entry) => {
                let fingerprint = Arc::new(fingerprint);
                entry.insert(Arc::clone(&fingerprint));
                CacheLookup {
                    fingerprint,
                    notes,
                    hit: false,
                }
            }
        };
        Ok(Some(lookup))
    }

    /// Cached fingerprint without touching the filesystem
    pub fn get(&self, path: &Path) -> Option<Arc<ArtifactFingerprint>> {
        self.entries.get(path).map(|e| Arc::clone(e.value()))
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries.contains_key(path)
    }

    /// Forget `path`; returns whether an entry was present
    pub fn evict(&self, path: &Path) -> bool {
        let removed = self.entries.remove(path).is_some();
        if removed {
            tracing::debug!("Evicted cached fingerprint {}", path.display());
        }
        removed
    }

    /// Forget every path in `paths`; returns the number of evicted entries
    pub fn evict_all<I, P>(&self, paths: I) -> usize
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        paths
            .into_iter()
            .filter(|p| self.evict(p.as_ref()))
            .count()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}
