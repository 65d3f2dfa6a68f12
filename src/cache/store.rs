//! Build-state snapshot stores
//!
//! A store remembers the fingerprints registered by the previous build
//! invocation and collects the registrations of the current one. After the
//! digest pass, anything registered last time but not this time is reported
//! as removed.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::cache::meta::StateMeta;
use crate::core::error::DigestError;
use crate::core::model::{ArtifactFingerprint, Snapshot};

/// State file names
pub const INPUTS_FILE: &str = "inputs.jsonl";
pub const META_FILE: &str = "meta.json";

/// Cross-invocation build state consumed by the digester.
///
/// A store serves one build session at a time; the `&mut` receivers keep
/// unrelated sessions from sharing registrations.
pub trait SnapshotStore {
    /// Record this run's fingerprint, superseding an earlier registration
    /// of the same path in this run
    fn register_input(&mut self, fingerprint: ArtifactFingerprint);

    /// Fingerprints registered by the previous run
    fn previous_inputs(&self) -> Snapshot;

    /// Previous-run entries not re-registered in this run
    fn removed_inputs(&self) -> Vec<ArtifactFingerprint>;

    /// End the run: this run's registrations become the next run's baseline
    fn commit(&mut self) -> Result<(), DigestError>;

    /// Whether a stored baseline existed but had to be dropped (corrupt, or
    /// recorded under another member policy) since the last commit.
    ///
    /// The digester treats this as a change even when no dependency differs.
    fn baseline_discarded(&self) -> bool {
        false
    }
}

/// Previous/current registrations shared by the store implementations
#[derive(Debug, Clone, Default)]
struct Registrations {
    previous: Snapshot,
    current: Snapshot,
}

impl Registrations {
    fn register(&mut self, fingerprint: ArtifactFingerprint) {
        self.current
            .insert(fingerprint.path().to_path_buf(), fingerprint);
    }

    fn removed(&self) -> Vec<ArtifactFingerprint> {
        self.previous
            .iter()
            .filter(|(path, _)| !self.current.contains_key(*path))
            .map(|(_, fp)| fp.clone())
            .collect()
    }

    fn roll_over(&mut self) {
        self.previous = std::mem::take(&mut self.current);
    }
}

/// In-memory store, mainly for embedding and tests
#[derive(Debug, Clone, Default)]
pub struct MemorySnapshotStore {
    state: Registrations,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a given previous-run snapshot
    pub fn with_previous(previous: Snapshot) -> Self {
        Self {
            state: Registrations {
                previous,
                current: Snapshot::new(),
            },
        }
    }

    /// Registrations made so far in this run
    pub fn current_inputs(&self) -> &Snapshot {
        &self.state.current
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn register_input(&mut self, fingerprint: ArtifactFingerprint) {
        self.state.register(fingerprint);
    }

    fn previous_inputs(&self) -> Snapshot {
        self.state.previous.clone()
    }

    fn removed_inputs(&self) -> Vec<ArtifactFingerprint> {
        self.state.removed()
    }

    fn commit(&mut self) -> Result<(), DigestError> {
        self.state.roll_over();
        Ok(())
    }
}

/// Directory-backed store: `inputs.jsonl` holds one fingerprint per line,
/// `meta.json` the format version and member policy hash.
///
/// Missing state is a first run with an empty baseline. State that cannot be
/// parsed, is incomplete or was produced under a different member policy is
/// discarded and flagged through [`SnapshotStore::baseline_discarded`]. Any
/// other read failure is an error.
#[derive(Debug)]
pub struct JsonlSnapshotStore {
    dir: PathBuf,
    policy_key: String,
    state: Registrations,
    discarded: bool,
}

impl JsonlSnapshotStore {
    /// Open the state in `dir` for fingerprints produced under `policy_key`
    pub fn open(
        dir: impl Into<PathBuf>,
        policy_key: impl Into<String>,
    ) -> Result<Self, DigestError> {
        let dir = dir.into();
        let policy_key = policy_key.into();
        let (previous, discarded) = match load_previous(&dir, &policy_key)? {
            Baseline::Loaded(snapshot) => (snapshot, false),
            Baseline::Fresh => (Snapshot::new(), false),
            Baseline::Discarded => (Snapshot::new(), true),
        };
        Ok(Self {
            dir,
            policy_key,
            state: Registrations {
                previous,
                current: Snapshot::new(),
            },
            discarded,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl SnapshotStore for JsonlSnapshotStore {
    fn register_input(&mut self, fingerprint: ArtifactFingerprint) {
        self.state.register(fingerprint);
    }

    fn previous_inputs(&self) -> Snapshot {
        self.state.previous.clone()
    }

    fn removed_inputs(&self) -> Vec<ArtifactFingerprint> {
        self.state.removed()
    }

    fn commit(&mut self) -> Result<(), DigestError> {
        fs::create_dir_all(&self.dir).map_err(|e| DigestError::io(&self.dir, e))?;

        write_inputs(&self.dir.join(INPUTS_FILE), &self.state.current)?;
        write_meta(&self.dir.join(META_FILE), &StateMeta::new(&self.policy_key))?;

        tracing::debug!(
            "Committed {} inputs to {}",
            self.state.current.len(),
            self.dir.display()
        );
        self.state.roll_over();
        self.discarded = false;
        Ok(())
    }

    fn baseline_discarded(&self) -> bool {
        self.discarded
    }
}

enum Baseline {
    Loaded(Snapshot),
    Fresh,
    Discarded,
}

fn load_previous(dir: &Path, policy_key: &str) -> Result<Baseline, DigestError> {
    let inputs_path = dir.join(INPUTS_FILE);
    let inputs_exist = path_exists(&inputs_path)?;

    let meta = match read_meta(&dir.join(META_FILE)) {
        Ok(Some(meta)) => meta,
        Ok(None) if inputs_exist => {
            tracing::warn!("Discarding build state in {} without {}", dir.display(), META_FILE);
            return Ok(Baseline::Discarded);
        }
        Ok(None) => return Ok(Baseline::Fresh),
        Err(e @ DigestError::State { .. }) => {
            tracing::warn!("Discarding unreadable build state: {}", e);
            return Ok(Baseline::Discarded);
        }
        Err(e) => return Err(e),
    };

    if !meta.is_compatible(policy_key) {
        tracing::warn!(
            "Discarding build state in {} recorded under a different member policy",
            dir.display()
        );
        return Ok(Baseline::Discarded);
    }

    if !inputs_exist {
        tracing::warn!("Discarding build state in {} without {}", dir.display(), INPUTS_FILE);
        return Ok(Baseline::Discarded);
    }

    match read_inputs(&inputs_path) {
        Ok(snapshot) => Ok(Baseline::Loaded(snapshot)),
        Err(e @ DigestError::State { .. }) => {
            tracing::warn!("Discarding unreadable build state: {}", e);
            Ok(Baseline::Discarded)
        }
        Err(e) => Err(e),
    }
}

fn path_exists(path: &Path) -> Result<bool, DigestError> {
    path.try_exists().map_err(|e| DigestError::io(path, e))
}

/// Read the stored snapshot of a state directory regardless of policy
pub fn read_state(dir: &Path) -> Result<(Option<StateMeta>, Snapshot), DigestError> {
    let meta = read_meta(&dir.join(META_FILE))?;
    let inputs_path = dir.join(INPUTS_FILE);
    let inputs = if path_exists(&inputs_path)? {
        read_inputs(&inputs_path)?
    } else {
        Snapshot::new()
    };
    Ok((meta, inputs))
}

fn read_meta(path: &Path) -> Result<Option<StateMeta>, DigestError> {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(DigestError::io(path, e)),
    };
    let meta = serde_json::from_str(&content).map_err(|e| DigestError::State {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    Ok(Some(meta))
}

fn write_meta(path: &Path, meta: &StateMeta) -> Result<(), DigestError> {
    let json = serde_json::to_string_pretty(meta).map_err(|e| DigestError::State {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    replace_file(path, |writer| writer.write_all(json.as_bytes()))
}

fn read_inputs(path: &Path) -> Result<Snapshot, DigestError> {
    let file = File::open(path).map_err(|e| DigestError::io(path, e))?;
    let reader = BufReader::new(file);
    let mut snapshot = Snapshot::new();

    for line in reader.lines() {
        let line = line.map_err(|e| DigestError::io(path, e))?;
        if line.trim().is_empty() {
            continue;
        }
        let fp: ArtifactFingerprint =
            serde_json::from_str(&line).map_err(|e| DigestError::State {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        snapshot.insert(fp.path().to_path_buf(), fp);
    }

    Ok(snapshot)
}

fn write_inputs(path: &Path, inputs: &Snapshot) -> Result<(), DigestError> {
    let mut lines = Vec::with_capacity(inputs.len());
    for fp in inputs.values() {
        let json = serde_json::to_string(fp).map_err(|e| DigestError::State {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        lines.push(json);
    }

    replace_file(path, |writer| {
        for line in &lines {
            writeln!(writer, "{}", line)?;
        }
        Ok(())
    })
}

/// Write `path` through a sibling temp file renamed over it, so readers see
/// either the old or the new content
fn replace_file<F>(path: &Path, write: F) -> Result<(), DigestError>
where
    F: FnOnce(&mut BufWriter<File>) -> std::io::Result<()>,
{
    let tmp = tmp_path(path);
    let result = (|| -> std::io::Result<()> {
        let mut writer = BufWriter::new(File::create(&tmp)?);
        write(&mut writer)?;
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        fs::rename(&tmp, path)
    })();

    result.map_err(|e| {
        let _ = fs::remove_file(&tmp);
        DigestError::io(path, e)
    })
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Delete a state directory
pub fn clear_state(dir: &Path) -> Result<(), DigestError> {
    match fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(DigestError::io(dir, e)),
    }
}
