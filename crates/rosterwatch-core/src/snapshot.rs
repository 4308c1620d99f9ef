//! Snapshot persistence between runs.
//!
//! The previous run's roster is read once at the start of a run and the
//! current roster is written once at the end. Reading never fails: a missing,
//! unreadable or corrupt artifact is reported as a first run with an empty
//! snapshot. Writing goes through a temporary file in the destination
//! directory that is flushed and then renamed over the artifact, so a failed
//! write leaves the previous artifact intact.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{CoreError, CoreResult};
use crate::labels::MemberLabels;
use crate::roster::Roster;

/// Default artifact file name.
pub const SNAPSHOT_FILE_NAME: &str = "previous_snapshot.json";

/// A roster persisted by a previous run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    /// Group memberships captured by the run.
    pub roster: Roster,
    /// When the run that wrote this snapshot finished, if recorded.
    pub generated_at: Option<DateTime<Utc>>,
    /// Display labels of the members in `roster`.
    pub labels: MemberLabels,
}

impl Snapshot {
    /// An empty snapshot, as seen on a first run.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Wraps a freshly fetched roster, stamping it with the current time.
    #[must_use]
    pub fn capture(roster: Roster) -> Self {
        Self {
            roster,
            generated_at: Some(Utc::now()),
            labels: MemberLabels::default(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.roster.is_empty()
    }
}

impl From<Roster> for Snapshot {
    fn from(roster: Roster) -> Self {
        Self {
            roster,
            generated_at: None,
            labels: MemberLabels::default(),
        }
    }
}

/// Where a loaded snapshot came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotSource {
    /// The artifact was read and parsed.
    Loaded,
    /// No artifact exists at the load path.
    Missing,
    /// The artifact exists but could not be read or parsed.
    Corrupt,
}

/// Result of [`SnapshotStore::load`].
#[derive(Debug, Clone)]
pub struct LoadOutcome {
    pub snapshot: Snapshot,
    pub source: SnapshotSource,
}

impl LoadOutcome {
    /// True when no usable previous snapshot was found.
    #[must_use]
    pub fn is_first_run(&self) -> bool {
        self.source != SnapshotSource::Loaded
    }
}

/// On-disk layout.
///
/// Older artifacts hold the bare group → members mapping, newer ones wrap it
/// with a timestamp and member labels. Both are accepted on read; only the
/// wrapped form is written.
#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum SnapshotFile {
    Wrapped {
        #[serde(default)]
        generated_at: Option<DateTime<Utc>>,
        groups: BTreeMap<String, Vec<String>>,
        #[serde(default, skip_serializing_if = "MemberLabels::is_empty")]
        labels: MemberLabels,
    },
    Bare(BTreeMap<String, Vec<String>>),
}

/// File-backed snapshot store.
///
/// The load and save paths may differ: CI pipelines typically download the
/// previous artifact into one directory and publish the next one from another.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    load_path: PathBuf,
    save_path: PathBuf,
}

impl SnapshotStore {
    /// Creates a store that reads and writes the same file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            load_path: path.clone(),
            save_path: path,
        }
    }

    /// Creates a store that reads from `load_path` and writes to `save_path`.
    pub fn with_paths(load_path: impl Into<PathBuf>, save_path: impl Into<PathBuf>) -> Self {
        Self {
            load_path: load_path.into(),
            save_path: save_path.into(),
        }
    }

    #[must_use]
    pub fn load_path(&self) -> &Path {
        &self.load_path
    }

    #[must_use]
    pub fn save_path(&self) -> &Path {
        &self.save_path
    }

    /// Loads the previous snapshot.
    ///
    /// Every group name and member is re-normalized, so artifacts written
    /// under older normalization rules still compare correctly.
    pub fn load(&self) -> LoadOutcome {
        let path = &self.load_path;

        let contents = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "No previous snapshot found, treating this as first run");
                return LoadOutcome {
                    snapshot: Snapshot::empty(),
                    source: SnapshotSource::Missing,
                };
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read previous snapshot, treating this as first run");
                return LoadOutcome {
                    snapshot: Snapshot::empty(),
                    source: SnapshotSource::Corrupt,
                };
            }
        };

        match serde_json::from_str::<SnapshotFile>(&contents) {
            Ok(file) => {
                let snapshot = Self::from_file(file);
                debug!(
                    path = %path.display(),
                    groups = snapshot.roster.len(),
                    memberships = snapshot.roster.membership_count(),
                    "Loaded previous snapshot"
                );
                LoadOutcome {
                    snapshot,
                    source: SnapshotSource::Loaded,
                }
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Previous snapshot is corrupted, treating this as first run");
                LoadOutcome {
                    snapshot: Snapshot::empty(),
                    source: SnapshotSource::Corrupt,
                }
            }
        }
    }

    /// Persists `snapshot` as the next run's previous snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::SnapshotWrite`] if the directory cannot be created
    /// or the file cannot be written and renamed into place.
    pub fn save(&self, snapshot: &Snapshot) -> CoreResult<()> {
        let path = &self.save_path;

        let file = SnapshotFile::Wrapped {
            generated_at: snapshot.generated_at,
            groups: snapshot
                .roster
                .iter()
                .map(|(name, members)| {
                    (
                        name.to_string(),
                        members.iter().map(ToString::to_string).collect(),
                    )
                })
                .collect(),
            labels: snapshot.labels.clone(),
        };
        let contents = serde_json::to_vec_pretty(&file)?;

        write_atomic(path, &contents).map_err(|source| CoreError::SnapshotWrite {
            path: path.clone(),
            source,
        })?;

        info!(
            path = %path.display(),
            groups = snapshot.roster.len(),
            "Current snapshot saved for next comparison"
        );
        Ok(())
    }

    fn from_file(file: SnapshotFile) -> Snapshot {
        let (generated_at, groups, labels) = match file {
            SnapshotFile::Wrapped {
                generated_at,
                groups,
                labels,
            } => (generated_at, groups, labels),
            SnapshotFile::Bare(groups) => (None, groups, MemberLabels::default()),
        };
        Snapshot {
            roster: Roster::from_raw(groups),
            generated_at,
            labels,
        }
    }
}

/// Writes `contents` to `path` through a temporary file in the same
/// directory, creating the directory first.
///
/// The temporary file is flushed to disk before it is renamed over `path`,
/// so readers see either the old or the new contents.
pub fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
