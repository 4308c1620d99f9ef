//! The per-run delta artifact consumed by downstream reporting.

use chrono::{DateTime, Utc};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{info, warn};

use crate::error::{CoreError, CoreResult};
use crate::ids::GroupName;
use crate::reconcile::{GroupDelta, ReconciliationResult};
use crate::snapshot::write_atomic;

/// Default artifact file name.
pub const DELTA_FILE_NAME: &str = "comparison_result.json";

/// Top-level keys that carry run metadata rather than a group.
pub const RESERVED_KEYS: [&str; 4] = [
    "new_groups",
    "disappeared_groups",
    "changes_detected",
    "generated_at",
];

/// Serialized view of a [`ReconciliationResult`] with a generation time.
///
/// Every group is a top-level key, followed by the metadata keys:
///
/// ```json
/// {
///   "Finance": { "added": [...], "removed": [...], "unchanged": [...] },
///   "IT": { "added": [...], "removed": [...], "unchanged": [...] },
///   "new_groups": [...],
///   "disappeared_groups": [...],
///   "changes_detected": true,
///   "generated_at": "2024-01-01T00:00:00Z"
/// }
/// ```
///
/// A group whose name equals one of [`RESERVED_KEYS`] cannot be written
/// without clobbering the metadata; it is left out of the artifact (see
/// [`DeltaArtifact::shadowed_groups`]) and still appears in `new_groups` or
/// `disappeared_groups` when it applies.
#[derive(Debug)]
pub struct DeltaArtifact<'a> {
    pub groups: &'a BTreeMap<GroupName, GroupDelta>,
    pub new_groups: &'a BTreeSet<GroupName>,
    pub disappeared_groups: &'a BTreeSet<GroupName>,
    pub changes_detected: bool,
    pub generated_at: DateTime<Utc>,
}

impl<'a> DeltaArtifact<'a> {
    #[must_use]
    pub fn new(result: &'a ReconciliationResult, generated_at: DateTime<Utc>) -> Self {
        Self {
            groups: &result.groups,
            new_groups: &result.new_groups,
            disappeared_groups: &result.disappeared_groups,
            changes_detected: result.changes_detected,
            generated_at,
        }
    }

    /// Groups left out because their name is a reserved key.
    pub fn shadowed_groups(&self) -> impl Iterator<Item = &'a GroupName> {
        self.groups.keys().filter(|name| is_reserved(name))
    }

    /// Pretty-printed JSON bytes.
    pub fn to_json(&self) -> CoreResult<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Writes the artifact to `path`, replacing any previous file.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ArtifactWrite`] if the file cannot be written.
    pub fn write(&self, path: &Path) -> CoreResult<()> {
        for name in self.shadowed_groups() {
            warn!(group = %name, "Group name collides with a delta metadata key, left out of the delta");
        }
        let contents = self.to_json()?;
        write_atomic(path, &contents).map_err(|source| CoreError::ArtifactWrite {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), groups = self.groups.len(), "Delta written");
        Ok(())
    }
}

fn is_reserved(name: &GroupName) -> bool {
    RESERVED_KEYS.contains(&name.as_str())
}

impl Serialize for DeltaArtifact<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        for (name, delta) in self.groups.iter().filter(|(name, _)| !is_reserved(name)) {
            map.serialize_entry(name, delta)?;
        }
        map.serialize_entry("new_groups", self.new_groups)?;
        map.serialize_entry("disappeared_groups", self.disappeared_groups)?;
        map.serialize_entry("changes_detected", &self.changes_detected)?;
        map.serialize_entry("generated_at", &self.generated_at)?;
        map.end()
    }
}
