//! Group membership auditing for rosterwatch
//!
//! This crate holds everything that does not talk to a directory service:
//! label normalization, the roster model and member display labels, snapshot
//! persistence between runs, the reconciliation engine that classifies what
//! changed, and the delta artifact written for downstream reporting.
//!
//! # Example
//!
//! ```no_run
//! use rosterwatch_core::{reconcile, Roster, SnapshotStore};
//!
//! let store = SnapshotStore::new("artifacts/previous_snapshot.json");
//! let previous = store.load().snapshot;
//!
//! let current = Roster::from_raw(vec![("Finance", vec!["alice", "bob"])]);
//! let result = reconcile(&current, &previous);
//!
//! for (group, delta) in result.changed_groups() {
//!     println!("{group}: +{} -{}", delta.added.len(), delta.removed.len());
//! }
//! ```

pub mod audit;
pub mod delta;
pub mod error;
pub mod ids;
pub mod labels;
pub mod normalize;
pub mod reconcile;
pub mod roster;
pub mod snapshot;
pub mod source;

// Re-exports
pub use audit::{run_audit, AuditOutcome};
pub use delta::{DeltaArtifact, DELTA_FILE_NAME};
pub use error::{CoreError, CoreResult};
pub use ids::{EmptyLabelError, GroupName, MemberId};
pub use labels::MemberLabels;
pub use normalize::{normalize, normalize_non_empty};
pub use reconcile::{
    reconcile, GroupDelta, GroupStatus, ReconciliationResult, ReconciliationSummary,
};
pub use roster::Roster;
pub use snapshot::{
    write_atomic, LoadOutcome, Snapshot, SnapshotSource, SnapshotStore, SNAPSHOT_FILE_NAME,
};
pub use source::{FetchReport, GroupSelection, GroupTarget, RosterSource};
