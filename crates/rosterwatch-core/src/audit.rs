//! One audit run: load the previous snapshot, fetch the current roster,
//! reconcile, and persist the next snapshot.

use std::collections::BTreeSet;
use tracing::{info, warn};

use crate::error::CoreResult;
use crate::ids::GroupName;
use crate::labels::MemberLabels;
use crate::reconcile::{reconcile, ReconciliationResult};
use crate::snapshot::{Snapshot, SnapshotSource, SnapshotStore};
use crate::source::{GroupSelection, RosterSource};

/// Everything a run produced, for reporting and signalling.
#[derive(Debug, Clone)]
pub struct AuditOutcome {
    /// The comparison between this run and the previous snapshot.
    pub result: ReconciliationResult,
    /// The snapshot written for the next run.
    pub snapshot: Snapshot,
    /// How the previous snapshot was obtained.
    pub previous_source: SnapshotSource,
    /// The previous snapshot loaded but held no groups.
    pub previous_empty: bool,
    /// Groups whose member request failed this run.
    pub failed_groups: BTreeSet<GroupName>,
    /// Requested group names with no directory match.
    pub unresolved_groups: Vec<String>,
    /// Labels for every member in `result`, including removed ones.
    pub labels: MemberLabels,
}

impl AuditOutcome {
    /// True when there was no previous membership to compare against: the
    /// snapshot was missing, unreadable, or held no groups.
    ///
    /// Every group is then reported as new; callers usually skip
    /// notification for such a run.
    #[must_use]
    pub fn is_bootstrap(&self) -> bool {
        self.previous_source != SnapshotSource::Loaded || self.previous_empty
    }
}

/// Runs one audit against `source`, persisting through `store`.
///
/// Groups that could not be read this run are left out of the comparison
/// and keep their previous membership in the saved snapshot. Unresolved
/// group names are left out of the comparison and dropped from the snapshot.
///
/// # Errors
///
/// Fails if the source aborts (nothing is saved then) or if the snapshot
/// cannot be written.
pub async fn run_audit<S>(
    source: &S,
    store: &SnapshotStore,
    selection: &GroupSelection,
) -> CoreResult<AuditOutcome>
where
    S: RosterSource + ?Sized,
{
    let loaded = store.load();
    let loaded_first_run = loaded.is_first_run();
    let previous = loaded.snapshot;
    info!(
        groups = previous.roster.len(),
        first_run = loaded_first_run || previous.is_empty(),
        "Loaded previous member data"
    );

    let report = source.fetch_roster(selection).await?;
    info!(
        groups = report.roster.len(),
        memberships = report.roster.membership_count(),
        failed = report.failed.len(),
        unresolved = report.unresolved.len(),
        "Fetched current group members"
    );

    let excluded = report.excluded();
    for name in &report.failed {
        warn!(group = %name, "No member data this run, group left out of comparison");
    }

    let comparable_previous = Snapshot::from(previous.roster.without(&excluded));
    let result = reconcile(&report.roster, &comparable_previous);

    let mut labels = previous.labels.clone();
    labels.merge(report.labels);

    let mut next = report.roster;
    next.carry_forward(&previous.roster, &report.failed);
    let mut snapshot = Snapshot::capture(next);
    snapshot.labels = labels.restricted_to(&snapshot.roster);
    store.save(&snapshot)?;

    Ok(AuditOutcome {
        result,
        snapshot,
        previous_source: loaded.source,
        previous_empty: previous.is_empty(),
        failed_groups: report.failed,
        unresolved_groups: report.unresolved,
        labels,
    })
}
