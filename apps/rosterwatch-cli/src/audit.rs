//! One pipeline run: audit, then write the delta artifact and report.

use chrono::Utc;
use rosterwatch_core::{
    run_audit, AuditOutcome, DeltaArtifact, GroupSelection, RosterSource, SnapshotStore,
    DELTA_FILE_NAME, SNAPSHOT_FILE_NAME,
};
use std::path::PathBuf;
use tracing::{info, warn};

use crate::error::CliResult;
use crate::report::{render_html, write_report, REPORT_FILE_NAME};

/// Settings for one run, resolved from flags and environment.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub selection: GroupSelection,
    /// Where the previous run's snapshot is read from.
    pub previous: PathBuf,
    /// Where this run's snapshot, delta and report are written.
    pub output_dir: PathBuf,
    pub write_report: bool,
}

impl RunConfig {
    pub fn snapshot_path(&self) -> PathBuf {
        self.output_dir.join(SNAPSHOT_FILE_NAME)
    }

    pub fn delta_path(&self) -> PathBuf {
        self.output_dir.join(DELTA_FILE_NAME)
    }

    pub fn report_path(&self) -> PathBuf {
        self.output_dir.join(REPORT_FILE_NAME)
    }
}

/// Runs the audit against `source` and writes the run's artifacts.
///
/// A bootstrap run only saves the snapshot; there is nothing to report.
pub async fn execute<S>(source: &S, config: &RunConfig) -> CliResult<AuditOutcome>
where
    S: RosterSource + ?Sized,
{
    let store = SnapshotStore::with_paths(&config.previous, config.snapshot_path());
    let outcome = run_audit(source, &store, &config.selection).await?;

    for name in &outcome.unresolved_groups {
        warn!(group = %name, "Group not found in directory, skipped");
    }

    if outcome.is_bootstrap() {
        info!(
            groups = outcome.snapshot.roster.len(),
            "No previous snapshot found, current membership saved as the baseline"
        );
        return Ok(outcome);
    }

    let generated_at = outcome.snapshot.generated_at.unwrap_or_else(Utc::now);
    DeltaArtifact::new(&outcome.result, generated_at).write(&config.delta_path())?;

    if config.write_report {
        let html = render_html(&outcome.result, &outcome.labels, generated_at);
        let path = config.report_path();
        write_report(&path, &html)?;
        info!(path = %path.display(), "HTML report saved");
    }

    let summary = outcome.result.summary();
    info!(
        groups = summary.groups,
        new_groups = summary.new_groups,
        disappeared_groups = summary.disappeared_groups,
        changed_groups = summary.changed_groups,
        added_members = summary.added_members,
        removed_members = summary.removed_members,
        changes_detected = outcome.result.changes_detected,
        "Snapshot comparison complete"
    );

    Ok(outcome)
}
