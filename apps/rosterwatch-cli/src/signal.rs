//! Azure Pipelines logging commands.
//!
//! Output variables are written to stdout as `##vso[...]` lines for later
//! stages to branch on. Logs go to stderr.

use rosterwatch_core::AuditOutcome;
use std::io::{self, Write};

/// Variables published to later pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSignal {
    pub changes_detected: bool,
    pub new_members: usize,
    pub removed_members: usize,
    pub bootstrap: bool,
}

impl PipelineSignal {
    /// Derives the signal from a finished run.
    ///
    /// A bootstrap run never reports changes, whatever the comparison says.
    pub fn from_outcome(outcome: &AuditOutcome) -> Self {
        if outcome.is_bootstrap() {
            return Self {
                changes_detected: false,
                new_members: 0,
                removed_members: 0,
                bootstrap: true,
            };
        }
        let summary = outcome.result.summary();
        Self {
            changes_detected: outcome.result.changes_detected,
            new_members: summary.added_members,
            removed_members: summary.removed_members,
            bootstrap: false,
        }
    }

    /// The `setvariable` commands for this signal.
    pub fn commands(&self) -> Vec<String> {
        vec![
            set_variable("ChangesDetected", &self.changes_detected.to_string()),
            set_variable("NewMembersCount", &self.new_members.to_string()),
            set_variable("RemovedMembersCount", &self.removed_members.to_string()),
            set_variable("Bootstrap", &self.bootstrap.to_string()),
        ]
    }

    pub fn emit(&self, out: &mut impl Write) -> io::Result<()> {
        for command in self.commands() {
            writeln!(out, "{command}")?;
        }
        out.flush()
    }
}

/// `##vso[task.setvariable variable=NAME;isOutput=true]VALUE`
pub fn set_variable(name: &str, value: &str) -> String {
    format!(
        "##vso[task.setvariable variable={name};isOutput=true]{}",
        escape_data(value)
    )
}

/// `##vso[task.logissue type=error]MESSAGE`
pub fn log_error(message: &str) -> String {
    format!("##vso[task.logissue type=error]{}", escape_data(message))
}

/// Escapes a logging command payload so it stays on one line.
fn escape_data(value: &str) -> String {
    value
        .replace('%', "%AZP25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}
