//! HTML membership report rendered from a reconciliation result.
//!
//! Layout: added groups, deleted groups, groups with member changes, then
//! every group. Each group is a table of change type, member label and
//! member identifier rows.

use chrono::{DateTime, Utc};
use html_escape::encode_text;
use rosterwatch_core::{
    write_atomic, GroupDelta, GroupName, MemberId, MemberLabels, ReconciliationResult,
};
use std::collections::BTreeSet;
use std::fmt::Write;
use std::path::Path;

use crate::error::{CliError, CliResult};

/// Default report file name.
pub const REPORT_FILE_NAME: &str = "group_membership_report.html";

const STYLE: &str = r#"body { font-family: Segoe UI, Arial, Helvetica Neue, sans-serif; }
h2 { color: #333; }
.added { color: green; }
.removed { color: darkorange; }
.unchanged { color: black; }
table { border-collapse: collapse; width: 100%; }
th, td { padding: 8px 12px; border: 1px solid #ccc; text-align: left; }"#;

/// Renders the full report document.
///
/// Members are shown by their label from `labels`, falling back to the
/// identifier.
pub fn render_html(
    result: &ReconciliationResult,
    labels: &MemberLabels,
    generated_at: DateTime<Utc>,
) -> String {
    let mut html = String::new();

    let _ = writeln!(
        html,
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="UTF-8">
<title>Group Membership Report</title>
<style>
{STYLE}
</style>
</head>
<body>
<h1>Group Membership Report</h1>
<p>Report generated on: <strong>{}</strong></p>"#,
        generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );

    group_list(&mut html, "Added Groups", &result.new_groups);
    group_list(&mut html, "Deleted Groups", &result.disappeared_groups);

    html.push_str("<h1>Groups With Changes</h1>\n");
    let mut any_changed = false;
    for (group, delta) in result
        .groups
        .iter()
        .filter(|(_, delta)| delta.has_member_changes())
    {
        group_table(&mut html, labels, group, delta);
        any_changed = true;
    }
    if !any_changed {
        html.push_str("<p>No changes detected in any group.</p>\n");
    }

    html.push_str("<h1>All Groups</h1>\n");
    for (group, delta) in &result.groups {
        group_table(&mut html, labels, group, delta);
    }

    html.push_str("</body>\n</html>\n");
    html
}

/// Writes a rendered report to `path`, replacing any previous report.
pub fn write_report(path: &Path, html: &str) -> CliResult<()> {
    write_atomic(path, html.as_bytes()).map_err(|e| {
        CliError::Io(format!("cannot write report {}: {}", path.display(), e))
    })
}

fn group_list(html: &mut String, title: &str, groups: &BTreeSet<GroupName>) {
    if groups.is_empty() {
        return;
    }
    let _ = writeln!(html, "<h2>{title}</h2>");
    for group in groups {
        let _ = writeln!(html, "<p>{}</p>", encode_text(group.as_str()));
    }
}

fn group_table(html: &mut String, labels: &MemberLabels, group: &GroupName, delta: &GroupDelta) {
    let _ = writeln!(html, "<h2>{}</h2>", encode_text(group.as_str()));
    html.push_str("<table>\n<tr><th>Change Type</th><th>Member</th><th>Identifier</th></tr>\n");
    member_rows(html, labels, "added", "Added", &delta.added);
    member_rows(html, labels, "removed", "Removed", &delta.removed);
    member_rows(html, labels, "unchanged", "Unchanged", &delta.unchanged);
    html.push_str("</table>\n");
}

fn member_rows(
    html: &mut String,
    labels: &MemberLabels,
    class: &str,
    change: &str,
    members: &BTreeSet<MemberId>,
) {
    for member in members {
        let _ = writeln!(
            html,
            r#"<tr><td class="{class}">{change}</td><td class="{class}">{}</td><td class="{class}">{}</td></tr>"#,
            encode_text(labels.display(member)),
            encode_text(member.as_str())
        );
    }
}
