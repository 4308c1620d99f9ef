//! Membership reconciliation between the current roster and the previous
//! snapshot.
//!
//! The engine is a pure function of its two inputs. A first run (empty
//! previous snapshot) is not special-cased: every group comes out as newly
//! observed and callers decide whether to suppress notification.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::ids::{GroupName, MemberId};
use crate::roster::Roster;
use crate::snapshot::Snapshot;

/// How a group changed between the two rosters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupStatus {
    /// Only present in the current roster.
    New,
    /// Only present in the previous snapshot.
    Disappeared,
    /// Present in both, with members added or removed.
    Changed,
    /// Present in both with identical members.
    #[default]
    Stable,
}

/// Member changes for one group.
///
/// The three sets are disjoint; `added ∪ unchanged` is the current membership
/// and `removed ∪ unchanged` the previous one. Serialized as sorted lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GroupDelta {
    pub added: BTreeSet<MemberId>,
    pub removed: BTreeSet<MemberId>,
    pub unchanged: BTreeSet<MemberId>,
    #[serde(skip)]
    status: GroupStatus,
}

impl GroupDelta {
    fn new_group(current: &BTreeSet<MemberId>) -> Self {
        Self {
            added: current.clone(),
            status: GroupStatus::New,
            ..Self::default()
        }
    }

    fn disappeared_group(previous: &BTreeSet<MemberId>) -> Self {
        Self {
            removed: previous.clone(),
            status: GroupStatus::Disappeared,
            ..Self::default()
        }
    }

    fn compare(current: &BTreeSet<MemberId>, previous: &BTreeSet<MemberId>) -> Self {
        let added: BTreeSet<MemberId> = current.difference(previous).cloned().collect();
        let removed: BTreeSet<MemberId> = previous.difference(current).cloned().collect();
        let unchanged = current.intersection(previous).cloned().collect();
        let status = if added.is_empty() && removed.is_empty() {
            GroupStatus::Stable
        } else {
            GroupStatus::Changed
        };
        Self {
            added,
            removed,
            unchanged,
            status,
        }
    }

    /// Classification of this group.
    #[must_use]
    pub fn status(&self) -> GroupStatus {
        self.status
    }

    /// Whether any member was added or removed.
    #[must_use]
    pub fn has_member_changes(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty()
    }

    /// Whether the group needs reporting: new, disappeared or member changes.
    #[must_use]
    pub fn is_changed(&self) -> bool {
        self.status() != GroupStatus::Stable
    }

    /// Members of the group in the current roster.
    pub fn current_members(&self) -> impl Iterator<Item = &MemberId> {
        self.added.union(&self.unchanged)
    }

    /// Members of the group in the previous snapshot.
    pub fn previous_members(&self) -> impl Iterator<Item = &MemberId> {
        self.removed.union(&self.unchanged)
    }
}

/// Counts derived from a [`ReconciliationResult`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconciliationSummary {
    pub groups: usize,
    pub new_groups: usize,
    pub disappeared_groups: usize,
    pub changed_groups: usize,
    pub added_members: usize,
    pub removed_members: usize,
}

/// Outcome of comparing the current roster with the previous snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconciliationResult {
    /// One delta per group in the union of both rosters.
    pub groups: BTreeMap<GroupName, GroupDelta>,
    /// Groups only present in the current roster.
    pub new_groups: BTreeSet<GroupName>,
    /// Groups only present in the previous snapshot.
    pub disappeared_groups: BTreeSet<GroupName>,
    /// True iff the two rosters differ.
    pub changes_detected: bool,
}

impl ReconciliationResult {
    /// Returns the delta for `group`, if it appeared in either roster.
    #[must_use]
    pub fn get(&self, group: &GroupName) -> Option<&GroupDelta> {
        self.groups.get(group)
    }

    /// Groups that are new, disappeared or have member changes, sorted by name.
    pub fn changed_groups(&self) -> impl Iterator<Item = (&GroupName, &GroupDelta)> {
        self.groups.iter().filter(|(_, delta)| delta.is_changed())
    }

    /// Groups with identical membership in both rosters, sorted by name.
    pub fn stable_groups(&self) -> impl Iterator<Item = (&GroupName, &GroupDelta)> {
        self.groups.iter().filter(|(_, delta)| !delta.is_changed())
    }

    /// Aggregated counts for logging and pipeline variables.
    #[must_use]
    pub fn summary(&self) -> ReconciliationSummary {
        let mut summary = ReconciliationSummary {
            groups: self.groups.len(),
            new_groups: self.new_groups.len(),
            disappeared_groups: self.disappeared_groups.len(),
            ..ReconciliationSummary::default()
        };
        for delta in self.groups.values() {
            if delta.status() == GroupStatus::Changed {
                summary.changed_groups += 1;
            }
            summary.added_members += delta.added.len();
            summary.removed_members += delta.removed.len();
        }
        summary
    }
}

/// Compares `current` against `previous`.
///
/// Deterministic: the same inputs always give the same result, and every
/// member list in the output is sorted.
#[must_use]
pub fn reconcile(current: &Roster, previous: &Snapshot) -> ReconciliationResult {
    let previous = &previous.roster;
    let all_groups: BTreeSet<&GroupName> =
        current.group_names().chain(previous.group_names()).collect();

    let mut result = ReconciliationResult::default();

    for group in all_groups {
        let delta = match (current.get(group), previous.get(group)) {
            (Some(cur), None) => {
                result.new_groups.insert(group.clone());
                GroupDelta::new_group(cur)
            }
            (None, Some(prev)) => {
                result.disappeared_groups.insert(group.clone());
                GroupDelta::disappeared_group(prev)
            }
            (Some(cur), Some(prev)) => GroupDelta::compare(cur, prev),
            (None, None) => continue,
        };

        if delta.is_changed() {
            result.changes_detected = true;
        }
        result.groups.insert(group.clone(), delta);
    }

    result
}
