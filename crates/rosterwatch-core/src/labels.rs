//! Human-readable member labels for reports.
//!
//! Rosters are compared on [`MemberId`], which is usually an opaque directory
//! object id. A [`MemberLabels`] map carries what a reader recognises (display
//! name, sign-in name) next to it. Labels never take part in a comparison.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::ids::MemberId;
use crate::normalize::normalize_non_empty;
use crate::roster::Roster;

/// `MemberId` → display label.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberLabels(BTreeMap<MemberId, String>);

impl MemberLabels {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `label` for `member`. Blank labels, and labels that only
    /// repeat the identifier, are not stored.
    pub fn insert(&mut self, member: MemberId, label: &str) {
        match normalize_non_empty(label) {
            Some(label) if label != member.as_str() => {
                self.0.insert(member, label);
            }
            _ => {}
        }
    }

    #[must_use]
    pub fn get(&self, member: &MemberId) -> Option<&str> {
        self.0.get(member).map(String::as_str)
    }

    /// The label for `member`, or its identifier when none is known.
    #[must_use]
    pub fn display<'a>(&'a self, member: &'a MemberId) -> &'a str {
        self.get(member).unwrap_or_else(|| member.as_str())
    }

    /// Takes every label from `newer`, replacing older ones for the same member.
    pub fn merge(&mut self, newer: MemberLabels) {
        self.0.extend(newer.0);
    }

    /// Labels of members that appear somewhere in `roster`.
    #[must_use]
    pub fn restricted_to(&self, roster: &Roster) -> Self {
        let present: BTreeSet<&MemberId> = roster.iter().flat_map(|(_, members)| members).collect();
        Self(
            self.0
                .iter()
                .filter(|(member, _)| present.contains(member))
                .map(|(member, label)| (member.clone(), label.clone()))
                .collect(),
        )
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
