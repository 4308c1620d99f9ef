//! Roster source abstraction.
//!
//! A [`RosterSource`] turns a [`GroupSelection`] into the current roster. It
//! reports groups it could not read separately from the roster, so the caller
//! can tell "no data this run" apart from "group has no members" and from
//! "group was removed".

use async_trait::async_trait;
use std::collections::BTreeSet;

use crate::error::CoreResult;
use crate::ids::GroupName;
use crate::labels::MemberLabels;
use crate::roster::Roster;

/// A group whose directory identifier is already known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupTarget {
    /// Key used for the group in rosters and reports.
    pub name: GroupName,
    /// Directory-side object identifier.
    pub id: String,
}

impl GroupTarget {
    /// Creates a target, returning `None` if the name or id is blank.
    #[must_use]
    pub fn new(name: &str, id: &str) -> Option<Self> {
        let id = id.trim();
        if id.is_empty() {
            return None;
        }
        Some(Self {
            name: GroupName::parse(name)?,
            id: id.to_string(),
        })
    }
}

/// Which groups to audit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupSelection {
    /// Human-readable names that must be resolved to directory ids first.
    Names(Vec<String>),
    /// A directory-side filter expression listing the groups to audit.
    Filter(String),
    /// Groups whose directory ids are already known.
    Targets(Vec<GroupTarget>),
}

impl GroupSelection {
    /// Names selection with blank entries dropped and duplicates (after
    /// normalization) collapsed to their first occurrence.
    pub fn names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = BTreeSet::new();
        let names = names
            .into_iter()
            .filter_map(|n| GroupName::parse(n.as_ref()))
            .filter(|n| seen.insert(n.clone()))
            .map(GroupName::into_string)
            .collect();
        Self::Names(names)
    }

    /// Whether the selection cannot possibly yield any group.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Names(names) => names.is_empty(),
            Self::Filter(filter) => filter.trim().is_empty(),
            Self::Targets(targets) => targets.is_empty(),
        }
    }
}

/// What a roster source produced for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchReport {
    /// Groups that were read successfully, including ones with no members.
    pub roster: Roster,
    /// Groups whose member request failed; they have no data this run.
    pub failed: BTreeSet<GroupName>,
    /// Requested names that matched no directory group.
    pub unresolved: Vec<String>,
    /// Display labels for the members in `roster`.
    pub labels: MemberLabels,
}

impl FetchReport {
    /// Groups that must be left out of the comparison this run.
    #[must_use]
    pub fn excluded(&self) -> BTreeSet<GroupName> {
        self.failed
            .iter()
            .cloned()
            .chain(self.unresolved.iter().filter_map(|n| GroupName::parse(n)))
            .collect()
    }
}

/// Produces the current roster for a selection of groups.
#[async_trait]
pub trait RosterSource: Send + Sync {
    /// Fetches the members of every selected group.
    ///
    /// Per-group failures are reported in [`FetchReport::failed`] and
    /// [`FetchReport::unresolved`]. An `Err` means the run must abort.
    async fn fetch_roster(&self, selection: &GroupSelection) -> CoreResult<FetchReport>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_selection_dedupes_and_drops_blanks() {
        let selection = GroupSelection::names(["\u{feff}Finance", "", "  ", "IT", "Finance "]);
        assert_eq!(
            selection,
            GroupSelection::Names(vec!["Finance".to_string(), "IT".to_string()])
        );
        assert!(!selection.is_empty());
        assert!(GroupSelection::names(Vec::<String>::new()).is_empty());
    }

    #[test]
    fn test_target_rejects_blank_parts() {
        assert!(GroupTarget::new("Finance", " ").is_none());
        assert!(GroupTarget::new(" ", "abc").is_none());
        let target = GroupTarget::new(" Finance", " abc ").unwrap();
        assert_eq!(target.name.as_str(), "Finance");
        assert_eq!(target.id, "abc");
    }

    #[test]
    fn test_excluded_combines_failed_and_unresolved() {
        let report = FetchReport {
            roster: Roster::new(),
            failed: BTreeSet::from([GroupName::parse("Broken").unwrap()]),
            unresolved: vec!["Ghost ".to_string()],
            ..FetchReport::default()
        };
        let excluded: Vec<String> = report.excluded().iter().map(ToString::to_string).collect();
        assert_eq!(excluded, vec!["Broken", "Ghost"]);
    }
}
