//! Group → member-set mapping.

use serde::Serialize;
use std::collections::{btree_map, BTreeMap, BTreeSet};

use crate::ids::{GroupName, MemberId};

/// Members of every group observed in one run.
///
/// Members are held in a [`BTreeSet`], so a roster can never contain the same
/// member twice for a group, and iteration is always sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Roster {
    groups: BTreeMap<GroupName, BTreeSet<MemberId>>,
}

impl Roster {
    /// Creates an empty roster.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a roster from raw labels, normalizing every group name and
    /// member. Blank labels are dropped; groups whose names collide after
    /// normalization are merged.
    pub fn from_raw<I, G, M, S>(raw: I) -> Self
    where
        I: IntoIterator<Item = (G, M)>,
        G: AsRef<str>,
        M: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut roster = Self::new();
        for (group, members) in raw {
            let Some(group) = GroupName::parse(group.as_ref()) else {
                continue;
            };
            roster.extend_group(
                group,
                members
                    .into_iter()
                    .filter_map(|m| MemberId::parse(m.as_ref())),
            );
        }
        roster
    }

    /// Ensures `group` is present, possibly with no members.
    pub fn insert_group(&mut self, group: GroupName) -> &mut BTreeSet<MemberId> {
        self.groups.entry(group).or_default()
    }

    /// Adds `members` to `group`, creating the group if needed.
    pub fn extend_group<I>(&mut self, group: GroupName, members: I)
    where
        I: IntoIterator<Item = MemberId>,
    {
        self.insert_group(group).extend(members);
    }

    /// Returns the members of `group`, if the group is present.
    #[must_use]
    pub fn get(&self, group: &GroupName) -> Option<&BTreeSet<MemberId>> {
        self.groups.get(group)
    }

    /// Whether `group` is present (even with zero members).
    #[must_use]
    pub fn contains_group(&self, group: &GroupName) -> bool {
        self.groups.contains_key(group)
    }

    /// Group names in sorted order.
    pub fn group_names(&self) -> impl Iterator<Item = &GroupName> {
        self.groups.keys()
    }

    /// `(group, members)` pairs in sorted group order.
    pub fn iter(&self) -> btree_map::Iter<'_, GroupName, BTreeSet<MemberId>> {
        self.groups.iter()
    }

    /// Number of groups.
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Total number of memberships across all groups.
    #[must_use]
    pub fn membership_count(&self) -> usize {
        self.groups.values().map(BTreeSet::len).sum()
    }

    /// Returns a copy without the given groups.
    #[must_use]
    pub fn without(&self, excluded: &BTreeSet<GroupName>) -> Self {
        self.groups
            .iter()
            .filter(|(name, _)| !excluded.contains(*name))
            .map(|(name, members)| (name.clone(), members.clone()))
            .collect()
    }

    /// Copies the membership of `groups` from `previous` into this roster.
    ///
    /// Groups that already have data in this roster, or that `previous` never
    /// saw, are left alone.
    pub fn carry_forward(&mut self, previous: &Roster, groups: &BTreeSet<GroupName>) {
        for name in groups {
            if self.contains_group(name) {
                continue;
            }
            if let Some(members) = previous.get(name) {
                self.groups.insert(name.clone(), members.clone());
            }
        }
    }

    /// Consumes the roster and returns the underlying map.
    #[must_use]
    pub fn into_inner(self) -> BTreeMap<GroupName, BTreeSet<MemberId>> {
        self.groups
    }
}

impl FromIterator<(GroupName, BTreeSet<MemberId>)> for Roster {
    fn from_iter<T: IntoIterator<Item = (GroupName, BTreeSet<MemberId>)>>(iter: T) -> Self {
        let mut roster = Self::new();
        for (group, members) in iter {
            roster.extend_group(group, members);
        }
        roster
    }
}

impl<'a> IntoIterator for &'a Roster {
    type Item = (&'a GroupName, &'a BTreeSet<MemberId>);
    type IntoIter = btree_map::Iter<'a, GroupName, BTreeSet<MemberId>>;

    fn into_iter(self) -> Self::IntoIter {
        self.groups.iter()
    }
}
