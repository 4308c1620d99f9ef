//! Group member listing, member identifier and display label extraction.

use rosterwatch_core::{MemberId, MemberLabels};
use serde_json::Value;
use std::collections::BTreeSet;
use tracing::{debug, instrument};

use crate::{EntraResult, EntraRosterFetcher, MemberKey};

/// `@odata.type` of user objects in member listings.
pub const USER_ODATA_TYPE: &str = "#microsoft.graph.user";

const MEMBER_SELECT: &str = "id,userPrincipalName,mail,displayName";

/// Picks the member identifier from a Graph directory object.
///
/// Tries `key` first, then the fallback chain. Blank values are skipped, so a
/// user with an empty `mail` falls through to the next property.
#[must_use]
pub fn member_id(record: &Value, key: MemberKey) -> Option<MemberId> {
    key.lookup_order().find_map(|field| {
        record
            .get(field)
            .and_then(Value::as_str)
            .and_then(MemberId::parse)
    })
}

/// Display label for a directory object: `displayName (sign-in)`, where the
/// sign-in is the user principal name or, failing that, the mail address.
///
/// Either half alone is used when the other is missing.
#[must_use]
pub fn member_label(record: &Value) -> Option<String> {
    let text = |field: &str| {
        record
            .get(field)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };
    let sign_in = text("userPrincipalName").or_else(|| text("mail"));
    match (text("displayName"), sign_in) {
        (Some(name), Some(sign_in)) => Some(format!("{name} ({sign_in})")),
        (Some(only), None) | (None, Some(only)) => Some(only.to_string()),
        (None, None) => None,
    }
}

/// Members of one group with their display labels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupMembers {
    pub ids: BTreeSet<MemberId>,
    pub labels: MemberLabels,
}

impl GroupMembers {
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Whether a directory object is a user (as opposed to a device, service
/// principal or nested group).
#[must_use]
pub fn is_user(record: &Value) -> bool {
    record.get("@odata.type").and_then(Value::as_str) == Some(USER_ODATA_TYPE)
}

impl EntraRosterFetcher {
    /// Path of the member listing for `group_id`, relative to the API version.
    pub(crate) fn members_path(&self, group_id: &str) -> String {
        format!(
            "/groups/{}/members?$select={}&$top={}",
            urlencoding::encode(group_id),
            MEMBER_SELECT,
            self.page_size
        )
    }

    /// Adds the usable identifiers and labels of one page of member records
    /// to `members`.
    pub(crate) fn collect_page(&self, page: Vec<Value>, members: &mut GroupMembers) {
        for record in page {
            if self.users_only && !is_user(&record) {
                continue;
            }
            let Some(id) = member_id(&record, self.member_key) else {
                debug!("Skipping member record without a usable identifier");
                continue;
            };
            if let Some(label) = member_label(&record) {
                members.labels.insert(id.clone(), &label);
            }
            members.ids.insert(id);
        }
    }

    /// Reads the remaining pages of a listing starting at `next_link`.
    pub(crate) async fn follow_next_link(
        &self,
        next_link: &str,
        members: &mut GroupMembers,
    ) -> EntraResult<()> {
        self.graph_client()
            .get_paginated(next_link, |page: Vec<Value>| {
                self.collect_page(page, members);
                Ok(())
            })
            .await
    }

    /// Fetches every member of one group, following pagination.
    #[instrument(skip(self))]
    pub async fn fetch_members(&self, group_id: &str) -> EntraResult<GroupMembers> {
        let url = format!(
            "{}{}",
            self.graph_client().base_url(),
            self.members_path(group_id)
        );

        let mut members = GroupMembers::default();
        self.follow_next_link(&url, &mut members).await?;

        debug!(count = members.len(), "Fetched group members");
        Ok(members)
    }
}
