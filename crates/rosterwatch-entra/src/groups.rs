//! Resolving the groups to audit.
//!
//! Groups are either looked up by exact display name or discovered through a
//! raw OData filter expression.

use rosterwatch_core::{normalize_non_empty, GroupTarget};
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use crate::graph_client::ODataResponse;
use crate::{EntraResult, EntraRosterFetcher};

/// Minimal group projection returned by lookups.
#[derive(Debug, Clone, Deserialize)]
pub struct GroupRecord {
    pub id: String,
    #[serde(rename = "displayName")]
    pub display_name: Option<String>,
}

/// Escapes a value for use inside a single-quoted OData string literal.
#[must_use]
pub fn escape_odata_literal(value: &str) -> String {
    value.replace('\'', "''")
}

/// Percent-encoded `displayName eq '<name>'` filter expression.
#[must_use]
pub fn display_name_filter(name: &str) -> String {
    let expression = format!("displayName eq '{}'", escape_odata_literal(name));
    urlencoding::encode(&expression).into_owned()
}

/// Names resolved to directory groups, plus the names that matched nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedGroups {
    pub targets: Vec<GroupTarget>,
    pub unresolved: Vec<String>,
}

impl EntraRosterFetcher {
    /// Looks up one group by exact display name.
    ///
    /// Returns `Ok(None)` when no group matches. The returned target is keyed
    /// by the requested name, not the directory's spelling.
    #[instrument(skip(self))]
    pub async fn resolve_group(&self, name: &str) -> EntraResult<Option<GroupTarget>> {
        let url = format!(
            "{}/groups?$filter={}&$select=id,displayName",
            self.graph_client().base_url(),
            display_name_filter(name)
        );

        let response: ODataResponse<GroupRecord> = self.graph_client().get(&url).await?;
        if response.value.len() > 1 {
            warn!(
                group = %name,
                matches = response.value.len(),
                "Display name is ambiguous, using the first match"
            );
        }

        Ok(response
            .value
            .into_iter()
            .next()
            .and_then(|record| GroupTarget::new(name, &record.id)))
    }

    /// Resolves every name, collecting the ones that match no group.
    ///
    /// # Errors
    ///
    /// A failed lookup request aborts resolution; an empty match does not.
    #[instrument(skip(self, names), fields(names = names.len()))]
    pub async fn resolve_groups(&self, names: &[String]) -> EntraResult<ResolvedGroups> {
        let mut resolved = ResolvedGroups::default();

        for name in names {
            match self.resolve_group(name).await? {
                Some(target) => {
                    debug!(group = %target.name, id = %target.id, "Resolved group");
                    resolved.targets.push(target);
                }
                None => {
                    warn!(group = %name, "Group not found in directory, skipping this run");
                    resolved.unresolved.push(name.clone());
                }
            }
        }

        info!(
            resolved = resolved.targets.len(),
            unresolved = resolved.unresolved.len(),
            "Group name resolution completed"
        );
        Ok(resolved)
    }

    /// Lists every group matching an OData filter expression.
    ///
    /// Groups without a display name cannot be keyed and are skipped.
    #[instrument(skip(self))]
    pub async fn discover_groups(&self, filter: &str) -> EntraResult<Vec<GroupTarget>> {
        let url = format!(
            "{}/groups?$filter={}&$select=id,displayName&$top={}",
            self.graph_client().base_url(),
            urlencoding::encode(filter.trim()),
            self.page_size
        );

        let mut targets = Vec::new();
        self.graph_client()
            .get_paginated(&url, |page: Vec<GroupRecord>| {
                for record in page {
                    let target = record
                        .display_name
                        .as_deref()
                        .and_then(normalize_non_empty)
                        .and_then(|name| GroupTarget::new(&name, &record.id));
                    match target {
                        Some(target) => targets.push(target),
                        None => debug!(id = %record.id, "Skipping group without display name"),
                    }
                }
                Ok(())
            })
            .await?;

        info!(groups = targets.len(), "Discovered groups from filter");
        Ok(targets)
    }
}
