//! The Graph-backed [`RosterSource`].

use async_trait::async_trait;
use rosterwatch_core::{CoreError, CoreResult, FetchReport, GroupSelection, GroupTarget, RosterSource};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::{
    EntraConfig, EntraResult, FetchMode, GraphClient, MemberKey, TokenCache,
};

/// Reads group rosters from Microsoft Graph.
#[derive(Debug)]
pub struct EntraRosterFetcher {
    client: GraphClient,
    pub(crate) batch_size: usize,
    pub(crate) page_size: u32,
    pub(crate) member_key: MemberKey,
    pub(crate) users_only: bool,
    fetch_mode: FetchMode,
}

impl EntraRosterFetcher {
    /// Creates a fetcher from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be created.
    pub fn new(config: EntraConfig) -> EntraResult<Self> {
        config.validate()?;

        let EntraConfig {
            tenant_id,
            credentials,
            cloud_environment,
            api_version,
            batch_size,
            page_size,
            member_key,
            users_only,
            fetch_mode,
            retry_policy,
        } = config;

        let http_client = GraphClient::http_client()?;
        let token_cache = Arc::new(TokenCache::new(
            credentials,
            &cloud_environment,
            tenant_id,
            http_client.clone(),
        ));
        let client = GraphClient::new(
            http_client,
            token_cache,
            cloud_environment,
            api_version,
            retry_policy,
        );

        Ok(Self {
            client,
            batch_size,
            page_size,
            member_key,
            users_only,
            fetch_mode,
        })
    }

    /// Returns the underlying Graph client.
    #[must_use]
    pub fn graph_client(&self) -> &GraphClient {
        &self.client
    }

    #[must_use]
    pub fn fetch_mode(&self) -> FetchMode {
        self.fetch_mode
    }

    /// Resolves `selection` and fetches the members of every resulting group.
    #[instrument(skip(self, selection), fields(mode = %self.fetch_mode))]
    pub async fn fetch(&self, selection: &GroupSelection) -> EntraResult<FetchReport> {
        let (targets, unresolved) = match selection {
            GroupSelection::Names(names) => {
                let resolved = self.resolve_groups(names).await?;
                (resolved.targets, resolved.unresolved)
            }
            GroupSelection::Filter(filter) => (self.discover_groups(filter).await?, Vec::new()),
            GroupSelection::Targets(targets) => (targets.clone(), Vec::new()),
        };
        let targets = dedupe_targets(targets);

        let mut report = match self.fetch_mode {
            FetchMode::Batch => self.fetch_members_for_many(&targets).await?,
            FetchMode::PerGroup => self.fetch_each(&targets).await?,
        };
        report.unresolved = unresolved;
        Ok(report)
    }

    /// Pages through each group's members one group at a time.
    ///
    /// Any failure aborts the fetch, as there is no partial-failure channel
    /// for a single-group call.
    async fn fetch_each(&self, targets: &[GroupTarget]) -> EntraResult<FetchReport> {
        let mut report = FetchReport::default();
        for target in targets {
            let members = self.fetch_members(&target.id).await?;
            report.roster.extend_group(target.name.clone(), members.ids);
            report.labels.merge(members.labels);
        }
        info!(groups = report.roster.len(), "Per-group member fetch completed");
        Ok(report)
    }
}

/// Keeps the first target for each normalized group name.
fn dedupe_targets(targets: Vec<GroupTarget>) -> Vec<GroupTarget> {
    let mut seen = BTreeSet::new();
    targets
        .into_iter()
        .filter(|target| {
            let first = seen.insert(target.name.clone());
            if !first {
                warn!(group = %target.name, id = %target.id, "Duplicate group name, keeping the first match");
            }
            first
        })
        .collect()
}

#[async_trait]
impl RosterSource for EntraRosterFetcher {
    async fn fetch_roster(&self, selection: &GroupSelection) -> CoreResult<FetchReport> {
        if selection.is_empty() {
            return Err(CoreError::InvalidSelection("no groups selected".into()));
        }
        self.fetch(selection).await.map_err(CoreError::fetch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedupe_keeps_first() {
        let targets = vec![
            GroupTarget::new("Finance", "a").unwrap(),
            GroupTarget::new("IT", "b").unwrap(),
            GroupTarget::new(" Finance", "c").unwrap(),
        ];
        let deduped = dedupe_targets(targets);
        let ids: Vec<&str> = deduped.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_empty_selection_is_rejected() {
        let config = EntraConfig::builder()
            .tenant_id("t")
            .client_id("c")
            .client_secret("s")
            .build()
            .unwrap();
        let fetcher = EntraRosterFetcher::new(config).unwrap();

        let err = fetcher
            .fetch_roster(&GroupSelection::Names(Vec::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidSelection(_)));
    }
}
