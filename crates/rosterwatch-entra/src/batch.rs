//! Member listings for many groups through Graph JSON batching.
//!
//! Each `$batch` call carries at most [`MAX_BATCH_SIZE`] member requests.
//! Requests are numbered `"1"..="n"` within their batch and responses are
//! matched back by that number, since Graph may answer out of order.

use rosterwatch_core::{FetchReport, GroupTarget};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info, instrument, warn};

use crate::graph_client::{graph_error, ODataResponse};
use crate::members::GroupMembers;
use crate::{EntraError, EntraResult, EntraRosterFetcher, GraphClient};

/// Graph's limit on requests per `$batch` call.
pub const MAX_BATCH_SIZE: usize = 20;

/// Body of a `POST /$batch` call.
#[derive(Debug, Serialize)]
pub struct BatchRequest {
    pub requests: Vec<BatchRequestItem>,
}

/// One sub-request; `url` is relative to the API version.
#[derive(Debug, Serialize)]
pub struct BatchRequestItem {
    pub id: String,
    pub method: &'static str,
    pub url: String,
}

/// Body of a `$batch` response.
#[derive(Debug, Deserialize)]
pub struct BatchResponse {
    #[serde(default)]
    pub responses: Vec<BatchResponseItem>,
}

/// One sub-response.
#[derive(Debug, Deserialize)]
pub struct BatchResponseItem {
    pub id: String,
    pub status: u16,
    #[serde(default)]
    pub body: Option<Value>,
}

impl BatchResponseItem {
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl GraphClient {
    /// Sends one `$batch` call.
    ///
    /// # Errors
    ///
    /// Fails if the envelope itself is rejected; sub-request failures are
    /// reported in the individual responses.
    #[instrument(skip(self, requests), fields(size = requests.len()))]
    pub async fn batch(&self, requests: Vec<BatchRequestItem>) -> EntraResult<BatchResponse> {
        if requests.len() > MAX_BATCH_SIZE {
            return Err(EntraError::Batch(format!(
                "{} requests exceed the batch limit of {MAX_BATCH_SIZE}",
                requests.len()
            )));
        }
        let url = format!("{}/$batch", self.base_url());
        self.post(&url, &BatchRequest { requests }).await
    }
}

impl EntraRosterFetcher {
    /// Fetches the members of every target, batching up to the configured
    /// batch size per call.
    ///
    /// A target whose sub-request fails ends up in [`FetchReport::failed`]
    /// and the remaining targets are still read. A failed `$batch` call
    /// aborts the whole fetch.
    #[instrument(skip(self, targets), fields(groups = targets.len()))]
    pub async fn fetch_members_for_many(&self, targets: &[GroupTarget]) -> EntraResult<FetchReport> {
        let mut report = FetchReport::default();

        for (index, chunk) in targets.chunks(self.batch_size).enumerate() {
            debug!(batch = index + 1, size = chunk.len(), "Sending member batch");

            let requests = chunk
                .iter()
                .enumerate()
                .map(|(i, target)| BatchRequestItem {
                    id: (i + 1).to_string(),
                    method: "GET",
                    url: self.members_path(&target.id),
                })
                .collect();
            let by_id: HashMap<String, &GroupTarget> = chunk
                .iter()
                .enumerate()
                .map(|(i, target)| ((i + 1).to_string(), target))
                .collect();

            let response = self.graph_client().batch(requests).await?;
            let mut answered = BTreeSet::new();

            for item in response.responses {
                let Some(target) = by_id.get(&item.id).copied() else {
                    warn!(id = %item.id, "Ignoring batch response with unknown id");
                    continue;
                };
                answered.insert(item.id.clone());

                match self.read_sub_response(target, item).await {
                    Some(members) => {
                        report.roster.extend_group(target.name.clone(), members.ids);
                        report.labels.merge(members.labels);
                    }
                    None => {
                        report.failed.insert(target.name.clone());
                    }
                }
            }

            for (id, target) in &by_id {
                if !answered.contains(id) {
                    warn!(group = %target.name, "No batch response for group, skipping this run");
                    report.failed.insert(target.name.clone());
                }
            }
        }

        // A duplicated target may fail in one request and succeed in another
        report
            .failed
            .retain(|name| !report.roster.contains_group(name));

        info!(
            groups = report.roster.len(),
            failed = report.failed.len(),
            "Batched member fetch completed"
        );
        Ok(report)
    }

    /// Turns one sub-response into the group's members, or `None` if the
    /// group has no usable data this run.
    async fn read_sub_response(
        &self,
        target: &GroupTarget,
        item: BatchResponseItem,
    ) -> Option<GroupMembers> {
        if !item.is_success() {
            let body = item.body.map(|b| b.to_string()).unwrap_or_default();
            let status = reqwest::StatusCode::from_u16(item.status)
                .unwrap_or(reqwest::StatusCode::INTERNAL_SERVER_ERROR);
            let error = graph_error(status, &body);
            warn!(
                group = %target.name,
                status = item.status,
                error = %error,
                "Member request failed, group skipped this run"
            );
            return None;
        }

        let page: ODataResponse<Value> = match item.body {
            None => ODataResponse {
                value: Vec::new(),
                next_link: None,
            },
            Some(body) => match serde_json::from_value(body) {
                Ok(page) => page,
                Err(e) => {
                    warn!(group = %target.name, error = %e, "Unreadable member response, group skipped this run");
                    return None;
                }
            },
        };

        let mut members = GroupMembers::default();
        self.collect_page(page.value, &mut members);

        if let Some(next_link) = page.next_link {
            debug!(group = %target.name, "Following member pages beyond the batch response");
            if let Err(e) = self.follow_next_link(&next_link, &mut members).await {
                warn!(group = %target.name, error = %e, "Member paging failed, group skipped this run");
                return None;
            }
        }

        Some(members)
    }
}
