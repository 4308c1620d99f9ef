//! Microsoft Graph API HTTP client.
//!
//! Every request carries the shared bearer token. Throttling (429) honours
//! `Retry-After`, gateway errors back off exponentially, and a 401 triggers
//! one token refresh before the error is surfaced.

use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::rate_limit::RetryPolicy;
use crate::{EntraCloudEnvironment, EntraError, EntraResult, TokenCache};

/// `OData` error response from Microsoft Graph.
#[derive(Debug, Deserialize)]
pub struct ODataError {
    pub error: ODataErrorBody,
}

/// `OData` error body.
#[derive(Debug, Deserialize)]
pub struct ODataErrorBody {
    pub code: String,
    pub message: String,
    #[serde(rename = "innerError")]
    pub inner_error: Option<serde_json::Value>,
}

impl From<ODataError> for EntraError {
    fn from(odata: ODataError) -> Self {
        EntraError::GraphApi {
            code: odata.error.code,
            message: odata.error.message,
            inner_error: odata.error.inner_error.map(|v| v.to_string()),
        }
    }
}

/// Response wrapper for paginated Graph API responses.
#[derive(Debug, Deserialize)]
pub struct ODataResponse<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
    #[serde(rename = "@odata.nextLink")]
    pub next_link: Option<String>,
}

/// Microsoft Graph API client.
#[derive(Debug)]
pub struct GraphClient {
    http_client: reqwest::Client,
    token_cache: Arc<TokenCache>,
    cloud_environment: EntraCloudEnvironment,
    api_version: String,
    retry_policy: RetryPolicy,
}

impl GraphClient {
    /// Creates a new Graph client sharing `http_client` with the token cache.
    pub fn new(
        http_client: reqwest::Client,
        token_cache: Arc<TokenCache>,
        cloud_environment: EntraCloudEnvironment,
        api_version: String,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            http_client,
            token_cache,
            cloud_environment,
            api_version,
            retry_policy,
        }
    }

    /// Builds the HTTP client used for both token and Graph requests.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialised.
    pub fn http_client() -> EntraResult<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(EntraError::from)
    }

    /// Returns the base URL for Graph API requests.
    #[must_use]
    pub fn base_url(&self) -> String {
        format!(
            "{}/{}",
            self.cloud_environment.graph_endpoint(),
            self.api_version
        )
    }

    /// Performs a GET request with automatic token injection and retry handling.
    #[instrument(skip(self))]
    pub async fn get<T: DeserializeOwned>(&self, url: &str) -> EntraResult<T> {
        self.request_with_retry(Method::GET, url, None::<&()>).await
    }

    /// Performs a POST request with automatic token injection and retry handling.
    #[instrument(skip(self, body))]
    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        url: &str,
        body: &B,
    ) -> EntraResult<T> {
        self.request_with_retry(Method::POST, url, Some(body)).await
    }

    async fn request_with_retry<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        url: &str,
        body: Option<&B>,
    ) -> EntraResult<T> {
        let policy = &self.retry_policy;
        let mut retries = Retries::default();

        loop {
            let token = self.token_cache.get_token().await?;
            let mut request = self
                .http_client
                .request(method.clone(), url)
                .bearer_auth(&token);
            if let Some(body) = body {
                request = request.json(body);
            }
            let response = request.send().await?;
            let status = response.status();

            match Verdict::of(&response) {
                Verdict::Accept => return response.json().await.map_err(EntraError::from),
                Verdict::Throttled(retry_after) => {
                    if retries.throttled >= policy.max_retries {
                        return Err(EntraError::RateLimited {
                            retry_after_secs: retry_after.unwrap_or_default(),
                        });
                    }
                    warn!(
                        attempt = retries.throttled + 1,
                        max = policy.max_retries,
                        ?retry_after,
                        "Throttled by Graph"
                    );
                    policy.wait(retry_after, retries.throttled).await;
                    retries.throttled += 1;
                }
                Verdict::Transient => {
                    if retries.transient >= policy.max_retries {
                        return Err(EntraError::MaxRetriesExceeded {
                            attempts: retries.transient,
                        });
                    }
                    warn!(
                        %status,
                        attempt = retries.transient + 1,
                        max = policy.max_retries,
                        "Graph temporarily unavailable"
                    );
                    policy.wait(None, retries.transient).await;
                    retries.transient += 1;
                }
                Verdict::Unauthorized if !retries.token_refreshed => {
                    debug!("Graph rejected the cached token, refreshing");
                    self.token_cache.invalidate().await;
                    retries.token_refreshed = true;
                }
                Verdict::Unauthorized | Verdict::Reject => {
                    let body = response.text().await.unwrap_or_default();
                    return Err(graph_error(status, &body));
                }
            }
        }
    }

    /// Reads a collection page by page, handing each page to `on_page`.
    ///
    /// Follows `@odata.nextLink` until a page comes back without one. An
    /// error from `on_page` stops paging and is returned as is.
    #[instrument(skip(self, on_page))]
    pub async fn get_paginated<T, F>(&self, initial_url: &str, mut on_page: F) -> EntraResult<()>
    where
        T: DeserializeOwned,
        F: FnMut(Vec<T>) -> EntraResult<()>,
    {
        let mut url = initial_url.to_string();
        let mut pages = 0usize;

        loop {
            debug!(%url, page = pages + 1, "Fetching page");
            let response: ODataResponse<T> = self.get(&url).await?;
            pages += 1;

            on_page(response.value)?;

            match response.next_link {
                Some(next) => url = next,
                None => {
                    debug!(pages, "Pagination complete");
                    return Ok(());
                }
            }
        }
    }
}

/// Retry counters for one logical request.
#[derive(Debug, Default)]
struct Retries {
    throttled: u32,
    transient: u32,
    token_refreshed: bool,
}

/// How a response is handled.
#[derive(Debug, PartialEq, Eq)]
enum Verdict {
    Accept,
    /// 429, with the server's `Retry-After` in seconds if it sent one.
    Throttled(Option<u64>),
    /// 502, 503 and 504.
    Transient,
    Unauthorized,
    Reject,
}

impl Verdict {
    fn of(response: &reqwest::Response) -> Self {
        let retry_after = || {
            response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(RetryPolicy::parse_retry_after)
        };
        match response.status() {
            status if status.is_success() => Self::Accept,
            StatusCode::TOO_MANY_REQUESTS => Self::Throttled(retry_after()),
            StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT => Self::Transient,
            StatusCode::UNAUTHORIZED => Self::Unauthorized,
            _ => Self::Reject,
        }
    }
}

/// Maps a non-success response body to [`EntraError::GraphApi`].
pub(crate) fn graph_error(status: StatusCode, body: &str) -> EntraError {
    match serde_json::from_str::<ODataError>(body) {
        Ok(odata_error) => odata_error.into(),
        Err(_) => EntraError::GraphApi {
            code: status.to_string(),
            message: body.to_string(),
            inner_error: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_odata_error_parsing() {
        let json = r#"{
            "error": {
                "code": "Request_ResourceNotFound",
                "message": "Resource not found",
                "innerError": {"date": "2024-01-15"}
            }
        }"#;

        let error = graph_error(StatusCode::NOT_FOUND, json);
        match error {
            EntraError::GraphApi {
                code,
                message,
                inner_error,
            } => {
                assert_eq!(code, "Request_ResourceNotFound");
                assert_eq!(message, "Resource not found");
                assert!(inner_error.is_some());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_plain_error_body_keeps_status() {
        let error = graph_error(StatusCode::FORBIDDEN, "nope");
        assert!(matches!(
            error,
            EntraError::GraphApi { ref code, ref message, .. }
                if code == "403 Forbidden" && message == "nope"
        ));
    }

    #[test]
    fn test_odata_response_parsing() {
        let json = r#"{
            "value": [{"id": "1"}, {"id": "2"}],
            "@odata.nextLink": "https://graph.microsoft.com/v1.0/groups/g/members?$skiptoken=xxx"
        }"#;

        let response: ODataResponse<serde_json::Value> = serde_json::from_str(json).unwrap();
        assert_eq!(response.value.len(), 2);
        assert!(response.next_link.is_some());
    }

    #[test]
    fn test_odata_response_without_value() {
        let response: ODataResponse<serde_json::Value> = serde_json::from_str("{}").unwrap();
        assert!(response.value.is_empty());
        assert!(response.next_link.is_none());
    }
}
