//! Common test utilities for rosterwatch-entra integration tests.

#![allow(dead_code)]

use rosterwatch_entra::{
    EntraCloudEnvironment, EntraConfig, EntraConfigBuilder, EntraRosterFetcher, RetryPolicy,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

pub const TENANT_ID: &str = "test-tenant";

/// Test data factory for creating Entra users.
pub fn create_test_user(id: &str, prefix: &str) -> Value {
    json!({
        "@odata.type": "#microsoft.graph.user",
        "id": id,
        "userPrincipalName": format!("{prefix}@test.onmicrosoft.com"),
        "displayName": format!("Test User {prefix}"),
        "mail": format!("{prefix}@example.com")
    })
}

/// Test data factory for non-user members (service principals, devices).
pub fn create_service_principal(id: &str, name: &str) -> Value {
    json!({
        "@odata.type": "#microsoft.graph.servicePrincipal",
        "id": id,
        "displayName": name
    })
}

/// Test data factory for group lookup results.
pub fn create_test_group(id: &str, name: &str) -> Value {
    json!({
        "id": id,
        "displayName": name
    })
}

/// Wraps items in an OData response format.
pub fn create_odata_response(items: Vec<Value>, next_link: Option<&str>) -> Value {
    let mut response = json!({ "value": items });
    if let Some(link) = next_link {
        response["@odata.nextLink"] = json!(link);
    }
    response
}

/// Creates an OData error response.
pub fn create_odata_error(code: &str, message: &str) -> Value {
    json!({
        "error": {
            "code": code,
            "message": message
        }
    })
}

/// Creates a mock OAuth token response.
pub fn create_token_response(access_token: &str, expires_in: u64) -> Value {
    json!({
        "access_token": access_token,
        "token_type": "Bearer",
        "expires_in": expires_in
    })
}

/// Generate a sequence of test users.
pub fn generate_test_users(prefix: &str, count: usize) -> Vec<Value> {
    (0..count)
        .map(|i| create_test_user(&format!("{prefix}-user-{i}"), &format!("{prefix}{i}")))
        .collect()
}

/// Canned answer for one group in a `$batch` call.
#[derive(Clone)]
pub struct SubResponse {
    pub status: u16,
    pub body: Value,
}

impl SubResponse {
    pub fn members(members: Vec<Value>) -> Self {
        Self {
            status: 200,
            body: create_odata_response(members, None),
        }
    }

    pub fn members_with_next(members: Vec<Value>, next_link: &str) -> Self {
        Self {
            status: 200,
            body: create_odata_response(members, Some(next_link)),
        }
    }

    pub fn error(status: u16, code: &str) -> Self {
        Self {
            status,
            body: create_odata_error(code, "sub-request failed"),
        }
    }
}

/// Answers `$batch` calls from a table of group id → sub-response.
///
/// Responses are returned in reverse order so callers must correlate by id.
/// Every received envelope is recorded for later inspection.
pub struct BatchResponder {
    groups: HashMap<String, SubResponse>,
    received: Arc<Mutex<Vec<Value>>>,
}

impl BatchResponder {
    pub fn new(groups: HashMap<String, SubResponse>) -> (Self, Arc<Mutex<Vec<Value>>>) {
        let received = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                groups,
                received: received.clone(),
            },
            received,
        )
    }
}

/// Extracts `{id}` from `/groups/{id}/members?...`.
pub fn group_id_from_url(url: &str) -> Option<&str> {
    url.strip_prefix("/groups/")?.split('/').next()
}

impl Respond for BatchResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let envelope: Value = match serde_json::from_slice(&request.body) {
            Ok(v) => v,
            Err(_) => return ResponseTemplate::new(400),
        };
        self.received.lock().unwrap().push(envelope.clone());

        let mut responses: Vec<Value> = envelope["requests"]
            .as_array()
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(|req| {
                let id = req["id"].clone();
                let group = req["url"].as_str().and_then(group_id_from_url).unwrap_or("");
                match self.groups.get(group) {
                    Some(sub) => json!({"id": id, "status": sub.status, "body": sub.body}),
                    None => json!({
                        "id": id,
                        "status": 404,
                        "body": create_odata_error("Request_ResourceNotFound", "no such group")
                    }),
                }
            })
            .collect();
        responses.reverse();

        ResponseTemplate::new(200).set_body_json(json!({ "responses": responses }))
    }
}

/// Mock server wrapper with common setup helpers.
pub struct MockGraphServer {
    pub server: MockServer,
}

impl MockGraphServer {
    /// Creates a new mock Graph API server.
    pub async fn new() -> Self {
        let server = MockServer::start().await;
        Self { server }
    }

    /// Returns the mock server's base URL.
    pub fn url(&self) -> String {
        self.server.uri()
    }

    /// Config builder pointed at this server with fast retries.
    pub fn config(&self) -> EntraConfigBuilder {
        EntraConfig::builder()
            .tenant_id(TENANT_ID)
            .client_id("test-client")
            .client_secret("test-secret")
            .cloud_environment(EntraCloudEnvironment::custom(self.url(), self.url()))
            .retry_policy(RetryPolicy::for_testing())
    }

    /// Fetcher with default settings against this server.
    pub fn fetcher(&self) -> EntraRosterFetcher {
        EntraRosterFetcher::new(self.config().build().unwrap()).unwrap()
    }

    /// Sets up OAuth token endpoint.
    pub async fn mock_token_endpoint(&self) {
        Mock::given(method("POST"))
            .and(path(format!("/{TENANT_ID}/oauth2/v2.0/token")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(create_token_response("mock-access-token", 3600)),
            )
            .mount(&self.server)
            .await;
    }

    /// Sets up a display-name lookup answering with `groups`.
    pub async fn mock_group_lookup(&self, name: &str, groups: Vec<Value>) {
        Mock::given(method("GET"))
            .and(path("/v1.0/groups"))
            .and(query_param("$filter", format!("displayName eq '{}'", name.replace('\'', "''"))))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(create_odata_response(groups, None)),
            )
            .mount(&self.server)
            .await;
    }

    /// Sets up a paged member listing; page `n > 0` is served at
    /// `?$skiptoken=page{n}`.
    pub async fn mock_group_members_pages(&self, group_id: &str, pages: Vec<Vec<Value>>) {
        let members_path = format!("/v1.0/groups/{group_id}/members");
        let total = pages.len();

        for (i, page) in pages.into_iter().enumerate() {
            let next_link = (i + 1 < total).then(|| {
                format!("{}{}?$skiptoken=page{}", self.url(), members_path, i + 1)
            });
            let response = create_odata_response(page, next_link.as_deref());

            let mock = Mock::given(method("GET")).and(path(members_path.as_str()));
            let mock = if i == 0 {
                mock.and(query_param("$select", "id,userPrincipalName,mail,displayName"))
            } else {
                mock.and(query_param("$skiptoken", format!("page{i}")))
            };
            mock.respond_with(ResponseTemplate::new(200).set_body_json(response))
                .expect(1)
                .mount(&self.server)
                .await;
        }
    }

    /// Sets up the `$batch` endpoint; returns the recorded envelopes.
    pub async fn mock_batch(
        &self,
        groups: HashMap<String, SubResponse>,
        expected_calls: u64,
    ) -> Arc<Mutex<Vec<Value>>> {
        let (responder, received) = BatchResponder::new(groups);
        Mock::given(method("POST"))
            .and(path("/v1.0/$batch"))
            .respond_with(responder)
            .expect(expected_calls)
            .mount(&self.server)
            .await;
        received
    }
}
