//! App-only bearer tokens for Microsoft Graph.
//!
//! A run uses the client-credentials grant against the tenant's token
//! endpoint and keeps the bearer until shortly before it expires.

use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::{EntraCloudEnvironment, EntraCredentials, EntraError, EntraResult};

/// A token is replaced this long before the identity platform expires it.
const REFRESH_MARGIN_SECS: i64 = 300;

#[derive(Deserialize)]
struct TokenGrant {
    access_token: String,
    expires_in: i64,
}

/// Error body of a rejected token request.
#[derive(Deserialize)]
struct TokenErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

impl TokenErrorBody {
    fn message(&self) -> String {
        match &self.error_description {
            Some(description) => format!("{}: {}", self.error, description),
            None => self.error.clone(),
        }
    }
}

struct Bearer {
    value: SecretString,
    refresh_after: DateTime<Utc>,
}

impl Bearer {
    fn from_grant(grant: TokenGrant, now: DateTime<Utc>) -> Self {
        let lifetime = (grant.expires_in - REFRESH_MARGIN_SECS).max(0);
        Self {
            value: SecretString::from(grant.access_token),
            refresh_after: now + Duration::seconds(lifetime),
        }
    }

    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now < self.refresh_after
    }
}

/// Shared bearer token for every Graph call of a run.
pub struct TokenCache {
    http_client: reqwest::Client,
    token_url: String,
    scope: String,
    tenant_id: String,
    credentials: EntraCredentials,
    current: RwLock<Option<Bearer>>,
}

impl std::fmt::Debug for TokenCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCache")
            .field("token_url", &self.token_url)
            .field("client_id", &self.credentials.client_id)
            .finish_non_exhaustive()
    }
}

impl TokenCache {
    pub fn new(
        credentials: EntraCredentials,
        cloud_environment: &EntraCloudEnvironment,
        tenant_id: impl Into<String>,
        http_client: reqwest::Client,
    ) -> Self {
        let tenant_id = tenant_id.into();
        Self {
            token_url: format!(
                "{}/{}/oauth2/v2.0/token",
                cloud_environment.login_endpoint(),
                tenant_id
            ),
            scope: format!("{}/.default", cloud_environment.graph_endpoint()),
            tenant_id,
            credentials,
            http_client,
            current: RwLock::new(None),
        }
    }

    /// Token endpoint for the configured tenant and cloud.
    #[must_use]
    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    /// Returns a bearer token, requesting a new one when the cached one is
    /// missing or close to expiry.
    #[instrument(skip(self), fields(tenant_id = %self.tenant_id))]
    pub async fn get_token(&self) -> EntraResult<String> {
        if let Some(bearer) = self.current.read().await.as_ref() {
            if bearer.is_fresh(Utc::now()) {
                return Ok(bearer.value.expose_secret().to_string());
            }
        }

        let mut slot = self.current.write().await;
        // a concurrent caller may have refreshed while we waited for the lock
        if let Some(bearer) = slot.as_ref() {
            if bearer.is_fresh(Utc::now()) {
                return Ok(bearer.value.expose_secret().to_string());
            }
        }

        let bearer = self.request_token().await?;
        let value = bearer.value.expose_secret().to_string();
        *slot = Some(bearer);
        Ok(value)
    }

    /// Drops the cached token so the next call requests a new one.
    pub async fn invalidate(&self) {
        *self.current.write().await = None;
    }

    async fn request_token(&self) -> EntraResult<Bearer> {
        debug!("Requesting access token");
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.expose_secret()),
            ("scope", self.scope.as_str()),
        ];

        let response = self
            .http_client
            .post(&self.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| EntraError::Auth(format!("token request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<TokenErrorBody>(&body)
                .map(|err| err.message())
                .unwrap_or(body);
            return Err(EntraError::Auth(format!(
                "token request rejected ({status}): {detail}"
            )));
        }

        let grant: TokenGrant = response
            .json()
            .await
            .map_err(|e| EntraError::Auth(format!("unreadable token response: {e}")))?;

        let bearer = Bearer::from_grant(grant, Utc::now());
        debug!(refresh_after = %bearer.refresh_after, "Access token acquired");
        Ok(bearer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grant(expires_in: i64) -> TokenGrant {
        TokenGrant {
            access_token: "token".into(),
            expires_in,
        }
    }

    #[test]
    fn test_bearer_refreshes_before_expiry() {
        let now = Utc::now();
        let bearer = Bearer::from_grant(grant(3600), now);

        assert!(bearer.is_fresh(now + Duration::minutes(54)));
        assert!(!bearer.is_fresh(now + Duration::minutes(56)));
    }

    #[test]
    fn test_short_lived_grant_is_never_fresh() {
        let now = Utc::now();
        let bearer = Bearer::from_grant(grant(60), now);
        assert!(!bearer.is_fresh(now));
    }

    #[test]
    fn test_error_body_message() {
        let body: TokenErrorBody = serde_json::from_str(
            r#"{"error": "invalid_client", "error_description": "AADSTS7000215: Invalid client secret provided."}"#,
        )
        .unwrap();
        assert_eq!(
            body.message(),
            "invalid_client: AADSTS7000215: Invalid client secret provided."
        );
    }

    #[test]
    fn test_token_url_uses_cloud_authority() {
        let cache = TokenCache::new(
            EntraCredentials {
                client_id: "client".into(),
                client_secret: SecretString::from("secret".to_string()),
            },
            &EntraCloudEnvironment::China,
            "tenant-42",
            reqwest::Client::new(),
        );
        assert_eq!(
            cache.token_url(),
            "https://login.chinacloudapi.cn/tenant-42/oauth2/v2.0/token"
        );
    }
}
