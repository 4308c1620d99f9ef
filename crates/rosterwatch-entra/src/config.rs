//! Connection and fetch settings for the Graph roster source.

use secrecy::SecretString;
use std::fmt;
use std::str::FromStr;

use crate::batch::MAX_BATCH_SIZE;
use crate::rate_limit::RetryPolicy;

/// Largest `$top` Graph accepts on member listings.
pub const MAX_PAGE_SIZE: u32 = 999;

const DEFAULT_API_VERSION: &str = "v1.0";

/// Microsoft national cloud the tenant lives in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum EntraCloudEnvironment {
    /// Global Azure.
    #[default]
    Commercial,
    /// Azure US Government (GCC High / DoD).
    UsGovernment,
    /// Azure China, operated by 21Vianet.
    China,
    /// Explicit endpoints, e.g. a proxy or a mock server.
    Custom {
        graph_endpoint: String,
        login_endpoint: String,
    },
}

impl EntraCloudEnvironment {
    /// Base URL of the Graph API, without trailing slash.
    #[must_use]
    pub fn graph_endpoint(&self) -> &str {
        match self {
            Self::Commercial => "https://graph.microsoft.com",
            Self::UsGovernment => "https://graph.microsoft.us",
            Self::China => "https://microsoftgraph.chinacloudapi.cn",
            Self::Custom { graph_endpoint, .. } => graph_endpoint,
        }
    }

    /// Base URL of the token authority, without trailing slash.
    #[must_use]
    pub fn login_endpoint(&self) -> &str {
        match self {
            Self::Commercial => "https://login.microsoftonline.com",
            Self::UsGovernment => "https://login.microsoftonline.us",
            Self::China => "https://login.chinacloudapi.cn",
            Self::Custom { login_endpoint, .. } => login_endpoint,
        }
    }

    /// Custom environment with explicit endpoints. Trailing slashes are dropped.
    pub fn custom(graph_endpoint: impl Into<String>, login_endpoint: impl Into<String>) -> Self {
        Self::Custom {
            graph_endpoint: graph_endpoint.into().trim_end_matches('/').to_string(),
            login_endpoint: login_endpoint.into().trim_end_matches('/').to_string(),
        }
    }
}

impl FromStr for EntraCloudEnvironment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "commercial" | "global" | "public" => Ok(Self::Commercial),
            "usgov" | "us_government" | "usgovernment" | "gcchigh" => Ok(Self::UsGovernment),
            "china" => Ok(Self::China),
            other => Err(ConfigError::InvalidValue(
                "ENTRA_CLOUD".into(),
                format!("unknown cloud '{other}'"),
            )),
        }
    }
}

/// Which member property becomes the [`MemberId`](rosterwatch_core::MemberId).
///
/// The chosen property is tried first; if a record lacks it the remaining
/// properties are tried in the order `id`, `userPrincipalName`, `mail`,
/// `displayName`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MemberKey {
    /// Directory object id. Stable across renames.
    #[default]
    Id,
    UserPrincipalName,
    Mail,
    DisplayName,
}

impl MemberKey {
    const FALLBACK_ORDER: [MemberKey; 4] = [
        MemberKey::Id,
        MemberKey::UserPrincipalName,
        MemberKey::Mail,
        MemberKey::DisplayName,
    ];

    /// Graph property name.
    #[must_use]
    pub fn field(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::UserPrincipalName => "userPrincipalName",
            Self::Mail => "mail",
            Self::DisplayName => "displayName",
        }
    }

    /// Properties to try, preferred one first.
    pub fn lookup_order(self) -> impl Iterator<Item = &'static str> {
        std::iter::once(self)
            .chain(Self::FALLBACK_ORDER.into_iter().filter(move |k| *k != self))
            .map(Self::field)
    }
}

impl FromStr for MemberKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "id" => Ok(Self::Id),
            "upn" | "userprincipalname" => Ok(Self::UserPrincipalName),
            "mail" | "email" => Ok(Self::Mail),
            "displayname" | "display_name" | "name" => Ok(Self::DisplayName),
            other => Err(ConfigError::InvalidValue(
                "MEMBER_KEY".into(),
                format!("unknown member key '{other}'"),
            )),
        }
    }
}

impl fmt::Display for MemberKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field())
    }
}

/// How member lists are requested.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FetchMode {
    /// Up to [`MAX_BATCH_SIZE`] groups per `$batch` call.
    #[default]
    Batch,
    /// One paged listing per group, sequentially.
    PerGroup,
}

impl FromStr for FetchMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "batch" => Ok(Self::Batch),
            "per-group" | "per_group" | "sequential" => Ok(Self::PerGroup),
            other => Err(ConfigError::InvalidValue(
                "FETCH_MODE".into(),
                format!("unknown fetch mode '{other}'"),
            )),
        }
    }
}

impl fmt::Display for FetchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Batch => f.write_str("batch"),
            Self::PerGroup => f.write_str("per-group"),
        }
    }
}

/// App registration credentials for the client-credentials flow.
#[derive(Debug)]
pub struct EntraCredentials {
    pub client_id: String,
    pub client_secret: SecretString,
}

/// Settings for [`EntraRosterFetcher`](crate::EntraRosterFetcher).
#[derive(Debug)]
pub struct EntraConfig {
    pub tenant_id: String,
    pub credentials: EntraCredentials,
    pub cloud_environment: EntraCloudEnvironment,
    /// Graph API version segment, e.g. `v1.0`.
    pub api_version: String,
    /// Member requests per `$batch` call (1..=20).
    pub batch_size: usize,
    /// `$top` for paged listings (1..=999).
    pub page_size: u32,
    pub member_key: MemberKey,
    /// Keep only `#microsoft.graph.user` members.
    pub users_only: bool,
    pub fetch_mode: FetchMode,
    pub retry_policy: RetryPolicy,
}

impl EntraConfig {
    /// Starts a builder with defaults for everything but the credentials.
    #[must_use]
    pub fn builder() -> EntraConfigBuilder {
        EntraConfigBuilder::default()
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_reader(|key| std::env::var(key))
    }

    /// Load configuration from a custom variable reader.
    ///
    /// This allows tests to supply variables without mutating process-global
    /// environment state.
    pub fn from_reader<F>(reader: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Result<String, std::env::VarError>,
    {
        let required = |key: &str| {
            reader(key)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| ConfigError::MissingVar(key.into()))
        };
        let optional = |key: &str| reader(key).ok().filter(|v| !v.trim().is_empty());

        let tenant_id = required("TENANT_ID")?;
        let client_id = required("CLIENT_ID")?;
        let client_secret = required("CLIENT_SECRET")?;

        let mut builder = Self::builder()
            .tenant_id(tenant_id)
            .client_id(client_id)
            .client_secret(client_secret);

        let cloud = optional("ENTRA_CLOUD")
            .map(|v| v.parse::<EntraCloudEnvironment>())
            .transpose()?
            .unwrap_or_default();
        let graph_override = optional("GRAPH_BASE_URL");
        let login_override = optional("LOGIN_BASE_URL");
        builder = if graph_override.is_some() || login_override.is_some() {
            let graph = graph_override.unwrap_or_else(|| cloud.graph_endpoint().to_string());
            let login = login_override.unwrap_or_else(|| cloud.login_endpoint().to_string());
            check_url("GRAPH_BASE_URL", &graph)?;
            check_url("LOGIN_BASE_URL", &login)?;
            builder.cloud_environment(EntraCloudEnvironment::custom(graph, login))
        } else {
            builder.cloud_environment(cloud)
        };

        if let Some(version) = optional("GRAPH_API_VERSION") {
            builder = builder.api_version(version.trim());
        }
        if let Some(size) = optional("BATCH_SIZE") {
            builder = builder.batch_size(parse_number("BATCH_SIZE", &size)?);
        }
        if let Some(size) = optional("PAGE_SIZE") {
            builder = builder.page_size(parse_number("PAGE_SIZE", &size)?);
        }
        if let Some(key) = optional("MEMBER_KEY") {
            builder = builder.member_key(key.parse()?);
        }
        if let Some(flag) = optional("USERS_ONLY") {
            builder = builder.users_only(parse_bool("USERS_ONLY", &flag)?);
        }
        if let Some(mode) = optional("FETCH_MODE") {
            builder = builder.fetch_mode(mode.parse()?);
        }

        builder.build()
    }

    /// Checks ranges and required fields.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tenant_id.trim().is_empty() {
            return Err(ConfigError::MissingVar("TENANT_ID".into()));
        }
        if self.credentials.client_id.trim().is_empty() {
            return Err(ConfigError::MissingVar("CLIENT_ID".into()));
        }
        if self.api_version.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "GRAPH_API_VERSION".into(),
                "must not be empty".into(),
            ));
        }
        if !(1..=MAX_BATCH_SIZE).contains(&self.batch_size) {
            return Err(ConfigError::InvalidValue(
                "BATCH_SIZE".into(),
                format!("must be between 1 and {MAX_BATCH_SIZE}"),
            ));
        }
        if !(1..=MAX_PAGE_SIZE).contains(&self.page_size) {
            return Err(ConfigError::InvalidValue(
                "PAGE_SIZE".into(),
                format!("must be between 1 and {MAX_PAGE_SIZE}"),
            ));
        }
        self.retry_policy
            .validate()
            .map_err(|e| ConfigError::InvalidValue("retry policy".into(), e))
    }
}

/// Builder for [`EntraConfig`].
#[derive(Debug, Default)]
pub struct EntraConfigBuilder {
    tenant_id: Option<String>,
    client_id: Option<String>,
    client_secret: Option<SecretString>,
    cloud_environment: EntraCloudEnvironment,
    api_version: Option<String>,
    batch_size: Option<usize>,
    page_size: Option<u32>,
    member_key: MemberKey,
    users_only: bool,
    fetch_mode: FetchMode,
    retry_policy: Option<RetryPolicy>,
}

impl EntraConfigBuilder {
    #[must_use]
    pub fn tenant_id(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    #[must_use]
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    #[must_use]
    pub fn client_secret(mut self, client_secret: impl Into<String>) -> Self {
        let secret: String = client_secret.into();
        self.client_secret = Some(secret.into());
        self
    }

    #[must_use]
    pub fn cloud_environment(mut self, cloud_environment: EntraCloudEnvironment) -> Self {
        self.cloud_environment = cloud_environment;
        self
    }

    #[must_use]
    pub fn api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = Some(api_version.into());
        self
    }

    #[must_use]
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    #[must_use]
    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    #[must_use]
    pub fn member_key(mut self, member_key: MemberKey) -> Self {
        self.member_key = member_key;
        self
    }

    #[must_use]
    pub fn users_only(mut self, users_only: bool) -> Self {
        self.users_only = users_only;
        self
    }

    #[must_use]
    pub fn fetch_mode(mut self, fetch_mode: FetchMode) -> Self {
        self.fetch_mode = fetch_mode;
        self
    }

    #[must_use]
    pub fn retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = Some(retry_policy);
        self
    }

    /// Builds and validates the configuration.
    pub fn build(self) -> Result<EntraConfig, ConfigError> {
        let config = EntraConfig {
            tenant_id: self
                .tenant_id
                .ok_or_else(|| ConfigError::MissingVar("TENANT_ID".into()))?,
            credentials: EntraCredentials {
                client_id: self
                    .client_id
                    .ok_or_else(|| ConfigError::MissingVar("CLIENT_ID".into()))?,
                client_secret: self
                    .client_secret
                    .ok_or_else(|| ConfigError::MissingVar("CLIENT_SECRET".into()))?,
            },
            cloud_environment: self.cloud_environment,
            api_version: self
                .api_version
                .unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
            batch_size: self.batch_size.unwrap_or(MAX_BATCH_SIZE),
            page_size: self.page_size.unwrap_or(MAX_PAGE_SIZE),
            member_key: self.member_key,
            users_only: self.users_only,
            fetch_mode: self.fetch_mode,
            retry_policy: self.retry_policy.unwrap_or_default(),
        };
        config.validate()?;
        Ok(config)
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingVar(String),

    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

fn parse_number<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidValue(key.into(), e.to_string()))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidValue(
            key.into(),
            format!("expected a boolean, got '{other}'"),
        )),
    }
}

fn check_url(key: &str, value: &str) -> Result<(), ConfigError> {
    url::Url::parse(value)
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidValue(key.into(), e.to_string()))
}
