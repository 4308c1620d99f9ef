//! Microsoft Entra ID roster source for rosterwatch
//!
//! Reads group member lists from the Microsoft Graph API and hands them to
//! `rosterwatch-core` through the [`RosterSource`](rosterwatch_core::RosterSource)
//! trait.
//!
//! # Features
//!
//! - `OAuth2` client credentials authentication with a cached token
//! - Paged member listings and `$batch` requests of up to 20 groups
//! - Group lookup by exact display name or by OData filter
//! - Retry with backoff on throttling and transient gateway errors
//! - Multi-cloud support (Commercial, US Government, China, custom endpoints)
//!
//! # Example
//!
//! ```no_run
//! use rosterwatch_core::{GroupSelection, RosterSource};
//! use rosterwatch_entra::{EntraConfig, EntraRosterFetcher};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = EntraConfig::builder()
//!     .tenant_id("your-tenant-id")
//!     .client_id("your-client-id")
//!     .client_secret("your-client-secret")
//!     .build()?;
//!
//! let fetcher = EntraRosterFetcher::new(config)?;
//! let report = fetcher
//!     .fetch_roster(&GroupSelection::names(["Finance", "IT"]))
//!     .await?;
//! println!("{} groups read", report.roster.len());
//! # Ok(())
//! # }
//! ```

mod auth;
mod batch;
mod config;
mod error;
mod fetcher;
mod graph_client;
mod groups;
mod members;
mod rate_limit;

// Re-exports
pub use auth::TokenCache;
pub use batch::{BatchRequest, BatchRequestItem, BatchResponse, BatchResponseItem, MAX_BATCH_SIZE};
pub use config::{
    ConfigError, EntraCloudEnvironment, EntraConfig, EntraConfigBuilder, EntraCredentials,
    FetchMode, MemberKey, MAX_PAGE_SIZE,
};
pub use error::{EntraError, EntraResult};
pub use fetcher::EntraRosterFetcher;
pub use graph_client::{GraphClient, ODataError, ODataErrorBody, ODataResponse};
pub use groups::{display_name_filter, escape_odata_literal, GroupRecord, ResolvedGroups};
pub use members::{is_user, member_id, member_label, GroupMembers, USER_ODATA_TYPE};
pub use rate_limit::RetryPolicy;
