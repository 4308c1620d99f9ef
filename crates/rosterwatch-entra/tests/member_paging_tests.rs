//! Member listing tests against a mock Graph server.
//!
//! These tests verify:
//! - Every page of a listing is read
//! - Member identifiers are normalized and de-duplicated
//! - The users-only filter and member key fallback

mod common;

use common::*;
use rosterwatch_core::{GroupSelection, GroupTarget, MemberId, RosterSource};
use rosterwatch_entra::{EntraRosterFetcher, FetchMode, MemberKey};
use serde_json::json;

fn ids(members: &std::collections::BTreeSet<MemberId>) -> Vec<&str> {
    members.iter().map(MemberId::as_str).collect()
}

/// Tests that all pages of a three-page listing are followed.
#[tokio::test]
async fn test_fetch_members_follows_next_link() {
    let mock = MockGraphServer::new().await;
    mock.mock_token_endpoint().await;
    mock.mock_group_members_pages(
        "group-1",
        vec![
            generate_test_users("a", 3),
            generate_test_users("b", 3),
            generate_test_users("c", 2),
        ],
    )
    .await;

    let members = mock.fetcher().fetch_members("group-1").await.unwrap();
    assert_eq!(members.len(), 8);
    assert!(members.ids.contains(&MemberId::parse("c-user-1").unwrap()));
}

/// Tests that a group without members yields an empty set, not an error.
#[tokio::test]
async fn test_fetch_members_empty_group() {
    let mock = MockGraphServer::new().await;
    mock.mock_token_endpoint().await;
    mock.mock_group_members_pages("empty", vec![vec![]]).await;

    let members = mock.fetcher().fetch_members("empty").await.unwrap();
    assert!(members.is_empty());
}

/// Tests that identifiers are normalized and duplicates across pages collapse.
#[tokio::test]
async fn test_members_normalized_and_deduplicated() {
    let mock = MockGraphServer::new().await;
    mock.mock_token_endpoint().await;
    mock.mock_group_members_pages(
        "group-1",
        vec![
            vec![json!({"id": "\u{feff}u-1 "}), json!({"id": "u-2"})],
            vec![json!({"id": "u-1"}), json!({"id": "   "})],
        ],
    )
    .await;

    let members = mock.fetcher().fetch_members("group-1").await.unwrap();
    assert_eq!(ids(&members.ids), vec!["u-1", "u-2"]);
}

/// Tests the users-only filter and display-name keyed members.
#[tokio::test]
async fn test_users_only_with_display_name_key() {
    let mock = MockGraphServer::new().await;
    mock.mock_token_endpoint().await;
    mock.mock_group_members_pages(
        "group-1",
        vec![vec![
            create_test_user("u-1", "alice"),
            create_service_principal("sp-1", "Backup Agent"),
        ]],
    )
    .await;

    let config = mock
        .config()
        .users_only(true)
        .member_key(MemberKey::DisplayName)
        .build()
        .unwrap();
    let fetcher = EntraRosterFetcher::new(config).unwrap();

    let members = fetcher.fetch_members("group-1").await.unwrap();
    assert_eq!(ids(&members.ids), vec!["Test User alice"]);
}

/// Tests that members without the configured key fall back to other properties.
#[tokio::test]
async fn test_member_key_fallback() {
    let mock = MockGraphServer::new().await;
    mock.mock_token_endpoint().await;
    mock.mock_group_members_pages(
        "group-1",
        vec![vec![
            create_test_user("u-1", "alice"),
            create_service_principal("sp-1", "Backup Agent"),
        ]],
    )
    .await;

    let config = mock.config().member_key(MemberKey::Mail).build().unwrap();
    let fetcher = EntraRosterFetcher::new(config).unwrap();

    let members = fetcher.fetch_members("group-1").await.unwrap();
    assert_eq!(ids(&members.ids), vec!["alice@example.com", "sp-1"]);
}

/// Tests that display labels are collected next to the object ids.
#[tokio::test]
async fn test_member_labels_collected() {
    let mock = MockGraphServer::new().await;
    mock.mock_token_endpoint().await;
    mock.mock_group_members_pages(
        "group-1",
        vec![vec![
            create_test_user("u-1", "alice"),
            create_service_principal("sp-1", "Backup Agent"),
            json!({"id": "u-2"}),
        ]],
    )
    .await;

    let members = mock.fetcher().fetch_members("group-1").await.unwrap();
    assert_eq!(ids(&members.ids), vec!["sp-1", "u-1", "u-2"]);

    let alice = MemberId::parse("u-1").unwrap();
    let agent = MemberId::parse("sp-1").unwrap();
    let bare = MemberId::parse("u-2").unwrap();
    assert_eq!(
        members.labels.get(&alice),
        Some("Test User alice (alice@test.onmicrosoft.com)")
    );
    assert_eq!(members.labels.get(&agent), Some("Backup Agent"));
    assert_eq!(members.labels.display(&bare), "u-2");
}

/// Tests the per-group fetch mode through the roster source trait.
#[tokio::test]
async fn test_per_group_mode_roster() {
    let mock = MockGraphServer::new().await;
    mock.mock_token_endpoint().await;
    mock.mock_group_members_pages("g-fin", vec![generate_test_users("fin", 2)])
        .await;
    mock.mock_group_members_pages("g-it", vec![vec![]]).await;

    let config = mock
        .config()
        .fetch_mode(FetchMode::PerGroup)
        .build()
        .unwrap();
    let fetcher = EntraRosterFetcher::new(config).unwrap();

    let selection = GroupSelection::Targets(vec![
        GroupTarget::new("Finance", "g-fin").unwrap(),
        GroupTarget::new("IT", "g-it").unwrap(),
    ]);
    let report = fetcher.fetch_roster(&selection).await.unwrap();

    assert_eq!(report.roster.len(), 2);
    assert!(report.failed.is_empty());
    assert_eq!(report.labels.len(), 2);
    let it = rosterwatch_core::GroupName::parse("IT").unwrap();
    assert!(report.roster.get(&it).unwrap().is_empty());
}

/// Tests that a failing listing in per-group mode aborts the fetch.
#[tokio::test]
async fn test_per_group_mode_failure_is_fatal() {
    let mock = MockGraphServer::new().await;
    mock.mock_token_endpoint().await;

    let config = mock
        .config()
        .fetch_mode(FetchMode::PerGroup)
        .build()
        .unwrap();
    let fetcher = EntraRosterFetcher::new(config).unwrap();

    // Nothing mounted for the members path, the mock server answers 404
    let selection = GroupSelection::Targets(vec![GroupTarget::new("Finance", "g-fin").unwrap()]);
    assert!(fetcher.fetch_roster(&selection).await.is_err());
}
