// crates/lti1p3-services/tests/groups.rs
// ============================================================================
// Module: Course Groups Service Tests
// Description: Tests for the context group service client.
// Purpose: Verify pagination, user filtering, and set joining behavior.
// Dependencies: lti1p3-services, serde_json, tiny_http
// ============================================================================

//! ## Overview
//! Exercises the groups client against scripted local servers: group
//! listings follow `Link` pagination to exhaustion, the user id lands on
//! the first page URL as a query parameter, pages are requested with the
//! group container accept header, and set listings join groups onto their
//! sets by `set_id` when asked to.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

mod common;

use lti1p3_services::CourseGroupsService;
use lti1p3_services::GroupsServiceData;
use lti1p3_services::ServiceConnector;
use serde_json::json;

use crate::common::GROUPS_SCOPE;
use crate::common::Route;
use crate::common::TOKEN_RESPONSE;
use crate::common::local_registration;
use crate::common::spawn_routing_server;
use crate::common::spawn_service_server;

// ============================================================================
// SECTION: Test Helpers
// ============================================================================

/// Builds claim data for the local server, with or without a sets endpoint.
fn service_data(base: &str, with_sets: bool) -> GroupsServiceData {
    GroupsServiceData {
        context_groups_url: format!("{base}/groups"),
        context_group_sets_url: with_sets.then(|| format!("{base}/sets")),
        scope: vec![GROUPS_SCOPE.to_string()],
        service_versions: vec!["1.0".to_string()],
    }
}

// ============================================================================
// SECTION: Group Listing Tests
// ============================================================================

/// Tests that the group listing follows pagination to exhaustion.
#[test]
fn get_groups_follows_pagination_to_exhaustion() {
    let (base, handle) = spawn_routing_server(
        TOKEN_RESPONSE,
        |base| {
            vec![
                Route {
                    path: "/groups".to_string(),
                    body: json!({"groups": [{"id": "g1"}, {"id": "g2"}]}).to_string(),
                    link: Some(format!("<{base}/groups?page=2>; rel=\"next\"")),
                },
                Route {
                    path: "/groups?page=2".to_string(),
                    body: json!({"groups": [{"id": "g3"}]}).to_string(),
                    link: None,
                },
            ]
        },
        3,
    );
    let connector = ServiceConnector::new(local_registration(&base)).unwrap();
    let service = CourseGroupsService::new(&connector, service_data(&base, false));

    let groups = service.get_groups(None).unwrap();
    assert_eq!(groups, vec![json!({"id": "g1"}), json!({"id": "g2"}), json!({"id": "g3"})]);

    let requested = handle.join().unwrap();
    assert_eq!(
        requested,
        vec!["/token".to_string(), "/groups".to_string(), "/groups?page=2".to_string()]
    );
}

/// Tests that the user id is appended to the first page URL as a query
/// parameter.
#[test]
fn get_groups_appends_user_id_to_the_first_page_url() {
    let (base, handle) = spawn_routing_server(
        TOKEN_RESPONSE,
        |_| {
            vec![Route {
                path: "/groups?user_id=learner-7".to_string(),
                body: json!({"groups": [{"id": "g1"}]}).to_string(),
                link: None,
            }]
        },
        2,
    );
    let connector = ServiceConnector::new(local_registration(&base)).unwrap();
    let service = CourseGroupsService::new(&connector, service_data(&base, false));

    let groups = service.get_groups(Some("learner-7")).unwrap();
    assert_eq!(groups, vec![json!({"id": "g1"})]);

    let requested = handle.join().unwrap();
    assert_eq!(requested, vec!["/token".to_string(), "/groups?user_id=learner-7".to_string()]);
}

/// Tests that a page without the requested data key yields an empty page.
#[test]
fn get_page_with_missing_data_key_is_empty() {
    let (base, handle) = spawn_service_server(r#"{"unrelated": 1}"#, 200, None);
    let connector = ServiceConnector::new(local_registration(&base)).unwrap();
    let service = CourseGroupsService::new(&connector, service_data(&base, false));

    let (items, next_page_url) = service.get_page(&format!("{base}/groups"), "groups").unwrap();
    assert!(items.is_empty());
    assert!(next_page_url.is_none());

    handle.join().unwrap();
}

/// Tests that pages are requested with the group container accept header.
#[test]
fn group_pages_use_the_container_accept_header() {
    let (base, handle) = spawn_service_server(r#"{"groups": []}"#, 200, None);
    let connector = ServiceConnector::new(local_registration(&base)).unwrap();
    let service = CourseGroupsService::new(&connector, service_data(&base, false));

    service.get_groups(None).unwrap();

    let captured = handle.join().unwrap();
    assert_eq!(
        captured.accept.as_deref(),
        Some("application/vnd.ims.lti-gs.v1.contextgroupcontainer+json")
    );
}

// ============================================================================
// SECTION: Group Set Tests
// ============================================================================

/// Tests that the sets endpoint presence is reported from the claim data.
#[test]
fn has_sets_reflects_the_claim_endpoints() {
    let registration = local_registration("http://127.0.0.1:9");
    let connector = ServiceConnector::new(registration).unwrap();

    let with_sets = CourseGroupsService::new(&connector, service_data("http://127.0.0.1:9", true));
    assert!(with_sets.has_sets());

    let without_sets =
        CourseGroupsService::new(&connector, service_data("http://127.0.0.1:9", false));
    assert!(!without_sets.has_sets());
}

/// Tests that a missing sets endpoint yields an empty listing without any
/// request being made.
#[test]
fn get_sets_without_an_endpoint_is_empty() {
    let connector = ServiceConnector::new(local_registration("http://127.0.0.1:9")).unwrap();
    let service = CourseGroupsService::new(&connector, service_data("http://127.0.0.1:9", false));

    let sets = service.get_sets(true).unwrap();
    assert!(sets.is_empty());
}

/// Tests that groups are attached to their sets by `set_id` and that every
/// set gains a groups array.
#[test]
fn get_sets_attaches_groups_by_set_id() {
    let (base, handle) = spawn_routing_server(
        TOKEN_RESPONSE,
        |_| {
            vec![
                Route {
                    path: "/sets".to_string(),
                    body: json!({"sets": [
                        {"id": "s1", "name": "Alpha"},
                        {"id": "s2", "name": "Beta"}
                    ]})
                    .to_string(),
                    link: None,
                },
                Route {
                    path: "/groups".to_string(),
                    body: json!({"groups": [
                        {"id": "g1", "set_id": "s1"},
                        {"id": "g2"},
                        {"id": "g3", "set_id": "missing"}
                    ]})
                    .to_string(),
                    link: None,
                },
            ]
        },
        3,
    );
    let connector = ServiceConnector::new(local_registration(&base)).unwrap();
    let service = CourseGroupsService::new(&connector, service_data(&base, true));

    let sets = service.get_sets(true).unwrap();
    assert_eq!(sets.len(), 2);
    assert_eq!(sets[0]["groups"], json!([{"id": "g1", "set_id": "s1"}]));
    assert_eq!(sets[1]["groups"], json!([]));

    let requested = handle.join().unwrap();
    assert_eq!(
        requested,
        vec!["/token".to_string(), "/sets".to_string(), "/groups".to_string()]
    );
}

/// Tests that set ids are matched on their JSON value, not only strings.
#[test]
fn numeric_set_ids_match_on_value() {
    let (base, handle) = spawn_routing_server(
        TOKEN_RESPONSE,
        |_| {
            vec![
                Route {
                    path: "/sets".to_string(),
                    body: json!({"sets": [{"id": 7}]}).to_string(),
                    link: None,
                },
                Route {
                    path: "/groups".to_string(),
                    body: json!({"groups": [{"id": "g1", "set_id": 7}]}).to_string(),
                    link: None,
                },
            ]
        },
        3,
    );
    let connector = ServiceConnector::new(local_registration(&base)).unwrap();
    let service = CourseGroupsService::new(&connector, service_data(&base, true));

    let sets = service.get_sets(true).unwrap();
    assert_eq!(sets[0]["groups"], json!([{"id": "g1", "set_id": 7}]));

    handle.join().unwrap();
}

/// Tests that set listings are left untouched without `include_groups` and
/// that no group request is made.
#[test]
fn get_sets_without_include_groups_leaves_sets_untouched() {
    let (base, handle) = spawn_routing_server(
        TOKEN_RESPONSE,
        |_| {
            vec![Route {
                path: "/sets".to_string(),
                body: json!({"sets": [{"id": "s1", "name": "Alpha"}]}).to_string(),
                link: None,
            }]
        },
        2,
    );
    let connector = ServiceConnector::new(local_registration(&base)).unwrap();
    let service = CourseGroupsService::new(&connector, service_data(&base, true));

    let sets = service.get_sets(false).unwrap();
    assert_eq!(sets, vec![json!({"id": "s1", "name": "Alpha"})]);
    assert!(sets[0].get("groups").is_none());

    let requested = handle.join().unwrap();
    assert_eq!(requested, vec!["/token".to_string(), "/sets".to_string()]);
}

/// Tests that set listings follow pagination like group listings.
#[test]
fn set_pagination_is_followed() {
    let (base, handle) = spawn_routing_server(
        TOKEN_RESPONSE,
        |base| {
            vec![
                Route {
                    path: "/sets".to_string(),
                    body: json!({"sets": [{"id": "s1"}]}).to_string(),
                    link: Some(format!("<{base}/sets?page=2>; rel=\"next\"")),
                },
                Route {
                    path: "/sets?page=2".to_string(),
                    body: json!({"sets": [{"id": "s2"}]}).to_string(),
                    link: None,
                },
            ]
        },
        3,
    );
    let connector = ServiceConnector::new(local_registration(&base)).unwrap();
    let service = CourseGroupsService::new(&connector, service_data(&base, true));

    let sets = service.get_sets(false).unwrap();
    assert_eq!(sets, vec![json!({"id": "s1"}), json!({"id": "s2"})]);

    let requested = handle.join().unwrap();
    assert_eq!(
        requested,
        vec!["/token".to_string(), "/sets".to_string(), "/sets?page=2".to_string()]
    );
}
