// crates/lti1p3-services/tests/connector.rs
// ============================================================================
// Module: Service Connector Tests
// Description: Tests for token acquisition and authenticated requests.
// Purpose: Verify the grant form, assertion claims, caching, and paging.
// Dependencies: jsonwebtoken, lti1p3-core, lti1p3-services, tiny_http, url
// ============================================================================

//! ## Overview
//! Exercises the connector against local tiny_http endpoints: the token
//! request carries the client-credentials grant with a decodable RS256
//! client assertion, tokens are cached per sorted scope set and refreshed
//! after expiry, service requests send bearer and accept headers, and the
//! next-page URL is read from the `Link` header's `rel="next"` entry.

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

use std::collections::BTreeMap;

use jsonwebtoken::Algorithm;
use jsonwebtoken::DecodingKey;
use jsonwebtoken::Validation;
use jsonwebtoken::decode;
use jsonwebtoken::decode_header;
use lti1p3_core::derive_jwk;
use lti1p3_services::ServiceConnector;
use lti1p3_services::ServiceError;
use serde_json::Value;
use serde_json::json;

use crate::common::GROUPS_SCOPE;
use crate::common::TOKEN_RESPONSE;
use crate::common::TOOL_PUBLIC_KEY_PEM;
use crate::common::local_registration;
use crate::common::spawn_routing_server;
use crate::common::spawn_service_server;
use crate::common::spawn_token_server;

// ============================================================================
// SECTION: Test Helpers
// ============================================================================

/// Token response whose access token expires immediately.
const EXPIRING_TOKEN_RESPONSE: &str =
    r#"{"access_token":"token-123","token_type":"Bearer","expires_in":0}"#;

/// Parses a URL-encoded form body into a key-value map.
fn parse_form(body: &str) -> BTreeMap<String, String> {
    url::form_urlencoded::parse(body.as_bytes()).into_owned().collect()
}

/// Decodes a client assertion against the tool public key, returning its
/// header and claims. Audience validation is disabled so the claim value
/// can be asserted directly.
fn decode_assertion(assertion: &str) -> (jsonwebtoken::Header, Value) {
    let header = decode_header(assertion).unwrap();
    let key = DecodingKey::from_rsa_pem(TOOL_PUBLIC_KEY_PEM.as_bytes()).unwrap();
    let mut validation = Validation::new(Algorithm::RS256);
    validation.validate_aud = false;
    let decoded = decode::<Value>(assertion, &key, &validation).unwrap();
    (header, decoded.claims)
}

/// Standard scope list used by the token tests.
fn groups_scopes() -> Vec<String> {
    vec![GROUPS_SCOPE.to_string()]
}

// ============================================================================
// SECTION: Token Endpoint Tests
// ============================================================================

/// Tests that the token request posts the client-credentials grant form.
#[test]
fn access_token_posts_client_credentials_grant() {
    let (base, handle) = spawn_token_server(TOKEN_RESPONSE, 200);
    let connector = ServiceConnector::new(local_registration(&base)).unwrap();

    let scopes = vec!["scope-b".to_string(), "scope-a".to_string()];
    let token = connector.access_token(&scopes).unwrap();
    assert_eq!(token, "token-123");

    let captured = handle.join().unwrap();
    assert_eq!(captured.method, "POST");
    assert_eq!(captured.url, "/token");
    let form = parse_form(&captured.body);
    assert_eq!(form.get("grant_type").map(String::as_str), Some("client_credentials"));
    assert_eq!(
        form.get("client_assertion_type").map(String::as_str),
        Some("urn:ietf:params:oauth:client-assertion-type:jwt-bearer")
    );
    assert_eq!(form.get("scope").map(String::as_str), Some("scope-b scope-a"));
}

/// Tests that the client assertion names the client id as issuer and
/// subject and falls back to the token URL as audience.
#[test]
fn client_assertion_binds_client_id_and_token_url() {
    let (base, handle) = spawn_token_server(TOKEN_RESPONSE, 200);
    let connector = ServiceConnector::new(local_registration(&base)).unwrap();

    connector.access_token(&groups_scopes()).unwrap();

    let captured = handle.join().unwrap();
    let form = parse_form(&captured.body);
    let (header, claims) = decode_assertion(form.get("client_assertion").unwrap());
    assert_eq!(header.alg, Algorithm::RS256);
    assert_eq!(claims["iss"], json!("abc"));
    assert_eq!(claims["sub"], json!("abc"));
    assert_eq!(claims["aud"], json!(format!("{base}/token")));
    let lifetime = claims["exp"].as_u64().unwrap() - claims["iat"].as_u64().unwrap();
    assert_eq!(lifetime, 60);
    assert!(!claims["jti"].as_str().unwrap().is_empty());
}

/// Tests that a configured audience overrides the token URL fallback.
#[test]
fn client_assertion_prefers_configured_audience() {
    let (base, handle) = spawn_token_server(TOKEN_RESPONSE, 200);
    let mut registration = local_registration(&base);
    registration.auth_audience = Some("https://lms.example/oauth/audience".to_string());
    let connector = ServiceConnector::new(registration).unwrap();

    connector.access_token(&groups_scopes()).unwrap();

    let captured = handle.join().unwrap();
    let form = parse_form(&captured.body);
    let (_, claims) = decode_assertion(form.get("client_assertion").unwrap());
    assert_eq!(claims["aud"], json!("https://lms.example/oauth/audience"));
}

/// Tests that the assertion header carries the derived tool JWK's kid.
#[test]
fn assertion_header_carries_derived_kid() {
    let (base, handle) = spawn_token_server(TOKEN_RESPONSE, 200);
    let connector = ServiceConnector::new(local_registration(&base)).unwrap();

    connector.access_token(&groups_scopes()).unwrap();

    let captured = handle.join().unwrap();
    let form = parse_form(&captured.body);
    let (header, _) = decode_assertion(form.get("client_assertion").unwrap());
    let expected = derive_jwk(TOOL_PUBLIC_KEY_PEM).unwrap().kid;
    assert_eq!(header.kid, Some(expected));
}

/// Tests that the assertion header omits the kid without a public key.
#[test]
fn assertion_header_omits_kid_without_public_key() {
    let (base, handle) = spawn_token_server(TOKEN_RESPONSE, 200);
    let mut registration = local_registration(&base);
    registration.tool_public_key = None;
    let connector = ServiceConnector::new(registration).unwrap();

    connector.access_token(&groups_scopes()).unwrap();

    let captured = handle.join().unwrap();
    let form = parse_form(&captured.body);
    let (header, _) = decode_assertion(form.get("client_assertion").unwrap());
    assert!(header.kid.is_none());
}

/// Tests that a second request with the same scope set, in any order, is
/// served from the cache without a second token request.
#[test]
fn access_token_is_cached_per_scope_set() {
    let (base, handle) = spawn_routing_server(TOKEN_RESPONSE, |_| Vec::new(), 1);
    let connector = ServiceConnector::new(local_registration(&base)).unwrap();

    let first = connector
        .access_token(&["scope-a".to_string(), "scope-b".to_string()])
        .unwrap();
    let second = connector
        .access_token(&["scope-b".to_string(), "scope-a".to_string()])
        .unwrap();
    assert_eq!(first, second);

    let requested = handle.join().unwrap();
    assert_eq!(requested, vec!["/token".to_string()]);
}

/// Tests that an expired cache entry triggers a fresh token request.
#[test]
fn expired_token_is_refreshed() {
    let (base, handle) = spawn_routing_server(EXPIRING_TOKEN_RESPONSE, |_| Vec::new(), 2);
    let connector = ServiceConnector::new(local_registration(&base)).unwrap();

    connector.access_token(&groups_scopes()).unwrap();
    connector.access_token(&groups_scopes()).unwrap();

    let requested = handle.join().unwrap();
    assert_eq!(requested, vec!["/token".to_string(), "/token".to_string()]);
}

/// Tests that distinct scope sets are not served from the same cache entry.
#[test]
fn distinct_scope_sets_get_distinct_token_requests() {
    let (base, handle) = spawn_routing_server(TOKEN_RESPONSE, |_| Vec::new(), 2);
    let connector = ServiceConnector::new(local_registration(&base)).unwrap();

    connector.access_token(&["scope-a".to_string()]).unwrap();
    connector.access_token(&["scope-b".to_string()]).unwrap();

    let requested = handle.join().unwrap();
    assert_eq!(requested.len(), 2);
}

/// Tests that a non-success token endpoint answer is surfaced with its
/// status and body.
#[test]
fn token_endpoint_rejection_is_an_error() {
    let (base, handle) = spawn_token_server(r#"{"error":"invalid_client"}"#, 400);
    let connector = ServiceConnector::new(local_registration(&base)).unwrap();

    let err = connector.access_token(&groups_scopes()).unwrap_err();
    let ServiceError::TokenEndpoint {
        status,
        body,
    } = err
    else {
        panic!("expected a token endpoint error, got {err:?}");
    };
    assert_eq!(status, 400);
    assert!(body.contains("invalid_client"));

    handle.join().unwrap();
}

/// Tests that a token payload without an access token is rejected.
#[test]
fn token_payload_without_access_token_is_an_error() {
    let (base, handle) = spawn_token_server(r#"{"token_type":"Bearer"}"#, 200);
    let connector = ServiceConnector::new(local_registration(&base)).unwrap();

    let err = connector.access_token(&groups_scopes()).unwrap_err();
    let ServiceError::TokenPayload {
        detail,
    } = err
    else {
        panic!("expected a token payload error, got {err:?}");
    };
    assert!(detail.contains("access_token"));

    handle.join().unwrap();
}

// ============================================================================
// SECTION: Service Request Tests
// ============================================================================

/// Tests that a bodyless service request issues a GET with bearer and
/// accept headers.
#[test]
fn service_request_gets_with_bearer_and_accept() {
    let (base, handle) = spawn_service_server(r#"{"groups":[]}"#, 200, None);
    let connector = ServiceConnector::new(local_registration(&base)).unwrap();

    let page = connector
        .make_service_request(
            &groups_scopes(),
            &format!("{base}/groups"),
            None,
            "application/json",
            "application/json",
        )
        .unwrap();
    assert_eq!(page.body, json!({"groups": []}));
    assert!(page.next_page_url.is_none());

    let captured = handle.join().unwrap();
    assert_eq!(captured.method, "GET");
    assert_eq!(captured.authorization.as_deref(), Some("Bearer token-123"));
    assert_eq!(captured.accept.as_deref(), Some("application/json"));
}

/// Tests that a body turns the request into a POST carrying the JSON body
/// with the given content type.
#[test]
fn service_request_posts_json_body() {
    let (base, handle) = spawn_service_server("{}", 200, None);
    let connector = ServiceConnector::new(local_registration(&base)).unwrap();

    let body = json!({"scoreGiven": 1.0, "scoreMaximum": 10.0});
    connector
        .make_service_request(
            &groups_scopes(),
            &format!("{base}/scores"),
            Some(&body),
            "application/json",
            "application/vnd.ims.lis.v1.score+json",
        )
        .unwrap();

    let captured = handle.join().unwrap();
    assert_eq!(captured.method, "POST");
    assert_eq!(
        captured.content_type.as_deref(),
        Some("application/vnd.ims.lis.v1.score+json")
    );
    let sent: Value = serde_json::from_str(&captured.body).unwrap();
    assert_eq!(sent, body);
}

/// Tests that the next-page URL is read from the `rel="next"` link entry.
#[test]
fn next_page_url_follows_the_next_link_relation() {
    let link = r#"<https://lms.example/groups?page=2>; rel="next", <https://lms.example/groups>; rel="first""#;
    let (base, handle) = spawn_service_server(r#"{"groups":[]}"#, 200, Some(link));
    let connector = ServiceConnector::new(local_registration(&base)).unwrap();

    let page = connector
        .make_service_request(
            &groups_scopes(),
            &format!("{base}/groups"),
            None,
            "application/json",
            "application/json",
        )
        .unwrap();
    assert_eq!(
        page.next_page_url.as_deref(),
        Some("https://lms.example/groups?page=2")
    );

    handle.join().unwrap();
}

/// Tests that an unquoted next relation parameter is recognized.
#[test]
fn unquoted_next_link_relation_is_recognized() {
    let link = "<https://lms.example/groups?page=2>; rel=next";
    let (base, handle) = spawn_service_server(r#"{"groups":[]}"#, 200, Some(link));
    let connector = ServiceConnector::new(local_registration(&base)).unwrap();

    let page = connector
        .make_service_request(
            &groups_scopes(),
            &format!("{base}/groups"),
            None,
            "application/json",
            "application/json",
        )
        .unwrap();
    assert_eq!(
        page.next_page_url.as_deref(),
        Some("https://lms.example/groups?page=2")
    );

    handle.join().unwrap();
}

/// Tests that link entries without a next relation yield no next page.
#[test]
fn pages_without_next_relation_have_no_next_url() {
    let link = r#"<https://lms.example/groups>; rel="prev""#;
    let (base, handle) = spawn_service_server(r#"{"groups":[]}"#, 200, Some(link));
    let connector = ServiceConnector::new(local_registration(&base)).unwrap();

    let page = connector
        .make_service_request(
            &groups_scopes(),
            &format!("{base}/groups"),
            None,
            "application/json",
            "application/json",
        )
        .unwrap();
    assert!(page.next_page_url.is_none());

    handle.join().unwrap();
}

/// Tests that a non-success service status is surfaced with its status,
/// URL, and body.
#[test]
fn non_success_service_status_is_an_error() {
    let (base, handle) = spawn_service_server("denied", 403, None);
    let connector = ServiceConnector::new(local_registration(&base)).unwrap();

    let err = connector
        .make_service_request(
            &groups_scopes(),
            &format!("{base}/groups"),
            None,
            "application/json",
            "application/json",
        )
        .unwrap_err();
    let ServiceError::ServiceStatus {
        url,
        status,
        body,
    } = err
    else {
        panic!("expected a service status error, got {err:?}");
    };
    assert!(url.ends_with("/groups"));
    assert_eq!(status, 403);
    assert_eq!(body, "denied");

    handle.join().unwrap();
}

/// Tests that an empty response body decodes to an empty JSON object.
#[test]
fn empty_response_body_decodes_to_an_empty_object() {
    let (base, handle) = spawn_service_server("", 200, None);
    let connector = ServiceConnector::new(local_registration(&base)).unwrap();

    let page = connector
        .make_service_request(
            &groups_scopes(),
            &format!("{base}/groups"),
            None,
            "application/json",
            "application/json",
        )
        .unwrap();
    assert_eq!(page.body, json!({}));

    handle.join().unwrap();
}
