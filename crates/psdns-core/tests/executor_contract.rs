//! Contract Test: Authenticated Request Executor
//!
//! Runs the executor against a wiremock server acting as both the token
//! endpoint and the API.
//!
//! Constraints verified:
//! - Every call carries a bearer token and fresh correlation identifiers
//! - Only body-carrying methods declare a JSON content type
//! - Anything but 200 is a `NonOk` failure, including other 2xx codes
//! - Tokens about to expire are refreshed before the call
//! - Cancellation aborts an in-flight call

mod common;

use std::time::{Duration, Instant};

use common::*;
use psdns_core::client::Client;
use psdns_core::error::Error;
use reqwest::Method;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use wiremock::matchers::{body_json, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

const SEGMENT: &str = "dnsEntityService";

async fn api_requests(server: &MockServer) -> Vec<Request> {
    server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|request| request.url.path().starts_with("/dnsEntityService/"))
        .collect()
}

fn header_value(request: &Request, name: &str) -> Option<String> {
    request
        .headers
        .get(name)
        .map(|value| value.to_str().unwrap().to_string())
}

#[tokio::test]
async fn every_call_carries_bearer_and_fresh_trace_ids() {
    let server = MockServer::start().await;
    mount_password_grant(&server, "tok-1", 3600).await;
    Mock::given(method("GET"))
        .and(path("/dnsEntityService/dnsDomains/42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(2)
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    let client = Client::connect(&config(&server), SEGMENT, &cancel).await.unwrap();
    client.execute(Method::GET, "dnsDomains/42", None, &cancel).await.unwrap();
    client.execute(Method::GET, "/dnsDomains/42", None, &cancel).await.unwrap();

    let requests = api_requests(&server).await;
    assert_eq!(requests.len(), 2);

    let mut seen = Vec::new();
    for request in &requests {
        assert_eq!(
            header_value(request, "authorization").as_deref(),
            Some("Bearer tok-1")
        );
        assert_eq!(
            header_value(request, "x-transaction-caller").as_deref(),
            Some("psdns")
        );
        assert_eq!(header_value(request, "content-type"), None);

        let message_id = header_value(request, "x-message-id").unwrap();
        let transaction_id = header_value(request, "x-transaction-id").unwrap();
        Uuid::parse_str(&message_id).unwrap();
        Uuid::parse_str(&transaction_id).unwrap();
        seen.push(message_id);
        seen.push(transaction_id);
    }
    seen.sort();
    seen.dedup();
    assert_eq!(seen.len(), 4, "correlation identifiers must never repeat");
}

#[tokio::test]
async fn content_type_only_on_body_methods() {
    let server = MockServer::start().await;
    mount_password_grant(&server, "tok-1", 3600).await;
    Mock::given(path("/dnsEntityService/dnsResourceRecords/42/r1"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    let client = Client::connect(&config(&server), SEGMENT, &cancel).await.unwrap();
    let body = Some(br#"{"dnsResourceRecord":{"content":"1.2.3.4","ttl":300}}"#.to_vec());

    client
        .execute(Method::PUT, "dnsResourceRecords/42/r1", body.clone(), &cancel)
        .await
        .unwrap();
    client
        .execute(Method::DELETE, "dnsResourceRecords/42/r1", body, &cancel)
        .await
        .unwrap();

    let requests = api_requests(&server).await;
    assert_eq!(requests.len(), 2);

    assert_eq!(requests[0].method.as_str(), "PUT");
    assert_eq!(
        header_value(&requests[0], "content-type").as_deref(),
        Some("application/json")
    );
    assert!(!requests[0].body.is_empty());

    assert_eq!(requests[1].method.as_str(), "DELETE");
    assert_eq!(header_value(&requests[1], "content-type"), None);
    assert!(requests[1].body.is_empty());
}

#[tokio::test]
async fn call_marshals_request_and_unmarshals_response() {
    let server = MockServer::start().await;
    mount_password_grant(&server, "tok-1", 3600).await;
    Mock::given(method("POST"))
        .and(path("/dnsEntityService/dnsDomains/search"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({"dnsDomainSearchList": [{"nameList": ["example.com"]}]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"count": 3})))
        .expect(1)
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    let client = Client::connect(&config(&server), SEGMENT, &cancel).await.unwrap();

    let response: serde_json::Value = client
        .call(
            Method::POST,
            "dnsDomains/search",
            Some(&json!({"dnsDomainSearchList": [{"nameList": ["example.com"]}]})),
            &cancel,
        )
        .await
        .unwrap();
    assert_eq!(response["count"], 3);
}

#[tokio::test]
async fn malformed_response_is_a_decode_error() {
    let server = MockServer::start().await;
    mount_password_grant(&server, "tok-1", 3600).await;
    Mock::given(method("GET"))
        .and(path("/dnsEntityService/dnsDomains/42"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    let client = Client::connect(&config(&server), SEGMENT, &cancel).await.unwrap();

    let err = client
        .call::<(), serde_json::Value>(Method::GET, "dnsDomains/42", None, &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Decode { path: ref failed, .. } if failed == "dnsDomains/42"));
}

#[tokio::test]
async fn any_status_but_200_is_non_ok() {
    let server = MockServer::start().await;
    mount_password_grant(&server, "tok-1", 3600).await;
    Mock::given(method("POST"))
        .and(path("/dnsEntityService/dnsDomains"))
        .respond_with(ResponseTemplate::new(201).set_body_string("created"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/dnsEntityService/dnsDomains/404"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such domain"))
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    let client = Client::connect(&config(&server), SEGMENT, &cancel).await.unwrap();

    let err = client
        .execute(Method::POST, "dnsDomains", Some(b"{}".to_vec()), &cancel)
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(201));

    let err = client
        .execute(Method::GET, "dnsDomains/404", None, &cancel)
        .await
        .unwrap_err();
    match err {
        Error::NonOk { status, url, body } => {
            assert_eq!(status, 404);
            assert!(url.ends_with("/dnsEntityService/dnsDomains/404"));
            assert_eq!(body.as_deref(), Some("no such domain"));
        }
        other => panic!("expected NonOk, got {:?}", other),
    }
}

#[tokio::test]
async fn rejected_credentials_are_an_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Invalid user credentials",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = Client::connect(&config(&server), SEGMENT, &CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        Error::Auth { endpoint, message } => {
            assert!(endpoint.ends_with("/token"));
            assert!(message.contains("invalid_grant"), "{}", message);
        }
        other => panic!("expected Auth, got {:?}", other),
    }
}

#[tokio::test]
async fn password_grant_sends_client_credentials_in_form() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=password"))
        .and(body_string_contains("client_id=psdns-client"))
        .and(body_string_contains("client_secret=client-secret"))
        .and(body_string_contains("username=operator"))
        .and(body_string_contains("password=hunter2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "tok-1",
            "token_type": "Bearer",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = Client::connect(&config(&server), SEGMENT, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(
        client.session().token_url(),
        format!("{}/token", server.uri())
    );
}

#[tokio::test]
async fn expiring_token_is_refreshed_before_the_call() {
    let server = MockServer::start().await;
    // Expires inside the refresh threshold
    mount_password_grant(&server, "tok-1", 5).await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=tok-1-refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "tok-2",
            "token_type": "Bearer",
            "expires_in": 3600,
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/dnsEntityService/dnsDomains/42"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    let client = Client::connect(&config(&server), SEGMENT, &cancel).await.unwrap();
    client.execute(Method::GET, "dnsDomains/42", None, &cancel).await.unwrap();
    client.execute(Method::GET, "dnsDomains/42", None, &cancel).await.unwrap();

    for request in api_requests(&server).await {
        assert_eq!(
            header_value(&request, "authorization").as_deref(),
            Some("Bearer tok-2")
        );
    }
}

#[tokio::test]
async fn failed_refresh_falls_back_to_password_grant() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=password"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "tok-1",
            "expires_in": 5,
            "refresh_token": "stale",
        })))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "invalid_grant"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/dnsEntityService/dnsDomains/42"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    let client = Client::connect(&config(&server), SEGMENT, &cancel).await.unwrap();
    client.execute(Method::GET, "dnsDomains/42", None, &cancel).await.unwrap();
}

#[tokio::test]
async fn cancellation_aborts_in_flight_call() {
    let server = MockServer::start().await;
    mount_password_grant(&server, "tok-1", 3600).await;
    Mock::given(method("GET"))
        .and(path("/dnsEntityService/dnsDomains/42"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(4)))
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    let client = Client::connect(&config(&server), SEGMENT, &cancel).await.unwrap();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let err = client
        .execute(Method::GET, "dnsDomains/42", None, &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn unreachable_api_is_a_retryable_transport_error() {
    let server = MockServer::start().await;
    mount_password_grant(&server, "tok-1", 3600).await;

    let cancel = CancellationToken::new();
    let connected = Client::connect(&config(&server), SEGMENT, &cancel).await.unwrap();
    let client = Client::new("http://127.0.0.1:1", SEGMENT, connected.session().clone());

    let err = client
        .execute(Method::GET, "dnsDomains/42", None, &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Transport(_)), "got {:?}", err);
    assert!(err.is_retryable());
}
