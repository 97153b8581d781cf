// ABOUTME: HTTP integration tests for the /oauth endpoints
// ABOUTME: Drives the authorization-code flow over the wire and checks the token endpoint
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 German Neuroinformatics Node (G-Node)

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;
mod helpers;

use axum::http::StatusCode;
use axum::Router;
use base64::{engine::general_purpose, Engine as _};
use common::{
    harness, query_param, TestHarness, ALICE_PASSWORD, CLI_CLIENT, CLI_SECRET, UI_CLIENT,
    UI_REDIRECT, UI_SECRET,
};
use helpers::axum_test::TestRequest;
use serde_json::{json, Value};

fn router(h: &TestHarness) -> Router {
    gin_auth::routes::router(h.state.clone())
}

/// Drive authorize → login → approve over HTTP, returning the code
async fn obtain_code(h: &TestHarness) -> String {
    let response = TestRequest::post("/oauth/authorize")
        .form(&json!({
            "response_type": "code",
            "client_id": UI_CLIENT,
            "redirect_uri": UI_REDIRECT,
            "scope": "account-read repo-read",
            "state": "xyz",
        }))
        .send(router(h))
        .await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    let location = response.location();
    assert!(location.contains("/oauth/login_page"));
    let grant_token = query_param(&location, "grant_request").unwrap();

    let response = TestRequest::post("/oauth/login")
        .form(&json!({
            "grant_request": grant_token,
            "login": "alice",
            "password": ALICE_PASSWORD,
        }))
        .send(router(h))
        .await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert!(response.location().contains("/oauth/approve_page"));

    let response = TestRequest::post("/oauth/approve")
        .form(&json!({
            "grant_request": grant_token,
            "scope": "account-read",
        }))
        .send(router(h))
        .await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    let location = response.location();
    assert!(location.starts_with(UI_REDIRECT));
    assert_eq!(query_param(&location, "state").unwrap(), "xyz");
    query_param(&location, "code").unwrap()
}

#[tokio::test]
async fn authorization_code_flow_over_http() {
    let h = harness().await;
    let code = obtain_code(&h).await;

    let response = TestRequest::post("/oauth/token")
        .form(&json!({
            "grant_type": "authorization_code",
            "code": code,
            "redirect_uri": UI_REDIRECT,
            "client_id": UI_CLIENT,
            "client_secret": UI_SECRET,
        }))
        .send(router(&h))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["scope"], "account-read");
    assert!(body["refresh_token"].is_string());
    let access_token = body["access_token"].as_str().unwrap().to_owned();

    // Introspection resolves the principal
    let response = TestRequest::get(&format!("/oauth/validate/{access_token}"))
        .send(router(&h))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    let info: Value = response.json();
    assert_eq!(info["kind"], "account");
    assert_eq!(info["subject"], "alice");
    assert_eq!(info["scope"], "account-read");
    assert!(info["expires_in"].as_i64().unwrap() > 0);
}

#[tokio::test]
async fn code_reuse_is_a_400_over_http() {
    let h = harness().await;
    let code = obtain_code(&h).await;
    let form = json!({
        "grant_type": "authorization_code",
        "code": code,
        "redirect_uri": UI_REDIRECT,
        "client_id": UI_CLIENT,
        "client_secret": UI_SECRET,
    });

    let response = TestRequest::post("/oauth/token")
        .form(&form)
        .send(router(&h))
        .await;
    assert_eq!(response.status, StatusCode::OK);

    let response = TestRequest::post("/oauth/token")
        .form(&form)
        .send(router(&h))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"], "unknown_code");
}

#[tokio::test]
async fn token_endpoint_accepts_basic_auth() {
    let h = harness().await;
    let encoded = general_purpose::STANDARD.encode(format!("{CLI_CLIENT}:{CLI_SECRET}"));

    let response = TestRequest::post("/oauth/token")
        .header("authorization", &format!("Basic {encoded}"))
        .form(&json!({
            "grant_type": "password",
            "username": "alice",
            "password": ALICE_PASSWORD,
            "scope": "repo-read",
        }))
        .send(router(&h))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["scope"], "repo-read");
}

#[tokio::test]
async fn token_endpoint_rejects_missing_client_auth() {
    let h = harness().await;
    let response = TestRequest::post("/oauth/token")
        .form(&json!({
            "grant_type": "client_credentials",
            "scope": "repo-read",
        }))
        .send(router(&h))
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn refresh_exchange_over_http() {
    let h = harness().await;
    let code = obtain_code(&h).await;
    let response = TestRequest::post("/oauth/token")
        .form(&json!({
            "grant_type": "authorization_code",
            "code": code,
            "redirect_uri": UI_REDIRECT,
            "client_id": UI_CLIENT,
            "client_secret": UI_SECRET,
        }))
        .send(router(&h))
        .await;
    let body: Value = response.json();
    let refresh = body["refresh_token"].as_str().unwrap().to_owned();

    let response = TestRequest::post("/oauth/token")
        .form(&json!({
            "grant_type": "refresh_token",
            "refresh_token": refresh,
            "client_id": UI_CLIENT,
            "client_secret": UI_SECRET,
        }))
        .send(router(&h))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    let rotated: Value = response.json();
    assert_ne!(rotated["access_token"], body["access_token"]);

    // Old refresh token is burned
    let response = TestRequest::post("/oauth/token")
        .form(&json!({
            "grant_type": "refresh_token",
            "refresh_token": refresh,
            "client_id": UI_CLIENT,
            "client_secret": UI_SECRET,
        }))
        .send(router(&h))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unsupported_grant_type_is_malformed() {
    let h = harness().await;
    let response = TestRequest::post("/oauth/token")
        .form(&json!({
            "grant_type": "device_code",
            "client_id": UI_CLIENT,
            "client_secret": UI_SECRET,
        }))
        .send(router(&h))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"], "malformed");
}

#[tokio::test]
async fn validate_unknown_token_is_unauthenticated() {
    let h = harness().await;
    let response = TestRequest::get("/oauth/validate/doesnotexist")
        .send(router(&h))
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn authorize_rejects_unknown_client_over_http() {
    let h = harness().await;
    let response = TestRequest::post("/oauth/authorize")
        .form(&json!({
            "response_type": "code",
            "client_id": "nope",
            "redirect_uri": UI_REDIRECT,
            "scope": "account-read",
            "state": "xyz",
        }))
        .send(router(&h))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"], "unknown_client");
}
