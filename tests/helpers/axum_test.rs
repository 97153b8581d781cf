// ABOUTME: Axum HTTP testing utilities for integration tests
// ABOUTME: Builds requests and executes them against routers without a running server
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 German Neuroinformatics Node (G-Node)

use axum::body::Body;
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tower::ServiceExt;

/// Helper to build and execute HTTP requests against axum routers
pub struct TestRequest {
    method: Method,
    uri: String,
    headers: Vec<(String, String)>,
    body: Option<(String, String)>,
}

impl TestRequest {
    pub fn get(uri: &str) -> Self {
        Self::new(Method::GET, uri)
    }

    pub fn post(uri: &str) -> Self {
        Self::new(Method::POST, uri)
    }

    pub fn put(uri: &str) -> Self {
        Self::new(Method::PUT, uri)
    }

    fn new(method: Method, uri: &str) -> Self {
        Self {
            method,
            uri: uri.to_owned(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn header(mut self, key: &str, value: &str) -> Self {
        self.headers.push((key.to_owned(), value.to_owned()));
        self
    }

    pub fn bearer(self, token: &str) -> Self {
        self.header("authorization", &format!("Bearer {token}"))
    }

    /// Attach an `application/x-www-form-urlencoded` body
    pub fn form<T: Serialize>(mut self, payload: &T) -> Self {
        let encoded = serde_urlencoded::to_string(payload).expect("form serialization");
        self.body = Some((
            "application/x-www-form-urlencoded".to_owned(),
            encoded,
        ));
        self
    }

    /// Attach a JSON body
    pub fn json<T: Serialize>(mut self, payload: &T) -> Self {
        let encoded = serde_json::to_string(payload).expect("json serialization");
        self.body = Some(("application/json".to_owned(), encoded));
        self
    }

    /// Execute against the router and collect the response
    pub async fn send(self, router: Router) -> TestResponse {
        let mut builder = Request::builder().method(self.method).uri(self.uri);
        for (key, value) in self.headers {
            builder = builder.header(key, value);
        }
        let request = match self.body {
            Some((content_type, body)) => builder
                .header(header::CONTENT_TYPE, content_type)
                .body(Body::from(body)),
            None => builder.body(Body::empty()),
        }
        .expect("request construction");

        let response = router.oneshot(request).await.expect("router call");
        let (parts, body) = response.into_parts();
        let bytes = body.collect().await.expect("body collection").to_bytes();
        TestResponse {
            status: parts.status,
            headers: parts.headers,
            body: bytes.to_vec(),
        }
    }
}

/// Collected response: status, headers, and the full body
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn json<T: DeserializeOwned>(&self) -> T {
        serde_json::from_slice(&self.body).expect("json response body")
    }

    /// The `Location` header of a redirect response
    pub fn location(&self) -> String {
        self.headers
            .get(header::LOCATION)
            .expect("location header")
            .to_str()
            .expect("location header encoding")
            .to_owned()
    }
}
