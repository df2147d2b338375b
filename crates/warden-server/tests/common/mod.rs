//! Common utilities for warden server integration tests
//!
//! Every test gets its own in-memory store, registry and audit log, so
//! tests are independent and need no database.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use warden_server::{
    api::{create_router, AppState},
    config::{AccessPath, Config, Enforcement},
};

pub struct TestServer {
    pub state: AppState,
    pub router: Router,
}

impl TestServer {
    pub fn start(config: Config) -> Self {
        let state = AppState::in_memory(config);
        let router = create_router(state.clone());
        Self { state, router }
    }

    /// Warden enforcement on the given access path.
    pub fn warden(access_path: AccessPath) -> Self {
        let mut config = Config::default();
        config.warden.access_path = access_path;
        Self::start(config)
    }

    pub fn vanilla(access_path: AccessPath) -> Self {
        let mut config = Config::default();
        config.warden.access_path = access_path;
        config.warden.enforcement = Enforcement::Vanilla;
        Self::start(config)
    }

    pub async fn send(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, body)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Method::GET, uri, None).await
    }

    pub async fn post(&self, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        self.send(Method::POST, uri, body).await
    }

    pub async fn delete(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Method::DELETE, uri, None).await
    }

    pub async fn protect(&self, table: &str) {
        let (status, body) = self.post(&format!("/api/protection/protect/{table}"), None).await;
        assert_eq!(status, StatusCode::OK, "{body}");
    }

    pub async fn unprotect(&self, table: &str) {
        let (status, body) = self.post(&format!("/api/protection/unprotect/{table}"), None).await;
        assert_eq!(status, StatusCode::OK, "{body}");
    }
}
