//! Common test utilities for integration tests
//!
//! This module provides shared infrastructure for integration tests:
//! - An application over a fresh in-memory store
//! - A bootstrapped admin account and its session token
//! - Request helpers returning status and JSON body
//! - Member registration and login shortcuts

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;
use trustledger_api::app::{build_router, AppState};
use trustledger_api::config::Config;
use trustledger_shared::store::memory::MemoryStore;

pub const ADMIN_USERNAME: &str = "trustadmin";
pub const ADMIN_PASSWORD: &str = "admin-password";

/// Test context containing all necessary resources
pub struct TestContext {
    pub app: axum::Router,
    pub state: AppState,
    pub admin_token: String,
}

impl TestContext {
    /// Creates a new test context over an empty in-memory store
    pub async fn new() -> anyhow::Result<Self> {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("STORE_BACKEND", "memory"),
            ("JWT_SECRET", "integration-test-secret-at-least-32-bytes"),
            ("ADMIN_USERNAME", ADMIN_USERNAME),
            ("ADMIN_PASSWORD", ADMIN_PASSWORD),
        ]);
        let config = Config::from_lookup(|key| vars.get(key).map(|v| v.to_string()))?;

        let state = AppState::new(Arc::new(MemoryStore::new()), config);
        state.ledger.bootstrap_admin(ADMIN_USERNAME, ADMIN_PASSWORD).await?;

        let app = build_router(state.clone());

        let mut ctx = TestContext {
            app,
            state,
            admin_token: String::new(),
        };
        ctx.admin_token = ctx.login(ADMIN_USERNAME, ADMIN_PASSWORD).await?;

        Ok(ctx)
    }

    /// Sends a request and returns the status with the parsed JSON body
    ///
    /// Empty bodies come back as `Value::Null`.
    pub async fn send(&self, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }

        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };

        (status, value)
    }

    /// Sends a request with the admin session
    pub async fn admin(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        self.send(method, uri, Some(&self.admin_token), body).await
    }

    /// Logs in and returns the session token
    pub async fn login(&self, phone: &str, password: &str) -> anyhow::Result<String> {
        let (status, body) = self
            .send(
                "POST",
                "/api/auth/login",
                None,
                Some(json!({ "phone": phone, "password": password })),
            )
            .await;

        if status != StatusCode::OK {
            anyhow::bail!("login failed with {}: {}", status, body);
        }

        body["token"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("login response without token: {}", body))
    }

    /// Registers a member as admin and returns the response body
    pub async fn create_member(&self, name: &str, phone: &str) -> Value {
        let (status, body) = self.admin("POST", "/api/members", Some(member_body(name, phone))).await;
        assert_eq!(status, StatusCode::CREATED, "unexpected response: {}", body);
        body
    }

    /// Records a payment as admin and returns the response body
    pub async fn record_payment(&self, member_id: i64, amount: &str) -> (StatusCode, Value) {
        self.admin(
            "POST",
            "/api/payments",
            Some(json!({
                "member_id": member_id,
                "amount": amount,
                "payment_method": "UPI",
            })),
        )
        .await
    }
}

/// Registration body; the initial password is `member-pass`
pub fn member_body(name: &str, phone: &str) -> Value {
    json!({
        "name": name,
        "phone": phone,
        "password": "member-pass",
        "date_of_birth": "1975-04-12",
        "address": "12 Temple Street, Madurai",
        "father_name": "Subramani",
        "children": [
            { "name": "Anitha", "date_of_birth": "2005-08-01", "gender": "Female" }
        ]
    })
}

pub fn id_of(value: &Value) -> i64 {
    value["id"].as_i64().expect("response has an id")
}
