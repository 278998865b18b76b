//! Common test utilities for invoicing-service integration tests.
#![allow(dead_code)]

use invoicing_service::config::InvoicingConfig;
use invoicing_service::startup::Application;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::{Method, RequestBuilder, Response};
use serde_json::{json, Value};
use service_core::middleware::auth::AccessTokenClaims;
use std::sync::Once;

static INIT: Once = Once::new();

pub const TEST_JWT_SECRET: &str = "integration-test-secret";

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,invoicing_service=debug")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Mint an HS256 access token for `subject`, valid for `ttl_secs` (negative = already expired).
pub fn mint_token(secret: &str, subject: &str, ttl_secs: i64) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = AccessTokenClaims {
        sub: subject.to_string(),
        exp: now + ttl_secs,
        iat: Some(now),
        jti: Some(uuid::Uuid::new_v4().to_string()),
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("Failed to sign test token")
}

/// Test application wrapper.
pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub client: reqwest::Client,
    pub token: String,
}

/// Spawn the application on a random port with the in-memory store.
pub async fn spawn_app() -> TestApp {
    init_tracing();

    let mut config = InvoicingConfig::in_memory(TEST_JWT_SECRET);
    config.common.host = "127.0.0.1".to_string();
    config.common.port = 0;

    let app = Application::build(config)
        .await
        .expect("Failed to build application");
    let port = app.port();

    tokio::spawn(async move {
        app.run_until_stopped().await.ok();
    });

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        port,
        client: reqwest::Client::new(),
        token: mint_token(TEST_JWT_SECRET, "test-clerk", 600),
    }
}

impl TestApp {
    /// Request with the default bearer token attached.
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.address, path))
            .bearer_auth(&self.token)
    }

    /// Request with no Authorization header.
    pub fn anonymous(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.address, path))
    }

    pub async fn create_invoice(&self, body: &Value) -> Response {
        self.request(Method::POST, "/invoices")
            .json(body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Create the standard two-item invoice (total 40.00) and return its JSON.
    pub async fn create_sample_invoice(&self) -> Value {
        let response = self.create_invoice(&sample_invoice()).await;
        assert_eq!(response.status().as_u16(), 201);
        response.json().await.expect("Invalid JSON")
    }

    pub async fn pay(&self, invoice_id: &str) -> Response {
        self.request(Method::POST, &format!("/invoices/{}/pay", invoice_id))
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn get_json(&self, path: &str) -> (u16, Value) {
        let response = self
            .request(Method::GET, path)
            .send()
            .await
            .expect("Failed to execute request");
        let status = response.status().as_u16();
        let body = response.json().await.unwrap_or(Value::Null);
        (status, body)
    }
}

/// Items [("A", 2, 10.00), ("B", 1, 20.00)].
pub fn sample_invoice() -> Value {
    json!({
        "customer_name": "Acme Corp",
        "items": [
            { "description": "A", "quantity": 2, "unit_price": "10.00" },
            { "description": "B", "quantity": 1, "unit_price": "20.00" }
        ]
    })
}
