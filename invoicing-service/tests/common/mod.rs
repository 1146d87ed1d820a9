//! Common test utilities for invoicing-service integration tests.

#![allow(dead_code)]

use invoicing_service::config::InvoicingConfig;
use invoicing_service::models::Role;
use invoicing_service::services::MemoryStore;
use invoicing_service::startup::Application;
use serde_json::{json, Value};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, Once};
use uuid::Uuid;

static INIT: Once = Once::new();

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

pub struct TestApp {
    pub address: String,
    pub client: reqwest::Client,
    pub store: Arc<MemoryStore>,
}

impl TestApp {
    /// Spawn the service on a random port with in-memory storage.
    pub async fn spawn() -> Self {
        init_tracing();

        let mut config = InvoicingConfig::in_memory("integration-test-secret");
        config.common.host = IpAddr::V4(Ipv4Addr::LOCALHOST);
        config.common.port = 0;

        let store = Arc::new(MemoryStore::new());
        let app = Application::build_with_store(config, store.clone())
            .await
            .expect("Failed to build application");
        let address = format!("http://127.0.0.1:{}", app.http_port());

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        let client = reqwest::Client::new();

        let mut attempts = 0;
        loop {
            match client.get(format!("{}/health", address)).send().await {
                Ok(resp) if resp.status().is_success() => break,
                _ if attempts < 20 => {
                    attempts += 1;
                    tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
                }
                _ => panic!("Server did not become healthy after 20 attempts"),
            }
        }

        Self {
            address,
            client,
            store,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub async fn register(&self, username: &str, password: &str, role: Role) -> reqwest::Response {
        self.client
            .post(self.url("/auth/register"))
            .json(&json!({ "username": username, "password": password, "role": role }))
            .send()
            .await
            .expect("Failed to send register request")
    }

    pub async fn login(&self, username: &str, password: &str) -> reqwest::Response {
        self.client
            .post(self.url("/auth/login"))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await
            .expect("Failed to send login request")
    }

    /// Register a fresh user with `role` and return a bearer token.
    pub async fn token_for(&self, role: Role) -> String {
        let username = format!("{}-{}", role, &Uuid::new_v4().simple().to_string()[..8]);
        let password = "s3cret-password";

        let resp = self.register(&username, password, role).await;
        assert_eq!(resp.status(), 201, "register failed");

        let body: Value = self.login(&username, password).await.json().await.unwrap();
        body["token"].as_str().expect("token missing").to_string()
    }

    pub async fn create_customer(&self, name: &str) -> Value {
        let resp = self
            .client
            .post(self.url("/clientes"))
            .json(&json!({
                "nombre": name,
                "direccion": "Calle Mayor 1",
                "telefono": "555-0100",
                "email": "cliente@example.com"
            }))
            .send()
            .await
            .expect("Failed to create customer");
        assert_eq!(resp.status(), 201);
        resp.json().await.unwrap()
    }

    pub async fn create_product(&self, token: &str, name: &str, price: f64, quantity: i32) -> Value {
        let resp = self
            .client
            .post(self.url("/productos"))
            .bearer_auth(token)
            .json(&json!({
                "nombre": name,
                "descripcion": "test product",
                "precio": price,
                "cantidad": quantity
            }))
            .send()
            .await
            .expect("Failed to create product");
        assert_eq!(resp.status(), 201);
        resp.json().await.unwrap()
    }

    pub async fn get_product(&self, token: &str, product_id: &str) -> Value {
        self.client
            .get(self.url(&format!("/productos/{}", product_id)))
            .bearer_auth(token)
            .send()
            .await
            .expect("Failed to get product")
            .json()
            .await
            .unwrap()
    }

    pub async fn post_invoice(&self, token: &str, body: &Value) -> reqwest::Response {
        self.client
            .post(self.url("/facturas"))
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .expect("Failed to send invoice request")
    }
}

/// Compare JSON money values without caring about float formatting.
pub fn money(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap(),
        Value::String(s) => s.parse().unwrap(),
        other => panic!("not a money value: {other}"),
    }
}

pub fn assert_money_eq(value: &Value, expected: f64) {
    let actual = money(value);
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}
