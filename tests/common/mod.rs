// tests/common/mod.rs
#![allow(dead_code)]

use freelancex::{config::Config, routes, state::AppState};
use reqwest::{Response, StatusCode};
use serde_json::{Value, json};
use sqlx::{PgPool, postgres::PgPoolOptions};

pub const TEST_SECRET: &str = "test_secret_for_integration_tests";

pub struct TestApp {
    pub address: String,
    pub pool: PgPool,
    pub client: reqwest::Client,
}

pub struct TestUser {
    pub id: i64,
    pub email: String,
    pub token: String,
}

/// Spawns the app on a random port against the database in `DATABASE_URL`.
/// Returns `None` (and the test passes vacuously) when no database is configured.
pub async fn spawn_app() -> Option<TestApp> {
    spawn_app_with(true).await
}

pub async fn spawn_app_with(strict_status_transitions: bool) -> Option<TestApp> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set; skipping database-backed test");
        return None;
    };

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to Postgres for testing.");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    let config = Config {
        database_url,
        jwt_secret: TEST_SECRET.to_string(),
        jwt_expiration: 600,
        rust_log: "error".to_string(),
        port: 0,
        request_timeout_secs: 30,
        cors_origins: vec!["http://localhost:3000".to_string()],
        strict_status_transitions,
    };

    let app = routes::create_router(AppState::new(pool.clone(), config));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Some(TestApp {
        address: format!("http://127.0.0.1:{}", port),
        pool,
        client: reqwest::Client::new(),
    })
}

pub fn unique_email(prefix: &str) -> String {
    format!("{}_{}@example.com", prefix, &uuid::Uuid::new_v4().simple().to_string()[..12])
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> Response {
        let mut request = self.client.get(self.url(path));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        request.send().await.expect("Failed to execute request")
    }

    pub async fn post(&self, path: &str, token: Option<&str>, body: Value) -> Response {
        let mut request = self.client.post(self.url(path)).json(&body);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        request.send().await.expect("Failed to execute request")
    }

    pub async fn put(&self, path: &str, token: &str, body: Value) -> Response {
        self.client
            .put(self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn delete(&self, path: &str, token: &str) -> Response {
        self.client
            .delete(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Registers a fresh account with the given role and logs it in.
    pub async fn register(&self, role: &str) -> TestUser {
        let email = unique_email(role);
        let response = self
            .post(
                "/api/auth/register",
                None,
                json!({
                    "name": format!("Test {}", role),
                    "email": email,
                    "password": "password123",
                    "role": role
                }),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let token = self.login(&email, "password123").await;
        let me: Value = self
            .get("/api/users/me", Some(&token))
            .await
            .json()
            .await
            .unwrap();

        TestUser {
            id: me["id"].as_i64().unwrap(),
            email,
            token,
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> String {
        let response = self
            .post(
                "/api/auth/login",
                None,
                json!({ "email": email, "password": password }),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = response.json().await.unwrap();
        body["token"].as_str().unwrap().to_string()
    }

    /// Creates a listing owned by `seller` and returns its id.
    pub async fn create_service(&self, seller: &TestUser, price: f64, delivery_time: &str) -> i64 {
        self.create_service_with(seller, json!({
            "title": "Logo design",
            "description": "A clean vector logo",
            "category": "design",
            "price": price,
            "deliveryTime": delivery_time,
            "tags": ["Logo", "vector"]
        }))
        .await
    }

    pub async fn create_service_with(&self, seller: &TestUser, body: Value) -> i64 {
        let response = self.post("/api/services", Some(&seller.token), body).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let body: Value = response.json().await.unwrap();
        body["id"].as_i64().unwrap()
    }

    /// Places an order as `buyer` and returns the created order document.
    pub async fn create_order(&self, buyer: &TestUser, service_id: i64) -> Value {
        let response = self
            .post(
                "/api/orders",
                Some(&buyer.token),
                json!({ "serviceId": service_id, "requirements": "Blue and white" }),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        response.json().await.unwrap()
    }

    pub async fn set_status(&self, user: &TestUser, order_id: i64, status: &str) -> Response {
        self.put(
            &format!("/api/orders/{}/status", order_id),
            &user.token,
            json!({ "status": status }),
        )
        .await
    }

    /// Drives an order through accepted and in-progress to completed.
    pub async fn complete(&self, seller: &TestUser, order_id: i64) {
        for status in ["accepted", "in-progress", "completed"] {
            let response = self.set_status(seller, order_id, status).await;
            assert_eq!(response.status(), StatusCode::OK, "moving to {}", status);
        }
    }

    /// A buyer, a seller and one order between them, ready for lifecycle tests.
    pub async fn order_fixture(&self, price: f64) -> (TestUser, TestUser, i64, i64) {
        let seller = self.register("freelancer").await;
        let buyer = self.register("client").await;
        let service_id = self.create_service(&seller, price, "3 days").await;
        let order = self.create_order(&buyer, service_id).await;
        let order_id = order["id"].as_i64().unwrap();
        (buyer, seller, service_id, order_id)
    }
}

pub async fn message_of(response: Response) -> String {
    let body: Value = response.json().await.unwrap();
    body["message"].as_str().unwrap_or_default().to_string()
}
