use crate::auth::AuthKeys;
use crate::router::create_router;
use crate::schemas::AppState;
use axum::Router;
use axum::http::{HeaderName, HeaderValue, StatusCode, header};
use axum_test::TestServer;
use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection};
use serde_json::{Value, json};
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

pub const TEST_PASSWORD: &str = "correct-horse";

/// Create an in-memory SQLite database for testing
pub async fn setup_test_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("Failed to connect to in-memory database");

    db.execute_unprepared("PRAGMA foreign_keys = ON;")
        .await
        .expect("Failed to enable foreign keys");

    Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");

    db
}

/// Create AppState for testing
pub async fn setup_test_app_state() -> AppState {
    AppState {
        db: setup_test_db().await,
        auth: AuthKeys::new("test-secret", 30).with_hash_cost(4),
        request_timeout: Duration::from_secs(30),
    }
}

/// Installs a stderr subscriber once per test binary.
///
/// The level comes from RUST_LOG and defaults to WARN.
fn init_test_tracing() {
    let log_level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|level| match level.to_uppercase().as_str() {
            "ERROR" => Some(Level::ERROR),
            "WARN" => Some(Level::WARN),
            "INFO" => Some(Level::INFO),
            "DEBUG" => Some(Level::DEBUG),
            "TRACE" => Some(Level::TRACE),
            _ => None,
        })
        .unwrap_or(Level::WARN);

    let _ = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Create axum app for testing
pub async fn setup_test_app() -> Router {
    init_test_tracing();
    create_router(setup_test_app_state().await)
}

pub async fn setup_test_server() -> TestServer {
    TestServer::new(setup_test_app().await).expect("Failed to start test server")
}

pub fn bearer(token: &str) -> (HeaderName, HeaderValue) {
    let value = HeaderValue::from_str(&format!("Bearer {}", token))
        .expect("Token is a valid header value");
    (header::AUTHORIZATION, value)
}

/// A registered user with a valid token.
pub struct TestUser {
    pub id: i64,
    pub token: String,
}

pub async fn register_and_login(server: &TestServer, username: &str) -> TestUser {
    let response = server
        .post("/api/v1/register")
        .json(&json!({
            "username": username,
            "email": format!("{}@example.com", username),
            "password": TEST_PASSWORD,
        }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    let id = body["data"]["id"].as_i64().expect("user id");

    let response = server
        .post("/api/v1/login")
        .json(&json!({ "username": username, "password": TEST_PASSWORD }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    let token = body["data"]["access_token"]
        .as_str()
        .expect("access token")
        .to_string();

    TestUser { id, token }
}

/// POSTs `body` as `user` and returns the `data` of the response.
pub async fn post_as(server: &TestServer, user: &TestUser, path: &str, body: Value) -> Value {
    let (name, value) = bearer(&user.token);
    let response = server.post(path).add_header(name, value).json(&body).await;
    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    body["data"].clone()
}

pub async fn get_as(server: &TestServer, user: &TestUser, path: &str) -> Value {
    let (name, value) = bearer(&user.token);
    let response = server.get(path).add_header(name, value).await;
    response.assert_status_ok();
    let body: Value = response.json();
    body["data"].clone()
}

pub async fn create_category(server: &TestServer, user: &TestUser, name: &str) -> i64 {
    let data = post_as(server, user, "/api/v1/categories", json!({ "name": name })).await;
    data["id"].as_i64().expect("category id")
}

pub async fn create_goal(server: &TestServer, user: &TestUser, title: &str) -> i64 {
    let data = post_as(
        server,
        user,
        "/api/v1/goals",
        json!({ "title": title, "target_amount": "1000", "due_date": "2030-01-01" }),
    )
    .await;
    data["id"].as_i64().expect("goal id")
}
