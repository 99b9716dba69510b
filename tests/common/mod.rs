#![allow(dead_code)]

use reqwest::Client;
use sea_orm::{ConnectionTrait, DatabaseConnection, Statement};
use sea_orm_migration::MigratorTrait;
use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Once,
};

static INIT: Once = Once::new();
static DB_SETUP: tokio::sync::OnceCell<()> = tokio::sync::OnceCell::const_new();

fn init_env() {
    INIT.call_once(|| {
        dotenv::dotenv().ok();
        std::env::set_var(
            "JWT_SECRET",
            "integration_test_secret_that_is_at_least_32_characters_long",
        );
        // Rate limiting off so rapid-fire test requests don't trip 429s
        std::env::set_var("RATE_LIMIT_ENABLED", "false");
        let config = versus::config::jwt::JwtConfig::from_env().unwrap();
        let _ = versus::utils::jwt::init_jwt_config(config);
    });
}

pub struct TestApp {
    pub addr: String,
    pub db: DatabaseConnection,
    pub client: Client,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.addr, path)
    }
}

pub async fn spawn_app() -> TestApp {
    init_env();

    let database_url = std::env::var("TEST_DATABASE_URL")
        .unwrap_or_else(|_| std::env::var("DATABASE_URL").expect("DATABASE_URL must be set"));

    let db = sea_orm::Database::connect(&database_url)
        .await
        .expect("Failed to connect to test database");

    // Migrate and clean leftovers exactly once per binary; every caller
    // waits for that to finish. Tests within a binary run in parallel and
    // must scope their assertions to their own data.
    DB_SETUP
        .get_or_init(|| async {
            versus::migration::Migrator::up(&db, None)
                .await
                .expect("Failed to run migrations");
            cleanup_tables(&db).await;
        })
        .await;

    let hub = versus::websocket::hub::ChatHub::new();
    let email_service = versus::services::email::EmailService::from_env();

    let app = axum::Router::new()
        .route("/", axum::routing::get(|| async { "ok" }))
        .merge(versus::routes::create_routes())
        .layer(axum::extract::Extension(db.clone()))
        .layer(axum::extract::Extension(hub))
        .layer(axum::extract::Extension(email_service));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    TestApp {
        addr: format!("http://{}", addr),
        db,
        client: Client::new(),
    }
}

async fn cleanup_tables(db: &DatabaseConnection) {
    let tables = [
        "refresh_tokens",
        "messages",
        "conversation_participants",
        "conversations",
        "battle_votes",
        "battles",
        "comments",
        "characters",
        "users",
    ];

    for table in tables {
        let sql = format!("TRUNCATE TABLE {} CASCADE", table);
        let _ = db
            .execute(Statement::from_string(
                sea_orm::DatabaseBackend::Postgres,
                sql,
            ))
            .await;
    }
}

/// Register a user, force-verify it directly in the database, and log in.
/// Returns (user_id, access_token).
pub async fn create_verified_user(app: &TestApp, username_prefix: &str) -> (i32, String) {
    static USER_COUNTER: AtomicUsize = AtomicUsize::new(0);
    let counter = USER_COUNTER.fetch_add(1, Ordering::SeqCst);
    let username = format!("{}_{}", username_prefix, counter);
    let email = format!("{}@test.com", username);
    let password = "test_password_123";

    let resp = app
        .client
        .post(app.url("/auth/register"))
        .json(&serde_json::json!({
            "username": username,
            "email": email,
            "password": password
        }))
        .send()
        .await
        .expect("Failed to register user");

    let status = resp.status();
    let body: serde_json::Value = resp.json().await.unwrap_or_else(|e| {
        panic!("Failed to parse register response for '{username}': status={status}, error={e}");
    });
    if !body["success"].as_bool().unwrap_or(false) {
        panic!("Failed to register '{username}': status={status}, body={body}");
    }
    let user_id = body["data"]["id"].as_i64().expect("register missing id") as i32;

    force_verify(&app.db, user_id).await;

    let resp = app
        .client
        .post(app.url("/auth/login"))
        .json(&serde_json::json!({ "email": email, "password": password }))
        .send()
        .await
        .expect("Failed to login");
    let body: serde_json::Value = resp.json().await.expect("Failed to parse login response");
    let token = body["data"]["token"]
        .as_str()
        .unwrap_or_else(|| panic!("login response missing token: {body}"))
        .to_string();

    (user_id, token)
}

/// Flip the verification flag directly, bypassing the email round trip.
pub async fn force_verify(db: &DatabaseConnection, user_id: i32) {
    db.execute(Statement::from_sql_and_values(
        sea_orm::DatabaseBackend::Postgres,
        "UPDATE users SET is_verified = TRUE WHERE id = $1",
        vec![user_id.into()],
    ))
    .await
    .expect("Failed to verify user");
}

/// Read a user's verification token straight from storage.
pub async fn read_verification_token(db: &DatabaseConnection, user_id: i32) -> Option<String> {
    let row = db
        .query_one(Statement::from_sql_and_values(
            sea_orm::DatabaseBackend::Postgres,
            "SELECT verification_token FROM users WHERE id = $1",
            vec![user_id.into()],
        ))
        .await
        .expect("Failed to query verification token")?;
    row.try_get("", "verification_token").ok()
}

/// Create a character with the given tier and return its id.
pub async fn create_test_character(
    app: &TestApp,
    token: &str,
    name: &str,
    tier: &str,
) -> i32 {
    let resp = app
        .client
        .post(app.url("/characters"))
        .bearer_auth(token)
        .json(&serde_json::json!({
            "name": name,
            "description": format!("Lore of {}", name),
            "tier": tier,
            "images": [{ "url": "/uploads/test.png", "label": "Base Form" }]
        }))
        .send()
        .await
        .expect("Failed to create character");

    let status = resp.status();
    let body: serde_json::Value = resp.json().await.expect("Failed to parse character");
    if !body["success"].as_bool().unwrap_or(false) {
        panic!("Failed to create character: status={status}, body={body}");
    }
    body["data"]["id"].as_i64().expect("character missing id") as i32
}
