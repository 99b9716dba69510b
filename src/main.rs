mod config;
mod error;
mod handlers;
mod middleware;
mod migration;
mod models;
mod response;
mod routes;
mod services;
mod utils;
mod websocket;

use axum::{extract::Extension, response::IntoResponse, routing::get, Json, Router};
use sea_orm::{ConnectionTrait, DatabaseConnection, Statement};
use sea_orm_migration::MigratorTrait;
use serde_json::json;
use std::env;
use std::net::SocketAddr;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;
use websocket::hub::ChatHub;

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        // Auth routes
        crate::handlers::register,
        crate::handlers::login,
        crate::handlers::verify_email,
        crate::handlers::resend_verification,
        crate::handlers::auth::refresh_token,
        crate::handlers::auth::logout,
        crate::handlers::get_current_user,
        // User routes
        crate::handlers::user::get_user_profile,
        crate::handlers::user::search_users,
        crate::handlers::user::get_me,
        crate::handlers::user::update_me,
        // Character routes
        crate::handlers::character::list_characters,
        crate::handlers::character::get_character,
        crate::handlers::character::create_character,
        crate::handlers::character::update_character,
        crate::handlers::character::delete_character,
        crate::handlers::character::get_characters_by_creator,
        crate::handlers::character::toggle_character_like,
        // Comment routes
        crate::handlers::comment::list_character_comments,
        crate::handlers::comment::create_comment,
        crate::handlers::comment::update_comment,
        crate::handlers::comment::delete_comment,
        crate::handlers::comment::toggle_comment_like,
        // Battle routes
        crate::handlers::battle::list_battles,
        crate::handlers::battle::get_battle,
        crate::handlers::battle::create_battle,
        crate::handlers::battle::delete_battle,
        crate::handlers::battle::vote_battle,
        crate::handlers::battle::get_my_vote,
        // Conversation routes
        crate::handlers::conversation::list_conversations,
        crate::handlers::conversation::create_conversation,
        crate::handlers::conversation::get_conversation,
        crate::handlers::conversation::delete_conversation,
        crate::handlers::conversation::get_unread_count,
        crate::handlers::conversation::list_messages,
        crate::handlers::conversation::send_message,
        crate::handlers::conversation::mark_messages_read,
    ),
    components(
        schemas(
            crate::response::ApiResponse<serde_json::Value>,
            crate::response::PaginatedResponse<serde_json::Value>,
            crate::response::PaginationQuery,
            crate::error::AppError,
            // Auth
            crate::handlers::auth::RegisterRequest,
            crate::handlers::auth::LoginRequest,
            crate::handlers::auth::RefreshTokenRequest,
            crate::handlers::auth::AuthResponse,
            crate::handlers::auth::TokenResponse,
            crate::handlers::auth::UserResponse,
            // User
            crate::handlers::user::UserSummary,
            crate::handlers::user::UserProfileResponse,
            crate::handlers::user::UpdateProfileRequest,
            // Character
            crate::models::character::ImageVariant,
            crate::handlers::character::CharacterSummary,
            crate::handlers::character::CharacterResponse,
            crate::handlers::character::CreateCharacterRequest,
            crate::handlers::character::UpdateCharacterRequest,
            crate::handlers::character::LikeToggleResponse,
            // Comment
            crate::handlers::comment::CommentResponse,
            crate::handlers::comment::CreateCommentRequest,
            crate::handlers::comment::UpdateCommentRequest,
            // Battle
            crate::handlers::battle::BattleResponse,
            crate::handlers::battle::CreateBattleRequest,
            crate::handlers::battle::VoteRequest,
            crate::handlers::battle::VoteTallyResponse,
            crate::handlers::battle::MyVoteResponse,
            // Conversation
            crate::handlers::conversation::ConversationResponse,
            crate::handlers::conversation::CreateConversationRequest,
            crate::handlers::conversation::MessageResponse,
            crate::handlers::conversation::SendMessageRequest,
            crate::handlers::conversation::UnreadCountResponse,
            crate::handlers::conversation::MarkReadResponse,
        )
    ),
    tags(
        (name = "auth", description = "Authentication operations"),
        (name = "users", description = "User profile operations"),
        (name = "characters", description = "Character profile operations"),
        (name = "comments", description = "Character comment operations"),
        (name = "battles", description = "Battle simulation and voting"),
        (name = "conversations", description = "Direct messaging"),
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "versus=debug,tower_http=debug,axum=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Validate configuration before doing anything else
    let jwt_config = validate_config()?;
    utils::jwt::init_jwt_config(jwt_config)?;

    tracing::info!("Starting Versus Arena API v{}...", env!("CARGO_PKG_VERSION"));

    let db = config::database::get_database().await?;
    tracing::info!("Database connected successfully");

    migration::Migrator::up(&db, None).await?;
    tracing::info!("Database migrations applied successfully");

    let hub = ChatHub::new();

    let email_service = services::email::EmailService::from_env();
    if email_service.is_configured() {
        tracing::info!("SMTP email service configured");
    } else {
        tracing::warn!("SMTP not configured, emails will be skipped");
    }

    let app = create_app()
        .layer(Extension(db))
        .layer(Extension(hub))
        .layer(Extension(email_service));

    let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port = env::var("PORT").unwrap_or_else(|_| "4000".to_string());
    let addr = format!("{}:{}", host, port);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui/", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server shut down gracefully");
    Ok(())
}

/// Validate all required configuration at startup (fail-fast).
fn validate_config() -> anyhow::Result<crate::config::jwt::JwtConfig> {
    // JWT config — validated and cached
    let jwt_config = config::jwt::JwtConfig::from_env()?;

    // DATABASE_URL — checked here for early error; actual connection happens later
    if env::var("DATABASE_URL").is_err() {
        return Err(anyhow::anyhow!(
            "DATABASE_URL environment variable must be set"
        ));
    }

    Ok(jwt_config)
}

fn build_cors_layer() -> CorsLayer {
    use axum::http::{header, HeaderValue, Method};

    let origins_str = env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string());

    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    if origins_str == "*" {
        cors.allow_origin(tower_http::cors::Any)
    } else {
        let origins: Vec<HeaderValue> = origins_str
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        cors.allow_origin(origins)
    }
}

fn create_app() -> Router {
    Router::new()
        .route("/", get(health_check))
        .merge(routes::create_routes())
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer())
}

#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Health check successful", body = serde_json::Value)
    )
)]
async fn health_check(Extension(db): Extension<DatabaseConnection>) -> impl IntoResponse {
    let db_ok = db
        .query_one(Statement::from_string(
            sea_orm::DatabaseBackend::Postgres,
            "SELECT 1".to_string(),
        ))
        .await
        .is_ok();

    let status = if db_ok { "ok" } else { "degraded" };

    Json(json!({
        "status": status,
        "service": "Versus Arena API",
        "version": env!("CARGO_PKG_VERSION"),
        "database": db_ok,
    }))
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C signal handler");
    tracing::info!("Shutdown signal received, gracefully shutting down...");
}
