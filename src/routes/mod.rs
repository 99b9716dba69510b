use crate::config::rate_limit::{RateLimitConfig, RateLimitRule};
use crate::handlers;
use crate::middleware::auth::auth_middleware;
use crate::websocket;
use axum::{middleware, routing, Router};
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};

pub fn create_routes() -> Router {
    Router::new()
        .nest("/api/v1", api_routes())
        // WebSocket route (auth handled inside the handler via query token)
        .route("/ws", routing::get(websocket::chat::ws_handler))
}

fn api_routes() -> Router {
    let rate_limit_config = RateLimitConfig::from_env();

    let auth = auth_routes(&rate_limit_config);
    let public_read = public_read_routes(&rate_limit_config);
    let protected =
        protected_routes(&rate_limit_config).layer(middleware::from_fn(auth_middleware));

    auth.merge(public_read).merge(protected)
}

/// Credential issuance: register, login, verify, refresh.
fn auth_routes(config: &RateLimitConfig) -> Router {
    let router = Router::new()
        .route("/auth/register", routing::post(handlers::register))
        .route("/auth/login", routing::post(handlers::login))
        .route(
            "/auth/verify-email/{token}",
            routing::get(handlers::verify_email),
        )
        .route("/auth/refresh", routing::post(handlers::refresh_token));

    with_optional_rate_limit(router, config.enabled, config.auth)
}

/// Public reads: galleries, detail pages, profiles, search.
fn public_read_routes(config: &RateLimitConfig) -> Router {
    let router = Router::new()
        // Characters
        .route(
            "/characters",
            routing::get(handlers::character::list_characters),
        )
        .route(
            "/characters/{id}",
            routing::get(handlers::character::get_character),
        )
        .route(
            "/characters/creator/{creator_id}",
            routing::get(handlers::character::get_characters_by_creator),
        )
        // Comments
        .route(
            "/comments/character/{character_id}",
            routing::get(handlers::comment::list_character_comments),
        )
        // Battles
        .route("/battles", routing::get(handlers::battle::list_battles))
        .route("/battles/{id}", routing::get(handlers::battle::get_battle))
        // Users
        .route(
            "/users/profile/{id}",
            routing::get(handlers::user::get_user_profile),
        )
        .route("/users/search", routing::get(handlers::user::search_users));

    with_optional_rate_limit(router, config.enabled, config.public_read)
}

/// Authenticated surface: everything that writes, plus private reads.
fn protected_routes(config: &RateLimitConfig) -> Router {
    let router = Router::new()
        // Auth
        .route("/auth/me", routing::get(handlers::get_current_user))
        .route("/auth/logout", routing::post(handlers::auth::logout))
        .route(
            "/auth/resend-verification",
            routing::post(handlers::resend_verification),
        )
        // Users
        .route(
            "/users/me",
            routing::get(handlers::user::get_me).put(handlers::user::update_me),
        )
        // Characters
        .route(
            "/characters",
            routing::post(handlers::character::create_character),
        )
        .route(
            "/characters/{id}",
            routing::put(handlers::character::update_character)
                .delete(handlers::character::delete_character),
        )
        .route(
            "/characters/{id}/like",
            routing::post(handlers::character::toggle_character_like),
        )
        // Comments
        .route("/comments", routing::post(handlers::comment::create_comment))
        .route(
            "/comments/{id}",
            routing::put(handlers::comment::update_comment)
                .delete(handlers::comment::delete_comment),
        )
        .route(
            "/comments/{id}/like",
            routing::post(handlers::comment::toggle_comment_like),
        )
        // Battles
        .route("/battles", routing::post(handlers::battle::create_battle))
        .route(
            "/battles/{id}",
            routing::delete(handlers::battle::delete_battle),
        )
        .route(
            "/battles/{id}/vote",
            routing::post(handlers::battle::vote_battle),
        )
        .route(
            "/battles/{id}/my-vote",
            routing::get(handlers::battle::get_my_vote),
        )
        // Conversations
        .route(
            "/conversations",
            routing::get(handlers::conversation::list_conversations)
                .post(handlers::conversation::create_conversation),
        )
        .route(
            "/conversations/unread-count",
            routing::get(handlers::conversation::get_unread_count),
        )
        .route(
            "/conversations/{id}",
            routing::get(handlers::conversation::get_conversation)
                .delete(handlers::conversation::delete_conversation),
        )
        .route(
            "/conversations/{id}/messages",
            routing::get(handlers::conversation::list_messages)
                .post(handlers::conversation::send_message),
        )
        .route(
            "/conversations/{id}/messages/read",
            routing::put(handlers::conversation::mark_messages_read),
        );

    with_optional_rate_limit(router, config.enabled, config.protected)
}

fn with_optional_rate_limit(router: Router, enabled: bool, rule: RateLimitRule) -> Router {
    if !enabled {
        return router;
    }

    let governor_conf = GovernorConfigBuilder::default()
        .per_second(rule.per_second)
        .burst_size(rule.burst_size)
        .finish()
        .expect("Invalid rate limit configuration");

    router.layer(GovernorLayer::new(governor_conf))
}
