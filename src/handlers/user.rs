use crate::error::{AppError, AppResult};
use crate::handlers::auth::UserResponse;
use crate::middleware::auth::parse_user_id;
use crate::middleware::AuthUser;
use crate::models::UserModel;
use crate::response::ApiResponse;
use crate::services::auth::AuthService;
use crate::services::user::UserService;
use axum::{
    extract::{Path, Query},
    response::IntoResponse,
    Extension, Json,
};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// Compact user identity embedded in other resources.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserSummary {
    pub id: i32,
    pub username: String,
    pub avatar_url: Option<String>,
}

impl From<&UserModel> for UserSummary {
    fn from(u: &UserModel) -> Self {
        Self {
            id: u.id,
            username: u.username.clone(),
            avatar_url: u.avatar_url.clone(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserProfileResponse {
    pub id: i32,
    pub username: String,
    pub avatar_url: Option<String>,
    pub created_at: String,
}

impl From<UserModel> for UserProfileResponse {
    fn from(u: UserModel) -> Self {
        Self {
            id: u.id,
            username: u.username,
            avatar_url: u.avatar_url,
            created_at: u.created_at.to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 3, max = 30))]
    pub username: Option<String>,
    #[validate(length(max = 500))]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SearchQuery {
    pub q: String,
}

#[utoipa::path(
    get,
    path = "/api/v1/users/profile/{id}",
    params(("id" = i32, Path, description = "User ID")),
    responses(
        (status = 200, description = "Public profile", body = UserProfileResponse),
        (status = 404, description = "User not found", body = AppError),
    ),
    tag = "users"
)]
pub async fn get_user_profile(
    Extension(db): Extension<DatabaseConnection>,
    Path(id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    let service = UserService::new(db);
    let user = service.get_profile(id).await?;
    Ok(ApiResponse::ok(UserProfileResponse::from(user)))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/search",
    params(("q" = String, Query, description = "Username fragment")),
    responses(
        (status = 200, description = "Matching users", body = Vec<UserSummary>),
    ),
    tag = "users"
)]
pub async fn search_users(
    Extension(db): Extension<DatabaseConnection>,
    Query(query): Query<SearchQuery>,
) -> AppResult<impl IntoResponse> {
    let trimmed = query.q.trim();
    if trimmed.is_empty() {
        return Ok(ApiResponse::ok(Vec::<UserSummary>::new()));
    }

    let service = UserService::new(db);
    let users = service.search(trimmed, 10).await?;
    let summaries: Vec<UserSummary> = users.iter().map(UserSummary::from).collect();
    Ok(ApiResponse::ok(summaries))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/me",
    security(("jwt_token" = [])),
    responses(
        (status = 200, description = "Own profile", body = UserResponse),
        (status = 401, description = "Unauthorized", body = AppError),
    ),
    tag = "users"
)]
pub async fn get_me(
    Extension(db): Extension<DatabaseConnection>,
    auth_user: AuthUser,
) -> AppResult<impl IntoResponse> {
    let user_id = parse_user_id(&auth_user)?;
    let service = AuthService::new(db);
    let user = service.get_user_by_id(user_id).await?;
    Ok(ApiResponse::ok(UserResponse::from(user)))
}

#[utoipa::path(
    put,
    path = "/api/v1/users/me",
    security(("jwt_token" = [])),
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = UserResponse),
        (status = 400, description = "Validation error", body = AppError),
        (status = 401, description = "Unauthorized", body = AppError),
        (status = 409, description = "Username already taken", body = AppError),
    ),
    tag = "users"
)]
pub async fn update_me(
    Extension(db): Extension<DatabaseConnection>,
    auth_user: AuthUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> AppResult<impl IntoResponse> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let user_id = parse_user_id(&auth_user)?;

    let service = UserService::new(db);
    let user = service
        .update_me(user_id, payload.username, payload.avatar_url)
        .await?;

    Ok(ApiResponse::ok(UserResponse::from(user)))
}
