use crate::error::{AppError, AppResult};
use crate::middleware::auth::parse_user_id;
use crate::middleware::AuthUser;
use crate::models::UserModel;
use crate::response::ApiResponse;
use crate::services::auth::AuthService;
use crate::services::email::EmailService;
use axum::{extract::Path, response::IntoResponse, Extension, Json};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    /// Username (3-30 characters)
    #[validate(length(min = 3, max = 30))]
    pub username: String,
    /// Email address
    #[validate(email)]
    pub email: String,
    /// Password (min 6 characters)
    #[validate(length(min = 6))]
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    /// Email address
    pub email: String,
    /// User password
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    /// User ID
    pub id: i32,
    /// Username
    pub username: String,
    /// Email address
    pub email: String,
    /// User role
    pub role: String,
    /// Avatar URL
    pub avatar_url: Option<String>,
    /// Whether the email address is verified
    pub is_verified: bool,
    /// Creation timestamp
    pub created_at: String,
}

impl From<UserModel> for UserResponse {
    fn from(user: UserModel) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role,
            avatar_url: user.avatar_url,
            is_verified: user.is_verified,
            created_at: user.created_at.to_string(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    /// JWT access token
    pub token: String,
    /// JWT refresh token
    pub refresh_token: String,
    /// Authenticated user
    pub user: UserResponse,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TokenResponse {
    /// JWT access token
    pub token: String,
    /// JWT refresh token
    pub refresh_token: String,
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "User registered, verification email sent", body = UserResponse),
        (status = 400, description = "Validation error", body = AppError),
        (status = 409, description = "Username or email already exists", body = AppError),
    ),
    tag = "auth"
)]
pub async fn register(
    Extension(db): Extension<DatabaseConnection>,
    Extension(email_service): Extension<EmailService>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<impl IntoResponse> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let service = AuthService::new(db);
    let user = service
        .register(
            &payload.username,
            &payload.email,
            &payload.password,
            &email_service,
        )
        .await?;

    let message = if user.is_verified {
        "Registration successful.".to_string()
    } else {
        "Registration successful. Please check your email to verify your account.".to_string()
    };

    Ok(ApiResponse::with_message(UserResponse::from(user), message))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials or unverified account", body = AppError),
        (status = 403, description = "Account deactivated", body = AppError),
    ),
    tag = "auth"
)]
pub async fn login(
    Extension(db): Extension<DatabaseConnection>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<impl IntoResponse> {
    let service = AuthService::new(db);
    let (user, access_token, refresh_token) =
        service.login(&payload.email, &payload.password).await?;

    Ok(ApiResponse::ok(AuthResponse {
        token: access_token,
        refresh_token,
        user: UserResponse::from(user),
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/auth/verify-email/{token}",
    params(("token" = String, Path, description = "Verification token from the email link")),
    responses(
        (status = 200, description = "Email verified, fresh credential issued", body = AuthResponse),
        (status = 400, description = "Invalid or expired token", body = AppError),
    ),
    tag = "auth"
)]
pub async fn verify_email(
    Extension(db): Extension<DatabaseConnection>,
    Path(token): Path<String>,
) -> AppResult<impl IntoResponse> {
    let service = AuthService::new(db);
    let (user, access_token, refresh_token) = service.verify_email(&token).await?;

    Ok(ApiResponse::with_message(
        AuthResponse {
            token: access_token,
            refresh_token,
            user: UserResponse::from(user),
        },
        "Email verified successfully".to_string(),
    ))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/resend-verification",
    security(("jwt_token" = [])),
    responses(
        (status = 200, description = "Verification email re-sent", body = String),
        (status = 400, description = "Account already verified", body = AppError),
        (status = 401, description = "Unauthorized", body = AppError),
    ),
    tag = "auth"
)]
pub async fn resend_verification(
    Extension(db): Extension<DatabaseConnection>,
    Extension(email_service): Extension<EmailService>,
    auth_user: AuthUser,
) -> AppResult<impl IntoResponse> {
    let user_id = parse_user_id(&auth_user)?;

    let service = AuthService::new(db);
    service.resend_verification(user_id, &email_service).await?;

    Ok(ApiResponse::ok("Verification email sent"))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/refresh",
    request_body = RefreshTokenRequest,
    responses(
        (status = 200, description = "Tokens rotated", body = TokenResponse),
        (status = 401, description = "Invalid or expired refresh token", body = AppError),
    ),
    tag = "auth"
)]
pub async fn refresh_token(
    Extension(db): Extension<DatabaseConnection>,
    Json(payload): Json<RefreshTokenRequest>,
) -> AppResult<impl IntoResponse> {
    let claims = crate::utils::jwt::decode_jwt(&payload.refresh_token)
        .map_err(|_| AppError::Unauthorized)?;
    if !crate::utils::jwt::is_refresh_token(&claims) {
        return Err(AppError::Unauthorized);
    }
    let user_id: i32 = claims.sub.parse().map_err(|_| AppError::Unauthorized)?;

    let service = AuthService::new(db);
    let (access_token, refresh_token) = service
        .rotate_refresh_token(user_id, &payload.refresh_token)
        .await?;

    Ok(ApiResponse::ok(TokenResponse {
        token: access_token,
        refresh_token,
    }))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    security(("jwt_token" = [])),
    request_body = RefreshTokenRequest,
    responses(
        (status = 200, description = "Refresh token revoked", body = String),
        (status = 401, description = "Unauthorized", body = AppError),
    ),
    tag = "auth"
)]
pub async fn logout(
    Extension(db): Extension<DatabaseConnection>,
    _auth_user: AuthUser,
    Json(payload): Json<RefreshTokenRequest>,
) -> AppResult<impl IntoResponse> {
    let service = AuthService::new(db);
    service.revoke_refresh_token(&payload.refresh_token).await?;

    Ok(ApiResponse::ok("Logged out"))
}

#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    security(("jwt_token" = [])),
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Unauthorized", body = AppError),
    ),
    tag = "auth"
)]
pub async fn get_current_user(
    Extension(db): Extension<DatabaseConnection>,
    auth_user: AuthUser,
) -> AppResult<impl IntoResponse> {
    let user_id = parse_user_id(&auth_user)?;

    let service = AuthService::new(db);
    let user = service.get_user_by_id(user_id).await?;

    Ok(ApiResponse::ok(UserResponse::from(user)))
}
