use crate::error::{AppError, AppResult};
use crate::handlers::character::LikeToggleResponse;
use crate::handlers::user::UserSummary;
use crate::middleware::auth::parse_user_id;
use crate::middleware::AuthUser;
use crate::models::CommentModel;
use crate::response::{ApiResponse, PaginatedResponse, PaginationQuery};
use crate::services::comment::CommentService;
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

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateCommentRequest {
    pub character_id: i32,
    /// Present when replying to a top-level comment
    pub parent_id: Option<i32>,
    #[validate(length(min = 1))]
    pub content: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateCommentRequest {
    #[validate(length(min = 1))]
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct CommentResponse {
    pub id: i32,
    pub character_id: i32,
    pub user_id: i32,
    pub parent_id: Option<i32>,
    pub content: String,
    pub likes: i32,
    pub author: Option<UserSummary>,
    pub replies: Vec<CommentResponse>,
    pub created_at: String,
    pub updated_at: String,
}

// Hand-written schema: the derive cannot express the self-referential
// `replies` field.
impl utoipa::ToSchema for CommentResponse {
    fn name() -> std::borrow::Cow<'static, str> {
        "CommentResponse".into()
    }
}

impl utoipa::PartialSchema for CommentResponse {
    fn schema() -> utoipa::openapi::RefOr<utoipa::openapi::schema::Schema> {
        use utoipa::openapi::schema::{ArrayBuilder, ObjectBuilder, Schema, Type};
        use utoipa::PartialSchema;
        utoipa::openapi::RefOr::T(Schema::Object(
            ObjectBuilder::new()
                .schema_type(Type::Object)
                .property("id", i32::schema())
                .property("character_id", i32::schema())
                .property("user_id", i32::schema())
                .property("parent_id", Option::<i32>::schema())
                .property("content", String::schema())
                .property("likes", i32::schema())
                .property("author", Option::<UserSummary>::schema())
                .property(
                    "replies",
                    ArrayBuilder::new()
                        .items(utoipa::openapi::Ref::from_schema_name("CommentResponse"))
                        .build(),
                )
                .property("created_at", String::schema())
                .property("updated_at", String::schema())
                .required("id")
                .required("character_id")
                .required("user_id")
                .required("content")
                .required("likes")
                .required("replies")
                .required("created_at")
                .required("updated_at")
                .build(),
        ))
    }
}

impl CommentResponse {
    fn build(
        comment: CommentModel,
        authors: &std::collections::HashMap<i32, UserSummary>,
        replies: Vec<CommentModel>,
    ) -> Self {
        let reply_nodes = replies
            .into_iter()
            .map(|r| {
                let author = authors.get(&r.user_id).cloned();
                Self {
                    id: r.id,
                    character_id: r.character_id,
                    user_id: r.user_id,
                    parent_id: r.parent_id,
                    content: r.content,
                    likes: r.likes,
                    author,
                    replies: Vec::new(),
                    created_at: r.created_at.to_string(),
                    updated_at: r.updated_at.to_string(),
                }
            })
            .collect();

        let author = authors.get(&comment.user_id).cloned();
        Self {
            id: comment.id,
            character_id: comment.character_id,
            user_id: comment.user_id,
            parent_id: comment.parent_id,
            content: comment.content,
            likes: comment.likes,
            author,
            replies: reply_nodes,
            created_at: comment.created_at.to_string(),
            updated_at: comment.updated_at.to_string(),
        }
    }
}

impl From<CommentModel> for CommentResponse {
    fn from(c: CommentModel) -> Self {
        Self::build(c, &std::collections::HashMap::new(), Vec::new())
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/comments/character/{character_id}",
    params(
        ("character_id" = i32, Path, description = "Character ID"),
        ("page" = Option<u64>, Query, description = "Page number"),
        ("limit" = Option<u64>, Query, description = "Top-level comments per page"),
    ),
    responses(
        (status = 200, description = "Comment threads, newest first", body = PaginatedResponse<CommentResponse>),
    ),
    tag = "comments"
)]
pub async fn list_character_comments(
    Extension(db): Extension<DatabaseConnection>,
    Path(character_id): Path<i32>,
    Query(params): Query<PaginationQuery>,
) -> AppResult<impl IntoResponse> {
    let page = params.page.unwrap_or(1).max(1);
    let per_page = params.limit.unwrap_or(20).clamp(1, 100);

    let service = CommentService::new(db.clone());
    let (threads, total) = service
        .list_by_character(character_id, page, per_page)
        .await?;

    let mut author_ids: Vec<i32> = Vec::new();
    for (comment, replies) in &threads {
        author_ids.push(comment.user_id);
        author_ids.extend(replies.iter().map(|r| r.user_id));
    }
    let users = UserService::new(db).by_ids(&author_ids).await?;
    let authors: std::collections::HashMap<i32, UserSummary> = users
        .iter()
        .map(|(id, u)| (*id, UserSummary::from(u)))
        .collect();

    let items: Vec<CommentResponse> = threads
        .into_iter()
        .map(|(comment, replies)| CommentResponse::build(comment, &authors, replies))
        .collect();

    Ok(ApiResponse::ok(PaginatedResponse::new(
        items, total, page, per_page,
    )))
}

#[utoipa::path(
    post,
    path = "/api/v1/comments",
    security(("jwt_token" = [])),
    request_body = CreateCommentRequest,
    responses(
        (status = 200, description = "Comment created", body = CommentResponse),
        (status = 400, description = "Validation error", body = AppError),
        (status = 401, description = "Unauthorized", body = AppError),
        (status = 404, description = "Character not found", body = AppError),
    ),
    tag = "comments"
)]
pub async fn create_comment(
    Extension(db): Extension<DatabaseConnection>,
    auth_user: AuthUser,
    Json(payload): Json<CreateCommentRequest>,
) -> AppResult<impl IntoResponse> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let user_id = parse_user_id(&auth_user)?;

    let service = CommentService::new(db.clone());
    let comment = service
        .create(
            payload.character_id,
            user_id,
            payload.parent_id,
            &payload.content,
        )
        .await?;

    let users = UserService::new(db).by_ids(&[user_id]).await?;
    let authors: std::collections::HashMap<i32, UserSummary> = users
        .iter()
        .map(|(id, u)| (*id, UserSummary::from(u)))
        .collect();

    Ok(ApiResponse::with_message(
        CommentResponse::build(comment, &authors, Vec::new()),
        "Comment created".to_string(),
    ))
}

#[utoipa::path(
    put,
    path = "/api/v1/comments/{id}",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "Comment ID")),
    request_body = UpdateCommentRequest,
    responses(
        (status = 200, description = "Comment updated", body = CommentResponse),
        (status = 400, description = "Validation error", body = AppError),
        (status = 403, description = "Not the author", body = AppError),
        (status = 404, description = "Comment not found", body = AppError),
    ),
    tag = "comments"
)]
pub async fn update_comment(
    Extension(db): Extension<DatabaseConnection>,
    auth_user: AuthUser,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateCommentRequest>,
) -> AppResult<impl IntoResponse> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let user_id = parse_user_id(&auth_user)?;

    let service = CommentService::new(db);
    let comment = service.update(id, user_id, &payload.content).await?;

    Ok(ApiResponse::ok(CommentResponse::from(comment)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/comments/{id}",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "Comment ID")),
    responses(
        (status = 200, description = "Comment deleted", body = String),
        (status = 403, description = "Not the author", body = AppError),
        (status = 404, description = "Comment not found", body = AppError),
    ),
    tag = "comments"
)]
pub async fn delete_comment(
    Extension(db): Extension<DatabaseConnection>,
    auth_user: AuthUser,
    Path(id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    let user_id = parse_user_id(&auth_user)?;

    let service = CommentService::new(db);
    service.soft_delete(id, user_id).await?;

    Ok(ApiResponse::ok("Comment deleted"))
}

#[utoipa::path(
    post,
    path = "/api/v1/comments/{id}/like",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "Comment ID")),
    responses(
        (status = 200, description = "Like toggled", body = LikeToggleResponse),
        (status = 401, description = "Unauthorized", body = AppError),
        (status = 404, description = "Comment not found", body = AppError),
    ),
    tag = "comments"
)]
pub async fn toggle_comment_like(
    Extension(db): Extension<DatabaseConnection>,
    auth_user: AuthUser,
    Path(id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    let user_id = parse_user_id(&auth_user)?;

    let service = CommentService::new(db);
    let (likes, liked) = service.toggle_like(id, user_id).await?;

    Ok(ApiResponse::ok(LikeToggleResponse { likes, liked }))
}
