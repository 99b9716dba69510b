use crate::error::{AppError, AppResult};
use crate::handlers::character::CharacterSummary;
use crate::handlers::user::UserSummary;
use crate::middleware::auth::parse_user_id;
use crate::middleware::AuthUser;
use crate::models::{ConversationModel, MessageModel};
use crate::response::{ApiResponse, PaginatedResponse, PaginationQuery};
use crate::services::character::CharacterService;
use crate::services::conversation::ConversationService;
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
pub struct CreateConversationRequest {
    /// The other participant
    pub participant_id: i32,
    /// Optional character context ("contact the creator")
    pub character_id: Option<i32>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SendMessageRequest {
    #[validate(length(min = 1))]
    pub content: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub id: i32,
    pub conversation_id: i32,
    pub sender_id: i32,
    pub content: String,
    pub is_read: bool,
    pub sender: Option<UserSummary>,
    pub created_at: String,
}

impl MessageResponse {
    fn build(m: MessageModel, sender: Option<UserSummary>) -> Self {
        Self {
            id: m.id,
            conversation_id: m.conversation_id,
            sender_id: m.sender_id,
            content: m.content,
            is_read: m.is_read,
            sender,
            created_at: m.created_at.to_string(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ConversationResponse {
    pub id: i32,
    pub participants: Vec<UserSummary>,
    pub character: Option<CharacterSummary>,
    pub last_message: Option<MessageResponse>,
    pub unread_count: u64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UnreadCountResponse {
    pub unread: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MarkReadResponse {
    pub marked: u64,
}

/// Assemble the list-view shape: participants, optional character context,
/// denormalized last message, and the caller's unread count.
async fn build_conversation_response(
    db: &DatabaseConnection,
    conversation: ConversationModel,
    viewer_id: i32,
) -> AppResult<ConversationResponse> {
    let service = ConversationService::new(db.clone());

    let participants: Vec<UserSummary> = service
        .participants_of(conversation.id)
        .await?
        .iter()
        .map(UserSummary::from)
        .collect();

    let character = match conversation.character_id {
        Some(character_id) => CharacterService::new(db.clone())
            .by_ids(&[character_id])
            .await?
            .get(&character_id)
            .map(CharacterSummary::from),
        None => None,
    };

    let last_message = match service.last_message_of(&conversation).await? {
        Some(message) => {
            let senders = UserService::new(db.clone())
                .by_ids(&[message.sender_id])
                .await?;
            let sender = senders.get(&message.sender_id).map(UserSummary::from);
            Some(MessageResponse::build(message, sender))
        }
        None => None,
    };

    let unread_count = service.unread_count(conversation.id, viewer_id).await?;

    Ok(ConversationResponse {
        id: conversation.id,
        participants,
        character,
        last_message,
        unread_count,
        created_at: conversation.created_at.to_string(),
        updated_at: conversation.updated_at.to_string(),
    })
}

#[utoipa::path(
    get,
    path = "/api/v1/conversations",
    security(("jwt_token" = [])),
    responses(
        (status = 200, description = "Caller's conversations, most recent first", body = Vec<ConversationResponse>),
        (status = 401, description = "Unauthorized", body = AppError),
    ),
    tag = "conversations"
)]
pub async fn list_conversations(
    Extension(db): Extension<DatabaseConnection>,
    auth_user: AuthUser,
) -> AppResult<impl IntoResponse> {
    let user_id = parse_user_id(&auth_user)?;

    let service = ConversationService::new(db.clone());
    let conversations = service.list_for_user(user_id).await?;

    let mut items = Vec::with_capacity(conversations.len());
    for conversation in conversations {
        items.push(build_conversation_response(&db, conversation, user_id).await?);
    }

    Ok(ApiResponse::ok(items))
}

#[utoipa::path(
    post,
    path = "/api/v1/conversations",
    security(("jwt_token" = [])),
    request_body = CreateConversationRequest,
    responses(
        (status = 200, description = "Existing or newly created conversation", body = ConversationResponse),
        (status = 400, description = "Cannot start a conversation with yourself", body = AppError),
        (status = 401, description = "Unauthorized", body = AppError),
        (status = 404, description = "Participant not found", body = AppError),
    ),
    tag = "conversations"
)]
pub async fn create_conversation(
    Extension(db): Extension<DatabaseConnection>,
    auth_user: AuthUser,
    Json(payload): Json<CreateConversationRequest>,
) -> AppResult<impl IntoResponse> {
    let user_id = parse_user_id(&auth_user)?;

    let service = ConversationService::new(db.clone());
    let (conversation, created) = service
        .find_or_create(user_id, payload.participant_id, payload.character_id)
        .await?;

    let response = build_conversation_response(&db, conversation, user_id).await?;
    let message = if created {
        "Conversation started"
    } else {
        "Conversation already exists"
    };

    Ok(ApiResponse::with_message(response, message.to_string()))
}

#[utoipa::path(
    get,
    path = "/api/v1/conversations/unread-count",
    security(("jwt_token" = [])),
    responses(
        (status = 200, description = "Global unread badge count", body = UnreadCountResponse),
        (status = 401, description = "Unauthorized", body = AppError),
    ),
    tag = "conversations"
)]
pub async fn get_unread_count(
    Extension(db): Extension<DatabaseConnection>,
    auth_user: AuthUser,
) -> AppResult<impl IntoResponse> {
    let user_id = parse_user_id(&auth_user)?;

    let service = ConversationService::new(db);
    let unread = service.total_unread(user_id).await?;

    Ok(ApiResponse::ok(UnreadCountResponse { unread }))
}

#[utoipa::path(
    get,
    path = "/api/v1/conversations/{id}",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "Conversation ID")),
    responses(
        (status = 200, description = "Conversation details", body = ConversationResponse),
        (status = 403, description = "Not a participant", body = AppError),
        (status = 404, description = "Conversation not found", body = AppError),
    ),
    tag = "conversations"
)]
pub async fn get_conversation(
    Extension(db): Extension<DatabaseConnection>,
    auth_user: AuthUser,
    Path(id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    let user_id = parse_user_id(&auth_user)?;

    let service = ConversationService::new(db.clone());
    let conversation = service.get_for_participant(id, user_id).await?;

    let response = build_conversation_response(&db, conversation, user_id).await?;
    Ok(ApiResponse::ok(response))
}

#[utoipa::path(
    delete,
    path = "/api/v1/conversations/{id}",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "Conversation ID")),
    responses(
        (status = 200, description = "Conversation deleted", body = String),
        (status = 403, description = "Not a participant", body = AppError),
        (status = 404, description = "Conversation not found", body = AppError),
    ),
    tag = "conversations"
)]
pub async fn delete_conversation(
    Extension(db): Extension<DatabaseConnection>,
    auth_user: AuthUser,
    Path(id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    let user_id = parse_user_id(&auth_user)?;

    let service = ConversationService::new(db);
    service.delete(id, user_id).await?;

    Ok(ApiResponse::ok("Conversation deleted"))
}

#[utoipa::path(
    get,
    path = "/api/v1/conversations/{id}/messages",
    security(("jwt_token" = [])),
    params(
        ("id" = i32, Path, description = "Conversation ID"),
        ("page" = Option<u64>, Query, description = "Page number"),
        ("limit" = Option<u64>, Query, description = "Messages per page"),
    ),
    responses(
        (status = 200, description = "Messages, oldest first", body = PaginatedResponse<MessageResponse>),
        (status = 403, description = "Not a participant", body = AppError),
    ),
    tag = "conversations"
)]
pub async fn list_messages(
    Extension(db): Extension<DatabaseConnection>,
    auth_user: AuthUser,
    Path(id): Path<i32>,
    Query(params): Query<PaginationQuery>,
) -> AppResult<impl IntoResponse> {
    let user_id = parse_user_id(&auth_user)?;
    let page = params.page.unwrap_or(1).max(1);
    let per_page = params.limit.unwrap_or(50).clamp(1, 200);

    let service = ConversationService::new(db.clone());
    let (messages, total) = service.list_messages(id, user_id, page, per_page).await?;

    let sender_ids: Vec<i32> = messages.iter().map(|m| m.sender_id).collect();
    let senders = UserService::new(db).by_ids(&sender_ids).await?;

    let items: Vec<MessageResponse> = messages
        .into_iter()
        .map(|m| {
            let sender = senders.get(&m.sender_id).map(UserSummary::from);
            MessageResponse::build(m, sender)
        })
        .collect();

    Ok(ApiResponse::ok(PaginatedResponse::new(
        items, total, page, per_page,
    )))
}

#[utoipa::path(
    post,
    path = "/api/v1/conversations/{id}/messages",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "Conversation ID")),
    request_body = SendMessageRequest,
    responses(
        (status = 200, description = "Message persisted", body = MessageResponse),
        (status = 400, description = "Validation error", body = AppError),
        (status = 403, description = "Not a participant", body = AppError),
    ),
    tag = "conversations"
)]
pub async fn send_message(
    Extension(db): Extension<DatabaseConnection>,
    auth_user: AuthUser,
    Path(id): Path<i32>,
    Json(payload): Json<SendMessageRequest>,
) -> AppResult<impl IntoResponse> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let user_id = parse_user_id(&auth_user)?;

    let service = ConversationService::new(db.clone());
    let message = service.create_message(id, user_id, &payload.content).await?;

    let senders = UserService::new(db).by_ids(&[user_id]).await?;
    let sender = senders.get(&user_id).map(UserSummary::from);

    Ok(ApiResponse::ok(MessageResponse::build(message, sender)))
}

#[utoipa::path(
    put,
    path = "/api/v1/conversations/{id}/messages/read",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "Conversation ID")),
    responses(
        (status = 200, description = "Unread messages marked read", body = MarkReadResponse),
        (status = 403, description = "Not a participant", body = AppError),
    ),
    tag = "conversations"
)]
pub async fn mark_messages_read(
    Extension(db): Extension<DatabaseConnection>,
    auth_user: AuthUser,
    Path(id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    let user_id = parse_user_id(&auth_user)?;

    let service = ConversationService::new(db);
    let marked = service.mark_read(id, user_id).await?;

    Ok(ApiResponse::ok(MarkReadResponse { marked }))
}
