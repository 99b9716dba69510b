use crate::error::{AppError, AppResult};
use crate::handlers::user::UserSummary;
use crate::middleware::auth::parse_user_id;
use crate::middleware::AuthUser;
use crate::models::character::ImageVariant;
use crate::models::CharacterModel;
use crate::response::{ApiResponse, PaginatedResponse};
use crate::services::character::{
    CharacterDraft, CharacterFilter, CharacterService, CharacterUpdate,
};
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
pub struct CreateCharacterRequest {
    /// Character name (1-100 characters)
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(max = 100))]
    pub alias: Option<String>,
    pub quote: Option<String>,
    /// Lore text
    #[validate(length(min = 1))]
    pub description: String,
    #[validate(length(max = 100))]
    pub origin: Option<String>,
    #[validate(length(max = 50))]
    pub gender: Option<String>,
    #[validate(length(max = 100))]
    pub classification: Option<String>,
    /// Ordered image variants; the first is the primary image
    #[serde(default)]
    pub images: Vec<ImageVariant>,
    /// Power tier; unmapped values rank as "Unknown"
    #[validate(length(max = 50))]
    pub tier: Option<String>,
    pub attack_potency: Option<String>,
    pub speed: Option<String>,
    pub durability: Option<String>,
    pub weaknesses: Option<String>,
    pub equipment: Option<String>,
    #[validate(range(min = 1, max = 100))]
    pub strength: Option<i32>,
    #[validate(range(min = 1, max = 100))]
    pub speed_stat: Option<i32>,
    #[validate(range(min = 1, max = 100))]
    pub durability_stat: Option<i32>,
    #[validate(range(min = 1, max = 100))]
    pub intelligence: Option<i32>,
    #[validate(range(min = 1, max = 100))]
    pub energy: Option<i32>,
    #[validate(range(min = 1, max = 100))]
    pub combat: Option<i32>,
    #[serde(default)]
    pub abilities: Vec<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateCharacterRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(length(max = 100))]
    pub alias: Option<String>,
    pub quote: Option<String>,
    #[validate(length(min = 1))]
    pub description: Option<String>,
    #[validate(length(max = 100))]
    pub origin: Option<String>,
    #[validate(length(max = 50))]
    pub gender: Option<String>,
    #[validate(length(max = 100))]
    pub classification: Option<String>,
    pub images: Option<Vec<ImageVariant>>,
    #[validate(length(max = 50))]
    pub tier: Option<String>,
    pub attack_potency: Option<String>,
    pub speed: Option<String>,
    pub durability: Option<String>,
    pub weaknesses: Option<String>,
    pub equipment: Option<String>,
    #[validate(range(min = 1, max = 100))]
    pub strength: Option<i32>,
    #[validate(range(min = 1, max = 100))]
    pub speed_stat: Option<i32>,
    #[validate(range(min = 1, max = 100))]
    pub durability_stat: Option<i32>,
    #[validate(range(min = 1, max = 100))]
    pub intelligence: Option<i32>,
    #[validate(range(min = 1, max = 100))]
    pub energy: Option<i32>,
    #[validate(range(min = 1, max = 100))]
    pub combat: Option<i32>,
    pub abilities: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CharacterListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub tier: Option<String>,
    pub creator_id: Option<i32>,
    pub search: Option<String>,
    pub sort_by: Option<String>,
}

/// Compact character identity embedded in battles and conversations.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CharacterSummary {
    pub id: i32,
    pub name: String,
    pub image: String,
    pub tier: String,
}

impl From<&CharacterModel> for CharacterSummary {
    fn from(c: &CharacterModel) -> Self {
        Self {
            id: c.id,
            name: c.name.clone(),
            image: c.primary_image(),
            tier: c.tier.clone(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CharacterResponse {
    pub id: i32,
    pub name: String,
    pub alias: Option<String>,
    pub quote: Option<String>,
    pub description: String,
    pub origin: Option<String>,
    pub gender: Option<String>,
    pub classification: Option<String>,
    pub images: Vec<ImageVariant>,
    /// Primary image (first variant, or a placeholder)
    pub image: String,
    pub tier: String,
    pub attack_potency: Option<String>,
    pub speed: Option<String>,
    pub durability: Option<String>,
    pub weaknesses: Option<String>,
    pub equipment: Option<String>,
    pub strength: i32,
    pub speed_stat: i32,
    pub durability_stat: i32,
    pub intelligence: i32,
    pub energy: i32,
    pub combat: i32,
    /// Rounded mean of the six numeric stats, derived on every read
    pub power_level: i32,
    pub abilities: Vec<String>,
    pub views: i32,
    pub likes: i32,
    pub creator_id: i32,
    pub creator: Option<UserSummary>,
    pub created_at: String,
    pub updated_at: String,
}

impl CharacterResponse {
    pub fn with_creator(c: CharacterModel, creator: Option<UserSummary>) -> Self {
        let image = c.primary_image();
        let power_level = c.power_level();
        Self {
            id: c.id,
            name: c.name,
            alias: c.alias,
            quote: c.quote,
            description: c.description,
            origin: c.origin,
            gender: c.gender,
            classification: c.classification,
            images: c.images.0,
            image,
            tier: c.tier,
            attack_potency: c.attack_potency,
            speed: c.speed,
            durability: c.durability,
            weaknesses: c.weaknesses,
            equipment: c.equipment,
            strength: c.strength,
            speed_stat: c.speed_stat,
            durability_stat: c.durability_stat,
            intelligence: c.intelligence,
            energy: c.energy,
            combat: c.combat,
            power_level,
            abilities: c.abilities.0,
            views: c.views,
            likes: c.likes,
            creator_id: c.creator_id,
            creator,
            created_at: c.created_at.to_string(),
            updated_at: c.updated_at.to_string(),
        }
    }
}

impl From<CharacterModel> for CharacterResponse {
    fn from(c: CharacterModel) -> Self {
        Self::with_creator(c, None)
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LikeToggleResponse {
    pub likes: i32,
    pub liked: bool,
}

async fn creator_summaries(
    db: DatabaseConnection,
    characters: &[CharacterModel],
) -> AppResult<std::collections::HashMap<i32, UserSummary>> {
    let ids: Vec<i32> = characters.iter().map(|c| c.creator_id).collect();
    let users = UserService::new(db).by_ids(&ids).await?;
    Ok(users
        .iter()
        .map(|(id, u)| (*id, UserSummary::from(u)))
        .collect())
}

#[utoipa::path(
    get,
    path = "/api/v1/characters",
    params(
        ("page" = Option<u64>, Query, description = "Page number"),
        ("limit" = Option<u64>, Query, description = "Items per page"),
        ("tier" = Option<String>, Query, description = "Filter by tier"),
        ("creator_id" = Option<i32>, Query, description = "Filter by creator"),
        ("search" = Option<String>, Query, description = "Search name/alias/description"),
        ("sort_by" = Option<String>, Query, description = "Sort order: recent, popular, name"),
    ),
    responses(
        (status = 200, description = "Paginated characters", body = PaginatedResponse<CharacterResponse>),
    ),
    tag = "characters"
)]
pub async fn list_characters(
    Extension(db): Extension<DatabaseConnection>,
    Query(params): Query<CharacterListQuery>,
) -> AppResult<impl IntoResponse> {
    let page = params.page.unwrap_or(1).max(1);
    let per_page = params.limit.unwrap_or(12).clamp(1, 100);

    let filter = CharacterFilter {
        tier: params.tier,
        creator_id: params.creator_id,
        search: params.search,
        sort: params.sort_by,
    };

    let service = CharacterService::new(db.clone());
    let (characters, total) = service.list(&filter, page, per_page).await?;

    let creators = creator_summaries(db, &characters).await?;
    let items: Vec<CharacterResponse> = characters
        .into_iter()
        .map(|c| {
            let creator = creators.get(&c.creator_id).cloned();
            CharacterResponse::with_creator(c, creator)
        })
        .collect();

    Ok(ApiResponse::ok(PaginatedResponse::new(
        items, total, page, per_page,
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/characters/{id}",
    params(("id" = i32, Path, description = "Character ID")),
    responses(
        (status = 200, description = "Character details", body = CharacterResponse),
        (status = 404, description = "Character not found", body = AppError),
    ),
    tag = "characters"
)]
pub async fn get_character(
    Extension(db): Extension<DatabaseConnection>,
    Path(id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    let service = CharacterService::new(db.clone());
    service.increment_views(id).await?;
    let character = service.get_active(id).await?;

    let creators = creator_summaries(db, std::slice::from_ref(&character)).await?;
    let creator = creators.get(&character.creator_id).cloned();

    Ok(ApiResponse::ok(CharacterResponse::with_creator(
        character, creator,
    )))
}

#[utoipa::path(
    post,
    path = "/api/v1/characters",
    security(("jwt_token" = [])),
    request_body = CreateCharacterRequest,
    responses(
        (status = 200, description = "Character created", body = CharacterResponse),
        (status = 400, description = "Validation error", body = AppError),
        (status = 401, description = "Unauthorized", body = AppError),
    ),
    tag = "characters"
)]
pub async fn create_character(
    Extension(db): Extension<DatabaseConnection>,
    auth_user: AuthUser,
    Json(payload): Json<CreateCharacterRequest>,
) -> AppResult<impl IntoResponse> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let user_id = parse_user_id(&auth_user)?;

    let draft = CharacterDraft {
        name: payload.name,
        alias: payload.alias,
        quote: payload.quote,
        description: payload.description,
        origin: payload.origin,
        gender: payload.gender,
        classification: payload.classification,
        images: payload.images,
        tier: payload.tier,
        attack_potency: payload.attack_potency,
        speed: payload.speed,
        durability: payload.durability,
        weaknesses: payload.weaknesses,
        equipment: payload.equipment,
        strength: payload.strength,
        speed_stat: payload.speed_stat,
        durability_stat: payload.durability_stat,
        intelligence: payload.intelligence,
        energy: payload.energy,
        combat: payload.combat,
        abilities: payload.abilities,
    };

    let service = CharacterService::new(db);
    let character = service.create(user_id, draft).await?;

    Ok(ApiResponse::with_message(
        CharacterResponse::from(character),
        "Character created".to_string(),
    ))
}

#[utoipa::path(
    put,
    path = "/api/v1/characters/{id}",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "Character ID")),
    request_body = UpdateCharacterRequest,
    responses(
        (status = 200, description = "Character updated", body = CharacterResponse),
        (status = 400, description = "Validation error", body = AppError),
        (status = 403, description = "Not the creator", body = AppError),
        (status = 404, description = "Character not found", body = AppError),
    ),
    tag = "characters"
)]
pub async fn update_character(
    Extension(db): Extension<DatabaseConnection>,
    auth_user: AuthUser,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateCharacterRequest>,
) -> AppResult<impl IntoResponse> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let user_id = parse_user_id(&auth_user)?;

    let update = CharacterUpdate {
        name: payload.name,
        alias: payload.alias,
        quote: payload.quote,
        description: payload.description,
        origin: payload.origin,
        gender: payload.gender,
        classification: payload.classification,
        images: payload.images,
        tier: payload.tier,
        attack_potency: payload.attack_potency,
        speed: payload.speed,
        durability: payload.durability,
        weaknesses: payload.weaknesses,
        equipment: payload.equipment,
        strength: payload.strength,
        speed_stat: payload.speed_stat,
        durability_stat: payload.durability_stat,
        intelligence: payload.intelligence,
        energy: payload.energy,
        combat: payload.combat,
        abilities: payload.abilities,
    };

    let service = CharacterService::new(db);
    let character = service.update(id, user_id, update).await?;

    Ok(ApiResponse::with_message(
        CharacterResponse::from(character),
        "Character updated".to_string(),
    ))
}

#[utoipa::path(
    delete,
    path = "/api/v1/characters/{id}",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "Character ID")),
    responses(
        (status = 200, description = "Character deleted", body = String),
        (status = 403, description = "Not the creator", body = AppError),
        (status = 404, description = "Character not found", body = AppError),
    ),
    tag = "characters"
)]
pub async fn delete_character(
    Extension(db): Extension<DatabaseConnection>,
    auth_user: AuthUser,
    Path(id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    let user_id = parse_user_id(&auth_user)?;

    let service = CharacterService::new(db);
    service.soft_delete(id, user_id).await?;

    Ok(ApiResponse::ok("Character deleted"))
}

#[utoipa::path(
    get,
    path = "/api/v1/characters/creator/{creator_id}",
    params(("creator_id" = i32, Path, description = "Creator user ID")),
    responses(
        (status = 200, description = "Creator's active characters", body = Vec<CharacterResponse>),
    ),
    tag = "characters"
)]
pub async fn get_characters_by_creator(
    Extension(db): Extension<DatabaseConnection>,
    Path(creator_id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    let service = CharacterService::new(db.clone());
    let characters = service.list_by_creator(creator_id).await?;

    let creators = creator_summaries(db, &characters).await?;
    let items: Vec<CharacterResponse> = characters
        .into_iter()
        .map(|c| {
            let creator = creators.get(&c.creator_id).cloned();
            CharacterResponse::with_creator(c, creator)
        })
        .collect();

    Ok(ApiResponse::ok(items))
}

#[utoipa::path(
    post,
    path = "/api/v1/characters/{id}/like",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "Character ID")),
    responses(
        (status = 200, description = "Like toggled", body = LikeToggleResponse),
        (status = 401, description = "Unauthorized", body = AppError),
        (status = 404, description = "Character not found", body = AppError),
    ),
    tag = "characters"
)]
pub async fn toggle_character_like(
    Extension(db): Extension<DatabaseConnection>,
    auth_user: AuthUser,
    Path(id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    let user_id = parse_user_id(&auth_user)?;

    let service = CharacterService::new(db);
    let (likes, liked) = service.toggle_like(id, user_id).await?;

    Ok(ApiResponse::ok(LikeToggleResponse { likes, liked }))
}
