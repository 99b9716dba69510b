use crate::error::{AppError, AppResult};
use crate::handlers::character::CharacterSummary;
use crate::handlers::user::UserSummary;
use crate::middleware::auth::parse_user_id;
use crate::middleware::AuthUser;
use crate::models::{BattleModel, BattleVoteModel};
use crate::response::{ApiResponse, PaginatedResponse};
use crate::services::battle::BattleService;
use crate::services::character::CharacterService;
use crate::services::user::UserService;
use axum::{
    extract::{Path, Query},
    response::IntoResponse,
    Extension, Json,
};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateBattleRequest {
    pub character1_id: i32,
    pub character2_id: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VoteRequest {
    /// Must be one of the battle's two characters
    pub voted_character_id: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BattleListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub sort_by: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BattleResponse {
    pub id: i32,
    pub character1_id: i32,
    pub character2_id: i32,
    pub creator_id: i32,
    pub simulation_winner_id: Option<i32>,
    pub win_probability_char1: i32,
    pub win_probability_char2: i32,
    pub votes_char1: i32,
    pub votes_char2: i32,
    pub total_votes: i32,
    pub views: i32,
    pub character1: Option<CharacterSummary>,
    pub character2: Option<CharacterSummary>,
    pub creator: Option<UserSummary>,
    pub created_at: String,
}

impl BattleResponse {
    fn build(
        b: BattleModel,
        characters: &HashMap<i32, CharacterSummary>,
        creators: &HashMap<i32, UserSummary>,
    ) -> Self {
        Self {
            id: b.id,
            character1_id: b.character1_id,
            character2_id: b.character2_id,
            creator_id: b.creator_id,
            simulation_winner_id: b.simulation_winner_id,
            win_probability_char1: b.win_probability_char1,
            win_probability_char2: b.win_probability_char2,
            votes_char1: b.votes_char1,
            votes_char2: b.votes_char2,
            total_votes: b.total_votes,
            views: b.views,
            character1: characters.get(&b.character1_id).cloned(),
            character2: characters.get(&b.character2_id).cloned(),
            creator: creators.get(&b.creator_id).cloned(),
            created_at: b.created_at.to_string(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VoteTallyResponse {
    pub votes_char1: i32,
    pub votes_char2: i32,
    pub total_votes: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MyVoteResponse {
    pub battle_id: i32,
    pub voted_character_id: i32,
}

impl From<BattleVoteModel> for MyVoteResponse {
    fn from(v: BattleVoteModel) -> Self {
        Self {
            battle_id: v.battle_id,
            voted_character_id: v.voted_character_id,
        }
    }
}

async fn battle_summaries(
    db: DatabaseConnection,
    battles: &[BattleModel],
) -> AppResult<(HashMap<i32, CharacterSummary>, HashMap<i32, UserSummary>)> {
    let mut character_ids: Vec<i32> = Vec::new();
    let mut creator_ids: Vec<i32> = Vec::new();
    for battle in battles {
        character_ids.push(battle.character1_id);
        character_ids.push(battle.character2_id);
        creator_ids.push(battle.creator_id);
    }

    let characters = CharacterService::new(db.clone())
        .by_ids(&character_ids)
        .await?;
    let users = UserService::new(db).by_ids(&creator_ids).await?;

    let character_summaries = characters
        .iter()
        .map(|(id, c)| (*id, CharacterSummary::from(c)))
        .collect();
    let creator_summaries = users
        .iter()
        .map(|(id, u)| (*id, UserSummary::from(u)))
        .collect();

    Ok((character_summaries, creator_summaries))
}

#[utoipa::path(
    get,
    path = "/api/v1/battles",
    params(
        ("page" = Option<u64>, Query, description = "Page number"),
        ("limit" = Option<u64>, Query, description = "Items per page"),
        ("sort_by" = Option<String>, Query, description = "Sort order: recent, popular"),
    ),
    responses(
        (status = 200, description = "Paginated battles", body = PaginatedResponse<BattleResponse>),
    ),
    tag = "battles"
)]
pub async fn list_battles(
    Extension(db): Extension<DatabaseConnection>,
    Query(params): Query<BattleListQuery>,
) -> AppResult<impl IntoResponse> {
    let page = params.page.unwrap_or(1).max(1);
    let per_page = params.limit.unwrap_or(12).clamp(1, 100);
    let sort = params.sort_by.as_deref().unwrap_or("recent");

    let service = BattleService::new(db.clone());
    let (battles, total) = service.list(page, per_page, sort).await?;

    let (characters, creators) = battle_summaries(db, &battles).await?;
    let items: Vec<BattleResponse> = battles
        .into_iter()
        .map(|b| BattleResponse::build(b, &characters, &creators))
        .collect();

    Ok(ApiResponse::ok(PaginatedResponse::new(
        items, total, page, per_page,
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/battles/{id}",
    params(("id" = i32, Path, description = "Battle ID")),
    responses(
        (status = 200, description = "Battle details", body = BattleResponse),
        (status = 404, description = "Battle not found", body = AppError),
    ),
    tag = "battles"
)]
pub async fn get_battle(
    Extension(db): Extension<DatabaseConnection>,
    Path(id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    let service = BattleService::new(db.clone());
    service.increment_views(id).await?;
    let battle = service.get_active(id).await?;

    let (characters, creators) = battle_summaries(db, std::slice::from_ref(&battle)).await?;
    Ok(ApiResponse::ok(BattleResponse::build(
        battle,
        &characters,
        &creators,
    )))
}

#[utoipa::path(
    post,
    path = "/api/v1/battles",
    security(("jwt_token" = [])),
    request_body = CreateBattleRequest,
    responses(
        (status = 200, description = "Battle created with frozen outcome", body = BattleResponse),
        (status = 400, description = "A character cannot battle itself", body = AppError),
        (status = 401, description = "Unauthorized", body = AppError),
        (status = 404, description = "Character not found", body = AppError),
    ),
    tag = "battles"
)]
pub async fn create_battle(
    Extension(db): Extension<DatabaseConnection>,
    auth_user: AuthUser,
    Json(payload): Json<CreateBattleRequest>,
) -> AppResult<impl IntoResponse> {
    let user_id = parse_user_id(&auth_user)?;

    let service = BattleService::new(db.clone());
    let battle = service
        .create(user_id, payload.character1_id, payload.character2_id)
        .await?;

    let (characters, creators) = battle_summaries(db, std::slice::from_ref(&battle)).await?;
    Ok(ApiResponse::with_message(
        BattleResponse::build(battle, &characters, &creators),
        "Battle created".to_string(),
    ))
}

#[utoipa::path(
    delete,
    path = "/api/v1/battles/{id}",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "Battle ID")),
    responses(
        (status = 200, description = "Battle deleted", body = String),
        (status = 403, description = "Not the creator", body = AppError),
        (status = 404, description = "Battle not found", body = AppError),
    ),
    tag = "battles"
)]
pub async fn delete_battle(
    Extension(db): Extension<DatabaseConnection>,
    auth_user: AuthUser,
    Path(id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    let user_id = parse_user_id(&auth_user)?;

    let service = BattleService::new(db);
    service.soft_delete(id, user_id).await?;

    Ok(ApiResponse::ok("Battle deleted"))
}

#[utoipa::path(
    post,
    path = "/api/v1/battles/{id}/vote",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "Battle ID")),
    request_body = VoteRequest,
    responses(
        (status = 200, description = "Vote recorded", body = VoteTallyResponse),
        (status = 400, description = "Voted character is not part of this battle", body = AppError),
        (status = 401, description = "Unauthorized", body = AppError),
        (status = 404, description = "Battle not found", body = AppError),
    ),
    tag = "battles"
)]
pub async fn vote_battle(
    Extension(db): Extension<DatabaseConnection>,
    auth_user: AuthUser,
    Path(id): Path<i32>,
    Json(payload): Json<VoteRequest>,
) -> AppResult<impl IntoResponse> {
    let user_id = parse_user_id(&auth_user)?;

    let service = BattleService::new(db);
    let battle = service.vote(id, user_id, payload.voted_character_id).await?;

    Ok(ApiResponse::with_message(
        VoteTallyResponse {
            votes_char1: battle.votes_char1,
            votes_char2: battle.votes_char2,
            total_votes: battle.total_votes,
        },
        "Vote recorded".to_string(),
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/battles/{id}/my-vote",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "Battle ID")),
    responses(
        (status = 200, description = "Caller's current vote, or null", body = Option<MyVoteResponse>),
        (status = 401, description = "Unauthorized", body = AppError),
    ),
    tag = "battles"
)]
pub async fn get_my_vote(
    Extension(db): Extension<DatabaseConnection>,
    auth_user: AuthUser,
    Path(id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    let user_id = parse_user_id(&auth_user)?;

    let service = BattleService::new(db);
    let vote = service.my_vote(id, user_id).await?;

    Ok(ApiResponse::ok(vote.map(MyVoteResponse::from)))
}
