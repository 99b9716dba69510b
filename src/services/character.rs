use crate::{
    error::{AppError, AppResult},
    models::{
        character::{self, AbilityList, ImageList, ImageVariant, LikerSet},
        Character, CharacterModel,
    },
    utils::{normalize_image_url, strip_html},
};
use sea_orm::{
    sea_query::{extension::postgres::PgExpr, Expr},
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Statement, TransactionTrait,
};

pub struct CharacterService {
    db: DatabaseConnection,
}

/// Fields accepted at creation time. Absent stats default to 50, absent
/// tier to "Unknown".
pub struct CharacterDraft {
    pub name: String,
    pub alias: Option<String>,
    pub quote: Option<String>,
    pub description: String,
    pub origin: Option<String>,
    pub gender: Option<String>,
    pub classification: Option<String>,
    pub images: Vec<ImageVariant>,
    pub tier: Option<String>,
    pub attack_potency: Option<String>,
    pub speed: Option<String>,
    pub durability: Option<String>,
    pub weaknesses: Option<String>,
    pub equipment: Option<String>,
    pub strength: Option<i32>,
    pub speed_stat: Option<i32>,
    pub durability_stat: Option<i32>,
    pub intelligence: Option<i32>,
    pub energy: Option<i32>,
    pub combat: Option<i32>,
    pub abilities: Vec<String>,
}

/// Partial update; None leaves the column untouched.
#[derive(Default)]
pub struct CharacterUpdate {
    pub name: Option<String>,
    pub alias: Option<String>,
    pub quote: Option<String>,
    pub description: Option<String>,
    pub origin: Option<String>,
    pub gender: Option<String>,
    pub classification: Option<String>,
    pub images: Option<Vec<ImageVariant>>,
    pub tier: Option<String>,
    pub attack_potency: Option<String>,
    pub speed: Option<String>,
    pub durability: Option<String>,
    pub weaknesses: Option<String>,
    pub equipment: Option<String>,
    pub strength: Option<i32>,
    pub speed_stat: Option<i32>,
    pub durability_stat: Option<i32>,
    pub intelligence: Option<i32>,
    pub energy: Option<i32>,
    pub combat: Option<i32>,
    pub abilities: Option<Vec<String>>,
}

#[derive(Default)]
pub struct CharacterFilter {
    pub tier: Option<String>,
    pub creator_id: Option<i32>,
    pub search: Option<String>,
    pub sort: Option<String>,
}

fn normalize_images(images: Vec<ImageVariant>) -> ImageList {
    ImageList(
        images
            .into_iter()
            .map(|v| ImageVariant {
                url: normalize_image_url(&v.url),
                label: v.label,
            })
            .collect(),
    )
}

impl CharacterService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn list(
        &self,
        filter: &CharacterFilter,
        page: u64,
        per_page: u64,
    ) -> AppResult<(Vec<CharacterModel>, u64)> {
        let mut query = Character::find().filter(character::Column::IsActive.eq(true));

        if let Some(ref tier) = filter.tier {
            query = query.filter(character::Column::Tier.eq(tier.as_str()));
        }
        if let Some(creator_id) = filter.creator_id {
            query = query.filter(character::Column::CreatorId.eq(creator_id));
        }
        if let Some(ref search) = filter.search {
            let pattern = format!("%{}%", search.replace('%', "\\%").replace('_', "\\_"));
            query = query.filter(
                Condition::any()
                    .add(Expr::col(character::Column::Name).ilike(&pattern))
                    .add(Expr::col(character::Column::Alias).ilike(&pattern))
                    .add(Expr::col(character::Column::Description).ilike(&pattern)),
            );
        }

        query = match filter.sort.as_deref() {
            Some("popular") => query
                .order_by_desc(character::Column::Views)
                .order_by_desc(character::Column::Likes),
            Some("name") => query.order_by_asc(character::Column::Name),
            _ => query.order_by_desc(character::Column::CreatedAt),
        };

        let paginator = query.paginate(&self.db, per_page);
        let total = paginator.num_items().await?;
        let characters = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((characters, total))
    }

    /// Batch lookup for embedding summaries. Soft-deleted characters are
    /// included so existing battles and chats keep rendering their names.
    pub async fn by_ids(
        &self,
        ids: &[i32],
    ) -> AppResult<std::collections::HashMap<i32, CharacterModel>> {
        if ids.is_empty() {
            return Ok(std::collections::HashMap::new());
        }
        let characters = Character::find()
            .filter(character::Column::Id.is_in(ids.iter().copied()))
            .all(&self.db)
            .await?;
        Ok(characters.into_iter().map(|c| (c.id, c)).collect())
    }

    pub async fn get_active(&self, id: i32) -> AppResult<CharacterModel> {
        Character::find_by_id(id)
            .filter(character::Column::IsActive.eq(true))
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)
    }

    /// Detail-view counter: every fetch counts, including repeats by the
    /// same viewer.
    pub async fn increment_views(&self, id: i32) -> AppResult<()> {
        self.db
            .execute(Statement::from_sql_and_values(
                sea_orm::DatabaseBackend::Postgres,
                "UPDATE characters SET views = views + 1 WHERE id = $1 AND is_active = TRUE",
                vec![id.into()],
            ))
            .await?;
        Ok(())
    }

    pub async fn create(&self, creator_id: i32, draft: CharacterDraft) -> AppResult<CharacterModel> {
        let now = chrono::Utc::now().naive_utc();

        let new_character = character::ActiveModel {
            name: sea_orm::ActiveValue::Set(strip_html(&draft.name)),
            alias: sea_orm::ActiveValue::Set(draft.alias.map(|v| strip_html(&v))),
            quote: sea_orm::ActiveValue::Set(draft.quote.map(|v| strip_html(&v))),
            description: sea_orm::ActiveValue::Set(strip_html(&draft.description)),
            origin: sea_orm::ActiveValue::Set(draft.origin.map(|v| strip_html(&v))),
            gender: sea_orm::ActiveValue::Set(draft.gender.map(|v| strip_html(&v))),
            classification: sea_orm::ActiveValue::Set(
                draft.classification.map(|v| strip_html(&v)),
            ),
            images: sea_orm::ActiveValue::Set(normalize_images(draft.images)),
            tier: sea_orm::ActiveValue::Set(draft.tier.unwrap_or_else(|| "Unknown".to_string())),
            attack_potency: sea_orm::ActiveValue::Set(
                draft.attack_potency.map(|v| strip_html(&v)),
            ),
            speed: sea_orm::ActiveValue::Set(draft.speed.map(|v| strip_html(&v))),
            durability: sea_orm::ActiveValue::Set(draft.durability.map(|v| strip_html(&v))),
            weaknesses: sea_orm::ActiveValue::Set(draft.weaknesses.map(|v| strip_html(&v))),
            equipment: sea_orm::ActiveValue::Set(draft.equipment.map(|v| strip_html(&v))),
            strength: sea_orm::ActiveValue::Set(draft.strength.unwrap_or(50)),
            speed_stat: sea_orm::ActiveValue::Set(draft.speed_stat.unwrap_or(50)),
            durability_stat: sea_orm::ActiveValue::Set(draft.durability_stat.unwrap_or(50)),
            intelligence: sea_orm::ActiveValue::Set(draft.intelligence.unwrap_or(50)),
            energy: sea_orm::ActiveValue::Set(draft.energy.unwrap_or(50)),
            combat: sea_orm::ActiveValue::Set(draft.combat.unwrap_or(50)),
            abilities: sea_orm::ActiveValue::Set(AbilityList(draft.abilities)),
            liked_by: sea_orm::ActiveValue::Set(LikerSet::default()),
            creator_id: sea_orm::ActiveValue::Set(creator_id),
            views: sea_orm::ActiveValue::Set(0),
            likes: sea_orm::ActiveValue::Set(0),
            is_active: sea_orm::ActiveValue::Set(true),
            created_at: sea_orm::ActiveValue::Set(now),
            updated_at: sea_orm::ActiveValue::Set(now),
            ..Default::default()
        };

        let character = new_character.insert(&self.db).await?;
        Ok(character)
    }

    pub async fn update(
        &self,
        id: i32,
        user_id: i32,
        update: CharacterUpdate,
    ) -> AppResult<CharacterModel> {
        let existing = self.get_active(id).await?;
        if existing.creator_id != user_id {
            return Err(AppError::Forbidden);
        }

        let now = chrono::Utc::now().naive_utc();
        let mut active: character::ActiveModel = existing.into();

        if let Some(v) = update.name {
            active.name = sea_orm::ActiveValue::Set(strip_html(&v));
        }
        if let Some(v) = update.alias {
            active.alias = sea_orm::ActiveValue::Set(Some(strip_html(&v)));
        }
        if let Some(v) = update.quote {
            active.quote = sea_orm::ActiveValue::Set(Some(strip_html(&v)));
        }
        if let Some(v) = update.description {
            active.description = sea_orm::ActiveValue::Set(strip_html(&v));
        }
        if let Some(v) = update.origin {
            active.origin = sea_orm::ActiveValue::Set(Some(strip_html(&v)));
        }
        if let Some(v) = update.gender {
            active.gender = sea_orm::ActiveValue::Set(Some(strip_html(&v)));
        }
        if let Some(v) = update.classification {
            active.classification = sea_orm::ActiveValue::Set(Some(strip_html(&v)));
        }
        if let Some(v) = update.images {
            active.images = sea_orm::ActiveValue::Set(normalize_images(v));
        }
        if let Some(v) = update.tier {
            active.tier = sea_orm::ActiveValue::Set(v);
        }
        if let Some(v) = update.attack_potency {
            active.attack_potency = sea_orm::ActiveValue::Set(Some(strip_html(&v)));
        }
        if let Some(v) = update.speed {
            active.speed = sea_orm::ActiveValue::Set(Some(strip_html(&v)));
        }
        if let Some(v) = update.durability {
            active.durability = sea_orm::ActiveValue::Set(Some(strip_html(&v)));
        }
        if let Some(v) = update.weaknesses {
            active.weaknesses = sea_orm::ActiveValue::Set(Some(strip_html(&v)));
        }
        if let Some(v) = update.equipment {
            active.equipment = sea_orm::ActiveValue::Set(Some(strip_html(&v)));
        }
        if let Some(v) = update.strength {
            active.strength = sea_orm::ActiveValue::Set(v);
        }
        if let Some(v) = update.speed_stat {
            active.speed_stat = sea_orm::ActiveValue::Set(v);
        }
        if let Some(v) = update.durability_stat {
            active.durability_stat = sea_orm::ActiveValue::Set(v);
        }
        if let Some(v) = update.intelligence {
            active.intelligence = sea_orm::ActiveValue::Set(v);
        }
        if let Some(v) = update.energy {
            active.energy = sea_orm::ActiveValue::Set(v);
        }
        if let Some(v) = update.combat {
            active.combat = sea_orm::ActiveValue::Set(v);
        }
        if let Some(v) = update.abilities {
            active.abilities = sea_orm::ActiveValue::Set(AbilityList(v));
        }
        active.updated_at = sea_orm::ActiveValue::Set(now);

        let updated = active.update(&self.db).await?;
        Ok(updated)
    }

    pub async fn soft_delete(&self, id: i32, user_id: i32) -> AppResult<()> {
        let existing = self.get_active(id).await?;
        if existing.creator_id != user_id {
            return Err(AppError::Forbidden);
        }

        let mut active: character::ActiveModel = existing.into();
        active.is_active = sea_orm::ActiveValue::Set(false);
        active.updated_at = sea_orm::ActiveValue::Set(chrono::Utc::now().naive_utc());
        active.update(&self.db).await?;
        Ok(())
    }

    pub async fn list_by_creator(&self, creator_id: i32) -> AppResult<Vec<CharacterModel>> {
        let characters = Character::find()
            .filter(character::Column::CreatorId.eq(creator_id))
            .filter(character::Column::IsActive.eq(true))
            .order_by_desc(character::Column::CreatedAt)
            .all(&self.db)
            .await?;
        Ok(characters)
    }

    /// Per-user like toggle: an involution on (likes, liked_by).
    /// Row-locked so concurrent togglers cannot lose updates.
    pub async fn toggle_like(&self, id: i32, user_id: i32) -> AppResult<(i32, bool)> {
        let txn = self.db.begin().await?;

        let character = Character::find_by_id(id)
            .filter(character::Column::IsActive.eq(true))
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or(AppError::NotFound)?;

        let mut likers = character.liked_by.0.clone();
        let liked = if likers.contains(&user_id) {
            likers.retain(|&uid| uid != user_id);
            false
        } else {
            likers.push(user_id);
            true
        };
        let likes = if liked {
            character.likes + 1
        } else {
            (character.likes - 1).max(0)
        };

        let mut active: character::ActiveModel = character.into();
        active.liked_by = sea_orm::ActiveValue::Set(LikerSet(likers));
        active.likes = sea_orm::ActiveValue::Set(likes);
        active.update(&txn).await?;

        txn.commit().await?;
        Ok((likes, liked))
    }
}
