use crate::{
    error::{AppError, AppResult},
    models::{user, User, UserModel},
    utils::normalize_image_url,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect,
};

pub struct UserService {
    db: DatabaseConnection,
}

impl UserService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Public profile lookup. Deactivated accounts read as absent.
    pub async fn get_profile(&self, id: i32) -> AppResult<UserModel> {
        User::find_by_id(id)
            .filter(user::Column::IsActive.eq(true))
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)
    }

    /// Username substring search over active accounts.
    pub async fn search(&self, query: &str, limit: u64) -> AppResult<Vec<UserModel>> {
        let pattern = format!("%{}%", query.replace('%', "\\%").replace('_', "\\_"));
        let users = User::find()
            .filter(user::Column::IsActive.eq(true))
            .filter(user::Column::Username.like(&pattern))
            .order_by_asc(user::Column::Username)
            .limit(limit)
            .all(&self.db)
            .await?;
        Ok(users)
    }

    /// Batch lookup for embedding author/creator identities in list views.
    pub async fn by_ids(
        &self,
        ids: &[i32],
    ) -> AppResult<std::collections::HashMap<i32, UserModel>> {
        if ids.is_empty() {
            return Ok(std::collections::HashMap::new());
        }
        let users = User::find()
            .filter(user::Column::Id.is_in(ids.iter().copied()))
            .all(&self.db)
            .await?;
        Ok(users.into_iter().map(|u| (u.id, u)).collect())
    }

    pub async fn update_me(
        &self,
        user_id: i32,
        username: Option<String>,
        avatar_url: Option<String>,
    ) -> AppResult<UserModel> {
        let user = User::find_by_id(user_id)
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)?;

        if let Some(ref new_username) = username {
            if *new_username != user.username {
                let taken = User::find()
                    .filter(user::Column::Username.eq(new_username.as_str()))
                    .one(&self.db)
                    .await?
                    .is_some();
                if taken {
                    return Err(AppError::Conflict("Username is already taken".to_string()));
                }
            }
        }

        let now = chrono::Utc::now().naive_utc();
        let mut active: user::ActiveModel = user.into();
        if let Some(new_username) = username {
            active.username = sea_orm::ActiveValue::Set(new_username);
        }
        if let Some(raw_url) = avatar_url {
            active.avatar_url = sea_orm::ActiveValue::Set(Some(normalize_image_url(&raw_url)));
        }
        active.updated_at = sea_orm::ActiveValue::Set(now);

        let updated = active.update(&self.db).await?;
        Ok(updated)
    }
}
