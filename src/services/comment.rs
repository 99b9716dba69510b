use crate::{
    error::{AppError, AppResult},
    models::{
        character::{self, LikerSet},
        comment, Character, Comment, CommentModel,
    },
    utils::strip_html,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, TransactionTrait,
};
use std::collections::HashMap;

pub struct CommentService {
    db: DatabaseConnection,
}

impl CommentService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Page of top-level comments (newest first) with each comment's direct
    /// replies (oldest first). Replies do not count toward pagination, and
    /// a deactivated parent hides its whole reply group.
    pub async fn list_by_character(
        &self,
        character_id: i32,
        page: u64,
        per_page: u64,
    ) -> AppResult<(Vec<(CommentModel, Vec<CommentModel>)>, u64)> {
        let paginator = Comment::find()
            .filter(comment::Column::CharacterId.eq(character_id))
            .filter(comment::Column::ParentId.is_null())
            .filter(comment::Column::IsActive.eq(true))
            .order_by_desc(comment::Column::CreatedAt)
            .paginate(&self.db, per_page);

        let total = paginator.num_items().await?;
        let top_level = paginator.fetch_page(page.saturating_sub(1)).await?;

        let parent_ids: Vec<i32> = top_level.iter().map(|c| c.id).collect();
        let mut replies_by_parent: HashMap<i32, Vec<CommentModel>> = HashMap::new();

        if !parent_ids.is_empty() {
            let replies = Comment::find()
                .filter(comment::Column::ParentId.is_in(parent_ids))
                .filter(comment::Column::IsActive.eq(true))
                .order_by_asc(comment::Column::CreatedAt)
                .all(&self.db)
                .await?;

            for reply in replies {
                if let Some(parent_id) = reply.parent_id {
                    replies_by_parent.entry(parent_id).or_default().push(reply);
                }
            }
        }

        let threads = top_level
            .into_iter()
            .map(|c| {
                let replies = replies_by_parent.remove(&c.id).unwrap_or_default();
                (c, replies)
            })
            .collect();

        Ok((threads, total))
    }

    pub async fn create(
        &self,
        character_id: i32,
        user_id: i32,
        parent_id: Option<i32>,
        content: &str,
    ) -> AppResult<CommentModel> {
        Character::find_by_id(character_id)
            .filter(character::Column::IsActive.eq(true))
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)?;

        if let Some(pid) = parent_id {
            Comment::find_by_id(pid)
                .filter(comment::Column::IsActive.eq(true))
                .one(&self.db)
                .await?
                .ok_or_else(|| AppError::Validation("Parent comment not found".to_string()))?;
        }

        let now = chrono::Utc::now().naive_utc();

        let new_comment = comment::ActiveModel {
            character_id: sea_orm::ActiveValue::Set(character_id),
            user_id: sea_orm::ActiveValue::Set(user_id),
            parent_id: sea_orm::ActiveValue::Set(parent_id),
            content: sea_orm::ActiveValue::Set(strip_html(content)),
            likes: sea_orm::ActiveValue::Set(0),
            liked_by: sea_orm::ActiveValue::Set(LikerSet::default()),
            is_active: sea_orm::ActiveValue::Set(true),
            created_at: sea_orm::ActiveValue::Set(now),
            updated_at: sea_orm::ActiveValue::Set(now),
            ..Default::default()
        };

        let comment = new_comment.insert(&self.db).await?;
        Ok(comment)
    }

    pub async fn update(&self, id: i32, user_id: i32, content: &str) -> AppResult<CommentModel> {
        let existing = self.get_active(id).await?;
        if existing.user_id != user_id {
            return Err(AppError::Forbidden);
        }

        let now = chrono::Utc::now().naive_utc();
        let mut active: comment::ActiveModel = existing.into();
        active.content = sea_orm::ActiveValue::Set(strip_html(content));
        active.updated_at = sea_orm::ActiveValue::Set(now);

        let updated = active.update(&self.db).await?;
        Ok(updated)
    }

    pub async fn soft_delete(&self, id: i32, user_id: i32) -> AppResult<()> {
        let existing = self.get_active(id).await?;
        if existing.user_id != user_id {
            return Err(AppError::Forbidden);
        }

        let mut active: comment::ActiveModel = existing.into();
        active.is_active = sea_orm::ActiveValue::Set(false);
        active.updated_at = sea_orm::ActiveValue::Set(chrono::Utc::now().naive_utc());
        active.update(&self.db).await?;
        Ok(())
    }

    /// Same deduplicated toggle policy as character likes.
    pub async fn toggle_like(&self, id: i32, user_id: i32) -> AppResult<(i32, bool)> {
        let txn = self.db.begin().await?;

        let comment = Comment::find_by_id(id)
            .filter(comment::Column::IsActive.eq(true))
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or(AppError::NotFound)?;

        let mut likers = comment.liked_by.0.clone();
        let liked = if likers.contains(&user_id) {
            likers.retain(|&uid| uid != user_id);
            false
        } else {
            likers.push(user_id);
            true
        };
        let likes = if liked {
            comment.likes + 1
        } else {
            (comment.likes - 1).max(0)
        };

        let mut active: comment::ActiveModel = comment.into();
        active.liked_by = sea_orm::ActiveValue::Set(LikerSet(likers));
        active.likes = sea_orm::ActiveValue::Set(likes);
        active.update(&txn).await?;

        txn.commit().await?;
        Ok((likes, liked))
    }

    async fn get_active(&self, id: i32) -> AppResult<CommentModel> {
        Comment::find_by_id(id)
            .filter(comment::Column::IsActive.eq(true))
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)
    }
}
