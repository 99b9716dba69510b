use crate::{
    error::{AppError, AppResult},
    models::{
        conversation, conversation_participant, message, user, Conversation, ConversationModel,
        ConversationParticipant, Message, MessageModel, User, UserModel,
    },
    utils::strip_html,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Statement, TransactionTrait,
};

pub struct ConversationService {
    db: DatabaseConnection,
}

impl ConversationService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// At most one two-party conversation per unordered user pair: reuse the
    /// existing one when the participant set is exactly {caller, other},
    /// otherwise create it lazily. Returns (conversation, created).
    pub async fn find_or_create(
        &self,
        user_id: i32,
        participant_id: i32,
        character_id: Option<i32>,
    ) -> AppResult<(ConversationModel, bool)> {
        if participant_id == user_id {
            return Err(AppError::Validation(
                "Cannot start a conversation with yourself".to_string(),
            ));
        }

        User::find_by_id(participant_id)
            .filter(user::Column::IsActive.eq(true))
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)?;

        let existing = self
            .db
            .query_one(Statement::from_sql_and_values(
                sea_orm::DatabaseBackend::Postgres,
                "SELECT cp.conversation_id
                 FROM conversation_participants cp
                 WHERE cp.user_id IN ($1, $2)
                 GROUP BY cp.conversation_id
                 HAVING COUNT(DISTINCT cp.user_id) = 2
                    AND (SELECT COUNT(*) FROM conversation_participants x
                         WHERE x.conversation_id = cp.conversation_id) = 2
                 LIMIT 1",
                vec![user_id.into(), participant_id.into()],
            ))
            .await?;

        if let Some(row) = existing {
            let conversation_id: i32 = row.try_get("", "conversation_id")?;
            let conversation = Conversation::find_by_id(conversation_id)
                .one(&self.db)
                .await?
                .ok_or(AppError::NotFound)?;
            return Ok((conversation, false));
        }

        let now = chrono::Utc::now().naive_utc();
        let txn = self.db.begin().await?;

        let conversation = conversation::ActiveModel {
            character_id: sea_orm::ActiveValue::Set(character_id),
            last_message_id: sea_orm::ActiveValue::Set(None),
            created_at: sea_orm::ActiveValue::Set(now),
            updated_at: sea_orm::ActiveValue::Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        for uid in [user_id, participant_id] {
            conversation_participant::ActiveModel {
                conversation_id: sea_orm::ActiveValue::Set(conversation.id),
                user_id: sea_orm::ActiveValue::Set(uid),
                created_at: sea_orm::ActiveValue::Set(now),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
        }

        txn.commit().await?;
        Ok((conversation, true))
    }

    /// Caller's conversations, most recently touched first.
    pub async fn list_for_user(&self, user_id: i32) -> AppResult<Vec<ConversationModel>> {
        let joins = ConversationParticipant::find()
            .filter(conversation_participant::Column::UserId.eq(user_id))
            .all(&self.db)
            .await?;
        let ids: Vec<i32> = joins.iter().map(|j| j.conversation_id).collect();

        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let conversations = Conversation::find()
            .filter(conversation::Column::Id.is_in(ids))
            .order_by_desc(conversation::Column::UpdatedAt)
            .all(&self.db)
            .await?;
        Ok(conversations)
    }

    pub async fn get_for_participant(
        &self,
        id: i32,
        user_id: i32,
    ) -> AppResult<ConversationModel> {
        let conversation = Conversation::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)?;

        if !self.is_participant(id, user_id).await? {
            return Err(AppError::Forbidden);
        }

        Ok(conversation)
    }

    pub async fn is_participant(&self, conversation_id: i32, user_id: i32) -> AppResult<bool> {
        let count = ConversationParticipant::find()
            .filter(conversation_participant::Column::ConversationId.eq(conversation_id))
            .filter(conversation_participant::Column::UserId.eq(user_id))
            .count(&self.db)
            .await?;
        Ok(count > 0)
    }

    pub async fn participants_of(&self, conversation_id: i32) -> AppResult<Vec<UserModel>> {
        let joins = ConversationParticipant::find()
            .filter(conversation_participant::Column::ConversationId.eq(conversation_id))
            .all(&self.db)
            .await?;
        let user_ids: Vec<i32> = joins.iter().map(|j| j.user_id).collect();

        let users = User::find()
            .filter(user::Column::Id.is_in(user_ids))
            .all(&self.db)
            .await?;
        Ok(users)
    }

    pub async fn last_message_of(
        &self,
        conversation: &ConversationModel,
    ) -> AppResult<Option<MessageModel>> {
        match conversation.last_message_id {
            Some(id) => Ok(Message::find_by_id(id).one(&self.db).await?),
            None => Ok(None),
        }
    }

    /// Hard delete by any participant; messages and join rows cascade.
    pub async fn delete(&self, id: i32, user_id: i32) -> AppResult<()> {
        let conversation = self.get_for_participant(id, user_id).await?;
        Conversation::delete_by_id(conversation.id)
            .exec(&self.db)
            .await?;
        Ok(())
    }

    /// Messages oldest-first, the natural chat scroll order.
    pub async fn list_messages(
        &self,
        conversation_id: i32,
        user_id: i32,
        page: u64,
        per_page: u64,
    ) -> AppResult<(Vec<MessageModel>, u64)> {
        self.get_for_participant(conversation_id, user_id).await?;

        let paginator = Message::find()
            .filter(message::Column::ConversationId.eq(conversation_id))
            .order_by_asc(message::Column::CreatedAt)
            .paginate(&self.db, per_page);

        let total = paginator.num_items().await?;
        let messages = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((messages, total))
    }

    /// Durable write path: the message row and the conversation's
    /// last-message pointer move together or not at all.
    pub async fn create_message(
        &self,
        conversation_id: i32,
        sender_id: i32,
        content: &str,
    ) -> AppResult<MessageModel> {
        let conversation = self.get_for_participant(conversation_id, sender_id).await?;

        let now = chrono::Utc::now().naive_utc();
        let txn = self.db.begin().await?;

        let message = message::ActiveModel {
            conversation_id: sea_orm::ActiveValue::Set(conversation_id),
            sender_id: sea_orm::ActiveValue::Set(sender_id),
            content: sea_orm::ActiveValue::Set(strip_html(content)),
            is_read: sea_orm::ActiveValue::Set(false),
            created_at: sea_orm::ActiveValue::Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let mut active: conversation::ActiveModel = conversation.into();
        active.last_message_id = sea_orm::ActiveValue::Set(Some(message.id));
        active.updated_at = sea_orm::ActiveValue::Set(now);
        active.update(&txn).await?;

        txn.commit().await?;
        Ok(message)
    }

    /// Bulk flip of everything unread that the caller did not send.
    /// Returns the number of messages marked.
    pub async fn mark_read(&self, conversation_id: i32, user_id: i32) -> AppResult<u64> {
        self.get_for_participant(conversation_id, user_id).await?;

        let result = self
            .db
            .execute(Statement::from_sql_and_values(
                sea_orm::DatabaseBackend::Postgres,
                "UPDATE messages SET is_read = TRUE
                 WHERE conversation_id = $1 AND sender_id <> $2 AND is_read = FALSE",
                vec![conversation_id.into(), user_id.into()],
            ))
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn unread_count(&self, conversation_id: i32, user_id: i32) -> AppResult<u64> {
        let count = Message::find()
            .filter(message::Column::ConversationId.eq(conversation_id))
            .filter(message::Column::SenderId.ne(user_id))
            .filter(message::Column::IsRead.eq(false))
            .count(&self.db)
            .await?;
        Ok(count)
    }

    /// Global badge sum across all of the caller's conversations.
    pub async fn total_unread(&self, user_id: i32) -> AppResult<u64> {
        let row = self
            .db
            .query_one(Statement::from_sql_and_values(
                sea_orm::DatabaseBackend::Postgres,
                "SELECT COUNT(*) AS unread
                 FROM messages m
                 JOIN conversation_participants cp
                   ON cp.conversation_id = m.conversation_id AND cp.user_id = $1
                 WHERE m.sender_id <> $1 AND m.is_read = FALSE",
                vec![user_id.into()],
            ))
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Unread count query failed")))?;

        let unread: i64 = row.try_get("", "unread")?;
        Ok(unread as u64)
    }
}
