use crate::{
    config::auth::AuthConfig,
    error::{AppError, AppResult},
    models::{refresh_token, user, RefreshToken, User, UserModel},
    services::email::EmailService,
    utils::{encode_access_token, encode_refresh_token, hash_password, verify_password},
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    TransactionTrait,
};

pub struct AuthService {
    db: DatabaseConnection,
    config: AuthConfig,
}

impl AuthService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            config: AuthConfig::from_env(),
        }
    }

    /// Register a new user. While email verification is required the account
    /// starts unverified and no credential is issued; the verification mail
    /// is dispatched best-effort and never rolls back the write.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
        email_service: &EmailService,
    ) -> AppResult<UserModel> {
        if let Some(existing) = User::find()
            .filter(
                sea_orm::Condition::any()
                    .add(user::Column::Username.eq(username))
                    .add(user::Column::Email.eq(email)),
            )
            .one(&self.db)
            .await?
        {
            let message = if existing.email == email {
                "Email is already registered"
            } else {
                "Username is already taken"
            };
            return Err(AppError::Conflict(message.to_string()));
        }

        let password_hash = hash_password(password)?;
        let now = chrono::Utc::now().naive_utc();
        let (is_verified, verification_token, verification_expires) =
            if self.config.require_email_verification {
                let token = uuid::Uuid::new_v4().to_string();
                let expires = now + chrono::Duration::hours(24);
                (false, Some(token), Some(expires))
            } else {
                (true, None, None)
            };

        let new_user = user::ActiveModel {
            username: sea_orm::ActiveValue::Set(username.to_string()),
            email: sea_orm::ActiveValue::Set(email.to_string()),
            password_hash: sea_orm::ActiveValue::Set(password_hash),
            role: sea_orm::ActiveValue::Set("user".to_string()),
            avatar_url: sea_orm::ActiveValue::Set(None),
            is_verified: sea_orm::ActiveValue::Set(is_verified),
            verification_token: sea_orm::ActiveValue::Set(verification_token.clone()),
            verification_expires: sea_orm::ActiveValue::Set(verification_expires),
            is_active: sea_orm::ActiveValue::Set(true),
            created_at: sea_orm::ActiveValue::Set(now),
            updated_at: sea_orm::ActiveValue::Set(now),
            ..Default::default()
        };

        let user = new_user.insert(&self.db).await?;

        if let Some(token) = verification_token {
            if let Err(e) = email_service
                .send_verification_email(&user.email, &token)
                .await
            {
                tracing::warn!("Failed to send verification email: {e}");
            }
        }

        Ok(user)
    }

    /// Login by email + password.
    /// Returns (user, access_token, refresh_token).
    pub async fn login(
        &self,
        email: &str,
        password: &str,
    ) -> AppResult<(UserModel, String, String)> {
        let user = User::find()
            .filter(user::Column::Email.eq(email))
            .one(&self.db)
            .await?
            .ok_or(AppError::Unauthorized)?;

        let is_valid = verify_password(password, &user.password_hash)?;
        if !is_valid {
            return Err(AppError::Unauthorized);
        }

        if !user.is_active {
            return Err(AppError::Forbidden);
        }

        if !user.is_verified {
            return Err(AppError::AccountNotVerified);
        }

        let (access_token, refresh_token) = self.issue_tokens(&user).await?;
        Ok((user, access_token, refresh_token))
    }

    /// Consume a verification token: single use, flips the flag, clears the
    /// token, and returns a fresh credential (auto-login).
    pub async fn verify_email(&self, token: &str) -> AppResult<(UserModel, String, String)> {
        let user = User::find()
            .filter(user::Column::VerificationToken.eq(token))
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::Validation("Invalid verification token".to_string()))?;

        if let Some(expires) = user.verification_expires {
            if chrono::Utc::now().naive_utc() > expires {
                return Err(AppError::Validation(
                    "Verification token has expired".to_string(),
                ));
            }
        }

        let mut active: user::ActiveModel = user.into();
        active.is_verified = sea_orm::ActiveValue::Set(true);
        active.verification_token = sea_orm::ActiveValue::Set(None);
        active.verification_expires = sea_orm::ActiveValue::Set(None);
        active.updated_at = sea_orm::ActiveValue::Set(chrono::Utc::now().naive_utc());
        let user = active.update(&self.db).await?;

        let (access_token, refresh_token) = self.issue_tokens(&user).await?;
        Ok((user, access_token, refresh_token))
    }

    /// Re-issue a verification token for an unverified account.
    pub async fn resend_verification(
        &self,
        user_id: i32,
        email_service: &EmailService,
    ) -> AppResult<()> {
        let user = self.get_user_by_id(user_id).await?;
        if user.is_verified {
            return Err(AppError::Validation(
                "Account is already verified".to_string(),
            ));
        }
        let token = uuid::Uuid::new_v4().to_string();
        let now = chrono::Utc::now().naive_utc();

        let email = user.email.clone();
        let mut active: user::ActiveModel = user.into();
        active.verification_token = sea_orm::ActiveValue::Set(Some(token.clone()));
        active.verification_expires =
            sea_orm::ActiveValue::Set(Some(now + chrono::Duration::hours(24)));
        active.updated_at = sea_orm::ActiveValue::Set(now);
        active.update(&self.db).await?;

        if let Err(e) = email_service.send_verification_email(&email, &token).await {
            tracing::warn!("Failed to send verification email: {e}");
        }

        Ok(())
    }

    pub async fn rotate_refresh_token(
        &self,
        user_id: i32,
        current_refresh_token: &str,
    ) -> AppResult<(String, String)> {
        let token_hash = crate::utils::jwt::hash_refresh_token(current_refresh_token);
        let now = chrono::Utc::now().naive_utc();

        let existing = RefreshToken::find()
            .filter(refresh_token::Column::UserId.eq(user_id))
            .filter(refresh_token::Column::Token.eq(token_hash))
            .one(&self.db)
            .await?
            .ok_or(AppError::Unauthorized)?;

        if existing.expires_at <= now {
            let _ = RefreshToken::delete_by_id(existing.id).exec(&self.db).await;
            return Err(AppError::Unauthorized);
        }

        let user = self.get_user_by_id(user_id).await?;

        let txn = self.db.begin().await?;
        RefreshToken::delete_by_id(existing.id).exec(&txn).await?;
        let (access_token, refresh_token) = self.issue_tokens_txn(&txn, &user).await?;
        txn.commit().await?;
        Ok((access_token, refresh_token))
    }

    pub async fn revoke_refresh_token(&self, raw_token: &str) -> AppResult<()> {
        let token_hash = crate::utils::jwt::hash_refresh_token(raw_token);
        RefreshToken::delete_many()
            .filter(refresh_token::Column::Token.eq(token_hash))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    pub async fn get_user_by_id(&self, id: i32) -> AppResult<UserModel> {
        User::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)
    }

    async fn issue_tokens(&self, user: &UserModel) -> AppResult<(String, String)> {
        self.issue_tokens_txn(&self.db, user).await
    }

    async fn issue_tokens_txn<C: ConnectionTrait>(
        &self,
        conn: &C,
        user: &UserModel,
    ) -> AppResult<(String, String)> {
        let user_id = user.id.to_string();
        let access_token = encode_access_token(&user_id, &user.role)?;
        let refresh_token = encode_refresh_token(&user_id, &user.role)?;

        let now = chrono::Utc::now().naive_utc();
        let expires_at = now
            + chrono::Duration::seconds(crate::utils::jwt::refresh_token_expiry_seconds() as i64);

        let model = refresh_token::ActiveModel {
            user_id: sea_orm::ActiveValue::Set(user.id),
            token: sea_orm::ActiveValue::Set(crate::utils::jwt::hash_refresh_token(
                &refresh_token,
            )),
            expires_at: sea_orm::ActiveValue::Set(expires_at),
            created_at: sea_orm::ActiveValue::Set(now),
            ..Default::default()
        };
        model.insert(conn).await?;

        Ok((access_token, refresh_token))
    }
}
