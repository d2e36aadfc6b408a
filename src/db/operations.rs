use sqlx::PgPool;
use sqlx::{Transaction, Postgres};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::db::models::{Credential, Session, Token, TokenKind, User};
use crate::error::AppError;

const USER_COLUMNS: &str = "id, email, display_name, created_at, updated_at";
const SESSION_COLUMNS: &str = "id, user_id, user_agent, ip, expires_at, revoked_at, created_at";
const TOKEN_COLUMNS: &str = "id, session_id, kind, token, expires_at, revoked_at, created_at";

pub struct DbOperations {
    pool: Arc<PgPool>,
}

impl DbOperations {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    pub async fn begin_transaction(&self) -> Result<Transaction<'_, Postgres>, AppError> {
        Ok(self.pool.as_ref().begin().await?)
    }

    /// Insert a user and their credential as one commit. A uniqueness
    /// violation on the email surfaces as a duplicate error even when the
    /// conflicting row was committed by a concurrent request after our
    /// existence check.
    pub async fn create_user_with_credential(
        &self,
        user: &User,
        credential: &Credential,
    ) -> Result<User, AppError> {
        let mut transaction = self.begin_transaction().await?;

        let result = async {
            let query = format!(
                "INSERT INTO users (id, email, display_name, created_at, updated_at)
                 VALUES ($1, $2, $3, $4, $5)
                 RETURNING {USER_COLUMNS}"
            );
            let created = sqlx::query_as::<_, User>(&query)
                .bind(user.id)
                .bind(&user.email)
                .bind(&user.display_name)
                .bind(user.created_at)
                .bind(user.updated_at)
                .fetch_one(&mut *transaction)
                .await?;

            sqlx::query(
                "INSERT INTO credentials (id, user_id, password_hash) VALUES ($1, $2, $3)",
            )
            .bind(credential.id)
            .bind(credential.user_id)
            .bind(&credential.password_hash)
            .execute(&mut *transaction)
            .await?;

            Ok::<User, AppError>(created)
        }
        .await;

        match result {
            Ok(created) => {
                transaction.commit().await?;
                Ok(created)
            }
            Err(e) => {
                transaction.rollback().await?;
                Err(e)
            }
        }
    }

    pub async fn get_user_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?;

        Ok(user)
    }

    /// Exact, case-sensitive email match.
    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let user = sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(self.pool.as_ref())
            .await?;

        Ok(user)
    }

    pub async fn get_credential_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Option<Credential>, AppError> {
        let credential = sqlx::query_as::<_, Credential>(
            "SELECT id, user_id, password_hash FROM credentials WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(credential)
    }

    /// True if some other user already holds this email.
    pub async fn email_taken_by_other(&self, email: &str, user_id: Uuid) -> Result<bool, AppError> {
        let existing: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM users WHERE email = $1 AND id != $2")
                .bind(email)
                .bind(user_id)
                .fetch_optional(self.pool.as_ref())
                .await?;

        Ok(existing.is_some())
    }

    /// Apply the provided fields; `None` leaves a column untouched.
    /// `updated_at` is bumped unconditionally.
    pub async fn update_user_profile(
        &self,
        user_id: Uuid,
        display_name: Option<&str>,
        email: Option<&str>,
    ) -> Result<User, AppError> {
        let query = format!(
            "UPDATE users
             SET display_name = COALESCE($2, display_name),
                 email = COALESCE($3, email),
                 updated_at = $4
             WHERE id = $1
             RETURNING {USER_COLUMNS}"
        );
        let user = sqlx::query_as::<_, User>(&query)
            .bind(user_id)
            .bind(display_name)
            .bind(email)
            .bind(Utc::now())
            .fetch_one(self.pool.as_ref())
            .await?;

        Ok(user)
    }

    /// Persist a session and its access/refresh token pair as one commit.
    pub async fn create_session_with_tokens(
        &self,
        session: &Session,
        access: &Token,
        refresh: &Token,
    ) -> Result<(), AppError> {
        let mut transaction = self.begin_transaction().await?;

        let result = async {
            sqlx::query(
                "INSERT INTO sessions (id, user_id, user_agent, ip, expires_at, revoked_at, created_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(session.id)
            .bind(session.user_id)
            .bind(&session.user_agent)
            .bind(&session.ip)
            .bind(session.expires_at)
            .bind(session.revoked_at)
            .bind(session.created_at)
            .execute(&mut *transaction)
            .await?;

            for token in [access, refresh] {
                sqlx::query(
                    "INSERT INTO tokens (id, session_id, kind, token, expires_at, revoked_at, created_at)
                     VALUES ($1, $2, $3, $4, $5, $6, $7)",
                )
                .bind(token.id)
                .bind(token.session_id)
                .bind(token.kind)
                .bind(&token.token)
                .bind(token.expires_at)
                .bind(token.revoked_at)
                .bind(token.created_at)
                .execute(&mut *transaction)
                .await?;
            }

            Ok::<(), AppError>(())
        }
        .await;

        match result {
            Ok(()) => {
                transaction.commit().await?;
                Ok(())
            }
            Err(e) => {
                transaction.rollback().await?;
                Err(e)
            }
        }
    }

    /// Find the refresh-kind token row holding this string, if it is
    /// neither expired nor revoked.
    pub async fn find_active_refresh_token(
        &self,
        token_str: &str,
    ) -> Result<Option<Token>, AppError> {
        let query = format!(
            "SELECT {TOKEN_COLUMNS} FROM tokens
             WHERE token = $1
               AND kind = 'REFRESH'
               AND expires_at > now()
               AND revoked_at IS NULL"
        );
        let token = sqlx::query_as::<_, Token>(&query)
            .bind(token_str)
            .fetch_optional(self.pool.as_ref())
            .await?;

        Ok(token)
    }

    /// Overwrite a token row's string and expiry in place. The update is
    /// keyed on the old string as well as the id, so of two concurrent
    /// refreshes only one swap lands; the loser sees `false`.
    pub async fn replace_token_value(
        &self,
        token_id: Uuid,
        old_token: &str,
        new_token: &str,
        new_expires_at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE tokens SET token = $3, expires_at = $4 WHERE id = $1 AND token = $2",
        )
        .bind(token_id)
        .bind(old_token)
        .bind(new_token)
        .bind(new_expires_at)
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Set `revoked_at` on every unrevoked session and token of the user,
    /// in one commit. Rows already revoked keep their original timestamp,
    /// which makes a repeat call a no-op. Returns the number of rows touched.
    pub async fn revoke_all_for_user(&self, user_id: Uuid) -> Result<u64, AppError> {
        let mut transaction = self.begin_transaction().await?;

        let result = async {
            let now = Utc::now();
            let sessions = sqlx::query(
                "UPDATE sessions SET revoked_at = $2
                 WHERE user_id = $1 AND revoked_at IS NULL",
            )
            .bind(user_id)
            .bind(now)
            .execute(&mut *transaction)
            .await?;

            let tokens = sqlx::query(
                "UPDATE tokens SET revoked_at = $2
                 WHERE revoked_at IS NULL
                   AND session_id IN (SELECT id FROM sessions WHERE user_id = $1)",
            )
            .bind(user_id)
            .bind(now)
            .execute(&mut *transaction)
            .await?;

            Ok::<u64, AppError>(sessions.rows_affected() + tokens.rows_affected())
        }
        .await;

        match result {
            Ok(count) => {
                transaction.commit().await?;
                Ok(count)
            }
            Err(e) => {
                transaction.rollback().await?;
                Err(e)
            }
        }
    }

    /// Remove the user row. Credentials, sessions, tokens, and the other
    /// user-owned tables are removed by the schema's ON DELETE CASCADE.
    pub async fn delete_user(&self, user_id: Uuid) -> Result<(), AppError> {
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(self.pool.as_ref())
            .await?;

        Ok(())
    }

    /// All sessions belonging to a user, newest first.
    pub async fn sessions_for_user(&self, user_id: Uuid) -> Result<Vec<Session>, AppError> {
        let query = format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE user_id = $1 ORDER BY created_at DESC"
        );
        let sessions = sqlx::query_as::<_, Session>(&query)
            .bind(user_id)
            .fetch_all(self.pool.as_ref())
            .await?;

        Ok(sessions)
    }

    /// All token rows belonging to a user's sessions.
    pub async fn tokens_for_user(&self, user_id: Uuid) -> Result<Vec<Token>, AppError> {
        let query = format!(
            "SELECT {TOKEN_COLUMNS} FROM tokens
             WHERE session_id IN (SELECT id FROM sessions WHERE user_id = $1)"
        );
        let tokens = sqlx::query_as::<_, Token>(&query)
            .bind(user_id)
            .fetch_all(self.pool.as_ref())
            .await?;

        Ok(tokens)
    }

    /// Look up a token row by kind and exact string, live or not.
    pub async fn get_token(
        &self,
        token_str: &str,
        kind: TokenKind,
    ) -> Result<Option<Token>, AppError> {
        let query = format!("SELECT {TOKEN_COLUMNS} FROM tokens WHERE token = $1 AND kind = $2");
        let token = sqlx::query_as::<_, Token>(&query)
            .bind(token_str)
            .bind(kind)
            .fetch_optional(self.pool.as_ref())
            .await?;

        Ok(token)
    }
}
