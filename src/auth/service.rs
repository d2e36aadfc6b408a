use chrono::Utc;
use uuid::Uuid;

use crate::auth::password::{hash_password, verify_password};
use crate::auth::token::TokenIssuer;
use crate::db::models::{Credential, Session, Token, TokenKind, User};
use crate::db::operations::DbOperations;
use crate::error::{AppError, AuthError, ConflictError, DatabaseError};

/// Access + refresh token pair minted for a new session.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

pub struct AuthService {
    db: DbOperations,
    tokens: TokenIssuer,
}

impl AuthService {
    pub fn new(db: DbOperations, tokens: TokenIssuer) -> Self {
        Self { db, tokens }
    }

    /// Create a user and their credential. The email must not already be
    /// registered (exact, case-sensitive match); a uniqueness violation at
    /// commit time, from two registrations racing past the existence check,
    /// reports the same duplicate error as the pre-check.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<User, AppError> {
        if self.db.get_user_by_email(email).await?.is_some() {
            return Err(ConflictError::DuplicateEmail.into());
        }

        // Hash before anything is written.
        let password_hash = hash_password(password)?;

        let user = User::new(email.to_string(), display_name.map(String::from));
        let credential = Credential::new(user.id, password_hash);

        match self.db.create_user_with_credential(&user, &credential).await {
            Ok(created) => Ok(created),
            Err(AppError::DatabaseError(DatabaseError::Duplicate)) => {
                Err(ConflictError::DuplicateEmail.into())
            }
            Err(e) => Err(e),
        }
    }

    /// Check email + password. Unknown email and wrong password return the
    /// identical error, so callers cannot probe which accounts exist.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<User, AppError> {
        let Some(user) = self.db.get_user_by_email(email).await? else {
            return Err(AuthError::InvalidCredentials.into());
        };

        let Some(credential) = self.db.get_credential_for_user(user.id).await? else {
            return Err(AuthError::InvalidCredentials.into());
        };

        if !verify_password(password, &credential.password_hash) {
            return Err(AuthError::InvalidCredentials.into());
        }

        Ok(user)
    }

    /// Open a session for an authenticated user and mint its token pair.
    /// The session and both token rows land in one commit. This is the only
    /// place a refresh token is ever created.
    pub async fn create_session(
        &self,
        user: &User,
        user_agent: Option<String>,
        ip: Option<String>,
    ) -> Result<TokenPair, AppError> {
        let session = Session::new(user.id, self.tokens.refresh_ttl(), user_agent, ip);

        let access_token = self.tokens.issue(user.id, TokenKind::Access)?;
        let refresh_token = self.tokens.issue(user.id, TokenKind::Refresh)?;

        let access_row = Token::new(
            session.id,
            TokenKind::Access,
            access_token.clone(),
            self.tokens.access_ttl(),
        );
        let refresh_row = Token::new(
            session.id,
            TokenKind::Refresh,
            refresh_token.clone(),
            self.tokens.refresh_ttl(),
        );

        self.db
            .create_session_with_tokens(&session, &access_row, &refresh_row)
            .await?;

        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    /// Exchange a refresh token for a new access token. The presented string
    /// must pass both the cryptographic check and the persisted-row check.
    ///
    /// The matched row is overwritten in place with the new access token
    /// string and a fresh access expiry, so the original refresh string
    /// stops existing in the store. A refresh token therefore works at most
    /// once; the overwrite itself is keyed on the old string, so of two
    /// concurrent exchanges exactly one wins and the other fails here.
    pub async fn refresh_access_token(&self, refresh_token: &str) -> Result<String, AppError> {
        let claims = self
            .tokens
            .verify(refresh_token, TokenKind::Refresh)
            .map_err(|_| AuthError::InvalidRefreshToken)?;

        let Some(record) = self.db.find_active_refresh_token(refresh_token).await? else {
            return Err(AuthError::InvalidRefreshToken.into());
        };

        let new_access_token = self.tokens.issue(claims.sub, TokenKind::Access)?;
        let new_expires_at = Utc::now() + self.tokens.access_ttl();

        let swapped = self
            .db
            .replace_token_value(record.id, refresh_token, &new_access_token, new_expires_at)
            .await?;
        if !swapped {
            return Err(AuthError::InvalidRefreshToken.into());
        }

        Ok(new_access_token)
    }

    /// Revoke every session and token belonging to the user. Idempotent:
    /// a user with nothing active revokes zero rows and still succeeds.
    pub async fn logout(&self, user_id: Uuid) -> Result<u64, AppError> {
        self.db.revoke_all_for_user(user_id).await
    }

    /// Apply the provided profile fields. An email change to an address
    /// held by a different user is a conflict; re-submitting the user's own
    /// email is fine. `updated_at` is bumped unconditionally.
    pub async fn update_profile(
        &self,
        user: &User,
        display_name: Option<&str>,
        email: Option<&str>,
    ) -> Result<User, AppError> {
        if let Some(new_email) = email {
            if self.db.email_taken_by_other(new_email, user.id).await? {
                return Err(ConflictError::EmailInUse.into());
            }
        }

        match self.db.update_user_profile(user.id, display_name, email).await {
            Ok(updated) => Ok(updated),
            Err(AppError::DatabaseError(DatabaseError::Duplicate)) => {
                Err(ConflictError::EmailInUse.into())
            }
            Err(e) => Err(e),
        }
    }

    /// Delete the user row; the schema cascades take the credential,
    /// sessions, tokens, and the rest of the user-owned records with it.
    pub async fn delete_account(&self, user_id: Uuid) -> Result<(), AppError> {
        self.db.delete_user(user_id).await
    }

    /// The authorization gate for bearer-protected endpoints: verify the
    /// string as an access token, then load the subject. A subject that no
    /// longer exists is reported as unauthorized, never as not-found.
    ///
    /// Verification here is cryptographic only. The persisted token row is
    /// not consulted, so an unexpired access token keeps working after
    /// logout until it expires on its own.
    pub async fn current_user(&self, bearer: &str) -> Result<User, AppError> {
        let claims = self.tokens.verify(bearer, TokenKind::Access)?;

        let Some(user) = self.db.get_user_by_id(claims.sub).await? else {
            return Err(AuthError::Unauthorized.into());
        };

        Ok(user)
    }
}
