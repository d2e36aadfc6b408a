use chrono::{Duration, Utc};
use jsonwebtoken::{encode, decode, errors::ErrorKind, Header, EncodingKey, DecodingKey, Validation, Algorithm};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::db::models::TokenKind;
use crate::error::{AppError, AuthError};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,            // User ID
    #[serde(rename = "type")]
    pub kind: TokenKind,      // "access" or "refresh"
    pub exp: i64,             // Expiration time
    pub iat: i64,             // Issued at
    pub jti: String,          // Unique per issuance, keeps token strings globally unique
}

/// Issues and verifies signed bearer tokens.
///
/// Verification is purely cryptographic. Whether the matching persisted
/// token row is still live is the caller's concern, not this type's.
pub struct TokenIssuer {
    secret: String,
    algorithm: Algorithm,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenIssuer {
    pub fn new(config: &AuthConfig) -> Result<Self, AppError> {
        let algorithm: Algorithm = config
            .jwt_algorithm
            .parse()
            .map_err(|_| AppError::ConfigError(format!(
                "Unknown JWT algorithm: {}",
                config.jwt_algorithm
            )))?;
        // Tokens are signed with a shared secret, so only the HMAC family works here.
        if !matches!(algorithm, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512) {
            return Err(AppError::ConfigError(format!(
                "JWT algorithm must be HMAC-based, got: {}",
                config.jwt_algorithm
            )));
        }

        Ok(Self {
            secret: config.jwt_secret.clone(),
            algorithm,
            access_ttl: Duration::minutes(config.access_token_expire_minutes),
            refresh_ttl: Duration::days(config.refresh_token_expire_days),
        })
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Create a signed token of the given kind for a user.
    pub fn issue(&self, user_id: Uuid, kind: TokenKind) -> Result<String, AppError> {
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        let now = Utc::now();
        let claims = Claims {
            sub: user_id,
            kind,
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(
            &Header::new(self.algorithm),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| AppError::InternalError(format!("Token encoding failed: {}", e)))?;

        Ok(token)
    }

    /// Verify signature, expiry, and kind, returning the decoded claims.
    pub fn verify(&self, token: &str, expected_kind: TokenKind) -> Result<Claims, AuthError> {
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::new(self.algorithm),
        )
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        })?;

        if data.claims.kind != expected_kind {
            return Err(AuthError::WrongTokenKind);
        }

        Ok(data.claims)
    }
}
