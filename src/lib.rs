pub mod auth;
pub mod config;
pub mod db;
pub mod error;

use std::sync::Arc;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use actix_web::HttpResponse;

pub use error::AppError;
pub type Result<T> = std::result::Result<T, AppError>;
pub use config::Settings;

pub use auth::{AuthService, TokenIssuer};
pub use db::{DbOperations, Session, Token, TokenKind, User};

/// Health check endpoint handler
/// Returns a JSON response with server status and timestamp
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Application state shared across all components
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    pub db_pool: Arc<PgPool>,
    pub auth_service: Arc<AuthService>,
}

impl AppState {
    pub async fn new(config: Settings) -> Result<Self> {
        // Initialize database connection pool
        let db_pool = PgPoolOptions::new()
            .max_connections(config.database.max_connections)
            .connect(&config.database.url)
            .await
            .map_err(|e| AppError::DatabaseError(error::DatabaseError::ConnectionError(e.to_string())))?;
        let db_pool = Arc::new(db_pool);

        let token_issuer = TokenIssuer::new(&config.auth)?;
        let auth_service = AuthService::new(DbOperations::new(db_pool.clone()), token_issuer);

        Ok(Self {
            config: Arc::new(config),
            db_pool,
            auth_service: Arc::new(auth_service),
        })
    }

    pub async fn shutdown(&self) -> Result<()> {
        // Close database connections
        self.db_pool.close().await;

        Ok(())
    }
}
