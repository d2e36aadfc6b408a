use actix_web::{web, HttpResponse, HttpRequest};
use serde::{Deserialize, Serialize};
use crate::AppState;
use crate::error::{AppError, AuthError};
use tracing::{info, error};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub display_name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
}

/// Pull the bearer string out of the Authorization header.
fn bearer_token(req: &HttpRequest) -> Result<&str, AppError> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or_else(|| AuthError::Unauthorized.into())
}

pub async fn register(
    req: web::Json<RegisterRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    info!("Received registration request for email: {}", req.email);
    match state
        .auth_service
        .register(&req.email, &req.password, req.display_name.as_deref())
        .await
    {
        Ok(user) => {
            info!("Registration successful for email: {}", req.email);
            Ok(HttpResponse::Created().json(user))
        }
        Err(e) => {
            error!("Registration failed for email: {}: {}", req.email, e);
            Err(e)
        }
    }
}

pub async fn login(
    http_req: HttpRequest,
    req: web::Json<LoginRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    info!("Received login request for email: {}", req.email);
    let user = match state.auth_service.authenticate(&req.email, &req.password).await {
        Ok(user) => user,
        Err(e) => {
            error!("Login failed for email: {}: {}", req.email, e);
            return Err(e);
        }
    };

    let user_agent = http_req
        .headers()
        .get("User-Agent")
        .and_then(|h| h.to_str().ok())
        .map(String::from);
    let ip = http_req
        .connection_info()
        .realip_remote_addr()
        .map(String::from);

    let pair = state.auth_service.create_session(&user, user_agent, ip).await?;
    info!("Login successful for email: {}", req.email);

    Ok(HttpResponse::Ok().json(TokenResponse {
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
        token_type: "bearer",
    }))
}

pub async fn refresh(
    req: web::Json<RefreshRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let access_token = state
        .auth_service
        .refresh_access_token(&req.refresh_token)
        .await?;

    Ok(HttpResponse::Ok().json(TokenResponse {
        access_token,
        refresh_token: req.into_inner().refresh_token,
        token_type: "bearer",
    }))
}

pub async fn logout(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let token = bearer_token(&req)?;
    let user = state.auth_service.current_user(token).await?;

    state.auth_service.logout(user.id).await?;
    info!("Logout for user: {}", user.id);

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Successfully logged out"
    })))
}

pub async fn me(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let token = bearer_token(&req)?;
    let user = state.auth_service.current_user(token).await?;

    Ok(HttpResponse::Ok().json(user))
}

pub async fn update_me(
    http_req: HttpRequest,
    req: web::Json<UpdateProfileRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let token = bearer_token(&http_req)?;
    let user = state.auth_service.current_user(token).await?;

    let updated = state
        .auth_service
        .update_profile(&user, req.display_name.as_deref(), req.email.as_deref())
        .await?;

    Ok(HttpResponse::Ok().json(updated))
}

pub async fn delete_me(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let token = bearer_token(&req)?;
    let user = state.auth_service.current_user(token).await?;

    state.auth_service.delete_account(user.id).await?;
    info!("Account deleted for user: {}", user.id);

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Account successfully deleted"
    })))
}
