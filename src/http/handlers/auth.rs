//! Identity provider endpoints: register, login, refresh, logout.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::auth;
use crate::db::queries::{refresh_token, user as user_queries};
use crate::http::error::AppError;
use crate::http::AppState;
use crate::types::user::{AuthResponse, UserPublic};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub message: String,
}

async fn issue_tokens(
    state: &AppState,
    user: &crate::types::user::User,
) -> Result<AuthResponse, AppError> {
    let access_token = auth::generate_access_token(
        user.id,
        &user.email,
        &state.config.jwt_secret,
        state.config.access_token_ttl_seconds,
    )
    .map_err(AppError::Internal)?;

    let raw_refresh_token = auth::generate_refresh_token();
    let token_hash = auth::hash_refresh_token(&raw_refresh_token);
    let expires_at = Utc::now() + Duration::seconds(state.config.refresh_token_ttl_seconds);

    refresh_token::create(&state.pool, user.id, &token_hash, expires_at)
        .await
        .map_err(AppError::Internal)?;

    Ok(AuthResponse {
        access_token,
        refresh_token: raw_refresh_token,
        user: UserPublic::from(user.clone()),
    })
}

pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    if body.password.len() < 8 {
        return Err(AppError::Validation("password must be at least 8 characters".into()));
    }
    if body.email.trim().is_empty() || body.name.trim().is_empty() {
        return Err(AppError::Validation("email and name are required".into()));
    }

    if user_queries::get_user_by_email(&state.pool, &body.email)
        .await
        .map_err(AppError::Internal)?
        .is_some()
    {
        return Err(AppError::Conflict("an account with that email already exists".into()));
    }

    let password_hash = auth::hash_password(&body.password).map_err(AppError::Internal)?;
    let user = user_queries::create_user(&state.pool, &body.email, &password_hash, &body.name)
        .await
        .map_err(AppError::Internal)?;

    let response = issue_tokens(&state, &user).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let deadline = std::time::Duration::from_secs(state.config.request_deadline_seconds);
    if !state.rate_limiter.acquire("auth.login", &body.email, deadline).await {
        return Err(AppError::RateLimited);
    }

    let user = user_queries::get_user_by_email(&state.pool, &body.email)
        .await
        .map_err(AppError::Internal)?
        .ok_or_else(|| AppError::Validation("invalid email or password".into()))?;

    let valid = auth::verify_password(&body.password, &user.password_hash).map_err(AppError::Internal)?;
    if !valid {
        return Err(AppError::Validation("invalid email or password".into()));
    }

    Ok(Json(issue_tokens(&state, &user).await?))
}

pub async fn refresh(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let token_hash = auth::hash_refresh_token(&body.refresh_token);
    let row = refresh_token::find_by_hash(&state.pool, &token_hash)
        .await
        .map_err(AppError::Internal)?
        .ok_or(AppError::Unauthenticated)?;

    if !row.is_valid(Utc::now()) {
        return Err(AppError::Unauthenticated);
    }

    let user = user_queries::get_user(&state.pool, row.user_id)
        .await
        .map_err(AppError::Internal)?
        .ok_or(AppError::Unauthenticated)?;

    let access_token = auth::generate_access_token(
        user.id,
        &user.email,
        &state.config.jwt_secret,
        state.config.access_token_ttl_seconds,
    )
    .map_err(AppError::Internal)?;

    let raw_refresh_token = auth::generate_refresh_token();
    let new_hash = auth::hash_refresh_token(&raw_refresh_token);
    let new_expires_at = Utc::now() + Duration::seconds(state.config.refresh_token_ttl_seconds);

    refresh_token::rotate(&state.pool, row.id, user.id, &new_hash, new_expires_at)
        .await
        .map_err(AppError::Internal)?;

    Ok(Json(AuthResponse {
        access_token,
        refresh_token: raw_refresh_token,
        user: UserPublic::from(user),
    }))
}

pub async fn logout(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let token_hash = auth::hash_refresh_token(&body.refresh_token);
    if let Some(row) = refresh_token::find_by_hash(&state.pool, &token_hash)
        .await
        .map_err(AppError::Internal)?
    {
        refresh_token::revoke(&state.pool, row.id).await.map_err(AppError::Internal)?;
    }

    Ok(Json(MessageResponse { message: "logged out".into() }))
}
