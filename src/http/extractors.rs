//! Request extractors: turns an `Authorization: Bearer <token>` header into
//! an authenticated user id, or an `AppError::Unauthenticated` rejection.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::auth;
use crate::http::error::AppError;
use crate::http::AppState;

/// The authenticated caller, extracted from the bearer access token.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub user_id: uuid::Uuid,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(AppError::Unauthenticated)?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or(AppError::Unauthenticated)?;

        let claims = auth::validate_access_token(token, &state.config.jwt_secret)
            .map_err(|_| AppError::Unauthenticated)?;
        let info = auth::auth_info_from_claims(&claims).map_err(|_| AppError::Unauthenticated)?;

        Ok(AuthUser { user_id: info.user_id })
    }
}
