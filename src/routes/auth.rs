use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::{
    auth::{password, AuthenticatedUser},
    error::{AppError, AppResult},
    state::AppState,
};

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub token: String,
}

#[derive(Serialize)]
pub struct TokenResponse {
    pub token: String,
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<TokenResponse>> {
    let user = state
        .credentials
        .find_by_email(&payload.email)
        .await
        .ok_or_else(AppError::unauthorized)?;

    let valid = password::verify_password(&payload.password, &user.password_hash)
        .map_err(|_| AppError::unauthorized())?;
    if !valid {
        return Err(AppError::unauthorized());
    }

    let token = state
        .jwt
        .issue(&user.id, &user.email, &user.role, &user.name)?;
    Ok(Json(TokenResponse { token }))
}

/// Stateless refresh: the presented token's claims are re-signed with a
/// fresh expiry once its signature and grace window check out.
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> AppResult<Json<TokenResponse>> {
    let token = state
        .jwt
        .refresh(&payload.token)
        .map_err(|_| AppError::unauthorized())?;
    Ok(Json(TokenResponse { token }))
}

pub async fn me(user: AuthenticatedUser) -> Json<AuthenticatedUser> {
    Json(user)
}
