//! Authentication handlers

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::middleware::{CurrentTenant, CurrentUser};
use crate::services::auth::{AuthTokens, MeResponse, RegisterResponse, RegisterStudioInput};
use crate::services::AuthService;
use crate::AppState;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    /// Needed when logging in through the bare API host
    pub studio_slug: Option<String>,
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Register a studio and its owner account
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterStudioInput>,
) -> AppResult<(StatusCode, Json<RegisterResponse>)> {
    let auth_service = AuthService::new(state.db.clone(), &state.config);
    let result = auth_service.register_studio(body).await?;
    Ok((StatusCode::CREATED, Json(result)))
}

/// Login endpoint handler
///
/// The studio comes from the request host, or from `studio_slug` in the body.
pub async fn login(
    State(state): State<AppState>,
    tenant: Option<CurrentTenant>,
    Json(body): Json<LoginRequest>,
) -> AppResult<Json<AuthTokens>> {
    let auth_service = AuthService::new(state.db.clone(), &state.config);

    let studio_id = match (tenant, body.studio_slug.as_deref()) {
        (Some(CurrentTenant(tenant)), _) => tenant.studio_id,
        (None, Some(slug)) => auth_service.resolve_studio(slug).await?,
        (None, None) => return Err(AppError::StudioRequired),
    };

    let tokens = auth_service.login(studio_id, &body.email, &body.password).await?;
    Ok(Json(tokens))
}

/// Refresh token endpoint handler
pub async fn refresh(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> AppResult<Json<AuthTokens>> {
    let auth_service = AuthService::new(state.db.clone(), &state.config);
    let tokens = auth_service.refresh_token(&body.refresh_token).await?;
    Ok(Json(tokens))
}

pub async fn logout(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> AppResult<StatusCode> {
    let auth_service = AuthService::new(state.db.clone(), &state.config);
    auth_service.logout(&body.refresh_token).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Current user profile
pub async fn me(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<MeResponse>> {
    let auth_service = AuthService::new(state.db.clone(), &state.config);
    let me = auth_service.me(user.studio_id, user.user_id).await?;
    Ok(Json(me))
}
