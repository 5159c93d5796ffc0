// src/handlers/auth.rs

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::{
        auth::AuthenticatedUser,
        rbac::{PermUsersWrite, RequirePermission},
    },
    models::{
        audit::{Actor, AuditAction},
        auth::{AuthResponse, CreateUserPayload, LoginUserPayload, User},
    },
};

// Handler de login
pub async fn login(
    State(app_state): State<AppState>,
    Json(payload): Json<LoginUserPayload>,
) -> Result<Json<AuthResponse>, AppError> {
    payload.validate()?;

    let token = app_state
        .auth_service
        .login_user(&payload.username, &payload.password)
        .await?;

    Ok(Json(AuthResponse { token }))
}

// Handler da rota protegida /me
pub async fn get_me(AuthenticatedUser(user): AuthenticatedUser) -> Json<User> {
    Json(user)
}

// Criação de usuário (somente ADMIN)
pub async fn create_user(
    State(app_state): State<AppState>,
    _perm: RequirePermission<PermUsersWrite>,
    actor: Actor,
    Json(payload): Json<CreateUserPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let user = app_state
        .auth_service
        .create_user(&payload.username, &payload.password, payload.role)
        .await?;

    app_state
        .audit
        .record(
            &actor,
            AuditAction::CreateUser,
            "User",
            Some(user.id),
            json!({ "username": user.username, "role": user.role }),
        )
        .await;

    Ok((StatusCode::CREATED, Json(user)))
}
