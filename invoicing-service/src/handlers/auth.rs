//! Registration and login.

use axum::{extract::State, http::StatusCode, Json};
use service_core::error::AppError;

use crate::dtos::{LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};
use crate::models::CreateUser;
use crate::services::metrics::AUTH_FAILURES_TOTAL;
use crate::utils::{hash_password_blocking, verify_password_blocking, Password, ValidatedJson};
use crate::AppState;

const BAD_CREDENTIALS: &str = "Invalid username or password";

pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    let password_hash = hash_password_blocking(Password::new(payload.password)).await?;

    let user = state
        .store
        .create_user(&CreateUser {
            username: payload.username,
            password_hash,
            role: payload.role,
        })
        .await?;

    tracing::info!(user_id = %user.user_id, role = %payload.role, "User registered");

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            id: user.user_id,
            username: user.username,
            role: payload.role,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let user = state
        .store
        .find_user_by_username(&payload.username)
        .await?
        .ok_or_else(reject_login)?;

    let verified =
        verify_password_blocking(Password::new(payload.password), user.password_hash.clone())
            .await?;
    if !verified {
        return Err(reject_login());
    }

    let role = user
        .role()
        .map_err(|e| AppError::InternalError(anyhow::anyhow!("Stored user has {}", e)))?;
    let token = state.jwt.issue(user.user_id, role)?;

    tracing::info!(user_id = %user.user_id, role = %role, "User logged in");

    Ok(Json(LoginResponse { token }))
}

fn reject_login() -> AppError {
    AUTH_FAILURES_TOTAL.with_label_values(&["bad_login"]).inc();
    AppError::Unauthorized(anyhow::anyhow!(BAD_CREDENTIALS))
}
