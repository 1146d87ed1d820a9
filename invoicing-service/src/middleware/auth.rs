use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use service_core::error::AppError;
use uuid::Uuid;

use crate::models::Role;
use crate::services::metrics::AUTH_FAILURES_TOTAL;
use crate::AppState;

pub const ALL_ROLES: &[Role] = &Role::ALL;
pub const CATALOG_EDITORS: &[Role] = &[Role::Manager, Role::Admin];
pub const ADMIN_ONLY: &[Role] = &[Role::Admin];

/// Authenticated caller resolved from a bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub user_id: Uuid,
    pub role: Role,
}

impl Principal {
    /// Deny unless the principal's role is in `allowed`.
    pub fn authorize(&self, allowed: &[Role]) -> Result<(), AppError> {
        if allowed.contains(&self.role) {
            return Ok(());
        }

        AUTH_FAILURES_TOTAL.with_label_values(&["forbidden"]).inc();
        tracing::warn!(user_id = %self.user_id, role = %self.role, "Role not permitted");
        Err(AppError::Forbidden(anyhow::anyhow!(
            "Role '{}' is not permitted to perform this action",
            self.role
        )))
    }
}

/// Middleware to require a valid bearer token.
///
/// The resolved [`Principal`] is stored in request extensions.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty());

    let Some(token) = token else {
        AUTH_FAILURES_TOTAL
            .with_label_values(&["unauthenticated"])
            .inc();
        return Err(AppError::Unauthorized(anyhow::anyhow!(
            "Missing or invalid Authorization header"
        )));
    };

    let claims = state.jwt.validate(token).map_err(|e| {
        AUTH_FAILURES_TOTAL
            .with_label_values(&["unauthenticated"])
            .inc();
        tracing::debug!(error = %e, "Rejected bearer token");
        AppError::InvalidToken(e)
    })?;

    let user_id = Uuid::parse_str(&claims.sub)
        .map_err(|_| AppError::Unauthorized(anyhow::anyhow!("Invalid or expired token")))?;

    req.extensions_mut().insert(Principal {
        user_id,
        role: claims.role,
    });

    Ok(next.run(req).await)
}

/// Extractor for the principal placed by [`auth_middleware`].
pub struct AuthUser(pub Principal);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .copied()
            .map(AuthUser)
            .ok_or_else(|| {
                AppError::InternalError(anyhow::anyhow!(
                    "Auth principal missing from request extensions"
                ))
            })
    }
}
