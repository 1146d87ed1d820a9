//! Product catalog handlers.
//!
//! Reads need any role, creation needs manager or admin, changes need admin.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

use crate::dtos::{CreateProductRequest, MessageResponse, UpdateProductRequest};
use crate::middleware::{AuthUser, ADMIN_ONLY, ALL_ROLES, CATALOG_EDITORS};
use crate::models::{Product, UpdateProduct};
use crate::utils::ValidatedJson;
use crate::AppState;

fn product_not_found() -> AppError {
    AppError::NotFound(anyhow::anyhow!("Product not found"))
}

pub async fn list_products(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
) -> Result<Json<Vec<Product>>, AppError> {
    principal.authorize(ALL_ROLES)?;
    Ok(Json(state.store.list_products().await?))
}

pub async fn get_product(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    Path(product_id): Path<Uuid>,
) -> Result<Json<Product>, AppError> {
    principal.authorize(ALL_ROLES)?;
    state
        .store
        .get_product(product_id)
        .await?
        .map(Json)
        .ok_or_else(product_not_found)
}

pub async fn create_product(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    ValidatedJson(payload): ValidatedJson<CreateProductRequest>,
) -> Result<(StatusCode, Json<Product>), AppError> {
    principal.authorize(CATALOG_EDITORS)?;

    let product = state.store.create_product(&payload.into()).await?;

    tracing::info!(
        product_id = %product.product_id,
        user_id = %principal.user_id,
        quantity = product.quantity,
        "Product created"
    );

    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn update_product(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    Path(product_id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<UpdateProductRequest>,
) -> Result<Json<Product>, AppError> {
    principal.authorize(ADMIN_ONLY)?;

    let changes = UpdateProduct::from(payload);
    let product = if changes.is_empty() {
        state.store.get_product(product_id).await?
    } else {
        state.store.update_product(product_id, &changes).await?
    }
    .ok_or_else(product_not_found)?;

    tracing::info!(product_id = %product_id, user_id = %principal.user_id, "Product updated");

    Ok(Json(product))
}

pub async fn delete_product(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    Path(product_id): Path<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    principal.authorize(ADMIN_ONLY)?;

    if !state.store.delete_product(product_id).await? {
        return Err(product_not_found());
    }

    tracing::info!(product_id = %product_id, user_id = %principal.user_id, "Product deleted");

    Ok(Json(MessageResponse {
        message: "Product deleted".to_string(),
    }))
}
