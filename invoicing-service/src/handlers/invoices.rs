//! Invoice handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

use crate::dtos::CreateInvoiceRequest;
use crate::middleware::{AuthUser, ALL_ROLES};
use crate::models::{InvoiceDetail, InvoiceSummary, InvoiceWithLines};
use crate::services::InvoiceRequest;
use crate::utils::ValidatedJson;
use crate::AppState;

/// Create an invoice, decrementing stock for every line.
pub async fn create_invoice(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    ValidatedJson(payload): ValidatedJson<CreateInvoiceRequest>,
) -> Result<(StatusCode, Json<InvoiceWithLines>), AppError> {
    principal.authorize(ALL_ROLES)?;

    tracing::info!(
        user_id = %principal.user_id,
        customer_id = %payload.customer_id,
        lines = payload.lines.len(),
        "Creating invoice"
    );

    let created = state
        .workflow
        .create_invoice(&InvoiceRequest::from(payload))
        .await?;

    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn list_invoices(
    State(state): State<AppState>,
) -> Result<Json<Vec<InvoiceSummary>>, AppError> {
    Ok(Json(state.store.list_invoices().await?))
}

/// Invoice with its customer and every line with its product.
pub async fn get_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
) -> Result<Json<InvoiceDetail>, AppError> {
    let invoice = state
        .store
        .get_invoice(invoice_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;
    let lines = state.store.get_invoice_lines(invoice_id).await?;

    Ok(Json(InvoiceDetail { invoice, lines }))
}
