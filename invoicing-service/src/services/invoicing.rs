//! Invoice creation workflow.
//!
//! Creating an invoice validates stock, prices the lines from the catalog,
//! decrements stock and writes the invoice with its lines. All of it runs in
//! one store transaction: either every write lands or none does.

use rust_decimal::Decimal;
use service_core::error::AppError;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::models::{max_amount, InvoiceWithLines, NewInvoice, NewInvoiceLine, Product};
use crate::services::metrics::{INVOICES_CREATED_TOTAL, INVOICE_AMOUNT_TOTAL, INVOICE_FAILURES_TOTAL};
use crate::services::store::{EntityStore, StoreError, StoreTransaction};

/// One requested line.
#[derive(Debug, Clone)]
pub struct LineRequest {
    pub product_id: Uuid,
    pub quantity: i32,
    /// Price the caller believes applies. Informational only: the catalog
    /// price is what gets charged.
    pub quoted_price: Option<Decimal>,
}

/// Request to invoice a customer for a list of products.
#[derive(Debug, Clone)]
pub struct InvoiceRequest {
    pub customer_id: Uuid,
    pub lines: Vec<LineRequest>,
}

#[derive(Debug, Error)]
pub enum InvoiceError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error("Customer {0} not found")]
    CustomerNotFound(Uuid),

    #[error("Product {0} not found")]
    ProductNotFound(Uuid),

    #[error(
        "Insufficient stock for product {product_id}: available {available}, requested {requested}"
    )]
    InsufficientStock {
        product_id: Uuid,
        available: i32,
        requested: i32,
    },

    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl InvoiceError {
    /// Metric label for the failure.
    pub fn reason(&self) -> &'static str {
        match self {
            InvoiceError::InvalidRequest(_) => "invalid_request",
            InvoiceError::CustomerNotFound(_) => "customer_not_found",
            InvoiceError::ProductNotFound(_) => "product_not_found",
            InvoiceError::InsufficientStock { .. } => "insufficient_stock",
            InvoiceError::Storage(_) => "storage",
        }
    }
}

impl From<InvoiceError> for AppError {
    fn from(err: InvoiceError) -> Self {
        match err {
            InvoiceError::Storage(e) => e.into(),
            other => AppError::BadRequest(anyhow::anyhow!(other.to_string())),
        }
    }
}

/// Runs invoice creation against an entity store.
#[derive(Clone)]
pub struct InvoiceWorkflow {
    store: Arc<dyn EntityStore>,
}

impl InvoiceWorkflow {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    /// Create an invoice and its lines, decrementing stock.
    ///
    /// On any error nothing is persisted and stock is unchanged.
    #[instrument(skip(self, request), fields(customer_id = %request.customer_id, lines = request.lines.len()))]
    pub async fn create_invoice(
        &self,
        request: &InvoiceRequest,
    ) -> Result<InvoiceWithLines, InvoiceError> {
        let result = self.run(request).await;

        match &result {
            Ok(created) => {
                INVOICES_CREATED_TOTAL.inc();
                if let Ok(amount) = f64::try_from(created.invoice.total) {
                    INVOICE_AMOUNT_TOTAL.inc_by(amount);
                }
                info!(
                    invoice_id = %created.invoice.invoice_id,
                    total = %created.invoice.total,
                    "Invoice created"
                );
            }
            Err(e) => {
                INVOICE_FAILURES_TOTAL.with_label_values(&[e.reason()]).inc();
                warn!(error = %e, reason = e.reason(), "Invoice rejected");
            }
        }

        result
    }

    async fn run(&self, request: &InvoiceRequest) -> Result<InvoiceWithLines, InvoiceError> {
        let requested = requested_quantities(request)?;

        let mut tx = self.store.begin().await?;
        match apply(tx.as_mut(), request, &requested).await {
            Ok(created) => {
                tx.commit().await?;
                Ok(created)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "Failed to roll back invoice transaction");
                }
                Err(e)
            }
        }
    }
}

/// Validate line shapes and sum quantities per product.
///
/// The map is ordered by product id, which is also the lock order.
fn requested_quantities(request: &InvoiceRequest) -> Result<BTreeMap<Uuid, i32>, InvoiceError> {
    if request.lines.is_empty() {
        return Err(InvoiceError::InvalidRequest(
            "Invoice must contain at least one line".to_string(),
        ));
    }

    let mut requested: BTreeMap<Uuid, i32> = BTreeMap::new();
    for line in &request.lines {
        if line.quantity <= 0 {
            return Err(InvoiceError::InvalidRequest(format!(
                "Quantity for product {} must be positive",
                line.product_id
            )));
        }
        let total = requested.entry(line.product_id).or_insert(0);
        *total = total.checked_add(line.quantity).ok_or_else(|| {
            InvoiceError::InvalidRequest(format!(
                "Quantity for product {} is too large",
                line.product_id
            ))
        })?;
    }

    Ok(requested)
}

/// Sum of catalog price times quantity, bounded by what a money column holds.
fn invoice_total(
    request: &InvoiceRequest,
    products: &HashMap<Uuid, Product>,
) -> Result<Decimal, InvoiceError> {
    let too_large = || {
        InvoiceError::InvalidRequest(format!(
            "Invoice total exceeds the maximum of {}",
            max_amount()
        ))
    };

    let mut total = Decimal::ZERO;
    for line in &request.lines {
        total = products[&line.product_id]
            .unit_price
            .checked_mul(Decimal::from(line.quantity))
            .and_then(|amount| total.checked_add(amount))
            .filter(|sum| *sum <= max_amount())
            .ok_or_else(too_large)?;
    }

    Ok(total)
}

async fn apply(
    tx: &mut dyn StoreTransaction,
    request: &InvoiceRequest,
    requested: &BTreeMap<Uuid, i32>,
) -> Result<InvoiceWithLines, InvoiceError> {
    if tx.get_customer(request.customer_id).await?.is_none() {
        return Err(InvoiceError::CustomerNotFound(request.customer_id));
    }

    let product_ids: Vec<Uuid> = requested.keys().copied().collect();
    let products: HashMap<Uuid, Product> = tx
        .lock_products(&product_ids)
        .await?
        .into_iter()
        .map(|p| (p.product_id, p))
        .collect();

    // Report the first offending line in request order.
    for line in &request.lines {
        let product = products
            .get(&line.product_id)
            .ok_or(InvoiceError::ProductNotFound(line.product_id))?;
        let wanted = requested[&line.product_id];
        if product.quantity < wanted {
            return Err(InvoiceError::InsufficientStock {
                product_id: line.product_id,
                available: product.quantity,
                requested: wanted,
            });
        }
    }

    let total = invoice_total(request, &products)?;

    for (&product_id, &quantity) in requested {
        if tx.decrement_stock(product_id, quantity).await?.is_none() {
            return Err(InvoiceError::InsufficientStock {
                product_id,
                available: products.get(&product_id).map_or(0, |p| p.quantity),
                requested: quantity,
            });
        }
    }

    let invoice = tx
        .insert_invoice(&NewInvoice {
            customer_id: request.customer_id,
            total,
        })
        .await?;

    let mut lines = Vec::with_capacity(request.lines.len());
    for (sort_order, line) in (0..).zip(&request.lines) {
        let unit_price = products[&line.product_id].unit_price;
        if let Some(quoted) = line.quoted_price.filter(|quoted| *quoted != unit_price) {
            warn!(
                product_id = %line.product_id,
                quoted = %quoted,
                charged = %unit_price,
                "Ignoring caller-supplied price"
            );
        }

        lines.push(
            tx.insert_invoice_line(&NewInvoiceLine {
                invoice_id: invoice.invoice_id,
                product_id: line.product_id,
                quantity: line.quantity,
                unit_price,
                sort_order,
            })
            .await?,
        );
    }

    Ok(InvoiceWithLines { invoice, lines })
}
