//! Invoice and invoice line models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::{Customer, Product};

/// Invoice header. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Invoice {
    #[serde(rename = "id")]
    pub invoice_id: Uuid,
    #[serde(rename = "clienteId")]
    pub customer_id: Uuid,
    /// Derived from the lines, never supplied by a caller.
    pub total: Decimal,
    #[serde(rename = "fecha")]
    pub created_utc: DateTime<Utc>,
}

/// One sold product on an invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct InvoiceLine {
    #[serde(rename = "id")]
    pub line_id: Uuid,
    #[serde(rename = "facturaId")]
    pub invoice_id: Uuid,
    #[serde(rename = "productoId")]
    pub product_id: Uuid,
    #[serde(rename = "cantidad")]
    pub quantity: i32,
    /// Product price at the time of sale.
    #[serde(rename = "precio")]
    pub unit_price: Decimal,
    /// Position in the originating request.
    #[serde(skip)]
    pub sort_order: i32,
}

/// Largest amount a `NUMERIC(14,2)` money column holds.
pub fn max_amount() -> Decimal {
    Decimal::new(99_999_999_999_999, 2)
}

impl InvoiceLine {
    /// `None` when price times quantity overflows.
    pub fn subtotal(&self) -> Option<Decimal> {
        self.unit_price.checked_mul(Decimal::from(self.quantity))
    }
}

/// Row to insert for a new invoice.
#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub customer_id: Uuid,
    pub total: Decimal,
}

/// Row to insert for a new invoice line.
#[derive(Debug, Clone)]
pub struct NewInvoiceLine {
    pub invoice_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub sort_order: i32,
}

/// Invoice together with its lines, as produced by the invoice workflow.
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceWithLines {
    #[serde(rename = "factura")]
    pub invoice: Invoice,
    #[serde(rename = "detalles")]
    pub lines: Vec<InvoiceLine>,
}

/// Invoice joined with its customer for listings.
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceSummary {
    #[serde(flatten)]
    pub invoice: Invoice,
    /// `None` when the customer row no longer exists.
    #[serde(rename = "cliente")]
    pub customer: Option<Customer>,
}

/// Invoice line joined with its product.
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceLineDetail {
    #[serde(flatten)]
    pub line: InvoiceLine,
    /// `None` when the product was deleted after the sale.
    #[serde(rename = "producto")]
    pub product: Option<Product>,
}

/// Full invoice view: header with customer, lines with products.
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceDetail {
    #[serde(rename = "factura")]
    pub invoice: InvoiceSummary,
    #[serde(rename = "detalles")]
    pub lines: Vec<InvoiceLineDetail>,
}
