use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::services::{InvoiceRequest, LineRequest};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateInvoiceRequest {
    #[serde(rename = "clienteId")]
    pub customer_id: Uuid,

    #[serde(rename = "detalles")]
    #[validate(
        length(min = 1, max = 500, message = "Invoice must contain 1 to 500 lines"),
        nested
    )]
    pub lines: Vec<InvoiceLineRequest>,
}

/// `Serialize` is required by the `length` rule on [`CreateInvoiceRequest::lines`].
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct InvoiceLineRequest {
    #[serde(rename = "productoId")]
    pub product_id: Uuid,

    #[serde(rename = "cantidad")]
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,

    /// Accepted for compatibility, never charged.
    #[serde(rename = "precio", default)]
    pub quoted_price: Option<Decimal>,
}

impl From<CreateInvoiceRequest> for InvoiceRequest {
    fn from(req: CreateInvoiceRequest) -> Self {
        InvoiceRequest {
            customer_id: req.customer_id,
            lines: req
                .lines
                .into_iter()
                .map(|line| LineRequest {
                    product_id: line.product_id,
                    quantity: line.quantity,
                    quoted_price: line.quoted_price,
                })
                .collect(),
        }
    }
}
