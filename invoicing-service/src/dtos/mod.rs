//! Request and response bodies.

pub mod auth;
pub mod catalog;
pub mod invoice;

pub use auth::{LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};
pub use catalog::{CreateCustomerRequest, CreateProductRequest, UpdateProductRequest};
pub use invoice::{CreateInvoiceRequest, InvoiceLineRequest};

use rust_decimal::Decimal;
use serde::Serialize;
use validator::ValidationError;

use crate::models::max_amount;

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Price must fit a `NUMERIC(14,2)` column and not be negative.
fn valid_price(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(ValidationError::new("non_negative"));
    }
    if *value > max_amount() {
        return Err(ValidationError::new("max_amount"));
    }
    Ok(())
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("not_blank"));
    }
    Ok(())
}
