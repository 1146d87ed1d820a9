use rust_decimal::Decimal;
use serde::Deserialize;
use validator::Validate;

use super::{not_blank, valid_price};
use crate::models::{CreateCustomer, CreateProduct, UpdateProduct};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCustomerRequest {
    #[serde(rename = "nombre")]
    #[validate(
        length(max = 200, message = "Name must be at most 200 characters"),
        custom(function = "not_blank", message = "Name is required")
    )]
    pub name: String,

    #[serde(rename = "direccion")]
    #[validate(length(max = 500))]
    pub address: Option<String>,

    #[serde(rename = "telefono")]
    #[validate(length(max = 50))]
    pub phone: Option<String>,

    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
}

impl From<CreateCustomerRequest> for CreateCustomer {
    fn from(req: CreateCustomerRequest) -> Self {
        CreateCustomer {
            name: req.name.trim().to_string(),
            address: req.address,
            phone: req.phone,
            email: req.email,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductRequest {
    #[serde(rename = "nombre")]
    #[validate(
        length(max = 200, message = "Name must be at most 200 characters"),
        custom(function = "not_blank", message = "Name is required")
    )]
    pub name: String,

    #[serde(rename = "descripcion")]
    pub description: Option<String>,

    #[serde(rename = "precio")]
    #[validate(custom(
        function = "valid_price",
        message = "Price must be between 0 and 999999999999.99"
    ))]
    pub unit_price: Decimal,

    #[serde(rename = "cantidad")]
    #[validate(range(min = 0, message = "Quantity must not be negative"))]
    pub quantity: i32,
}

impl From<CreateProductRequest> for CreateProduct {
    fn from(req: CreateProductRequest) -> Self {
        CreateProduct {
            name: req.name.trim().to_string(),
            description: req.description,
            unit_price: req.unit_price.round_dp(2),
            quantity: req.quantity,
        }
    }
}

/// Partial product update; absent fields are left unchanged.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProductRequest {
    #[serde(rename = "nombre")]
    #[validate(
        length(max = 200, message = "Name must be at most 200 characters"),
        custom(function = "not_blank", message = "Name must not be blank")
    )]
    pub name: Option<String>,

    #[serde(rename = "descripcion")]
    pub description: Option<String>,

    #[serde(rename = "precio")]
    #[validate(custom(
        function = "valid_price",
        message = "Price must be between 0 and 999999999999.99"
    ))]
    pub unit_price: Option<Decimal>,

    #[serde(rename = "cantidad")]
    #[validate(range(min = 0, message = "Quantity must not be negative"))]
    pub quantity: Option<i32>,
}

impl From<UpdateProductRequest> for UpdateProduct {
    fn from(req: UpdateProductRequest) -> Self {
        UpdateProduct {
            name: req.name.map(|name| name.trim().to_string()),
            description: req.description,
            unit_price: req.unit_price.map(|price| price.round_dp(2)),
            quantity: req.quantity,
        }
    }
}
