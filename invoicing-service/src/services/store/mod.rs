//! Entity store abstraction.
//!
//! The HTTP layer and the invoice workflow only talk to [`EntityStore`]. Two
//! implementations exist: [`PgStore`] for production and [`MemoryStore`] for
//! local runs and tests. Both give the same guarantees for
//! [`StoreTransaction`]: every write made through a transaction becomes
//! visible atomically on [`StoreTransaction::commit`], and is undone when the
//! transaction is rolled back or dropped.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use service_core::error::AppError;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    CreateCustomer, CreateProduct, CreateUser, Customer, Invoice, InvoiceLine, InvoiceLineDetail,
    InvoiceSummary, NewInvoice, NewInvoiceLine, Product, UpdateProduct, User,
};

/// Storage failure.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store could not serve the request.
    #[error("storage unavailable: {0}")]
    Unavailable(anyhow::Error),

    /// A uniqueness constraint rejected the write.
    #[error("{0}")]
    Conflict(String),
}

impl StoreError {
    pub(crate) fn unavailable(context: &str, err: impl std::fmt::Display) -> Self {
        StoreError::Unavailable(anyhow::anyhow!("{}: {}", context, err))
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(e) => AppError::DatabaseError(e),
            StoreError::Conflict(msg) => AppError::Conflict(anyhow::anyhow!(msg)),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence operations for customers, products, invoices and users.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Cheap round trip used by the readiness check.
    async fn health_check(&self) -> StoreResult<()>;

    /// Open a unit of work for multi-record writes.
    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>>;

    async fn create_customer(&self, input: &CreateCustomer) -> StoreResult<Customer>;
    async fn get_customer(&self, customer_id: Uuid) -> StoreResult<Option<Customer>>;
    async fn list_customers(&self) -> StoreResult<Vec<Customer>>;

    async fn create_product(&self, input: &CreateProduct) -> StoreResult<Product>;
    async fn get_product(&self, product_id: Uuid) -> StoreResult<Option<Product>>;
    async fn list_products(&self) -> StoreResult<Vec<Product>>;
    async fn update_product(
        &self,
        product_id: Uuid,
        input: &UpdateProduct,
    ) -> StoreResult<Option<Product>>;
    /// Returns `false` when no such product existed.
    async fn delete_product(&self, product_id: Uuid) -> StoreResult<bool>;

    async fn get_invoice(&self, invoice_id: Uuid) -> StoreResult<Option<InvoiceSummary>>;
    /// Invoices, newest first, each joined with its customer.
    async fn list_invoices(&self) -> StoreResult<Vec<InvoiceSummary>>;
    /// Lines of an invoice in request order, each joined with its product.
    async fn get_invoice_lines(&self, invoice_id: Uuid) -> StoreResult<Vec<InvoiceLineDetail>>;

    /// Fails with [`StoreError::Conflict`] when the username is taken.
    async fn create_user(&self, input: &CreateUser) -> StoreResult<User>;
    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>>;
}

/// Transactional view of the store used by the invoice workflow.
#[async_trait]
pub trait StoreTransaction: Send {
    async fn get_customer(&mut self, customer_id: Uuid) -> StoreResult<Option<Customer>>;

    /// Load and lock the given products until the transaction ends.
    ///
    /// Missing ids are simply absent from the result. Locks are taken in
    /// ascending id order.
    async fn lock_products(&mut self, product_ids: &[Uuid]) -> StoreResult<Vec<Product>>;

    /// Decrement stock only if at least `quantity` units are on hand.
    ///
    /// Returns the updated product, or `None` when stock was insufficient or
    /// the product does not exist. Stock is left untouched in that case.
    async fn decrement_stock(&mut self, product_id: Uuid, quantity: i32)
        -> StoreResult<Option<Product>>;

    async fn insert_invoice(&mut self, input: &NewInvoice) -> StoreResult<Invoice>;
    async fn insert_invoice_line(&mut self, input: &NewInvoiceLine) -> StoreResult<InvoiceLine>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;
    async fn rollback(self: Box<Self>) -> StoreResult<()>;
}
