//! Domain models for invoicing-service.

mod customer;
mod invoice;
mod product;
mod user;

pub use customer::{CreateCustomer, Customer};
pub use invoice::{
    max_amount, Invoice, InvoiceDetail, InvoiceLine, InvoiceLineDetail, InvoiceSummary,
    InvoiceWithLines, NewInvoice, NewInvoiceLine,
};
pub use product::{CreateProduct, Product, UpdateProduct};
pub use user::{CreateUser, Role, UnknownRole, User};
