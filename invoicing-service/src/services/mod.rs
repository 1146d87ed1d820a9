//! Services module for invoicing-service.

pub mod invoicing;
pub mod jwt;
pub mod metrics;
pub mod store;

pub use invoicing::{InvoiceError, InvoiceRequest, InvoiceWorkflow, LineRequest};
pub use jwt::{AccessTokenClaims, JwtService};
pub use metrics::{get_metrics, init_metrics};
pub use store::{EntityStore, MemoryStore, PgStore, StoreError};
