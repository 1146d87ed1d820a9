pub mod auth;

pub use auth::{auth_middleware, AuthUser, Principal, ADMIN_ONLY, ALL_ROLES, CATALOG_EDITORS};
