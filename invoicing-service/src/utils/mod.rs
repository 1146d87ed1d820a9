pub mod password;
pub mod validation;

pub use password::{hash_password_blocking, verify_password_blocking, Password};
pub use validation::ValidatedJson;
