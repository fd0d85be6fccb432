// Domain Layer - Identities and request/response models

pub mod error;
pub mod fetch;
pub mod key;


// Re-exports
pub use error::DomainError;
pub use fetch::{FetchMethod, FetchRequest, FetchResponse};
pub use key::ContextKey;
