// Port Layer - Interfaces for external dependencies

pub mod fetcher;

// Re-exports
pub use fetcher::{FetchError, Fetcher};
