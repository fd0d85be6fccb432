// Application Layer - Serialization contexts and their registry

pub mod exclusive;
pub mod registry;

// Re-exports
pub use exclusive::{Exclusive, RunHandle};
pub use registry::ContextRegistry;
