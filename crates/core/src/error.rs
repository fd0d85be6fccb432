// Central Error Type for the Application

use thiserror::Error;

/// Application-level error type
///
/// The serialization contexts never fail on their own account; this type only
/// covers adapter setup around them.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
