//! Error types for `dbgbridge` core library.

use thiserror::Error;

/// Result type alias using `dbgbridge` Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for `dbgbridge` operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Recipe expansion error
    #[error("Recipe error: {0}")]
    Recipe(#[from] crate::recipe::RecipeError),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
