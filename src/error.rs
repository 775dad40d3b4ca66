//! Error types for the Pictor library.
//!
//! All fallible operations return [`Result`], whose error side is the
//! [`PictorError`] enum. Per-candidate failures (`LookupMiss`, `Decode`) are
//! normally absorbed inside a search and only logged; invocation-level
//! failures (`Input`, `IndexUnavailable`, `InvalidConfig`) abort the search.
//!
//! # Examples
//!
//! ```
//! use pictor::error::{PictorError, Result};
//!
//! fn example_operation() -> Result<()> {
//!     Err(PictorError::input("no readable query image"))
//! }
//!
//! match example_operation() {
//!     Ok(_) => println!("Success"),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use std::io;

use thiserror::Error;

/// The main error type for Pictor operations.
#[derive(Error, Debug)]
pub enum PictorError {
    /// I/O errors (file operations, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// No usable query image was provided.
    #[error("Input error: {0}")]
    Input(String),

    /// The vector index or slot mapping is missing or corrupt.
    #[error("Index unavailable: {0}")]
    IndexUnavailable(String),

    /// A slot, candidate id or path could not be resolved.
    #[error("Lookup miss: {0}")]
    LookupMiss(String),

    /// An image could not be decoded.
    #[error("Decode failure: {0}")]
    Decode(String),

    /// Errors raised by the image codec layer.
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A similarity signal escaped the [0, 1] range.
    #[error("Scoring error: {0}")]
    Scoring(String),

    /// Operation cancelled
    #[error("Operation cancelled: {0}")]
    OperationCancelled(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error for other cases
    #[error("Error: {0}")]
    Other(String),

    /// Failure of a third-party component, with its context chain.
    #[error("Anyhow error: {0:#}")]
    Anyhow(#[from] anyhow::Error),
}

/// Result type alias for operations that may fail with PictorError.
pub type Result<T> = std::result::Result<T, PictorError>;

impl PictorError {
    /// Create a new input error.
    pub fn input<S: Into<String>>(msg: S) -> Self {
        PictorError::Input(msg.into())
    }

    /// Create a new index-unavailable error.
    pub fn index_unavailable<S: Into<String>>(msg: S) -> Self {
        PictorError::IndexUnavailable(msg.into())
    }

    /// Create a new lookup-miss error.
    pub fn lookup_miss<S: Into<String>>(msg: S) -> Self {
        PictorError::LookupMiss(msg.into())
    }

    /// Create a new decode error.
    pub fn decode<S: Into<String>>(msg: S) -> Self {
        PictorError::Decode(msg.into())
    }

    /// Create a new invalid config error.
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        PictorError::InvalidConfig(msg.into())
    }

    /// Create a new invalid argument error.
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        PictorError::InvalidArgument(msg.into())
    }

    /// Create a new scoring error.
    pub fn scoring<S: Into<String>>(msg: S) -> Self {
        PictorError::Scoring(msg.into())
    }

    /// Create a new cancelled error.
    pub fn cancelled<S: Into<String>>(msg: S) -> Self {
        PictorError::OperationCancelled(msg.into())
    }

    /// Create a new internal error.
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        PictorError::Other(format!("Internal error: {}", msg.into()))
    }

    /// Create a new generic error.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        PictorError::Other(msg.into())
    }

    /// Whether this error only affects a single candidate and may be skipped.
    pub fn is_per_candidate(&self) -> bool {
        matches!(
            self,
            PictorError::LookupMiss(_) | PictorError::Decode(_) | PictorError::Image(_)
        )
    }
}
