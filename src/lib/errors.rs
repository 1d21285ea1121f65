//! Custom error types for barcode extraction.

use thiserror::Error;

/// Result type alias for extraction operations
pub type Result<T> = std::result::Result<T, ExtractError>;

/// Error type for barcode extraction operations
#[derive(Error, Debug)]
pub enum ExtractError {
    /// Malformed or inconsistent configuration (layout, mismatch spec, barcode table)
    #[error("Invalid configuration for '{subject}': {reason}")]
    Config {
        /// The configuration element at fault (category name, option, etc.)
        subject: String,
        /// Explanation of why it's invalid
        reason: String,
    },

    /// File format or existence error
    #[error("Invalid {file_type} file '{path}': {reason}")]
    InvalidFileFormat {
        /// Type of file (e.g., "FASTQ", "barcode table")
        file_type: String,
        /// Path to the file
        path: String,
        /// Explanation of the problem
        reason: String,
    },

    /// Underlying I/O failure
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ExtractError {
    /// Shorthand for a [`ExtractError::Config`] error.
    pub fn config(subject: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Config { subject: subject.into(), reason: reason.into() }
    }
}
