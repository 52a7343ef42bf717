//! Record source error types.

use thiserror::Error;

/// Errors from the external record source.
///
/// Any of these during the scan phase is fatal to the job; during the
/// archive phase they are tallied per record instead.
#[derive(Error, Debug)]
pub enum SourceError {
    /// The source could not be reached.
    #[error("Source unreachable: {0}")]
    Unreachable(String),

    /// The source rejected the credential.
    #[error("Source rejected credential: {0}")]
    Unauthorized(String),

    /// The source returned a non-success status.
    #[error("Source request failed ({status}): {body}")]
    RequestFailed { status: u16, body: String },

    /// The source response could not be decoded.
    #[error("Failed to decode source response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            SourceError::Decode(err.to_string())
        } else {
            SourceError::Unreachable(err.to_string())
        }
    }
}

/// Result type for record source operations.
pub type Result<T> = std::result::Result<T, SourceError>;
