//! Error taxonomy for the client.
//!
//! Every kind is recoverable: validation failures never reach the network,
//! service failures revert the session to `Staged`, and export failures only
//! produce a notification.

use std::path::PathBuf;

use thiserror::Error;

/// Message shown when no better explanation for a failed request exists.
pub const NETWORK_ERROR_MESSAGE: &str = "A network error occurred. Please check your connection.";
/// Message shown for a non-2xx response whose body carries no `error` field.
pub const PROCESSING_FAILED_MESSAGE: &str = "Processing failed";
/// Message shown for faults that escaped every other handler.
pub const UNEXPECTED_ERROR_MESSAGE: &str = "An unexpected error occurred.";

/// A candidate file failed staging.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("unsupported media type '{mime_type}'")]
    UnsupportedType { mime_type: String },

    #[error("file is {byte_size} bytes, limit is {limit} bytes")]
    TooLarge { byte_size: u64, limit: u64 },

    #[error("failed to read {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ValidationError {
    /// Text for the user-visible notification.
    pub fn user_message(&self) -> String {
        match self {
            ValidationError::UnsupportedType { .. } => "Please select a valid image file".to_string(),
            ValidationError::TooLarge { .. } => "File size must be less than 16MB".to_string(),
            ValidationError::Unreadable { path, .. } => {
                format!("Could not read {}", path.display())
            }
        }
    }
}

/// A detection request did not produce a usable result.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The server answered with a non-2xx status.
    #[error("server returned status {status}")]
    Request { status: u16, message: Option<String> },

    /// 2xx response whose body is not a detection payload.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// The request never completed.
    #[error("transport error: {0}")]
    Transport(String),

    /// The worker running the request faulted.
    #[error("unexpected failure: {0}")]
    Unexpected(String),
}

impl ServiceError {
    /// Text for the user-visible notification.
    ///
    /// A server-supplied `error` string is shown verbatim.
    pub fn user_message(&self) -> String {
        match self {
            ServiceError::Request {
                message: Some(message),
                ..
            } => message.clone(),
            ServiceError::Request { message: None, .. } => PROCESSING_FAILED_MESSAGE.to_string(),
            ServiceError::Malformed(_) | ServiceError::Transport(_) => {
                NETWORK_ERROR_MESSAGE.to_string()
            }
            ServiceError::Unexpected(_) => UNEXPECTED_ERROR_MESSAGE.to_string(),
        }
    }
}

/// Saving or viewing the annotated image failed.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("annotated image is not a base64 data URI: {0}")]
    Decode(String),

    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
