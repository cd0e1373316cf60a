//! Error taxonomy for metadata requests.
//!
//! Validation errors are client-class: they carry an HTTP status and a short
//! message. Everything else is internal and keeps the full error chain for
//! server-side logging.

use axum::http::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ZipMetaError {
    /// The request or its input file was rejected.
    #[error("{message}")]
    Validation {
        status: StatusCode,
        message: &'static str,
    },

    /// Any other failure while serving the request.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ZipMetaError {
    pub const NOT_ENOUGH_DATA: &'static str = "Not enough filedata";
    pub const NOT_A_ZIP: &'static str = "Not a zip file";
    pub const UNPARSABLE: &'static str = "Could not parse file as a zip file";
    pub const UNKNOWN_SAMPLE: &'static str = "Unknown sample identifier";

    pub fn bad_request(message: &'static str) -> Self {
        ZipMetaError::Validation {
            status: StatusCode::BAD_REQUEST,
            message,
        }
    }

    pub fn not_found(message: &'static str) -> Self {
        ZipMetaError::Validation {
            status: StatusCode::NOT_FOUND,
            message,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ZipMetaError::Validation { status, .. } => *status,
            ZipMetaError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, ZipMetaError::Validation { .. })
    }
}

pub type Result<T, E = ZipMetaError> = std::result::Result<T, E>;
