//! API Errors
//!
//! Every command error serialises as `{ "error": "...", "status": <code> }`.

use serde::ser::{Serialize, SerializeStruct, Serializer};
use thiserror::Error;

use crate::logic::capture::CaptureError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// HTTP-style status code.
    pub fn status(&self) -> u16 {
        match self {
            ApiError::Conflict(_) => 409,
            ApiError::NotFound(_) => 404,
            ApiError::BadRequest(_) => 400,
            ApiError::Internal(_) => 500,
        }
    }
}

impl From<CaptureError> for ApiError {
    fn from(err: CaptureError) -> Self {
        match err {
            CaptureError::Conflict => ApiError::Conflict(err.to_string()),
            other => {
                log::error!("Capture request failed: {}", other);
                ApiError::Internal(other.to_string())
            }
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        log::error!("Background task failed: {}", err);
        ApiError::Internal(format!("Background task failed: {}", err))
    }
}

impl Serialize for ApiError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut body = serializer.serialize_struct("ApiError", 2)?;
        body.serialize_field("error", &self.to_string())?;
        body.serialize_field("status", &self.status())?;
        body.end()
    }
}
