use actix_web::{http::StatusCode, ResponseError};
use thiserror::Error;

use crate::response::response_from_error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Unexpected(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    FileSizeLimit(String),
}

impl AppError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn unexpected(msg: impl Into<String>) -> Self {
        Self::Unexpected(msg.into())
    }

    pub fn param_error(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn file_size_limit(limit: usize) -> Self {
        Self::FileSizeLimit(format!("file exceeds the upload limit of {} bytes", limit))
    }

    pub fn msg(&self) -> &str {
        match self {
            Self::NotFound(msg)
            | Self::Unexpected(msg)
            | Self::BadRequest(msg)
            | Self::FileSizeLimit(msg) => msg,
        }
    }
}

impl From<sea_orm::DbErr> for AppError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Unexpected(err.to_string())
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::FileSizeLimit(_) => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }

    fn error_response(&self) -> actix_web::HttpResponse {
        response_from_error(self)
    }
}
