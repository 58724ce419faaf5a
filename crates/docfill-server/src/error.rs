use std::path::PathBuf;

use axum::{
    extract::multipart::MultipartError,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use docfill_core::SheetError;
use docfill_template::TemplateError;
use serde_json::json;
use thiserror::Error;

/// Application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{kind} not found at {}", path.display())]
    FileNotFound { kind: &'static str, path: PathBuf },

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Sheet(#[from] SheetError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("Spreadsheet error: {0}")]
    Storage(#[from] umya_spreadsheet::XlsxError),

    #[error("Invalid JSON body: {0}")]
    Json(#[from] JsonRejection),

    #[error("Invalid multipart body: {0}")]
    Multipart(#[from] MultipartError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn excel_not_found(path: impl Into<PathBuf>) -> Self {
        AppError::FileNotFound {
            kind: "Excel file",
            path: path.into(),
        }
    }

    pub fn template_not_found(path: impl Into<PathBuf>) -> Self {
        AppError::FileNotFound {
            kind: "Word template",
            path: path.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::FileNotFound { .. } | AppError::Sheet(SheetError::SheetNotFound(_)) => {
                StatusCode::NOT_FOUND
            }
            AppError::BadRequest(_)
            | AppError::Sheet(_)
            | AppError::Json(_)
            | AppError::Multipart(_) => StatusCode::BAD_REQUEST,
            AppError::Template(TemplateError::Io(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Template(_) => StatusCode::BAD_REQUEST,
            AppError::Storage(umya_spreadsheet::XlsxError::Io(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::Storage(_) => StatusCode::BAD_REQUEST,
            AppError::Io(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!("{}", message);
        } else {
            tracing::debug!(status = status.as_u16(), "request failed: {}", message);
        }

        let body = Json(json!({
            "ok": false,
            "error": message
        }));

        (status, body).into_response()
    }
}
