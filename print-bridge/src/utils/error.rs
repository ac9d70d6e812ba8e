//! 统一错误处理
//!
//! 服务级错误类型 [`AppError`]，以及到 HTTP 响应的映射。
//!
//! | 变体 | HTTP |
//! |------|------|
//! | Conflict | 409 |
//! | Invalid | 400 |
//! | NotFound | 404 |
//! | Storage / Print / Internal | 500 |

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::error;

use crate::storage::StoreError;
use ticket_printer::PrintError;

/// Error body sent with every non-2xx response
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Conflict: {0}")]
    /// 冲突 (409)
    Conflict(String),

    #[error("Invalid request: {0}")]
    /// 无效请求 (400)
    Invalid(String),

    #[error("Not found: {0}")]
    /// 资源不存在 (404)
    NotFound(String),

    #[error("Storage error: {0}")]
    /// 存储错误 (500)
    Storage(#[from] StoreError),

    #[error("Print error: {0}")]
    /// 打印失败 (500)
    Print(#[from] PrintError),

    #[error("Internal error: {0}")]
    /// 内部错误 (500)
    Internal(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Invalid(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Storage(_) | AppError::Print(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (kind, message) = match &self {
            AppError::Conflict(msg) => ("conflict", msg.clone()),
            AppError::Invalid(msg) => ("invalid_request", msg.clone()),
            AppError::NotFound(msg) => ("not_found", msg.clone()),
            other => {
                // 记录内部错误但不暴露详细信息
                error!(error = %other, "Internal error occurred");
                ("internal_error", "An internal error occurred".to_string())
            }
        };

        let body = Json(ErrorBody {
            error: kind.to_string(),
            message,
        });

        (status, body).into_response()
    }
}
