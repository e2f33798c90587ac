//! HTTP error mapping
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use qs_core::QsError;
use serde_json::json;

/// A core error on its way out of a handler
#[derive(Debug)]
pub struct ApiError(pub QsError);

pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            QsError::InvalidInput(_)
            | QsError::InvalidSpec(_)
            | QsError::InvalidState(_)
            | QsError::MissingParameter(_) => StatusCode::BAD_REQUEST,
            QsError::NotFound(_) => StatusCode::NOT_FOUND,
            QsError::DeliveryFailure(_) => StatusCode::BAD_GATEWAY,
            QsError::StoreError(_) | QsError::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<QsError> for ApiError {
    fn from(err: QsError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        (
            status,
            Json(json!({ "error": self.0.to_string(), "code": self.0.code() })),
        )
            .into_response()
    }
}
