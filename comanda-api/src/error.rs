use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use comanda_catalog::PricingError;
use comanda_order::LifecycleError;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error("{0}")]
    ValidationError(String),
}

impl From<PricingError> for AppError {
    fn from(err: PricingError) -> Self {
        AppError::Lifecycle(err.into())
    }
}

fn lifecycle_status(err: &LifecycleError) -> StatusCode {
    match err {
        LifecycleError::NotFound(_) => StatusCode::NOT_FOUND,
        LifecycleError::InvalidTransition { .. }
        | LifecycleError::AlreadyPaid(_)
        | LifecycleError::OrderCancelled(_)
        | LifecycleError::Conflict(_) => StatusCode::CONFLICT,
        LifecycleError::OutOfCoverage { .. } | LifecycleError::InsufficientPayment { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        LifecycleError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_REQUEST,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, error_message) = match &self {
            AppError::Lifecycle(LifecycleError::Storage(msg)) => {
                tracing::error!("Internal Server Error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE", "Internal Server Error".to_string())
            }
            AppError::Lifecycle(err) => (lifecycle_status(err), err.code(), err.to_string()),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, "VALIDATION", msg.clone()),
        };

        let body = Json(json!({
            "error": error_message,
            "code": code,
        }));

        (status, body).into_response()
    }
}
