use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use skylink_core::{ErrorKind, ReservationError};
use skylink_shared::ParseEnumError;

#[derive(Debug)]
pub enum AppError {
    Reservation(ReservationError),
    InternalServerError(String),
}

/// HTTP status for each error kind. 499 is the client-closed-request code.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Capacity | ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::PaymentDeclined => StatusCode::PAYMENT_REQUIRED,
        ErrorKind::GatewayTimeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::Cancelled => StatusCode::from_u16(499).unwrap_or(StatusCode::BAD_REQUEST),
        ErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind, error_message) = match self {
            AppError::Reservation(err) => {
                let kind = err.kind();
                if kind == ErrorKind::Internal {
                    tracing::error!("Internal Server Error: {}", err);
                    (status_for(kind), kind, "Internal Server Error".to_string())
                } else {
                    (status_for(kind), kind, err.to_string())
                }
            }
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorKind::Internal,
                    "Internal Server Error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "kind": kind,
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<ReservationError> for AppError {
    fn from(err: ReservationError) -> Self {
        Self::Reservation(err)
    }
}

impl From<ParseEnumError> for AppError {
    fn from(err: ParseEnumError) -> Self {
        Self::Reservation(err.into())
    }
}
