use serde::{Deserialize, Serialize};
use skylink_catalog::{InventoryError, PricingError};
use skylink_shared::ParseEnumError;
use std::fmt;
use uuid::Uuid;

/// Coarse error category, for callers that render errors by kind.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Capacity,
    Conflict,
    PaymentDeclined,
    GatewayTimeout,
    Cancelled,
    Unavailable,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "VALIDATION",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Capacity => "CAPACITY",
            ErrorKind::Conflict => "CONFLICT",
            ErrorKind::PaymentDeclined => "PAYMENT_DECLINED",
            ErrorKind::GatewayTimeout => "GATEWAY_TIMEOUT",
            ErrorKind::Cancelled => "CANCELLED",
            ErrorKind::Unavailable => "UNAVAILABLE",
            ErrorKind::Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every failure a booking, inventory or payment operation can report.
///
/// Validation failures are raised before any write; all other variants
/// leave the store exactly as it was before the call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReservationError {
    #[error("{0}")]
    Validation(String),

    #[error("{entity} not found with ID: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Not enough seats available on flight {flight_id}: requested {requested}, available {available}")]
    Capacity {
        flight_id: Uuid,
        requested: u32,
        available: u32,
    },

    #[error("{0}")]
    Conflict(String),

    #[error("Payment declined: {0}")]
    PaymentDeclined(String),

    #[error("Payment gateway did not answer within {0} ms")]
    GatewayTimeout(u64),

    #[error("Payment cancelled by caller before completion")]
    Cancelled,

    #[error("Payment gateway unavailable: {0}")]
    Gateway(String),

    #[error("Storage failure: {0}")]
    Storage(String),
}

impl ReservationError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ReservationError::Validation(_) => ErrorKind::Validation,
            ReservationError::NotFound { .. } => ErrorKind::NotFound,
            ReservationError::Capacity { .. } => ErrorKind::Capacity,
            ReservationError::Conflict(_) => ErrorKind::Conflict,
            ReservationError::PaymentDeclined(_) => ErrorKind::PaymentDeclined,
            ReservationError::GatewayTimeout(_) => ErrorKind::GatewayTimeout,
            ReservationError::Cancelled => ErrorKind::Cancelled,
            ReservationError::Gateway(_) => ErrorKind::Unavailable,
            ReservationError::Storage(_) => ErrorKind::Internal,
        }
    }
}

pub type ReservationResult<T> = Result<T, ReservationError>;

/// Failures reported by a [`crate::repository::ReservationStore`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("{entity} not found with ID: {id}")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("Not enough seats on flight {flight_id}: requested {requested}, available {available}")]
    InsufficientSeats {
        flight_id: Uuid,
        requested: u32,
        available: u32,
    },

    #[error("Duplicate {0}")]
    Duplicate(String),

    #[error("{0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<StoreError> for ReservationError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => ReservationError::not_found(entity, id),
            StoreError::InsufficientSeats {
                flight_id,
                requested,
                available,
            } => ReservationError::Capacity {
                flight_id,
                requested,
                available,
            },
            StoreError::Duplicate(what) => ReservationError::Conflict(format!("Duplicate {}", what)),
            StoreError::Backend(message) => ReservationError::Storage(message),
        }
    }
}

impl From<InventoryError> for ReservationError {
    fn from(err: InventoryError) -> Self {
        match err {
            InventoryError::InsufficientSeats {
                flight_id,
                requested,
                available,
            } => ReservationError::Capacity {
                flight_id,
                requested,
                available,
            },
            other => ReservationError::Validation(other.to_string()),
        }
    }
}

impl From<PricingError> for ReservationError {
    fn from(err: PricingError) -> Self {
        match err {
            PricingError::DuplicatePromotion(code) => {
                ReservationError::Conflict(format!("Promotion code already exists: {}", code))
            }
            other => ReservationError::Validation(other.to_string()),
        }
    }
}

impl From<ParseEnumError> for ReservationError {
    fn from(err: ParseEnumError) -> Self {
        ReservationError::Validation(err.to_string())
    }
}
