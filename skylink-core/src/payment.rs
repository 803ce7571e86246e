use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use skylink_shared::Masked;
use uuid::Uuid;

use crate::models::PaymentMethod;

/// Method-specific fields as submitted with a payment. Which ones are
/// required depends on the method.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentFields {
    pub card_number: Option<Masked<String>>,
    pub cardholder_name: Option<String>,
    pub card_expiry: Option<String>,
    pub cvv: Option<Masked<String>>,
    pub email: Option<String>,
    pub mobile_number: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CardDetails {
    /// Digits only.
    pub number: Masked<String>,
    pub cardholder_name: String,
    /// `MM/YY`
    pub expiry: String,
    pub cvv: Masked<String>,
    pub email: String,
}

/// A payment method whose fields have passed format validation.
#[derive(Debug, Clone)]
pub enum PaymentInstrument {
    Card(CardDetails),
    EzCash { mobile_number: String },
}

impl PaymentInstrument {
    pub fn method(&self) -> PaymentMethod {
        match self {
            PaymentInstrument::Card(_) => PaymentMethod::Card,
            PaymentInstrument::EzCash { .. } => PaymentMethod::EzCash,
        }
    }

    /// Where the payment confirmation goes, if the method carries a contact.
    pub fn contact_email(&self) -> Option<&str> {
        match self {
            PaymentInstrument::Card(card) => Some(card.email.as_str()),
            PaymentInstrument::EzCash { .. } => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub booking_id: Uuid,
    pub amount_cents: i64,
    pub transaction_id: String,
    pub instrument: PaymentInstrument,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayDecision {
    Approved,
    Declined(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    #[error("gateway unavailable: {0}")]
    Unavailable(String),
}

/// The external card/wallet processor.
///
/// Implementations must be cancel-safe: the ledger drops the future on
/// timeout or caller cancellation and treats the attempt as never made.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn authorize(&self, request: &AuthorizationRequest) -> Result<GatewayDecision, GatewayError>;
}
