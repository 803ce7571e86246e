use async_trait::async_trait;
use skylink_core::payment::{AuthorizationRequest, GatewayDecision, GatewayError, PaymentGateway, PaymentInstrument};
use std::time::Duration;
use tracing::debug;

use crate::methods::{is_valid_mobile, luhn_valid};

/// Stand-in for a card/wallet processor: waits `latency`, then approves
/// cards passing the Luhn check and well-formed mobile numbers.
#[derive(Debug, Clone)]
pub struct SimulatedGateway {
    latency: Duration,
}

impl SimulatedGateway {
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }

    /// No artificial delay; for tests.
    pub fn instant() -> Self {
        Self::new(Duration::ZERO)
    }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn authorize(&self, request: &AuthorizationRequest) -> Result<GatewayDecision, GatewayError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let decision = match &request.instrument {
            PaymentInstrument::Card(card) if luhn_valid(card.number.expose()) => GatewayDecision::Approved,
            PaymentInstrument::Card(_) => GatewayDecision::Declined("Card number failed validation".to_string()),
            PaymentInstrument::EzCash { mobile_number } if is_valid_mobile(mobile_number) => GatewayDecision::Approved,
            PaymentInstrument::EzCash { .. } => GatewayDecision::Declined("Mobile wallet rejected the number".to_string()),
        };

        debug!(
            transaction_id = %request.transaction_id,
            amount_cents = request.amount_cents,
            ?decision,
            "gateway decision"
        );
        Ok(decision)
    }
}
