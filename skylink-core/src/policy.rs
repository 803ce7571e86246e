use serde::Deserialize;
use std::time::Duration;

use crate::error::{ReservationError, ReservationResult};

/// Passenger-count limits shared by every booking path.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct BookingPolicy {
    #[serde(default = "default_max_passengers")]
    pub max_passengers: u32,
    /// Ceiling when full passenger details accompany the booking.
    #[serde(default = "default_max_passengers_with_details")]
    pub max_passengers_with_details: u32,
}

fn default_max_passengers() -> u32 { 10 }
fn default_max_passengers_with_details() -> u32 { 5 }

impl Default for BookingPolicy {
    fn default() -> Self {
        Self {
            max_passengers: default_max_passengers(),
            max_passengers_with_details: default_max_passengers_with_details(),
        }
    }
}

impl BookingPolicy {
    pub fn limit(&self, with_details: bool) -> u32 {
        if with_details {
            self.max_passengers_with_details
        } else {
            self.max_passengers
        }
    }

    pub fn check_passenger_count(&self, count: u32, with_details: bool) -> ReservationResult<()> {
        let max = self.limit(with_details);
        if count == 0 || count > max {
            return Err(ReservationError::validation(format!(
                "Number of passengers must be between 1 and {}",
                max
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct PaymentSettings {
    /// Artificial delay of the simulated gateway.
    #[serde(default = "default_gateway_latency_ms")]
    pub gateway_latency_ms: u64,
    /// Upper bound on any gateway call.
    #[serde(default = "default_gateway_timeout_ms")]
    pub gateway_timeout_ms: u64,
}

fn default_gateway_latency_ms() -> u64 { 1500 }
fn default_gateway_timeout_ms() -> u64 { 5000 }

impl Default for PaymentSettings {
    fn default() -> Self {
        Self {
            gateway_latency_ms: default_gateway_latency_ms(),
            gateway_timeout_ms: default_gateway_timeout_ms(),
        }
    }
}

impl PaymentSettings {
    pub fn gateway_latency(&self) -> Duration {
        Duration::from_millis(self.gateway_latency_ms)
    }

    pub fn gateway_timeout(&self) -> Duration {
        Duration::from_millis(self.gateway_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passenger_limits() {
        let policy = BookingPolicy::default();

        assert!(policy.check_passenger_count(1, false).is_ok());
        assert!(policy.check_passenger_count(10, false).is_ok());
        assert!(policy.check_passenger_count(11, false).is_err());
        assert!(policy.check_passenger_count(0, false).is_err());

        assert!(policy.check_passenger_count(5, true).is_ok());
        let err = policy.check_passenger_count(6, true).unwrap_err();
        assert_eq!(err.to_string(), "Number of passengers must be between 1 and 5");
    }

    #[test]
    fn test_payment_defaults() {
        let settings = PaymentSettings::default();
        assert_eq!(settings.gateway_latency(), Duration::from_millis(1500));
        assert_eq!(settings.gateway_timeout(), Duration::from_secs(5));
    }
}
