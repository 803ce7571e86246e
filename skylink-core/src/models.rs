use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use skylink_catalog::PriceQuote;
use skylink_shared::parse::{normalize_label, ParseEnumError};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// The account a booking belongs to. Registration and login live elsewhere;
/// the reservation core only reads users.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
}

impl User {
    pub fn new(username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            email: email.into(),
        }
    }
}

/// Booking lifecycle: `PENDING -> CONFIRMED -> CANCELLED`, `PENDING -> CANCELLED`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Cancelled => "CANCELLED",
        }
    }

    /// Staying in the same state is always allowed; nothing leaves CANCELLED.
    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Pending, Pending)
                | (Confirmed, Confirmed)
                | (Cancelled, Cancelled)
                | (Pending, Confirmed)
                | (Pending, Cancelled)
                | (Confirmed, Cancelled)
        )
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_label(s).as_str() {
            "PENDING" => Ok(BookingStatus::Pending),
            "CONFIRMED" => Ok(BookingStatus::Confirmed),
            "CANCELLED" => Ok(BookingStatus::Cancelled),
            _ => Err(ParseEnumError::new("booking status", s)),
        }
    }
}

/// A reservation of `passenger_count` seats on one flight.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Booking {
    pub id: Uuid,
    pub user_id: Uuid,
    pub flight_id: Uuid,
    pub passenger_count: u32,
    pub status: BookingStatus,
    pub extras_cents: i64,
    pub promo_code: Option<String>,
    pub discount_cents: i64,
    pub total_price_cents: i64,
    pub payment_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn new(user_id: Uuid, flight_id: Uuid, quote: &PriceQuote, promo_code: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            flight_id,
            passenger_count: quote.passengers,
            status: BookingStatus::Pending,
            extras_cents: quote.extras_cents,
            promo_code,
            discount_cents: quote.discount_cents,
            total_price_cents: quote.total_cents,
            payment_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Customer-facing reference, e.g. `BK-1A2B3C4D`.
    pub fn reference(&self) -> String {
        short_reference("BK", &self.id)
    }

    pub fn apply_quote(&mut self, quote: &PriceQuote) {
        self.passenger_count = quote.passengers;
        self.extras_cents = quote.extras_cents;
        self.discount_cents = quote.discount_cents;
        self.total_price_cents = quote.total_cents;
        self.updated_at = Utc::now();
    }

    pub fn update_status(&mut self, status: BookingStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }

    pub fn attach_payment(&mut self, payment_id: Uuid) {
        self.payment_id = Some(payment_id);
        self.updated_at = Utc::now();
    }

    pub fn detach_payment(&mut self) {
        self.payment_id = None;
        self.updated_at = Utc::now();
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == BookingStatus::Cancelled
    }
}

/// Passenger details as submitted, before validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PassengerDetails {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub country: String,
    pub passport_number: Option<String>,
    pub passport_expiry: Option<NaiveDate>,
}

/// A traveller on a booking. Owned by the booking and deleted with it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Passenger {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub date_of_birth: NaiveDate,
    pub country: String,
    pub passport_number: Option<String>,
    pub passport_expiry: Option<NaiveDate>,
}

impl Passenger {
    /// Normalised copy of already validated details: trimmed, email lower-cased.
    pub fn new(booking_id: Uuid, details: &PassengerDetails, date_of_birth: NaiveDate) -> Self {
        let trimmed = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        Self {
            id: Uuid::new_v4(),
            booking_id,
            first_name: details.first_name.trim().to_string(),
            last_name: details.last_name.trim().to_string(),
            email: details.email.trim().to_lowercase(),
            phone: trimmed(&details.phone),
            date_of_birth,
            country: details.country.trim().to_string(),
            passport_number: trimmed(&details.passport_number),
            passport_expiry: details.passport_expiry,
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Completed => "COMPLETED",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Refunded => "REFUNDED",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_label(s).as_str() {
            "PENDING" => Ok(PaymentStatus::Pending),
            "COMPLETED" => Ok(PaymentStatus::Completed),
            "FAILED" => Ok(PaymentStatus::Failed),
            "REFUNDED" => Ok(PaymentStatus::Refunded),
            _ => Err(ParseEnumError::new("payment status", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Card,
    EzCash,
    BankTransfer,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Card => "CARD",
            PaymentMethod::EzCash => "EZ_CASH",
            PaymentMethod::BankTransfer => "BANK_TRANSFER",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_label(s).as_str() {
            "CARD" => Ok(PaymentMethod::Card),
            "EZ_CASH" | "EZCASH" => Ok(PaymentMethod::EzCash),
            "BANK_TRANSFER" => Ok(PaymentMethod::BankTransfer),
            _ => Err(ParseEnumError::new("payment method", s)),
        }
    }
}

/// Money received (or attempted) against a booking.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Payment {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub amount_cents: i64,
    pub status: PaymentStatus,
    pub method: PaymentMethod,
    pub transaction_id: String,
    pub paid_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    pub fn new(booking_id: Uuid, amount_cents: i64, method: PaymentMethod, status: PaymentStatus) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            booking_id,
            amount_cents,
            status,
            method,
            transaction_id: new_transaction_id(),
            paid_at: now,
            updated_at: now,
        }
    }

    pub fn update_status(&mut self, status: PaymentStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }
}

/// `TXN-` followed by 8 upper-case hex characters.
pub fn new_transaction_id() -> String {
    short_reference("TXN", &Uuid::new_v4())
}

fn short_reference(prefix: &str, id: &Uuid) -> String {
    let hex = id.simple().to_string().to_uppercase();
    format!("{}-{}", prefix, &hex[..8])
}
