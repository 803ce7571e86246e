use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use skylink_shared::parse::{normalize_label, ParseEnumError};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::inventory::{InventoryError, SeatRelease};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CabinClass {
    Economy,
    Business,
    FirstClass,
}

impl CabinClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            CabinClass::Economy => "ECONOMY",
            CabinClass::Business => "BUSINESS",
            CabinClass::FirstClass => "FIRST_CLASS",
        }
    }
}

impl fmt::Display for CabinClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CabinClass {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_label(s).as_str() {
            "ECONOMY" => Ok(CabinClass::Economy),
            "BUSINESS" => Ok(CabinClass::Business),
            "FIRST_CLASS" => Ok(CabinClass::FirstClass),
            _ => Err(ParseEnumError::new("cabin class", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlightStatus {
    Scheduled,
    Delayed,
    Cancelled,
    Diverted,
}

impl FlightStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlightStatus::Scheduled => "SCHEDULED",
            FlightStatus::Delayed => "DELAYED",
            FlightStatus::Cancelled => "CANCELLED",
            FlightStatus::Diverted => "DIVERTED",
        }
    }
}

impl fmt::Display for FlightStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FlightStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_label(s).as_str() {
            "SCHEDULED" => Ok(FlightStatus::Scheduled),
            "DELAYED" => Ok(FlightStatus::Delayed),
            "CANCELLED" => Ok(FlightStatus::Cancelled),
            "DIVERTED" => Ok(FlightStatus::Diverted),
            _ => Err(ParseEnumError::new("flight status", s)),
        }
    }
}

/// A scheduled flight and the seat inventory it owns.
///
/// `seats_available` is only changed through [`Flight::reserve`] and
/// [`Flight::release`], which keep it within `0..=capacity`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Flight {
    pub id: Uuid,
    pub flight_number: String,
    pub origin: String,
    pub destination: String,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
    pub fare_cents: i64,
    pub cabin_class: CabinClass,
    pub seats_available: u32,
    pub capacity: u32,
    pub aircraft_type: String,
    pub status: FlightStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Flight {
    pub fn new(
        flight_number: impl Into<String>,
        origin: impl Into<String>,
        destination: impl Into<String>,
        departure_time: DateTime<Utc>,
        arrival_time: DateTime<Utc>,
        fare_cents: i64,
        capacity: u32,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            flight_number: flight_number.into().trim().to_uppercase(),
            origin: origin.into().trim().to_uppercase(),
            destination: destination.into().trim().to_uppercase(),
            departure_time,
            arrival_time,
            fare_cents,
            cabin_class: CabinClass::Economy,
            seats_available: capacity,
            capacity,
            aircraft_type: String::new(),
            status: FlightStatus::Scheduled,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_cabin_class(mut self, cabin_class: CabinClass) -> Self {
        self.cabin_class = cabin_class;
        self
    }

    pub fn with_aircraft_type(mut self, aircraft_type: impl Into<String>) -> Self {
        self.aircraft_type = aircraft_type.into();
        self
    }

    /// Starts the flight partially sold. Values above capacity are clamped.
    pub fn with_seats_available(mut self, seats: u32) -> Self {
        self.seats_available = seats.min(self.capacity);
        self
    }

    pub fn route(&self) -> String {
        format!("{} -> {}", self.origin, self.destination)
    }

    /// Checks the schedule and inventory fields before a flight is stored.
    pub fn validate(&self) -> Result<(), InventoryError> {
        if self.flight_number.is_empty() {
            return Err(InventoryError::InvalidFlight("flight number is required".to_string()));
        }
        if self.origin.is_empty() || self.destination.is_empty() {
            return Err(InventoryError::InvalidFlight("origin and destination are required".to_string()));
        }
        if self.origin == self.destination {
            return Err(InventoryError::InvalidFlight(
                "origin and destination must differ".to_string(),
            ));
        }
        if self.arrival_time <= self.departure_time {
            return Err(InventoryError::InvalidFlight(
                "arrival must be after departure".to_string(),
            ));
        }
        if self.fare_cents < 0 {
            return Err(InventoryError::InvalidFlight("fare cannot be negative".to_string()));
        }
        if self.seats_available > self.capacity {
            return Err(InventoryError::InvalidFlight(format!(
                "seats available {} exceed capacity {}",
                self.seats_available, self.capacity
            )));
        }
        Ok(())
    }

    pub fn can_accommodate(&self, count: u32) -> bool {
        self.seats_available >= count
    }

    /// Takes `count` seats out of inventory and returns the remaining count.
    pub fn reserve(&mut self, count: u32) -> Result<u32, InventoryError> {
        if count == 0 {
            return Err(InventoryError::InvalidCount(count));
        }
        if !self.can_accommodate(count) {
            return Err(InventoryError::InsufficientSeats {
                flight_id: self.id,
                requested: count,
                available: self.seats_available,
            });
        }

        self.seats_available -= count;
        self.updated_at = Utc::now();
        Ok(self.seats_available)
    }

    /// Returns `count` seats to inventory, never above capacity.
    pub fn release(&mut self, count: u32) -> Result<SeatRelease, InventoryError> {
        if count == 0 {
            return Err(InventoryError::InvalidCount(count));
        }

        let room = self.capacity.saturating_sub(self.seats_available);
        let restocked = count.min(room);
        self.seats_available += restocked;
        self.updated_at = Utc::now();

        Ok(SeatRelease {
            seats_available: self.seats_available,
            clamped: count - restocked,
        })
    }
}
