use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

/// Outcome of returning seats to a flight.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeatRelease {
    pub seats_available: u32,
    /// Seats that did not fit under the capacity ceiling and were dropped.
    pub clamped: u32,
}

/// Per-flight async locks.
///
/// Every read-modify-write of a flight's seats (and of the bookings and
/// payments hanging off that flight) runs while holding the flight's guard,
/// so two requests for the last seat cannot both observe it as free.
#[derive(Debug, Clone, Default)]
pub struct FlightLocks {
    locks: Arc<DashMap<Uuid, Arc<Mutex<()>>>>,
}

impl FlightLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `flight_id`.
    pub async fn acquire(&self, flight_id: Uuid) -> FlightGuard {
        let lock = self
            .locks
            .entry(flight_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        FlightGuard {
            flight_id,
            _guard: lock.lock_owned().await,
        }
    }
}

/// Held for the duration of one inventory-touching operation.
#[derive(Debug)]
pub struct FlightGuard {
    flight_id: Uuid,
    _guard: OwnedMutexGuard<()>,
}

impl FlightGuard {
    pub fn flight_id(&self) -> Uuid {
        self.flight_id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InventoryError {
    #[error("Not enough seats on flight {flight_id}: requested {requested}, available {available}")]
    InsufficientSeats {
        flight_id: Uuid,
        requested: u32,
        available: u32,
    },

    #[error("Seat count must be positive, got {0}")]
    InvalidCount(u32),

    #[error("Invalid flight: {0}")]
    InvalidFlight(String),
}
