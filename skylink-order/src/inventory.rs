use skylink_catalog::{Flight, FlightGuard, FlightLocks};
use skylink_core::error::{ReservationError, ReservationResult};
use skylink_core::repository::{Change, ChangeSet, ReservationStore};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Seat inventory of every flight, guarded by per-flight locks.
pub struct FlightInventory {
    store: Arc<dyn ReservationStore>,
    locks: FlightLocks,
}

impl FlightInventory {
    pub fn new(store: Arc<dyn ReservationStore>) -> Self {
        Self {
            store,
            locks: FlightLocks::new(),
        }
    }

    /// Exclusive access to one flight's seats and bookings.
    pub async fn lock(&self, flight_id: Uuid) -> FlightGuard {
        self.locks.acquire(flight_id).await
    }

    pub async fn get_flight(&self, flight_id: Uuid) -> ReservationResult<Flight> {
        self.store
            .get_flight(flight_id)
            .await?
            .ok_or_else(|| ReservationError::not_found("Flight", flight_id))
    }

    pub async fn list_flights(&self) -> ReservationResult<Vec<Flight>> {
        Ok(self.store.list_flights().await?)
    }

    /// Registers a new flight with a full cabin.
    pub async fn add_flight(&self, flight: Flight) -> ReservationResult<Flight> {
        flight.validate()?;

        let mut changes = ChangeSet::new();
        changes.push(Change::SaveFlight(flight.clone()));
        self.store.commit(changes).await?;

        info!(flight_id = %flight.id, flight_number = %flight.flight_number, capacity = flight.capacity, "flight added");
        Ok(flight)
    }

    /// Takes `count` seats and returns how many remain.
    pub async fn reserve_seats(&self, flight_id: Uuid, count: u32) -> ReservationResult<u32> {
        let _guard = self.lock(flight_id).await;
        let mut flight = self.get_flight(flight_id).await?;

        let mut changes = ChangeSet::new();
        let remaining = self.plan_reserve(&mut flight, count, &mut changes)?;
        self.store.commit(changes).await?;

        info!(%flight_id, count, remaining, "seats reserved");
        Ok(remaining)
    }

    /// Returns `count` seats, clamped to capacity, and reports the new count.
    pub async fn release_seats(&self, flight_id: Uuid, count: u32) -> ReservationResult<u32> {
        let _guard = self.lock(flight_id).await;
        let mut flight = self.get_flight(flight_id).await?;

        let mut changes = ChangeSet::new();
        let available = self.plan_release(&mut flight, count, &mut changes)?;
        self.store.commit(changes).await?;

        info!(%flight_id, count, available, "seats released");
        Ok(available)
    }

    /// Applies a reservation to the loaded `flight` and queues the matching write.
    /// Caller must hold the flight's lock.
    pub(crate) fn plan_reserve(
        &self,
        flight: &mut Flight,
        count: u32,
        changes: &mut ChangeSet,
    ) -> ReservationResult<u32> {
        let remaining = flight.reserve(count)?;
        changes.reserve_seats(flight.id, count);
        Ok(remaining)
    }

    pub(crate) fn plan_release(
        &self,
        flight: &mut Flight,
        count: u32,
        changes: &mut ChangeSet,
    ) -> ReservationResult<u32> {
        let release = flight.release(count)?;
        if release.clamped > 0 {
            warn!(
                flight_id = %flight.id,
                requested = count,
                clamped = release.clamped,
                capacity = flight.capacity,
                "restock exceeded capacity, clamping"
            );
        }
        changes.release_seats(flight.id, count);
        Ok(release.seats_available)
    }
}
