//! In-process store used by tests and by the `memory` storage backend.

use async_trait::async_trait;
use skylink_catalog::{Flight, InventoryError};
use skylink_core::error::{StoreError, StoreResult};
use skylink_core::models::{Booking, BookingStatus, Passenger, Payment, PaymentStatus, User};
use skylink_core::repository::{
    BookingRepository, Change, ChangeSet, FlightRepository, PassengerRepository, PaymentRepository,
    ReservationStore, UserRepository,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Default, Clone)]
struct Tables {
    flights: HashMap<Uuid, Flight>,
    users: HashMap<Uuid, User>,
    bookings: HashMap<Uuid, Booking>,
    passengers: HashMap<Uuid, Vec<Passenger>>,
    payments: HashMap<Uuid, Payment>,
}

impl Tables {
    fn flight_mut(&mut self, flight_id: Uuid) -> StoreResult<&mut Flight> {
        self.flights.get_mut(&flight_id).ok_or(StoreError::NotFound {
            entity: "Flight",
            id: flight_id,
        })
    }

    fn require_booking(&self, booking_id: Uuid) -> StoreResult<()> {
        if self.bookings.contains_key(&booking_id) {
            Ok(())
        } else {
            Err(StoreError::NotFound {
                entity: "Booking",
                id: booking_id,
            })
        }
    }

    fn apply(&mut self, change: Change) -> StoreResult<()> {
        match change {
            Change::SaveFlight(flight) => {
                flight.validate().map_err(|e| StoreError::Backend(e.to_string()))?;
                let taken = self
                    .flights
                    .values()
                    .any(|f| f.flight_number == flight.flight_number && f.id != flight.id);
                if taken {
                    return Err(StoreError::Duplicate(format!("flight number {}", flight.flight_number)));
                }
                self.flights.insert(flight.id, flight);
            }
            Change::SaveUser(user) => {
                self.users.insert(user.id, user);
            }
            Change::ReserveSeats { flight_id, count } => {
                self.flight_mut(flight_id)?.reserve(count).map_err(seat_error)?;
            }
            Change::ReleaseSeats { flight_id, count } => {
                self.flight_mut(flight_id)?.release(count).map_err(seat_error)?;
            }
            Change::SaveBooking(booking) => {
                if !self.flights.contains_key(&booking.flight_id) {
                    return Err(StoreError::NotFound {
                        entity: "Flight",
                        id: booking.flight_id,
                    });
                }
                if !self.users.contains_key(&booking.user_id) {
                    return Err(StoreError::NotFound {
                        entity: "User",
                        id: booking.user_id,
                    });
                }
                self.bookings.insert(booking.id, booking);
            }
            Change::DeleteBooking(booking_id) => {
                self.require_booking(booking_id)?;
                if self.passengers.contains_key(&booking_id) {
                    return Err(StoreError::Backend(format!(
                        "booking {} still has passengers",
                        booking_id
                    )));
                }
                self.bookings.remove(&booking_id);
            }
            Change::SavePassengers(passengers) => {
                for passenger in passengers {
                    self.require_booking(passenger.booking_id)?;
                    self.passengers.entry(passenger.booking_id).or_default().push(passenger);
                }
            }
            Change::DeletePassengers { booking_id } => {
                self.passengers.remove(&booking_id);
            }
            Change::SavePayment(payment) => {
                self.require_booking(payment.booking_id)?;
                for other in self.payments.values().filter(|p| p.id != payment.id) {
                    if other.transaction_id == payment.transaction_id {
                        return Err(StoreError::Duplicate(format!(
                            "transaction id {}",
                            payment.transaction_id
                        )));
                    }
                    if other.booking_id == payment.booking_id {
                        return Err(StoreError::Duplicate(format!(
                            "payment for booking {}",
                            payment.booking_id
                        )));
                    }
                }
                self.payments.insert(payment.id, payment);
            }
            Change::DeletePayment(payment_id) => {
                self.payments.remove(&payment_id).ok_or(StoreError::NotFound {
                    entity: "Payment",
                    id: payment_id,
                })?;
            }
        }
        Ok(())
    }
}

fn seat_error(err: InventoryError) -> StoreError {
    match err {
        InventoryError::InsufficientSeats {
            flight_id,
            requested,
            available,
        } => StoreError::InsufficientSeats {
            flight_id,
            requested,
            available,
        },
        other => StoreError::Backend(other.to_string()),
    }
}

fn sorted_by<T, K: Ord>(mut rows: Vec<T>, key: impl Fn(&T) -> K) -> Vec<T> {
    rows.sort_by_key(|row| key(row));
    rows
}

/// Commits stage every change on a copy of the tables and swap it in only
/// when all of them applied.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
    fail_commits: Arc<AtomicBool>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following commit fail with a backend error.
    pub fn set_fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    pub async fn insert_flight(&self, flight: Flight) -> StoreResult<()> {
        let mut changes = ChangeSet::new();
        changes.push(Change::SaveFlight(flight));
        self.commit(changes).await
    }

    pub async fn insert_user(&self, user: User) -> StoreResult<()> {
        let mut changes = ChangeSet::new();
        changes.push(Change::SaveUser(user));
        self.commit(changes).await
    }
}

#[async_trait]
impl FlightRepository for InMemoryStore {
    async fn get_flight(&self, id: Uuid) -> StoreResult<Option<Flight>> {
        Ok(self.tables.read().await.flights.get(&id).cloned())
    }

    async fn list_flights(&self) -> StoreResult<Vec<Flight>> {
        let flights = self.tables.read().await.flights.values().cloned().collect();
        Ok(sorted_by(flights, |f: &Flight| (f.departure_time, f.flight_number.clone())))
    }
}

#[async_trait]
impl BookingRepository for InMemoryStore {
    async fn get_booking(&self, id: Uuid) -> StoreResult<Option<Booking>> {
        Ok(self.tables.read().await.bookings.get(&id).cloned())
    }

    async fn list_bookings(&self) -> StoreResult<Vec<Booking>> {
        let bookings = self.tables.read().await.bookings.values().cloned().collect();
        Ok(sorted_by(bookings, |b: &Booking| b.created_at))
    }

    async fn list_bookings_by_user(&self, user_id: Uuid) -> StoreResult<Vec<Booking>> {
        let bookings = self
            .tables
            .read()
            .await
            .bookings
            .values()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect();
        Ok(sorted_by(bookings, |b: &Booking| b.created_at))
    }

    async fn list_bookings_by_status(&self, status: BookingStatus) -> StoreResult<Vec<Booking>> {
        let bookings = self
            .tables
            .read()
            .await
            .bookings
            .values()
            .filter(|b| b.status == status)
            .cloned()
            .collect();
        Ok(sorted_by(bookings, |b: &Booking| b.created_at))
    }
}

#[async_trait]
impl PassengerRepository for InMemoryStore {
    async fn list_passengers(&self, booking_id: Uuid) -> StoreResult<Vec<Passenger>> {
        Ok(self
            .tables
            .read()
            .await
            .passengers
            .get(&booking_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl PaymentRepository for InMemoryStore {
    async fn get_payment(&self, id: Uuid) -> StoreResult<Option<Payment>> {
        Ok(self.tables.read().await.payments.get(&id).cloned())
    }

    async fn find_payment_by_booking(&self, booking_id: Uuid) -> StoreResult<Option<Payment>> {
        Ok(self
            .tables
            .read()
            .await
            .payments
            .values()
            .find(|p| p.booking_id == booking_id)
            .cloned())
    }

    async fn list_payments(&self) -> StoreResult<Vec<Payment>> {
        let payments = self.tables.read().await.payments.values().cloned().collect();
        Ok(sorted_by(payments, |p: &Payment| p.paid_at))
    }

    async fn list_payments_by_status(&self, status: PaymentStatus) -> StoreResult<Vec<Payment>> {
        let payments = self
            .tables
            .read()
            .await
            .payments
            .values()
            .filter(|p| p.status == status)
            .cloned()
            .collect();
        Ok(sorted_by(payments, |p: &Payment| p.paid_at))
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }
}

#[async_trait]
impl ReservationStore for InMemoryStore {
    async fn commit(&self, changes: ChangeSet) -> StoreResult<()> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("commit rejected: store is failing".to_string()));
        }

        let mut tables = self.tables.write().await;
        let mut staged = tables.clone();
        let count = changes.len();
        for change in changes.into_changes() {
            staged.apply(change)?;
        }
        *tables = staged;

        debug!(changes = count, "in-memory commit applied");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use skylink_catalog::PriceQuote;

    fn flight(capacity: u32) -> Flight {
        let departure = Utc::now() + Duration::days(3);
        Flight::new("SK200", "CMB", "SIN", departure, departure + Duration::hours(4), 25_000, capacity)
    }

    fn booking_for(user: &User, flight: &Flight, passengers: u32) -> Booking {
        let quote = PriceQuote {
            fare_cents: flight.fare_cents,
            passengers,
            base_cents: flight.fare_cents * i64::from(passengers),
            extras_cents: 0,
            discount_cents: 0,
            total_cents: flight.fare_cents * i64::from(passengers),
            applied_promo_code: None,
        };
        Booking::new(user.id, flight.id, &quote, None)
    }

    #[tokio::test]
    async fn test_commit_is_all_or_nothing() {
        let store = InMemoryStore::new();
        let flight = flight(3);
        let user = User::new("nimal", "nimal@example.com");
        store.insert_flight(flight.clone()).await.unwrap();
        store.insert_user(user.clone()).await.unwrap();

        // 1. Reserve two seats and then more than what is left
        let mut changes = ChangeSet::new();
        changes
            .reserve_seats(flight.id, 2)
            .save_booking(booking_for(&user, &flight, 2))
            .reserve_seats(flight.id, 2);
        let err = store.commit(changes).await.unwrap_err();

        // 2. Nothing from the failed commit is visible
        assert!(matches!(err, StoreError::InsufficientSeats { requested: 2, available: 1, .. }));
        assert_eq!(store.get_flight(flight.id).await.unwrap().unwrap().seats_available, 3);
        assert!(store.list_bookings().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_release_is_clamped() {
        let store = InMemoryStore::new();
        let flight = flight(4);
        store.insert_flight(flight.clone()).await.unwrap();

        let mut changes = ChangeSet::new();
        changes.release_seats(flight.id, 10);
        store.commit(changes).await.unwrap();

        assert_eq!(store.get_flight(flight.id).await.unwrap().unwrap().seats_available, 4);
    }

    #[tokio::test]
    async fn test_payment_uniqueness() {
        let store = InMemoryStore::new();
        let flight = flight(10);
        let user = User::new("kamala", "kamala@example.com");
        store.insert_flight(flight.clone()).await.unwrap();
        store.insert_user(user.clone()).await.unwrap();

        let booking = booking_for(&user, &flight, 1);
        let mut changes = ChangeSet::new();
        changes.save_booking(booking.clone());
        store.commit(changes).await.unwrap();

        let first = Payment::new(booking.id, 25_000, skylink_core::PaymentMethod::Card, PaymentStatus::Completed);
        let mut changes = ChangeSet::new();
        changes.save_payment(first.clone());
        store.commit(changes).await.unwrap();

        // Second payment for the same booking
        let second = Payment::new(booking.id, 25_000, skylink_core::PaymentMethod::Card, PaymentStatus::Pending);
        let mut changes = ChangeSet::new();
        changes.save_payment(second);
        assert!(matches!(store.commit(changes).await, Err(StoreError::Duplicate(_))));

        assert_eq!(store.find_payment_by_booking(booking.id).await.unwrap(), Some(first));
    }

    #[tokio::test]
    async fn test_duplicate_flight_number_rejected() {
        let store = InMemoryStore::new();
        store.insert_flight(flight(10)).await.unwrap();

        let err = store.insert_flight(flight(20)).await.unwrap_err();
        assert_eq!(err, StoreError::Duplicate("flight number SK200".to_string()));
    }

    #[tokio::test]
    async fn test_fail_toggle() {
        let store = InMemoryStore::new();
        store.set_fail_commits(true);

        assert!(matches!(store.insert_flight(flight(1)).await, Err(StoreError::Backend(_))));

        store.set_fail_commits(false);
        assert!(store.insert_flight(flight(1)).await.is_ok());
    }
}
