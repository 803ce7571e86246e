use async_trait::async_trait;
use skylink_catalog::Flight;
use uuid::Uuid;

use crate::error::StoreResult;
use crate::models::{Booking, BookingStatus, Passenger, Payment, PaymentStatus, User};

/// Read access to flights
#[async_trait]
pub trait FlightRepository: Send + Sync {
    async fn get_flight(&self, id: Uuid) -> StoreResult<Option<Flight>>;

    async fn list_flights(&self) -> StoreResult<Vec<Flight>>;
}

/// Read access to bookings
#[async_trait]
pub trait BookingRepository: Send + Sync {
    async fn get_booking(&self, id: Uuid) -> StoreResult<Option<Booking>>;

    async fn list_bookings(&self) -> StoreResult<Vec<Booking>>;

    async fn list_bookings_by_user(&self, user_id: Uuid) -> StoreResult<Vec<Booking>>;

    async fn list_bookings_by_status(&self, status: BookingStatus) -> StoreResult<Vec<Booking>>;
}

#[async_trait]
pub trait PassengerRepository: Send + Sync {
    async fn list_passengers(&self, booking_id: Uuid) -> StoreResult<Vec<Passenger>>;
}

/// Read access to payments
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn get_payment(&self, id: Uuid) -> StoreResult<Option<Payment>>;

    async fn find_payment_by_booking(&self, booking_id: Uuid) -> StoreResult<Option<Payment>>;

    async fn list_payments(&self) -> StoreResult<Vec<Payment>>;

    async fn list_payments_by_status(&self, status: PaymentStatus) -> StoreResult<Vec<Payment>>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>>;
}

/// One write inside a [`ChangeSet`].
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    SaveFlight(Flight),
    SaveUser(User),
    /// Conditional decrement: fails the whole commit unless `count` seats are free.
    ReserveSeats { flight_id: Uuid, count: u32 },
    /// Increment clamped to the flight's capacity.
    ReleaseSeats { flight_id: Uuid, count: u32 },
    SaveBooking(Booking),
    DeleteBooking(Uuid),
    SavePassengers(Vec<Passenger>),
    DeletePassengers { booking_id: Uuid },
    SavePayment(Payment),
    DeletePayment(Uuid),
}

/// Writes applied together by [`ReservationStore::commit`], in order, all or nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    changes: Vec<Change>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, change: Change) -> &mut Self {
        self.changes.push(change);
        self
    }

    pub fn reserve_seats(&mut self, flight_id: Uuid, count: u32) -> &mut Self {
        self.push(Change::ReserveSeats { flight_id, count })
    }

    pub fn release_seats(&mut self, flight_id: Uuid, count: u32) -> &mut Self {
        self.push(Change::ReleaseSeats { flight_id, count })
    }

    pub fn save_booking(&mut self, booking: Booking) -> &mut Self {
        self.push(Change::SaveBooking(booking))
    }

    pub fn save_payment(&mut self, payment: Payment) -> &mut Self {
        self.push(Change::SavePayment(payment))
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Change> {
        self.changes.iter()
    }

    pub fn into_changes(self) -> Vec<Change> {
        self.changes
    }
}

/// The full persistence surface the reservation services need.
#[async_trait]
pub trait ReservationStore:
    FlightRepository + BookingRepository + PassengerRepository + PaymentRepository + UserRepository
{
    /// Applies every change in one transaction. On error nothing is applied.
    async fn commit(&self, changes: ChangeSet) -> StoreResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_set_keeps_order() {
        let flight_id = Uuid::new_v4();
        let mut changes = ChangeSet::new();

        changes
            .reserve_seats(flight_id, 2)
            .release_seats(flight_id, 1)
            .push(Change::DeletePassengers { booking_id: flight_id });

        assert_eq!(changes.len(), 3);
        let collected = changes.into_changes();
        assert_eq!(collected[0], Change::ReserveSeats { flight_id, count: 2 });
        assert_eq!(collected[1], Change::ReleaseSeats { flight_id, count: 1 });
    }
}
