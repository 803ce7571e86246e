use chrono::Utc;
use serde::{Deserialize, Serialize};
use skylink_catalog::pricing::normalize_code;
use skylink_catalog::{Flight, FlightGuard, PricingCalculator};
use skylink_core::error::{ReservationError, ReservationResult};
use skylink_core::models::{Booking, BookingStatus, Passenger, PassengerDetails, PaymentStatus, User};
use skylink_core::policy::BookingPolicy;
use skylink_core::repository::{Change, ChangeSet, ReservationStore};
use skylink_shared::Notification;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::changes::{plan_update, BookingUpdate};
use crate::effects::SideEffects;
use crate::inventory::FlightInventory;
use crate::passengers::validate_passengers;

/// A booking request. `status` defaults to PENDING.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBooking {
    pub user_id: Uuid,
    pub flight_id: Uuid,
    pub passenger_count: u32,
    #[serde(default)]
    pub extras_cents: i64,
    #[serde(default)]
    pub promo_code: Option<String>,
    #[serde(default)]
    pub status: Option<BookingStatus>,
}

/// Booking lifecycle: creation, updates, cancellation and deletion, each
/// committed together with its seat changes.
pub struct BookingManager {
    store: Arc<dyn ReservationStore>,
    inventory: Arc<FlightInventory>,
    pricing: PricingCalculator,
    policy: BookingPolicy,
    effects: SideEffects,
}

impl BookingManager {
    pub fn new(
        store: Arc<dyn ReservationStore>,
        inventory: Arc<FlightInventory>,
        pricing: PricingCalculator,
        policy: BookingPolicy,
        effects: SideEffects,
    ) -> Self {
        Self {
            store,
            inventory,
            pricing,
            policy,
            effects,
        }
    }

    pub fn inventory(&self) -> &Arc<FlightInventory> {
        &self.inventory
    }

    pub fn policy(&self) -> &BookingPolicy {
        &self.policy
    }

    pub async fn create_booking(&self, request: NewBooking) -> ReservationResult<Booking> {
        self.create(request, None).await.map(|(booking, _)| booking)
    }

    /// Creates the booking together with one validated record per passenger.
    pub async fn create_booking_with_passengers(
        &self,
        request: NewBooking,
        passengers: Vec<PassengerDetails>,
    ) -> ReservationResult<(Booking, Vec<Passenger>)> {
        self.create(request, Some(passengers.as_slice())).await
    }

    async fn create(
        &self,
        request: NewBooking,
        details: Option<&[PassengerDetails]>,
    ) -> ReservationResult<(Booking, Vec<Passenger>)> {
        self.policy
            .check_passenger_count(request.passenger_count, details.is_some())?;
        if request.extras_cents < 0 {
            return Err(ReservationError::validation("Extras amount cannot be negative"));
        }
        let status = request.status.unwrap_or(BookingStatus::Pending);
        if status == BookingStatus::Cancelled {
            return Err(ReservationError::validation(
                "A booking cannot be created in CANCELLED status",
            ));
        }

        let user = self.get_user(request.user_id).await?;

        let guard = self.inventory.lock(request.flight_id).await;
        let mut flight = self.inventory.get_flight(request.flight_id).await?;

        let promo_code = request.promo_code.as_deref().and_then(normalize_code);
        let quote = self
            .pricing
            .quote(
                flight.fare_cents,
                request.passenger_count,
                request.extras_cents,
                promo_code.as_deref(),
                Utc::now(),
            )
            .await?;

        let mut booking = Booking::new(user.id, flight.id, &quote, promo_code);
        booking.update_status(status);

        let passengers = match details {
            Some(details) => validate_passengers(booking.id, details, request.passenger_count, &user)?,
            None => Vec::new(),
        };

        let mut changes = ChangeSet::new();
        let remaining = self
            .inventory
            .plan_reserve(&mut flight, request.passenger_count, &mut changes)?;
        changes.save_booking(booking.clone());
        if !passengers.is_empty() {
            changes.push(Change::SavePassengers(passengers.clone()));
        }
        self.store.commit(changes).await?;
        drop(guard);

        info!(
            booking_id = %booking.id,
            flight_id = %flight.id,
            passengers = booking.passenger_count,
            total_cents = booking.total_price_cents,
            seats_remaining = remaining,
            "booking created"
        );

        self.effects
            .audit(
                &user.id.to_string(),
                "CREATE_BOOKING",
                &resource(&booking),
                &format!(
                    "Flight {} for {} passenger(s), total {}",
                    flight.flight_number,
                    booking.passenger_count,
                    format_amount(booking.total_price_cents)
                ),
            )
            .await;
        self.effects
            .notify(Notification::email(
                &user.email,
                "Booking Created",
                format!(
                    "Your booking {} on flight {} ({}) for {} passenger(s) has been created. Total: {}. Status: {}.",
                    booking.reference(),
                    flight.flight_number,
                    flight.route(),
                    booking.passenger_count,
                    format_amount(booking.total_price_cents),
                    booking.status
                ),
            ))
            .await;

        Ok((booking, passengers))
    }

    pub async fn update_booking(&self, booking_id: Uuid, update: BookingUpdate) -> ReservationResult<Booking> {
        let (guard, mut booking) = self.lock_booking(booking_id).await?;
        if update.is_empty() {
            debug!(%booking_id, "empty booking update ignored");
            return Ok(booking);
        }

        let has_details = !self.store.list_passengers(booking_id).await?.is_empty();
        let plan = plan_update(&booking, &update, &self.policy, has_details)?;
        let passengers = match &update.passengers {
            Some(details) => {
                let user = self.get_user(booking.user_id).await?;
                Some(validate_passengers(booking_id, details, plan.passenger_count, &user)?)
            }
            None => None,
        };
        let mut flight = self.inventory.get_flight(booking.flight_id).await?;
        let previous = booking.clone();

        let mut changes = ChangeSet::new();
        if plan.cancelling {
            self.refund_attached_payment(&booking, &mut changes).await?;
            self.plan_cancel(&mut booking, &mut flight, &mut changes)?;
        } else {
            if plan.seat_delta > 0 {
                self.inventory
                    .plan_reserve(&mut flight, plan.seat_delta as u32, &mut changes)?;
            } else if plan.seat_delta < 0 {
                self.inventory
                    .plan_release(&mut flight, plan.seat_delta.unsigned_abs() as u32, &mut changes)?;
            }

            if plan.reprice {
                let quote = self
                    .pricing
                    .quote(
                        flight.fare_cents,
                        plan.passenger_count,
                        plan.extras_cents,
                        plan.promo_code.as_deref(),
                        Utc::now(),
                    )
                    .await?;
                booking.apply_quote(&quote);
                booking.promo_code = plan.promo_code.clone();
            }
            booking.update_status(plan.status);
        }
        changes.save_booking(booking.clone());
        if let Some(passengers) = passengers {
            changes.push(Change::DeletePassengers { booking_id });
            changes.push(Change::SavePassengers(passengers));
        }
        self.store.commit(changes).await?;
        drop(guard);

        info!(
            %booking_id,
            status = %booking.status,
            passengers = booking.passenger_count,
            seat_delta = plan.seat_delta,
            total_cents = booking.total_price_cents,
            "booking updated"
        );
        self.effects
            .audit(
                &booking.user_id.to_string(),
                "UPDATE_BOOKING",
                &resource(&booking),
                &format!(
                    "Passengers {} -> {}, status {} -> {}, total {} -> {}",
                    previous.passenger_count,
                    booking.passenger_count,
                    previous.status,
                    booking.status,
                    format_amount(previous.total_price_cents),
                    format_amount(booking.total_price_cents)
                ),
            )
            .await;

        Ok(booking)
    }

    /// Cancels the booking, restocks its seats once and refunds an attached payment.
    pub async fn cancel_booking(&self, booking_id: Uuid) -> ReservationResult<Booking> {
        let (guard, mut booking) = self.lock_booking(booking_id).await?;
        if booking.is_cancelled() {
            return Err(ReservationError::conflict("Booking already cancelled"));
        }
        let mut flight = self.inventory.get_flight(booking.flight_id).await?;

        let mut changes = ChangeSet::new();
        let refunded = self.refund_attached_payment(&booking, &mut changes).await?;
        self.plan_cancel(&mut booking, &mut flight, &mut changes)?;
        changes.save_booking(booking.clone());
        self.store.commit(changes).await?;
        drop(guard);

        info!(%booking_id, seats_available = flight.seats_available, refunded, "booking cancelled");
        self.effects
            .audit(
                &booking.user_id.to_string(),
                "CANCEL_BOOKING",
                &resource(&booking),
                &format!(
                    "Released {} seat(s) on flight {}{}",
                    booking.passenger_count,
                    flight.flight_number,
                    if refunded { ", payment refunded" } else { "" }
                ),
            )
            .await;
        if let Ok(user) = self.get_user(booking.user_id).await {
            self.effects
                .notify(Notification::email(
                    &user.email,
                    "Booking Cancelled",
                    format!(
                        "Your booking {} on flight {} ({}) has been cancelled.",
                        booking.reference(),
                        flight.flight_number,
                        flight.route()
                    ),
                ))
                .await;
        }

        Ok(booking)
    }

    /// Removes the booking and its passengers. Refused while a payment exists.
    pub async fn delete_booking(&self, booking_id: Uuid) -> ReservationResult<()> {
        let (guard, booking) = self.lock_booking(booking_id).await?;
        let has_payment = booking.payment_id.is_some()
            || self.store.find_payment_by_booking(booking_id).await?.is_some();
        if has_payment {
            return Err(ReservationError::conflict(format!(
                "Cannot delete booking {} while a payment is attached",
                booking.reference()
            )));
        }

        let mut flight = self.inventory.get_flight(booking.flight_id).await?;
        let mut changes = ChangeSet::new();
        changes.push(Change::DeletePassengers { booking_id });
        if !booking.is_cancelled() {
            self.inventory
                .plan_release(&mut flight, booking.passenger_count, &mut changes)?;
        }
        changes.push(Change::DeleteBooking(booking_id));
        self.store.commit(changes).await?;
        drop(guard);

        info!(%booking_id, seats_available = flight.seats_available, "booking deleted");
        self.effects
            .audit(
                &booking.user_id.to_string(),
                "DELETE_BOOKING",
                &resource(&booking),
                &format!("Deleted booking on flight {}", flight.flight_number),
            )
            .await;

        Ok(())
    }

    pub async fn get_booking(&self, booking_id: Uuid) -> ReservationResult<Booking> {
        self.store
            .get_booking(booking_id)
            .await?
            .ok_or_else(|| ReservationError::not_found("Booking", booking_id))
    }

    pub async fn list_bookings(&self) -> ReservationResult<Vec<Booking>> {
        Ok(self.store.list_bookings().await?)
    }

    pub async fn list_bookings_for_user(&self, user_id: Uuid) -> ReservationResult<Vec<Booking>> {
        Ok(self.store.list_bookings_by_user(user_id).await?)
    }

    pub async fn list_bookings_by_status(&self, status: &str) -> ReservationResult<Vec<Booking>> {
        let status: BookingStatus = status.parse()?;
        Ok(self.store.list_bookings_by_status(status).await?)
    }

    pub async fn passengers(&self, booking_id: Uuid) -> ReservationResult<Vec<Passenger>> {
        self.get_booking(booking_id).await?;
        Ok(self.store.list_passengers(booking_id).await?)
    }

    async fn get_user(&self, user_id: Uuid) -> ReservationResult<User> {
        self.store
            .get_user(user_id)
            .await?
            .ok_or_else(|| ReservationError::not_found("User", user_id))
    }

    /// Locks the booking's flight and returns the booking as read under that lock.
    pub(crate) async fn lock_booking(&self, booking_id: Uuid) -> ReservationResult<(FlightGuard, Booking)> {
        let flight_id = self.get_booking(booking_id).await?.flight_id;
        let guard = self.inventory.lock(flight_id).await;
        let booking = self.get_booking(booking_id).await?;
        debug!(%booking_id, %flight_id, "booking locked");
        Ok((guard, booking))
    }

    /// Moves the booking to CANCELLED and queues its seats for restock.
    /// A booking that is already cancelled is left as is.
    pub(crate) fn plan_cancel(
        &self,
        booking: &mut Booking,
        flight: &mut Flight,
        changes: &mut ChangeSet,
    ) -> ReservationResult<()> {
        if booking.is_cancelled() {
            return Ok(());
        }
        self.inventory
            .plan_release(flight, booking.passenger_count, changes)?;
        booking.update_status(BookingStatus::Cancelled);
        Ok(())
    }

    async fn refund_attached_payment(&self, booking: &Booking, changes: &mut ChangeSet) -> ReservationResult<bool> {
        let Some(payment_id) = booking.payment_id else {
            return Ok(false);
        };
        let Some(mut payment) = self.store.get_payment(payment_id).await? else {
            return Ok(false);
        };
        if payment.status == PaymentStatus::Refunded {
            return Ok(false);
        }

        payment.update_status(PaymentStatus::Refunded);
        changes.save_payment(payment);
        Ok(true)
    }
}

pub(crate) fn resource(booking: &Booking) -> String {
    format!("Booking-{}", booking.id)
}

/// `12345` -> `"123.45"`
pub(crate) fn format_amount(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.unsigned_abs();
    format!("{}{}.{:02}", sign, cents / 100, cents % 100)
}
