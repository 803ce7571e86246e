use serde::{Deserialize, Serialize};
use skylink_core::error::{ReservationError, ReservationResult};
use skylink_core::models::{new_transaction_id, Booking, BookingStatus, Payment, PaymentMethod, PaymentStatus};
use skylink_core::payment::{AuthorizationRequest, GatewayDecision, PaymentFields, PaymentGateway, PaymentInstrument};
use skylink_core::policy::PaymentSettings;
use skylink_core::repository::{Change, ChangeSet, ReservationStore};
use skylink_shared::Notification;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::effects::SideEffects;
use crate::manager::{format_amount, BookingManager};
use crate::methods::validate_method;

/// A customer payment against a booking, authorised through the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub booking_id: Uuid,
    pub amount_cents: i64,
    pub method: PaymentMethod,
    #[serde(default)]
    pub fields: PaymentFields,
}

/// Back-office payment entry; skips the gateway. Method defaults to CARD.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPayment {
    pub booking_id: Uuid,
    pub amount_cents: i64,
    pub status: PaymentStatus,
    #[serde(default)]
    pub method: Option<PaymentMethod>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentUpdate {
    pub amount_cents: Option<i64>,
    pub status: Option<PaymentStatus>,
    pub transaction_id: Option<String>,
}

/// Records payments and keeps each booking's status in step with its payment:
/// COMPLETED confirms the booking, REFUNDED (or removal) cancels it.
pub struct PaymentLedger {
    store: Arc<dyn ReservationStore>,
    bookings: Arc<BookingManager>,
    gateway: Arc<dyn PaymentGateway>,
    settings: PaymentSettings,
    effects: SideEffects,
}

impl PaymentLedger {
    pub fn new(
        store: Arc<dyn ReservationStore>,
        bookings: Arc<BookingManager>,
        gateway: Arc<dyn PaymentGateway>,
        settings: PaymentSettings,
        effects: SideEffects,
    ) -> Self {
        Self {
            store,
            bookings,
            gateway,
            settings,
            effects,
        }
    }

    /// Authorises the payment and, once approved, stores it as COMPLETED and
    /// confirms the booking in one commit.
    ///
    /// The gateway call runs without holding the flight lock. It is bounded by
    /// the configured timeout and abandoned when `cancel` fires; in both cases
    /// nothing is written. A declined payment is not stored either.
    pub async fn process_payment(&self, request: PaymentRequest, cancel: CancellationToken) -> ReservationResult<Payment> {
        check_amount(request.amount_cents)?;
        let booking = self.bookings.get_booking(request.booking_id).await?;
        self.ensure_payable(&booking).await?;
        let instrument = validate_method(request.method, &request.fields)?;

        let authorization = AuthorizationRequest {
            booking_id: booking.id,
            amount_cents: request.amount_cents,
            transaction_id: new_transaction_id(),
            instrument,
        };

        match self.authorize(&authorization, &cancel).await? {
            GatewayDecision::Approved => {}
            GatewayDecision::Declined(reason) => {
                warn!(booking_id = %booking.id, transaction_id = %authorization.transaction_id, %reason, "payment declined");
                self.effects
                    .audit(
                        &booking.user_id.to_string(),
                        "PAYMENT_DECLINED",
                        &format!("Booking-{}", booking.id),
                        &format!(
                            "{} payment of {} declined: {}",
                            request.method,
                            format_amount(request.amount_cents),
                            reason
                        ),
                    )
                    .await;
                return Err(ReservationError::PaymentDeclined(reason));
            }
        }

        let (guard, mut booking) = self.bookings.lock_booking(request.booking_id).await?;
        if cancel.is_cancelled() {
            return Err(ReservationError::Cancelled);
        }
        self.ensure_payable(&booking).await?;

        let mut payment = Payment::new(
            booking.id,
            request.amount_cents,
            request.method,
            PaymentStatus::Completed,
        );
        payment.transaction_id = authorization.transaction_id.clone();
        booking.attach_payment(payment.id);
        booking.update_status(BookingStatus::Confirmed);

        let mut changes = ChangeSet::new();
        changes.save_booking(booking.clone()).save_payment(payment.clone());
        self.store.commit(changes).await?;
        drop(guard);

        info!(
            booking_id = %booking.id,
            payment_id = %payment.id,
            transaction_id = %payment.transaction_id,
            amount_cents = payment.amount_cents,
            method = %payment.method,
            "payment completed"
        );

        self.effects
            .audit(
                &booking.user_id.to_string(),
                "PAYMENT_PROCESSED",
                &resource(&payment),
                &format!(
                    "{} payment of {} for {} ({})",
                    payment.method,
                    format_amount(payment.amount_cents),
                    booking.reference(),
                    payment.transaction_id
                ),
            )
            .await;
        self.send_confirmation(&booking, &payment, &authorization.instrument).await;

        Ok(payment)
    }

    async fn authorize(
        &self,
        authorization: &AuthorizationRequest,
        cancel: &CancellationToken,
    ) -> ReservationResult<GatewayDecision> {
        let timeout = self.settings.gateway_timeout();

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!(booking_id = %authorization.booking_id, "payment cancelled during authorisation");
                Err(ReservationError::Cancelled)
            }
            outcome = tokio::time::timeout(timeout, self.gateway.authorize(authorization)) => match outcome {
                Ok(Ok(decision)) => Ok(decision),
                Ok(Err(e)) => Err(ReservationError::Gateway(e.to_string())),
                Err(_) => {
                    warn!(booking_id = %authorization.booking_id, timeout_ms = self.settings.gateway_timeout_ms, "payment gateway timed out");
                    Err(ReservationError::GatewayTimeout(self.settings.gateway_timeout_ms))
                }
            },
        }
    }

    /// Adds a payment with a given status. COMPLETED confirms the booking;
    /// REFUNDED cancels it and restocks its seats.
    pub async fn create_payment(&self, request: NewPayment) -> ReservationResult<Payment> {
        check_amount(request.amount_cents)?;

        let (guard, mut booking) = self.bookings.lock_booking(request.booking_id).await?;
        if booking.is_cancelled() {
            return Err(ReservationError::conflict(format!(
                "Cannot add a payment to cancelled booking {}",
                booking.reference()
            )));
        }
        self.ensure_payable(&booking).await?;

        let payment = Payment::new(
            booking.id,
            request.amount_cents,
            request.method.unwrap_or(PaymentMethod::Card),
            request.status,
        );
        booking.attach_payment(payment.id);

        let mut changes = ChangeSet::new();
        self.sync_booking(&mut booking, payment.status, &mut changes).await?;
        changes.save_booking(booking.clone()).save_payment(payment.clone());
        self.store.commit(changes).await?;
        drop(guard);

        info!(payment_id = %payment.id, booking_id = %booking.id, status = %payment.status, "payment created");
        self.effects
            .audit(
                &booking.user_id.to_string(),
                "CREATE_PAYMENT",
                &resource(&payment),
                &format!(
                    "{} {} payment of {} for {}",
                    payment.status,
                    payment.method,
                    format_amount(payment.amount_cents),
                    booking.reference()
                ),
            )
            .await;

        Ok(payment)
    }

    pub async fn update_payment(&self, payment_id: Uuid, update: PaymentUpdate) -> ReservationResult<Payment> {
        if let Some(amount) = update.amount_cents {
            check_amount(amount)?;
        }
        let transaction_id = match update.transaction_id.as_deref().map(|t| t.trim().to_uppercase()) {
            Some(t) if t.is_empty() => {
                return Err(ReservationError::validation("Transaction ID cannot be empty"));
            }
            other => other,
        };

        let booking_id = self.get_payment(payment_id).await?.booking_id;
        let (guard, mut booking) = self.bookings.lock_booking(booking_id).await?;
        let mut payment = self.get_payment(payment_id).await?;
        let previous = payment.clone();

        if payment.status == PaymentStatus::Refunded {
            return Err(ReservationError::conflict("Refunded payments cannot be modified"));
        }
        if let Some(txn) = &transaction_id {
            if *txn != payment.transaction_id {
                let taken = self
                    .store
                    .list_payments()
                    .await?
                    .iter()
                    .any(|p| p.id != payment.id && p.transaction_id == *txn);
                if taken {
                    return Err(ReservationError::conflict(format!("Transaction ID already exists: {}", txn)));
                }
                payment.transaction_id = txn.clone();
            }
        }
        if let Some(amount) = update.amount_cents {
            payment.amount_cents = amount;
        }

        let mut changes = ChangeSet::new();
        if let Some(status) = update.status {
            if status == PaymentStatus::Completed && booking.is_cancelled() {
                return Err(ReservationError::conflict(format!(
                    "Cannot complete a payment for cancelled booking {}",
                    booking.reference()
                )));
            }
            payment.update_status(status);
            booking.attach_payment(payment.id);
            self.sync_booking(&mut booking, status, &mut changes).await?;
            changes.save_booking(booking.clone());
        }
        changes.save_payment(payment.clone());
        self.store.commit(changes).await?;
        drop(guard);

        info!(%payment_id, status = %payment.status, booking_status = %booking.status, "payment updated");
        self.effects
            .audit(
                &booking.user_id.to_string(),
                "UPDATE_PAYMENT",
                &resource(&payment),
                &format!(
                    "Status {} -> {}, amount {} -> {}, transaction {}",
                    previous.status,
                    payment.status,
                    format_amount(previous.amount_cents),
                    format_amount(payment.amount_cents),
                    payment.transaction_id
                ),
            )
            .await;

        Ok(payment)
    }

    /// Detaches and removes the payment; the booking is forced to CANCELLED.
    pub async fn delete_payment(&self, payment_id: Uuid) -> ReservationResult<()> {
        let booking_id = self.get_payment(payment_id).await?.booking_id;
        let (guard, mut booking) = self.bookings.lock_booking(booking_id).await?;
        let payment = self.get_payment(payment_id).await?;
        let mut flight = self.bookings.inventory().get_flight(booking.flight_id).await?;

        let mut changes = ChangeSet::new();
        booking.detach_payment();
        self.bookings.plan_cancel(&mut booking, &mut flight, &mut changes)?;
        changes
            .save_booking(booking.clone())
            .push(Change::DeletePayment(payment.id));
        self.store.commit(changes).await?;
        drop(guard);

        info!(%payment_id, booking_id = %booking.id, "payment deleted, booking cancelled");
        self.effects
            .audit(
                &booking.user_id.to_string(),
                "DELETE_PAYMENT",
                &resource(&payment),
                &format!(
                    "Deleted {} payment {} of {}; {} cancelled",
                    payment.status,
                    payment.transaction_id,
                    format_amount(payment.amount_cents),
                    booking.reference()
                ),
            )
            .await;

        Ok(())
    }

    pub async fn refund_payment(&self, payment_id: Uuid) -> ReservationResult<Payment> {
        let booking_id = self.get_payment(payment_id).await?.booking_id;
        let (guard, mut booking) = self.bookings.lock_booking(booking_id).await?;
        let mut payment = self.get_payment(payment_id).await?;
        if payment.status != PaymentStatus::Completed {
            return Err(ReservationError::conflict("Only completed payments can be refunded"));
        }
        let mut flight = self.bookings.inventory().get_flight(booking.flight_id).await?;

        payment.update_status(PaymentStatus::Refunded);
        let mut changes = ChangeSet::new();
        self.bookings.plan_cancel(&mut booking, &mut flight, &mut changes)?;
        changes.save_booking(booking.clone()).save_payment(payment.clone());
        self.store.commit(changes).await?;
        drop(guard);

        info!(%payment_id, booking_id = %booking.id, seats_available = flight.seats_available, "payment refunded");
        self.effects
            .audit(
                &booking.user_id.to_string(),
                "REFUND_PAYMENT",
                &resource(&payment),
                &format!(
                    "Refunded {} ({}); {} cancelled",
                    format_amount(payment.amount_cents),
                    payment.transaction_id,
                    booking.reference()
                ),
            )
            .await;

        Ok(payment)
    }

    pub async fn get_payment(&self, payment_id: Uuid) -> ReservationResult<Payment> {
        self.store
            .get_payment(payment_id)
            .await?
            .ok_or_else(|| ReservationError::not_found("Payment", payment_id))
    }

    pub async fn list_payments(&self) -> ReservationResult<Vec<Payment>> {
        Ok(self.store.list_payments().await?)
    }

    pub async fn list_payments_by_status(&self, status: &str) -> ReservationResult<Vec<Payment>> {
        let status: PaymentStatus = status.parse()?;
        Ok(self.store.list_payments_by_status(status).await?)
    }

    /// The payment recorded for a booking, if any.
    pub async fn payment_for_booking(&self, booking_id: Uuid) -> ReservationResult<Option<Payment>> {
        self.bookings.get_booking(booking_id).await?;
        Ok(self.store.find_payment_by_booking(booking_id).await?)
    }

    async fn ensure_payable(&self, booking: &Booking) -> ReservationResult<()> {
        let has_payment = booking.payment_id.is_some()
            || self.store.find_payment_by_booking(booking.id).await?.is_some();
        if has_payment {
            return Err(ReservationError::conflict(format!(
                "Payment already exists for this booking. Booking ID: {}",
                booking.reference()
            )));
        }
        if booking.is_cancelled() {
            return Err(ReservationError::conflict(format!(
                "Cannot pay for cancelled booking {}",
                booking.reference()
            )));
        }
        Ok(())
    }

    /// Brings the booking's status in line with a payment moving to `status`.
    async fn sync_booking(
        &self,
        booking: &mut Booking,
        status: PaymentStatus,
        changes: &mut ChangeSet,
    ) -> ReservationResult<()> {
        match status {
            PaymentStatus::Completed => booking.update_status(BookingStatus::Confirmed),
            PaymentStatus::Refunded => {
                let mut flight = self.bookings.inventory().get_flight(booking.flight_id).await?;
                self.bookings.plan_cancel(booking, &mut flight, changes)?;
            }
            PaymentStatus::Pending | PaymentStatus::Failed => {}
        }
        Ok(())
    }

    async fn send_confirmation(&self, booking: &Booking, payment: &Payment, instrument: &PaymentInstrument) {
        let recipient = match instrument.contact_email() {
            Some(email) => Some(email.to_string()),
            None => self
                .store
                .get_user(booking.user_id)
                .await
                .ok()
                .flatten()
                .map(|u| u.email),
        };
        let Some(recipient) = recipient else {
            warn!(booking_id = %booking.id, "no recipient for payment confirmation");
            return;
        };
        let flight = match self.bookings.inventory().get_flight(booking.flight_id).await {
            Ok(flight) => flight,
            Err(e) => {
                warn!(booking_id = %booking.id, error = %e, "payment confirmation skipped");
                return;
            }
        };

        let body = format!(
            "Payment received.\n\
             Transaction ID: {}\n\
             Amount: {}\n\
             Method: {}\n\
             Date: {}\n\
             Booking: {}\n\
             Flight: {} ({})\n\
             Passengers: {}",
            payment.transaction_id,
            format_amount(payment.amount_cents),
            payment.method,
            payment.paid_at.format("%Y-%m-%d %H:%M"),
            booking.reference(),
            flight.flight_number,
            flight.route(),
            booking.passenger_count
        );
        self.effects
            .notify(Notification::email(recipient, "Payment Confirmation", body))
            .await;
    }
}

fn check_amount(amount_cents: i64) -> ReservationResult<()> {
    if amount_cents <= 0 {
        return Err(ReservationError::validation("Payment amount must be greater than zero"));
    }
    Ok(())
}

fn resource(payment: &Payment) -> String {
    format!("Payment-{}", payment.id)
}
