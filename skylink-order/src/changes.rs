use serde::{Deserialize, Serialize};
use skylink_catalog::pricing::normalize_code;
use skylink_core::error::{ReservationError, ReservationResult};
use skylink_core::models::{Booking, BookingStatus, PassengerDetails};
use skylink_core::policy::BookingPolicy;

/// Requested modifications to a booking. `None` leaves a field unchanged;
/// a blank promo code clears the current one. `passengers` replaces the
/// stored passenger records and must match the resulting count.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BookingUpdate {
    pub passenger_count: Option<u32>,
    pub status: Option<BookingStatus>,
    pub extras_cents: Option<i64>,
    pub promo_code: Option<String>,
    pub passengers: Option<Vec<PassengerDetails>>,
}

impl BookingUpdate {
    pub fn is_empty(&self) -> bool {
        self.passenger_count.is_none()
            && self.status.is_none()
            && self.extras_cents.is_none()
            && self.promo_code.is_none()
            && self.passengers.is_none()
    }
}

/// What an accepted [`BookingUpdate`] does to the booking and its flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatePlan {
    pub passenger_count: u32,
    pub status: BookingStatus,
    pub extras_cents: i64,
    pub promo_code: Option<String>,
    /// Seats to take (positive) or give back (negative) for the count change.
    pub seat_delta: i64,
    /// The booking moves into CANCELLED; all of its seats go back.
    pub cancelling: bool,
    /// Count, extras or promo changed, so the total must be recomputed.
    pub reprice: bool,
}

/// Checks an update against the booking's current state. Pure: no I/O.
///
/// `has_details` says whether passenger records are stored for the booking;
/// such bookings stay under the detail-path limit and cannot change their
/// count without a replacement passenger list.
pub fn plan_update(
    booking: &Booking,
    update: &BookingUpdate,
    policy: &BookingPolicy,
    has_details: bool,
) -> ReservationResult<UpdatePlan> {
    if booking.is_cancelled() {
        return Err(ReservationError::conflict(format!(
            "Cannot update a cancelled booking: {}",
            booking.reference()
        )));
    }

    let passenger_count = update.passenger_count.unwrap_or(booking.passenger_count);
    let with_details = has_details || update.passengers.is_some();
    policy.check_passenger_count(passenger_count, with_details)?;

    let extras_cents = update.extras_cents.unwrap_or(booking.extras_cents);
    if extras_cents < 0 {
        return Err(ReservationError::validation("Extras amount cannot be negative"));
    }

    let status = update.status.unwrap_or(booking.status);
    if !booking.status.can_transition_to(status) {
        return Err(ReservationError::conflict(format!(
            "Cannot change booking status from {} to {}",
            booking.status, status
        )));
    }

    let cancelling = status == BookingStatus::Cancelled;
    let count_changed = passenger_count != booking.passenger_count;
    if cancelling && (count_changed || update.passengers.is_some()) {
        return Err(ReservationError::validation(
            "Cannot change the number of passengers while cancelling a booking",
        ));
    }
    if has_details && count_changed && update.passengers.is_none() {
        return Err(ReservationError::validation(
            "Passenger details must be provided when changing the number of passengers",
        ));
    }

    let promo_code = match &update.promo_code {
        Some(raw) => normalize_code(raw),
        None => booking.promo_code.clone(),
    };

    let reprice = !cancelling
        && (count_changed || extras_cents != booking.extras_cents || promo_code != booking.promo_code);

    Ok(UpdatePlan {
        passenger_count,
        status,
        extras_cents,
        promo_code,
        seat_delta: i64::from(passenger_count) - i64::from(booking.passenger_count),
        cancelling,
        reprice,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use skylink_catalog::PriceQuote;
    use skylink_core::ErrorKind;
    use uuid::Uuid;

    fn booking(passengers: u32) -> Booking {
        let quote = PriceQuote {
            fare_cents: 10_000,
            passengers,
            base_cents: 10_000 * i64::from(passengers),
            extras_cents: 2_000,
            discount_cents: 0,
            total_cents: 10_000 * i64::from(passengers) + 2_000,
            applied_promo_code: None,
        };
        Booking::new(Uuid::new_v4(), Uuid::new_v4(), &quote, None)
    }

    #[test]
    fn test_shrinking_returns_seats() {
        let plan = plan_update(
            &booking(5),
            &BookingUpdate {
                passenger_count: Some(3),
                ..Default::default()
            },
            &BookingPolicy::default(),
            false,
        )
        .unwrap();

        assert_eq!(plan.seat_delta, -2);
        assert!(plan.reprice);
        assert!(!plan.cancelling);
    }

    #[test]
    fn test_status_only_keeps_price() {
        let plan = plan_update(
            &booking(2),
            &BookingUpdate {
                status: Some(BookingStatus::Confirmed),
                ..Default::default()
            },
            &BookingPolicy::default(),
            false,
        )
        .unwrap();

        assert_eq!(plan.status, BookingStatus::Confirmed);
        assert_eq!(plan.seat_delta, 0);
        assert!(!plan.reprice);
    }

    #[test]
    fn test_rejections() {
        let policy = BookingPolicy::default();

        // Out of range count
        let err = plan_update(
            &booking(2),
            &BookingUpdate {
                passenger_count: Some(11),
                ..Default::default()
            },
            &policy,
            false,
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        // Backwards transition
        let mut confirmed = booking(2);
        confirmed.update_status(BookingStatus::Confirmed);
        let err = plan_update(
            &confirmed,
            &BookingUpdate {
                status: Some(BookingStatus::Pending),
                ..Default::default()
            },
            &policy,
            false,
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        // Nothing leaves CANCELLED
        let mut cancelled = booking(2);
        cancelled.update_status(BookingStatus::Cancelled);
        let err = plan_update(&cancelled, &BookingUpdate::default(), &policy, false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        // Cancel and resize at once
        let err = plan_update(
            &booking(2),
            &BookingUpdate {
                passenger_count: Some(1),
                status: Some(BookingStatus::Cancelled),
                ..Default::default()
            },
            &policy,
            false,
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_blank_promo_clears_code() {
        let mut current = booking(1);
        current.promo_code = Some("SUMMER10".to_string());

        let plan = plan_update(
            &current,
            &BookingUpdate {
                promo_code: Some("  ".to_string()),
                ..Default::default()
            },
            &BookingPolicy::default(),
            false,
        )
        .unwrap();

        assert_eq!(plan.promo_code, None);
        assert!(plan.reprice);
    }

    #[test]
    fn test_detailed_booking_keeps_detail_limit() {
        let policy = BookingPolicy::default();
        let resize = |count| BookingUpdate {
            passenger_count: Some(count),
            ..Default::default()
        };

        // Resizing without a new passenger list
        let err = plan_update(&booking(1), &resize(2), &policy, true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        // Above the detail-path ceiling even with details
        let mut over = resize(6);
        over.passengers = Some(vec![PassengerDetails::default(); 6]);
        let err = plan_update(&booking(1), &over, &policy, true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        // Plain bookings still use the wider limit
        let plan = plan_update(&booking(1), &resize(9), &policy, false).unwrap();
        assert_eq!(plan.seat_delta, 8);

        // Extras-only change is fine on a detailed booking
        let plan = plan_update(
            &booking(2),
            &BookingUpdate {
                extras_cents: Some(0),
                ..Default::default()
            },
            &policy,
            true,
        )
        .unwrap();
        assert_eq!(plan.seat_delta, 0);
        assert!(plan.reprice);
    }
}
