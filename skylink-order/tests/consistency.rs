mod common;

use chrono::{Duration, Utc};
use common::{card_payment, wallet_payment, Harness, SlowGateway};
use skylink_catalog::{Promotion, PromotionCatalog};
use skylink_core::models::{BookingStatus, PaymentStatus};
use skylink_core::repository::{BookingRepository, PaymentRepository};
use skylink_core::ErrorKind;
use skylink_order::{BookingUpdate, NewPayment};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_last_seat_goes_to_exactly_one_booking() {
    let h = Harness::new().await;
    let flight = h.flight(100_00, 50, 1).await;

    // 1. Race two bookings for the last seat
    let first = {
        let bookings = h.bookings.clone();
        let request = h.request(flight.id, 1);
        tokio::spawn(async move { bookings.create_booking(request).await })
    };
    let second = {
        let bookings = h.bookings.clone();
        let request = h.request(flight.id, 1);
        tokio::spawn(async move { bookings.create_booking(request).await })
    };
    let outcomes = [first.await.unwrap(), second.await.unwrap()];

    // 2. One winner, one capacity failure
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    let loser = outcomes.iter().find_map(|r| r.as_ref().err()).unwrap();
    assert_eq!(loser.kind(), ErrorKind::Capacity);

    // 3. Inventory is exhausted, never negative
    assert_eq!(h.seats(flight.id).await, 0);
    assert_eq!(h.store.list_bookings().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_many_concurrent_bookings_never_oversell() {
    let h = Harness::new().await;
    let flight = h.flight(100_00, 30, 30).await;

    let tasks: Vec<_> = (0..20)
        .map(|i| {
            let bookings = h.bookings.clone();
            let request = h.request(flight.id, 1 + (i % 3));
            tokio::spawn(async move { bookings.create_booking(request).await })
        })
        .collect();

    let mut booked = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(booking) => booked += booking.passenger_count,
            Err(e) => assert_eq!(e.kind(), ErrorKind::Capacity),
        }
    }

    assert!(booked <= 30);
    assert_eq!(h.seats(flight.id).await, 30 - booked);
}

#[tokio::test]
async fn test_total_is_fare_times_passengers_plus_extras() {
    let h = Harness::new().await;
    let flight = h.flight(100_00, 10, 10).await;

    let mut request = h.request(flight.id, 2);
    request.extras_cents = 20_00;
    let booking = h.bookings.create_booking(request).await.unwrap();

    assert_eq!(booking.total_price_cents, 220_00);
    assert_eq!(booking.discount_cents, 0);
}

#[tokio::test]
async fn test_active_promotion_discounts_fare_only() {
    let catalog = Arc::new(PromotionCatalog::new());
    let now = Utc::now();
    catalog
        .add(Promotion::new("summer10", 10.0, now - Duration::days(1), now + Duration::days(1), None).unwrap())
        .await
        .unwrap();
    let h = Harness::builder().promotions(catalog).build().await;
    let flight = h.flight(100_00, 10, 10).await;

    let mut request = h.request(flight.id, 2);
    request.extras_cents = 20_00;
    request.promo_code = Some("SUMMER10".to_string());
    let booking = h.bookings.create_booking(request).await.unwrap();
    assert_eq!(booking.discount_cents, 20_00);
    assert_eq!(booking.total_price_cents, 200_00);

    // Unknown codes are kept on the booking but discount nothing
    let mut request = h.request(flight.id, 1);
    request.promo_code = Some("NOSUCHCODE".to_string());
    let booking = h.bookings.create_booking(request).await.unwrap();
    assert_eq!(booking.discount_cents, 0);
    assert_eq!(booking.total_price_cents, 100_00);
}

#[tokio::test]
async fn test_luhn_failure_is_declined_without_payment() {
    let h = Harness::new().await;
    let flight = h.flight(100_00, 10, 10).await;
    let booking = h.book(flight.id, 1).await;

    let err = h
        .ledger
        .process_payment(card_payment(&booking, "4111111111111112"), CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::PaymentDeclined);
    assert!(h.store.list_payments().await.unwrap().is_empty());
    let booking = h.bookings.get_booking(booking.id).await.unwrap();
    assert_eq!(booking.status, BookingStatus::Pending);
    assert_eq!(booking.payment_id, None);
    assert!(h.audit.actions().await.contains(&"PAYMENT_DECLINED".to_string()));
}

#[tokio::test]
async fn test_wallet_payment_confirms_booking() {
    let h = Harness::new().await;
    let flight = h.flight(100_00, 10, 10).await;
    let booking = h.book(flight.id, 2).await;

    let payment = h
        .ledger
        .process_payment(wallet_payment(&booking, "712345678"), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(payment.status, PaymentStatus::Completed);
    let txn = &payment.transaction_id;
    assert_eq!(txn.len(), 12);
    assert!(txn.starts_with("TXN-"));
    assert!(txn[4..].chars().all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));

    let booking = h.bookings.get_booking(booking.id).await.unwrap();
    assert_eq!(booking.status, BookingStatus::Confirmed);
    assert_eq!(booking.payment_id, Some(payment.id));

    // Wallet payments have no email of their own; the account holder is notified
    let confirmation = h
        .outbox
        .drain()
        .await
        .into_iter()
        .find(|n| n.subject == "Payment Confirmation")
        .unwrap();
    assert_eq!(confirmation.recipient, h.user.email);
}

#[tokio::test]
async fn test_delete_with_payment_is_refused() {
    let h = Harness::new().await;
    let flight = h.flight(100_00, 10, 10).await;
    let booking = h.book(flight.id, 2).await;
    let payment = h
        .ledger
        .process_payment(card_payment(&booking, "4111111111111111"), CancellationToken::new())
        .await
        .unwrap();
    let before = h.bookings.get_booking(booking.id).await.unwrap();

    let err = h.bookings.delete_booking(booking.id).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(h.bookings.get_booking(booking.id).await.unwrap(), before);
    assert_eq!(h.ledger.get_payment(payment.id).await.unwrap(), payment);
    assert_eq!(h.seats(flight.id).await, 8);
}

#[tokio::test]
async fn test_shrinking_booking_restocks_difference() {
    let h = Harness::new().await;
    let flight = h.flight(100_00, 15, 15).await;
    let booking = h.book(flight.id, 5).await;
    assert_eq!(h.seats(flight.id).await, 10);

    let updated = h
        .bookings
        .update_booking(
            booking.id,
            BookingUpdate {
                passenger_count: Some(3),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(h.seats(flight.id).await, 12);
    assert_eq!(updated.total_price_cents, 300_00);
}

#[tokio::test]
async fn test_cancel_twice_restocks_once() {
    let h = Harness::new().await;
    let flight = h.flight(100_00, 10, 10).await;
    let booking = h.book(flight.id, 4).await;

    h.bookings.cancel_booking(booking.id).await.unwrap();
    let err = h.bookings.cancel_booking(booking.id).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(err.to_string(), "Booking already cancelled");
    assert_eq!(h.seats(flight.id).await, 10);
}

#[tokio::test]
async fn test_concurrent_cancels_restock_once() {
    let h = Harness::new().await;
    let flight = h.flight(100_00, 10, 10).await;
    let booking = h.book(flight.id, 3).await;

    let tasks: Vec<_> = (0..4)
        .map(|_| {
            let bookings = h.bookings.clone();
            tokio::spawn(async move { bookings.cancel_booking(booking.id).await })
        })
        .collect();

    let mut succeeded = 0;
    for task in tasks {
        if task.await.unwrap().is_ok() {
            succeeded += 1;
        }
    }

    assert_eq!(succeeded, 1);
    assert_eq!(h.seats(flight.id).await, 10);
}

#[tokio::test]
async fn test_create_then_cancel_restores_inventory() {
    let h = Harness::new().await;
    let flight = h.flight(100_00, 40, 17).await;

    for passengers in 1..=5 {
        let booking = h.book(flight.id, passengers).await;
        h.bookings.cancel_booking(booking.id).await.unwrap();
        assert_eq!(h.seats(flight.id).await, 17);
    }
}

#[tokio::test]
async fn test_restock_is_clamped_to_capacity() {
    let h = Harness::new().await;
    let flight = h.flight(100_00, 10, 10).await;

    let seats = h.inventory.release_seats(flight.id, 5).await.unwrap();

    assert_eq!(seats, 10);
    assert_eq!(h.seats(flight.id).await, 10);
}

#[tokio::test]
async fn test_payment_status_drives_booking_status() {
    let h = Harness::new().await;
    let flight = h.flight(100_00, 20, 20).await;

    // 1. Paid, then refunded
    let refunded = h.book(flight.id, 1).await;
    let payment = h
        .ledger
        .process_payment(card_payment(&refunded, "4111111111111111"), CancellationToken::new())
        .await
        .unwrap();
    h.ledger.refund_payment(payment.id).await.unwrap();

    // 2. Paid, then booking cancelled
    let cancelled = h.book(flight.id, 2).await;
    h.ledger
        .process_payment(card_payment(&cancelled, "5555555555554444"), CancellationToken::new())
        .await
        .unwrap();
    h.bookings.cancel_booking(cancelled.id).await.unwrap();

    // 3. Back-office completed and refunded entries
    let admin_completed = h.book(flight.id, 1).await;
    h.ledger
        .create_payment(NewPayment {
            booking_id: admin_completed.id,
            amount_cents: admin_completed.total_price_cents,
            status: PaymentStatus::Completed,
            method: None,
        })
        .await
        .unwrap();
    let admin_refunded = h.book(flight.id, 1).await;
    h.ledger
        .create_payment(NewPayment {
            booking_id: admin_refunded.id,
            amount_cents: admin_refunded.total_price_cents,
            status: PaymentStatus::Refunded,
            method: None,
        })
        .await
        .unwrap();

    // 4. Still paid
    let paid = h.book(flight.id, 1).await;
    h.ledger
        .process_payment(wallet_payment(&paid, "771234567"), CancellationToken::new())
        .await
        .unwrap();

    for booking in h.store.list_bookings().await.unwrap() {
        let Some(payment_id) = booking.payment_id else {
            continue;
        };
        let payment = h.ledger.get_payment(payment_id).await.unwrap();
        match payment.status {
            PaymentStatus::Completed => assert_eq!(booking.status, BookingStatus::Confirmed),
            PaymentStatus::Refunded => assert_eq!(booking.status, BookingStatus::Cancelled),
            _ => {}
        }
    }

    // Only the two still-paid bookings hold seats
    assert_eq!(h.seats(flight.id).await, 18);
}

#[tokio::test(start_paused = true)]
async fn test_gateway_timeout_commits_nothing() {
    let h = Harness::builder()
        .gateway(SlowGateway(std::time::Duration::from_secs(30)))
        .gateway_timeout_ms(5_000)
        .build()
        .await;
    let flight = h.flight(100_00, 10, 10).await;
    let booking = h.book(flight.id, 1).await;

    let err = h
        .ledger
        .process_payment(card_payment(&booking, "4111111111111111"), CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::GatewayTimeout);
    assert!(h.store.list_payments().await.unwrap().is_empty());
    assert_eq!(h.bookings.get_booking(booking.id).await.unwrap().status, BookingStatus::Pending);
}

#[tokio::test(start_paused = true)]
async fn test_caller_cancellation_commits_nothing() {
    let h = Harness::builder()
        .gateway(SlowGateway(std::time::Duration::from_secs(2)))
        .build()
        .await;
    let flight = h.flight(100_00, 10, 10).await;
    let booking = h.book(flight.id, 1).await;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let err = h
        .ledger
        .process_payment(card_payment(&booking, "4111111111111111"), cancel)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert!(h.store.list_payments().await.unwrap().is_empty());

    // The booking can still be paid afterwards
    let payment = h
        .ledger
        .process_payment(card_payment(&booking, "4111111111111111"), CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Completed);
}

#[tokio::test]
async fn test_booking_cancelled_during_authorisation_is_not_confirmed() {
    let h = Harness::builder()
        .gateway(SlowGateway(std::time::Duration::from_millis(200)))
        .build()
        .await;
    let flight = h.flight(100_00, 10, 10).await;
    let booking = h.book(flight.id, 2).await;

    let ledger = h.ledger.clone();
    let request = card_payment(&booking, "4111111111111111");
    let payment = tokio::spawn(async move { ledger.process_payment(request, CancellationToken::new()).await });

    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    h.bookings.cancel_booking(booking.id).await.unwrap();

    let err = payment.await.unwrap().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert!(h.store.find_payment_by_booking(booking.id).await.unwrap().is_none());
    assert_eq!(h.seats(flight.id).await, 10);
}

#[tokio::test]
async fn test_side_effect_failures_do_not_roll_back() {
    let h = Harness::builder().broken_sinks().build().await;
    let flight = h.flight(100_00, 10, 10).await;

    let booking = h.book(flight.id, 2).await;
    let payment = h
        .ledger
        .process_payment(card_payment(&booking, "4111111111111111"), CancellationToken::new())
        .await
        .unwrap();
    h.bookings.cancel_booking(booking.id).await.unwrap();

    assert_eq!(h.ledger.get_payment(payment.id).await.unwrap().status, PaymentStatus::Refunded);
    assert_eq!(h.seats(flight.id).await, 10);
}

#[tokio::test]
async fn test_failed_commit_leaves_state_untouched() {
    let h = Harness::new().await;
    let flight = h.flight(100_00, 10, 10).await;
    let booking = h.book(flight.id, 2).await;

    h.store.set_fail_commits(true);
    let err = h.bookings.cancel_booking(booking.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Internal);
    let err = h.bookings.create_booking(h.request(flight.id, 1)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Internal);
    h.store.set_fail_commits(false);

    assert_eq!(h.seats(flight.id).await, 8);
    assert_eq!(h.bookings.get_booking(booking.id).await.unwrap().status, BookingStatus::Pending);
    assert_eq!(h.store.list_bookings().await.unwrap().len(), 1);
}
