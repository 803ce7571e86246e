use async_trait::async_trait;
use chrono::{Duration, Utc};
use skylink_catalog::{Flight, PricingCalculator, PromotionLookup};
use skylink_core::models::{Booking, PaymentMethod, User};
use skylink_core::payment::{AuthorizationRequest, GatewayDecision, GatewayError, PaymentFields, PaymentGateway};
use skylink_core::policy::{BookingPolicy, PaymentSettings};
use skylink_core::repository::FlightRepository;
use skylink_core::sinks::{AuditSink, NotificationSink, SinkError};
use skylink_order::{
    BookingManager, FlightInventory, NewBooking, PaymentLedger, PaymentRequest, SideEffects, SimulatedGateway,
};
use skylink_shared::{AuditRecord, Masked, Notification};
use skylink_store::{AuditLog, InMemoryStore, NotificationQueue};
use std::sync::Arc;
use uuid::Uuid;

pub struct Harness {
    pub store: Arc<InMemoryStore>,
    pub inventory: Arc<FlightInventory>,
    pub bookings: Arc<BookingManager>,
    pub ledger: Arc<PaymentLedger>,
    pub audit: Arc<AuditLog>,
    pub outbox: Arc<NotificationQueue>,
    pub user: User,
}

pub struct HarnessBuilder {
    gateway: Arc<dyn PaymentGateway>,
    settings: PaymentSettings,
    pricing: PricingCalculator,
    broken_sinks: bool,
}

impl HarnessBuilder {
    pub fn gateway(mut self, gateway: impl PaymentGateway + 'static) -> Self {
        self.gateway = Arc::new(gateway);
        self
    }

    pub fn gateway_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.settings.gateway_timeout_ms = timeout_ms;
        self
    }

    pub fn promotions(mut self, promotions: Arc<dyn PromotionLookup>) -> Self {
        self.pricing = PricingCalculator::new(promotions);
        self
    }

    pub fn broken_sinks(mut self) -> Self {
        self.broken_sinks = true;
        self
    }

    pub async fn build(self) -> Harness {
        let store = Arc::new(InMemoryStore::new());
        let user = User::new("traveler", "traveler@example.com");
        store.insert_user(user.clone()).await.unwrap();

        let audit = Arc::new(AuditLog::new());
        let outbox = Arc::new(NotificationQueue::default());
        let effects = if self.broken_sinks {
            SideEffects::new(Arc::new(BrokenSink), Arc::new(BrokenSink))
        } else {
            SideEffects::new(audit.clone(), outbox.clone())
        };

        let inventory = Arc::new(FlightInventory::new(store.clone()));
        let bookings = Arc::new(BookingManager::new(
            store.clone(),
            inventory.clone(),
            self.pricing,
            BookingPolicy::default(),
            effects.clone(),
        ));
        let ledger = Arc::new(PaymentLedger::new(
            store.clone(),
            bookings.clone(),
            self.gateway,
            self.settings,
            effects,
        ));

        Harness {
            store,
            inventory,
            bookings,
            ledger,
            audit,
            outbox,
            user,
        }
    }
}

impl Harness {
    pub fn builder() -> HarnessBuilder {
        HarnessBuilder {
            gateway: Arc::new(SimulatedGateway::instant()),
            settings: PaymentSettings::default(),
            pricing: PricingCalculator::without_promotions(),
            broken_sinks: false,
        }
    }

    pub async fn new() -> Harness {
        Self::builder().build().await
    }

    /// Adds a flight with `seats` free seats out of `capacity`.
    pub async fn flight(&self, fare_cents: i64, capacity: u32, seats: u32) -> Flight {
        let departure = Utc::now() + Duration::days(7);
        let number = format!("SK{}", &Uuid::new_v4().simple().to_string()[..4].to_uppercase());
        let flight = Flight::new(number, "CMB", "SIN", departure, departure + Duration::hours(4), fare_cents, capacity)
            .with_seats_available(seats);
        self.inventory.add_flight(flight).await.unwrap()
    }

    pub async fn seats(&self, flight_id: Uuid) -> u32 {
        self.store.get_flight(flight_id).await.unwrap().unwrap().seats_available
    }

    pub fn request(&self, flight_id: Uuid, passenger_count: u32) -> NewBooking {
        NewBooking {
            user_id: self.user.id,
            flight_id,
            passenger_count,
            extras_cents: 0,
            promo_code: None,
            status: None,
        }
    }

    pub async fn book(&self, flight_id: Uuid, passenger_count: u32) -> Booking {
        self.bookings
            .create_booking(self.request(flight_id, passenger_count))
            .await
            .unwrap()
    }
}

pub fn card_payment(booking: &Booking, number: &str) -> PaymentRequest {
    PaymentRequest {
        booking_id: booking.id,
        amount_cents: booking.total_price_cents,
        method: PaymentMethod::Card,
        fields: PaymentFields {
            card_number: Some(Masked::new(number.to_string())),
            cardholder_name: Some("Traveler One".to_string()),
            card_expiry: Some("08/30".to_string()),
            cvv: Some(Masked::new("321".to_string())),
            email: Some("traveler@example.com".to_string()),
            ..Default::default()
        },
    }
}

pub fn wallet_payment(booking: &Booking, mobile: &str) -> PaymentRequest {
    PaymentRequest {
        booking_id: booking.id,
        amount_cents: booking.total_price_cents,
        method: PaymentMethod::EzCash,
        fields: PaymentFields {
            mobile_number: Some(mobile.to_string()),
            ..Default::default()
        },
    }
}

/// Approves every request after `delay`.
pub struct SlowGateway(pub std::time::Duration);

#[async_trait]
impl PaymentGateway for SlowGateway {
    async fn authorize(&self, _request: &AuthorizationRequest) -> Result<GatewayDecision, GatewayError> {
        tokio::time::sleep(self.0).await;
        Ok(GatewayDecision::Approved)
    }
}

/// Audit and notification sink that is always down.
pub struct BrokenSink;

#[async_trait]
impl AuditSink for BrokenSink {
    async fn record(&self, _record: AuditRecord) -> Result<(), SinkError> {
        Err(SinkError::Unavailable("audit store offline".to_string()))
    }
}

#[async_trait]
impl NotificationSink for BrokenSink {
    async fn enqueue(&self, _notification: Notification) -> Result<(), SinkError> {
        Err(SinkError::Unavailable("mail relay offline".to_string()))
    }
}
