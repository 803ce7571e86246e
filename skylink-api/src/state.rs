use skylink_catalog::{PricingCalculator, PromotionCatalog};
use skylink_core::repository::ReservationStore;
use skylink_order::{BookingManager, FlightInventory, PaymentLedger, SideEffects, SimulatedGateway};
use skylink_store::app_config::Config;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub inventory: Arc<FlightInventory>,
    pub bookings: Arc<BookingManager>,
    pub ledger: Arc<PaymentLedger>,
    pub promotions: Arc<PromotionCatalog>,
}

impl AppState {
    /// Wires the services over `store` with the configured policies and a simulated gateway.
    pub fn new(store: Arc<dyn ReservationStore>, config: &Config, effects: SideEffects) -> Self {
        let promotions = Arc::new(PromotionCatalog::new());
        let inventory = Arc::new(FlightInventory::new(store.clone()));
        let bookings = Arc::new(BookingManager::new(
            store.clone(),
            inventory.clone(),
            PricingCalculator::new(promotions.clone()),
            config.booking.clone(),
            effects.clone(),
        ));
        let ledger = Arc::new(PaymentLedger::new(
            store,
            bookings.clone(),
            Arc::new(SimulatedGateway::new(config.payment.gateway_latency())),
            config.payment.clone(),
            effects,
        ));

        Self {
            inventory,
            bookings,
            ledger,
            promotions,
        }
    }
}
