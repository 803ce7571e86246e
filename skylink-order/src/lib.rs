pub mod changes;
pub mod effects;
pub mod gateway;
pub mod inventory;
pub mod ledger;
pub mod manager;
pub mod methods;
pub mod passengers;

pub use changes::{BookingUpdate, UpdatePlan};
pub use effects::SideEffects;
pub use gateway::SimulatedGateway;
pub use inventory::FlightInventory;
pub use ledger::{NewPayment, PaymentLedger, PaymentRequest, PaymentUpdate};
pub use manager::{BookingManager, NewBooking};
