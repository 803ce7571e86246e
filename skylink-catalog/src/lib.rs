pub mod flight;
pub mod pricing;
pub mod inventory;

pub use flight::{CabinClass, Flight, FlightStatus};
pub use pricing::{NoPromotions, PriceQuote, PricingCalculator, PricingError, Promotion, PromotionCatalog, PromotionLookup};
pub use inventory::{FlightGuard, FlightLocks, InventoryError, SeatRelease};
