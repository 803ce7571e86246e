pub mod app_config;
pub mod database;
pub mod memory;
pub mod pg_store;
pub mod seed;
pub mod sinks;

pub use database::DbClient;
pub use memory::InMemoryStore;
pub use pg_store::PgReservationStore;
pub use sinks::{AuditLog, NotificationQueue};
