pub mod pii;
pub mod parse;
pub mod models;

pub use pii::Masked;
pub use parse::ParseEnumError;
pub use models::events::{AuditRecord, Notification, NotificationChannel};
