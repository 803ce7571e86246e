pub mod error;
pub mod models;
pub mod repository;
pub mod payment;
pub mod sinks;
pub mod policy;

pub use error::{ErrorKind, ReservationError, ReservationResult, StoreError, StoreResult};
pub use models::{
    Booking, BookingStatus, Passenger, PassengerDetails, Payment, PaymentMethod, PaymentStatus, User,
};
pub use repository::{Change, ChangeSet, ReservationStore};
pub use payment::{PaymentFields, PaymentGateway, PaymentInstrument};
pub use sinks::{AuditSink, NotificationSink, SinkError};
pub use policy::{BookingPolicy, PaymentSettings};
