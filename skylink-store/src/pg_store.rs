use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use skylink_catalog::Flight;
use skylink_core::error::{StoreError, StoreResult};
use skylink_core::models::{Booking, BookingStatus, Passenger, Payment, PaymentStatus, User};
use skylink_core::repository::{
    BookingRepository, Change, ChangeSet, FlightRepository, PassengerRepository, PaymentRepository,
    ReservationStore, UserRepository,
};
use sqlx::{PgPool, Postgres, Transaction};
use std::str::FromStr;
use tracing::debug;
use uuid::Uuid;

const FLIGHT_COLUMNS: &str = "id, flight_number, origin, destination, departure_time, arrival_time, fare_cents, \
     cabin_class, seats_available, capacity, aircraft_type, status, created_at, updated_at";
const BOOKING_COLUMNS: &str = "id, user_id, flight_id, passenger_count, status, extras_cents, promo_code, \
     discount_cents, total_price_cents, payment_id, created_at, updated_at";
const PASSENGER_COLUMNS: &str = "id, booking_id, first_name, last_name, email, phone, date_of_birth, country, \
     passport_number, passport_expiry";
const PAYMENT_COLUMNS: &str = "id, booking_id, amount_cents, status, method, transaction_id, paid_at, updated_at";

fn db_error(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Duplicate(db.constraint().unwrap_or("unique key").to_string())
        }
        _ => StoreError::Backend(err.to_string()),
    }
}

fn parse_column<T: FromStr>(column: &str, value: &str) -> StoreResult<T> {
    value
        .parse()
        .map_err(|_| StoreError::Backend(format!("unexpected {} value '{}'", column, value)))
}

fn to_count(column: &str, value: i32) -> StoreResult<u32> {
    u32::try_from(value).map_err(|_| StoreError::Backend(format!("negative {}: {}", column, value)))
}

fn to_db_count(value: u32) -> StoreResult<i32> {
    i32::try_from(value).map_err(|_| StoreError::Backend(format!("count out of range: {}", value)))
}

// Internal structs for type-safe querying
#[derive(sqlx::FromRow)]
struct FlightRow {
    id: Uuid,
    flight_number: String,
    origin: String,
    destination: String,
    departure_time: DateTime<Utc>,
    arrival_time: DateTime<Utc>,
    fare_cents: i64,
    cabin_class: String,
    seats_available: i32,
    capacity: i32,
    aircraft_type: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<FlightRow> for Flight {
    type Error = StoreError;

    fn try_from(row: FlightRow) -> StoreResult<Self> {
        Ok(Flight {
            id: row.id,
            flight_number: row.flight_number,
            origin: row.origin,
            destination: row.destination,
            departure_time: row.departure_time,
            arrival_time: row.arrival_time,
            fare_cents: row.fare_cents,
            cabin_class: parse_column("cabin_class", &row.cabin_class)?,
            seats_available: to_count("seats_available", row.seats_available)?,
            capacity: to_count("capacity", row.capacity)?,
            aircraft_type: row.aircraft_type,
            status: parse_column("status", &row.status)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    user_id: Uuid,
    flight_id: Uuid,
    passenger_count: i32,
    status: String,
    extras_cents: i64,
    promo_code: Option<String>,
    discount_cents: i64,
    total_price_cents: i64,
    payment_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = StoreError;

    fn try_from(row: BookingRow) -> StoreResult<Self> {
        Ok(Booking {
            id: row.id,
            user_id: row.user_id,
            flight_id: row.flight_id,
            passenger_count: to_count("passenger_count", row.passenger_count)?,
            status: parse_column("status", &row.status)?,
            extras_cents: row.extras_cents,
            promo_code: row.promo_code,
            discount_cents: row.discount_cents,
            total_price_cents: row.total_price_cents,
            payment_id: row.payment_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct PassengerRow {
    id: Uuid,
    booking_id: Uuid,
    first_name: String,
    last_name: String,
    email: String,
    phone: Option<String>,
    date_of_birth: NaiveDate,
    country: String,
    passport_number: Option<String>,
    passport_expiry: Option<NaiveDate>,
}

impl From<PassengerRow> for Passenger {
    fn from(row: PassengerRow) -> Self {
        Passenger {
            id: row.id,
            booking_id: row.booking_id,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            phone: row.phone,
            date_of_birth: row.date_of_birth,
            country: row.country,
            passport_number: row.passport_number,
            passport_expiry: row.passport_expiry,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    booking_id: Uuid,
    amount_cents: i64,
    status: String,
    method: String,
    transaction_id: String,
    paid_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = StoreError;

    fn try_from(row: PaymentRow) -> StoreResult<Self> {
        Ok(Payment {
            id: row.id,
            booking_id: row.booking_id,
            amount_cents: row.amount_cents,
            status: parse_column("status", &row.status)?,
            method: parse_column("method", &row.method)?,
            transaction_id: row.transaction_id,
            paid_at: row.paid_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    email: String,
}

fn convert_all<R, T>(rows: Vec<R>) -> StoreResult<Vec<T>>
where
    T: TryFrom<R, Error = StoreError>,
{
    rows.into_iter().map(T::try_from).collect()
}

/// PostgreSQL-backed store. Each commit is one database transaction.
pub struct PgReservationStore {
    pool: PgPool,
}

impl PgReservationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_bookings(&self, filter: &str, bind: Option<BookingFilter>) -> StoreResult<Vec<Booking>> {
        let sql = format!("SELECT {} FROM bookings {} ORDER BY created_at", BOOKING_COLUMNS, filter);
        let query = sqlx::query_as::<_, BookingRow>(&sql);
        let query = match bind {
            Some(BookingFilter::User(user_id)) => query.bind(user_id),
            Some(BookingFilter::Status(status)) => query.bind(status.as_str()),
            None => query,
        };
        let rows = query.fetch_all(&self.pool).await.map_err(db_error)?;
        convert_all(rows)
    }
}

enum BookingFilter {
    User(Uuid),
    Status(BookingStatus),
}

#[async_trait]
impl FlightRepository for PgReservationStore {
    async fn get_flight(&self, id: Uuid) -> StoreResult<Option<Flight>> {
        let sql = format!("SELECT {} FROM flights WHERE id = $1", FLIGHT_COLUMNS);
        let row = sqlx::query_as::<_, FlightRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
        row.map(Flight::try_from).transpose()
    }

    async fn list_flights(&self) -> StoreResult<Vec<Flight>> {
        let sql = format!("SELECT {} FROM flights ORDER BY departure_time, flight_number", FLIGHT_COLUMNS);
        let rows = sqlx::query_as::<_, FlightRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;
        convert_all(rows)
    }
}

#[async_trait]
impl BookingRepository for PgReservationStore {
    async fn get_booking(&self, id: Uuid) -> StoreResult<Option<Booking>> {
        let sql = format!("SELECT {} FROM bookings WHERE id = $1", BOOKING_COLUMNS);
        let row = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
        row.map(Booking::try_from).transpose()
    }

    async fn list_bookings(&self) -> StoreResult<Vec<Booking>> {
        self.fetch_bookings("", None).await
    }

    async fn list_bookings_by_user(&self, user_id: Uuid) -> StoreResult<Vec<Booking>> {
        self.fetch_bookings("WHERE user_id = $1", Some(BookingFilter::User(user_id))).await
    }

    async fn list_bookings_by_status(&self, status: BookingStatus) -> StoreResult<Vec<Booking>> {
        self.fetch_bookings("WHERE status = $1", Some(BookingFilter::Status(status))).await
    }
}

#[async_trait]
impl PassengerRepository for PgReservationStore {
    async fn list_passengers(&self, booking_id: Uuid) -> StoreResult<Vec<Passenger>> {
        let sql = format!("SELECT {} FROM passengers WHERE booking_id = $1 ORDER BY last_name, first_name", PASSENGER_COLUMNS);
        let rows = sqlx::query_as::<_, PassengerRow>(&sql)
            .bind(booking_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(rows.into_iter().map(Passenger::from).collect())
    }
}

#[async_trait]
impl PaymentRepository for PgReservationStore {
    async fn get_payment(&self, id: Uuid) -> StoreResult<Option<Payment>> {
        let sql = format!("SELECT {} FROM payments WHERE id = $1", PAYMENT_COLUMNS);
        let row = sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
        row.map(Payment::try_from).transpose()
    }

    async fn find_payment_by_booking(&self, booking_id: Uuid) -> StoreResult<Option<Payment>> {
        let sql = format!("SELECT {} FROM payments WHERE booking_id = $1", PAYMENT_COLUMNS);
        let row = sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(booking_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
        row.map(Payment::try_from).transpose()
    }

    async fn list_payments(&self) -> StoreResult<Vec<Payment>> {
        let sql = format!("SELECT {} FROM payments ORDER BY paid_at", PAYMENT_COLUMNS);
        let rows = sqlx::query_as::<_, PaymentRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;
        convert_all(rows)
    }

    async fn list_payments_by_status(&self, status: PaymentStatus) -> StoreResult<Vec<Payment>> {
        let sql = format!("SELECT {} FROM payments WHERE status = $1 ORDER BY paid_at", PAYMENT_COLUMNS);
        let rows = sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;
        convert_all(rows)
    }
}

#[async_trait]
impl UserRepository for PgReservationStore {
    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>("SELECT id, username, email FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(row.map(|r| User {
            id: r.id,
            username: r.username,
            email: r.email,
        }))
    }
}

#[async_trait]
impl ReservationStore for PgReservationStore {
    async fn commit(&self, changes: ChangeSet) -> StoreResult<()> {
        if changes.is_empty() {
            return Ok(());
        }
        let count = changes.len();
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        // Dropping `tx` on an early return rolls everything back.
        for change in changes.into_changes() {
            apply(&mut tx, change).await?;
        }

        tx.commit().await.map_err(db_error)?;
        debug!(changes = count, "postgres commit applied");
        Ok(())
    }
}

async fn apply(tx: &mut Transaction<'_, Postgres>, change: Change) -> StoreResult<()> {
    match change {
        Change::SaveFlight(flight) => {
            flight.validate().map_err(|e| StoreError::Backend(e.to_string()))?;
            sqlx::query(
                r#"
                INSERT INTO flights (id, flight_number, origin, destination, departure_time, arrival_time,
                                     fare_cents, cabin_class, seats_available, capacity, aircraft_type, status,
                                     created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
                ON CONFLICT (id) DO UPDATE SET
                    flight_number = EXCLUDED.flight_number, origin = EXCLUDED.origin,
                    destination = EXCLUDED.destination, departure_time = EXCLUDED.departure_time,
                    arrival_time = EXCLUDED.arrival_time, fare_cents = EXCLUDED.fare_cents,
                    cabin_class = EXCLUDED.cabin_class, seats_available = EXCLUDED.seats_available,
                    capacity = EXCLUDED.capacity, aircraft_type = EXCLUDED.aircraft_type,
                    status = EXCLUDED.status, updated_at = EXCLUDED.updated_at
                "#,
            )
            .bind(flight.id)
            .bind(&flight.flight_number)
            .bind(&flight.origin)
            .bind(&flight.destination)
            .bind(flight.departure_time)
            .bind(flight.arrival_time)
            .bind(flight.fare_cents)
            .bind(flight.cabin_class.as_str())
            .bind(to_db_count(flight.seats_available)?)
            .bind(to_db_count(flight.capacity)?)
            .bind(&flight.aircraft_type)
            .bind(flight.status.as_str())
            .bind(flight.created_at)
            .bind(flight.updated_at)
            .execute(&mut **tx)
            .await
            .map_err(db_error)?;
        }
        Change::SaveUser(user) => {
            sqlx::query(
                "INSERT INTO users (id, username, email) VALUES ($1, $2, $3) \
                 ON CONFLICT (id) DO UPDATE SET username = EXCLUDED.username, email = EXCLUDED.email",
            )
            .bind(user.id)
            .bind(&user.username)
            .bind(&user.email)
            .execute(&mut **tx)
            .await
            .map_err(db_error)?;
        }
        Change::ReserveSeats { flight_id, count } => {
            let requested = to_db_count(count)?;
            // Conditional decrement: the row lock taken by UPDATE serialises concurrent callers.
            let updated: Option<i32> = sqlx::query_scalar(
                "UPDATE flights SET seats_available = seats_available - $2, updated_at = now() \
                 WHERE id = $1 AND seats_available >= $2 RETURNING seats_available",
            )
            .bind(flight_id)
            .bind(requested)
            .fetch_optional(&mut **tx)
            .await
            .map_err(db_error)?;

            if updated.is_none() {
                let available: Option<i32> =
                    sqlx::query_scalar("SELECT seats_available FROM flights WHERE id = $1")
                        .bind(flight_id)
                        .fetch_optional(&mut **tx)
                        .await
                        .map_err(db_error)?;
                return Err(match available {
                    None => StoreError::NotFound {
                        entity: "Flight",
                        id: flight_id,
                    },
                    Some(available) => StoreError::InsufficientSeats {
                        flight_id,
                        requested: count,
                        available: to_count("seats_available", available)?,
                    },
                });
            }
        }
        Change::ReleaseSeats { flight_id, count } => {
            let result = sqlx::query(
                "UPDATE flights SET seats_available = LEAST(capacity, seats_available + $2), updated_at = now() \
                 WHERE id = $1",
            )
            .bind(flight_id)
            .bind(to_db_count(count)?)
            .execute(&mut **tx)
            .await
            .map_err(db_error)?;
            if result.rows_affected() == 0 {
                return Err(StoreError::NotFound {
                    entity: "Flight",
                    id: flight_id,
                });
            }
        }
        Change::SaveBooking(booking) => {
            sqlx::query(
                r#"
                INSERT INTO bookings (id, user_id, flight_id, passenger_count, status, extras_cents, promo_code,
                                      discount_cents, total_price_cents, payment_id, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                ON CONFLICT (id) DO UPDATE SET
                    passenger_count = EXCLUDED.passenger_count, status = EXCLUDED.status,
                    extras_cents = EXCLUDED.extras_cents, promo_code = EXCLUDED.promo_code,
                    discount_cents = EXCLUDED.discount_cents, total_price_cents = EXCLUDED.total_price_cents,
                    payment_id = EXCLUDED.payment_id, updated_at = EXCLUDED.updated_at
                "#,
            )
            .bind(booking.id)
            .bind(booking.user_id)
            .bind(booking.flight_id)
            .bind(to_db_count(booking.passenger_count)?)
            .bind(booking.status.as_str())
            .bind(booking.extras_cents)
            .bind(&booking.promo_code)
            .bind(booking.discount_cents)
            .bind(booking.total_price_cents)
            .bind(booking.payment_id)
            .bind(booking.created_at)
            .bind(booking.updated_at)
            .execute(&mut **tx)
            .await
            .map_err(db_error)?;
        }
        Change::DeleteBooking(booking_id) => {
            let result = sqlx::query("DELETE FROM bookings WHERE id = $1")
                .bind(booking_id)
                .execute(&mut **tx)
                .await
                .map_err(db_error)?;
            if result.rows_affected() == 0 {
                return Err(StoreError::NotFound {
                    entity: "Booking",
                    id: booking_id,
                });
            }
        }
        Change::SavePassengers(passengers) => {
            for passenger in passengers {
                sqlx::query(
                    r#"
                    INSERT INTO passengers (id, booking_id, first_name, last_name, email, phone, date_of_birth,
                                            country, passport_number, passport_expiry)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                    "#,
                )
                .bind(passenger.id)
                .bind(passenger.booking_id)
                .bind(&passenger.first_name)
                .bind(&passenger.last_name)
                .bind(&passenger.email)
                .bind(&passenger.phone)
                .bind(passenger.date_of_birth)
                .bind(&passenger.country)
                .bind(&passenger.passport_number)
                .bind(passenger.passport_expiry)
                .execute(&mut **tx)
                .await
                .map_err(db_error)?;
            }
        }
        Change::DeletePassengers { booking_id } => {
            sqlx::query("DELETE FROM passengers WHERE booking_id = $1")
                .bind(booking_id)
                .execute(&mut **tx)
                .await
                .map_err(db_error)?;
        }
        Change::SavePayment(payment) => {
            sqlx::query(
                r#"
                INSERT INTO payments (id, booking_id, amount_cents, status, method, transaction_id, paid_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ON CONFLICT (id) DO UPDATE SET
                    amount_cents = EXCLUDED.amount_cents, status = EXCLUDED.status, method = EXCLUDED.method,
                    transaction_id = EXCLUDED.transaction_id, updated_at = EXCLUDED.updated_at
                "#,
            )
            .bind(payment.id)
            .bind(payment.booking_id)
            .bind(payment.amount_cents)
            .bind(payment.status.as_str())
            .bind(payment.method.as_str())
            .bind(&payment.transaction_id)
            .bind(payment.paid_at)
            .bind(payment.updated_at)
            .execute(&mut **tx)
            .await
            .map_err(db_error)?;
        }
        Change::DeletePayment(payment_id) => {
            let result = sqlx::query("DELETE FROM payments WHERE id = $1")
                .bind(payment_id)
                .execute(&mut **tx)
                .await
                .map_err(db_error)?;
            if result.rows_affected() == 0 {
                return Err(StoreError::NotFound {
                    entity: "Payment",
                    id: payment_id,
                });
            }
        }
    }
    Ok(())
}
