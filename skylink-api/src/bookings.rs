use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use skylink_core::models::{Booking, BookingStatus, Passenger, PassengerDetails, Payment};
use skylink_core::ReservationError;
use skylink_order::{BookingUpdate, NewBooking};
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct CreateBookingRequest {
    user_id: Uuid,
    flight_id: Uuid,
    passenger_count: u32,
    #[serde(default)]
    extras_cents: i64,
    promo_code: Option<String>,
    status: Option<String>,
    /// Present on the full-detail path.
    passengers: Option<Vec<PassengerDetails>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct UpdateBookingRequest {
    passenger_count: Option<u32>,
    status: Option<String>,
    extras_cents: Option<i64>,
    promo_code: Option<String>,
    passengers: Option<Vec<PassengerDetails>>,
}

#[derive(Debug, Default, Deserialize)]
struct BookingFilter {
    status: Option<String>,
    user_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
struct BookingResponse {
    reference: String,
    #[serde(flatten)]
    booking: Booking,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    passengers: Vec<Passenger>,
}

impl BookingResponse {
    fn new(booking: Booking, passengers: Vec<Passenger>) -> Self {
        Self {
            reference: booking.reference(),
            booking,
            passengers,
        }
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/bookings", get(list_bookings).post(create_booking))
        .route(
            "/v1/bookings/{id}",
            get(get_booking).patch(update_booking).delete(delete_booking),
        )
        .route("/v1/bookings/{id}/cancel", post(cancel_booking))
        .route("/v1/bookings/{id}/payment", get(booking_payment))
}

fn parse_status(raw: Option<&str>) -> Result<Option<BookingStatus>, AppError> {
    Ok(raw.map(str::parse::<BookingStatus>).transpose()?)
}

async fn create_booking(
    State(state): State<AppState>,
    Json(req): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<BookingResponse>), AppError> {
    let request = NewBooking {
        user_id: req.user_id,
        flight_id: req.flight_id,
        passenger_count: req.passenger_count,
        extras_cents: req.extras_cents,
        promo_code: req.promo_code,
        status: parse_status(req.status.as_deref())?,
    };

    let (booking, passengers) = match req.passengers {
        Some(details) => state.bookings.create_booking_with_passengers(request, details).await?,
        None => (state.bookings.create_booking(request).await?, Vec::new()),
    };

    info!("Booking created: {}", booking.reference());
    Ok((StatusCode::CREATED, Json(BookingResponse::new(booking, passengers))))
}

async fn list_bookings(
    State(state): State<AppState>,
    Query(filter): Query<BookingFilter>,
) -> Result<Json<Vec<Booking>>, AppError> {
    let bookings = match (filter.status.as_deref(), filter.user_id) {
        (Some(status), None) => state.bookings.list_bookings_by_status(status).await?,
        (None, Some(user_id)) => state.bookings.list_bookings_for_user(user_id).await?,
        (Some(status), Some(user_id)) => {
            let status: BookingStatus = status.parse()?;
            state
                .bookings
                .list_bookings_for_user(user_id)
                .await?
                .into_iter()
                .filter(|b| b.status == status)
                .collect()
        }
        (None, None) => state.bookings.list_bookings().await?,
    };
    Ok(Json(bookings))
}

async fn get_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<BookingResponse>, AppError> {
    let booking = state.bookings.get_booking(id).await?;
    let passengers = state.bookings.passengers(id).await?;
    Ok(Json(BookingResponse::new(booking, passengers)))
}

async fn update_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateBookingRequest>,
) -> Result<Json<BookingResponse>, AppError> {
    let update = BookingUpdate {
        passenger_count: req.passenger_count,
        status: parse_status(req.status.as_deref())?,
        extras_cents: req.extras_cents,
        promo_code: req.promo_code,
        passengers: req.passengers,
    };
    let booking = state.bookings.update_booking(id, update).await?;
    let passengers = state.bookings.passengers(id).await?;
    Ok(Json(BookingResponse::new(booking, passengers)))
}

async fn cancel_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<BookingResponse>, AppError> {
    let booking = state.bookings.cancel_booking(id).await?;
    Ok(Json(BookingResponse::new(booking, Vec::new())))
}

async fn delete_booking(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<StatusCode, AppError> {
    state.bookings.delete_booking(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn booking_payment(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Payment>, AppError> {
    let payment = state
        .ledger
        .payment_for_booking(id)
        .await?
        .ok_or_else(|| ReservationError::not_found("Payment for booking", id))?;
    Ok(Json(payment))
}
