use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use skylink_catalog::{CabinClass, Flight};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct CreateFlightRequest {
    flight_number: String,
    origin: String,
    destination: String,
    departure_time: DateTime<Utc>,
    arrival_time: DateTime<Utc>,
    fare_cents: i64,
    capacity: u32,
    cabin_class: Option<String>,
    aircraft_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SeatRequest {
    count: u32,
}

#[derive(Debug, Serialize)]
struct SeatResponse {
    flight_id: Uuid,
    seats_available: u32,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/flights", get(list_flights).post(create_flight))
        .route("/v1/flights/{id}", get(get_flight))
        .route("/v1/flights/{id}/reserve", post(reserve_seats))
        .route("/v1/flights/{id}/release", post(release_seats))
}

async fn list_flights(State(state): State<AppState>) -> Result<Json<Vec<Flight>>, AppError> {
    Ok(Json(state.inventory.list_flights().await?))
}

async fn get_flight(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Flight>, AppError> {
    Ok(Json(state.inventory.get_flight(id).await?))
}

async fn create_flight(
    State(state): State<AppState>,
    Json(req): Json<CreateFlightRequest>,
) -> Result<(StatusCode, Json<Flight>), AppError> {
    let cabin_class = match req.cabin_class.as_deref() {
        Some(raw) => raw.parse::<CabinClass>()?,
        None => CabinClass::Economy,
    };

    let flight = Flight::new(
        req.flight_number,
        req.origin,
        req.destination,
        req.departure_time,
        req.arrival_time,
        req.fare_cents,
        req.capacity,
    )
    .with_cabin_class(cabin_class)
    .with_aircraft_type(req.aircraft_type.unwrap_or_default());

    let flight = state.inventory.add_flight(flight).await?;
    Ok((StatusCode::CREATED, Json(flight)))
}

async fn reserve_seats(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<SeatRequest>,
) -> Result<Json<SeatResponse>, AppError> {
    let seats_available = state.inventory.reserve_seats(id, req.count).await?;
    Ok(Json(SeatResponse {
        flight_id: id,
        seats_available,
    }))
}

async fn release_seats(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<SeatRequest>,
) -> Result<Json<SeatResponse>, AppError> {
    let seats_available = state.inventory.release_seats(id, req.count).await?;
    Ok(Json(SeatResponse {
        flight_id: id,
        seats_available,
    }))
}
