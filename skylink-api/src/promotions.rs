use axum::{
    extract::{Json, State},
    http::StatusCode,
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use skylink_catalog::Promotion;
use skylink_core::ReservationError;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct CreatePromotionRequest {
    promo_code: String,
    discount_percent: f64,
    valid_from: DateTime<Utc>,
    valid_until: DateTime<Utc>,
    target_criteria: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/promotions", get(list_promotions).post(create_promotion))
}

async fn list_promotions(State(state): State<AppState>) -> Json<Vec<Promotion>> {
    Json(state.promotions.list().await)
}

async fn create_promotion(
    State(state): State<AppState>,
    Json(req): Json<CreatePromotionRequest>,
) -> Result<(StatusCode, Json<Promotion>), AppError> {
    let promotion = Promotion::new(
        &req.promo_code,
        req.discount_percent,
        req.valid_from,
        req.valid_until,
        req.target_criteria,
    )
    .map_err(ReservationError::from)?;

    state
        .promotions
        .add(promotion.clone())
        .await
        .map_err(ReservationError::from)?;
    Ok((StatusCode::CREATED, Json(promotion)))
}
