use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use skylink_core::models::{Payment, PaymentMethod, PaymentStatus};
use skylink_core::payment::PaymentFields;
use skylink_order::{NewPayment, PaymentRequest, PaymentUpdate};
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct ProcessPaymentRequest {
    booking_id: Uuid,
    amount_cents: i64,
    method: String,
    #[serde(flatten)]
    fields: PaymentFields,
}

/// Back-office entry with an explicit status.
#[derive(Debug, Deserialize)]
struct ManualPaymentRequest {
    booking_id: Uuid,
    amount_cents: i64,
    status: String,
    method: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct UpdatePaymentRequest {
    amount_cents: Option<i64>,
    status: Option<String>,
    transaction_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PaymentFilter {
    status: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/payments", get(list_payments).post(process_payment))
        .route("/v1/payments/manual", post(create_payment))
        .route(
            "/v1/payments/{id}",
            get(get_payment).patch(update_payment).delete(delete_payment),
        )
        .route("/v1/payments/{id}/refund", post(refund_payment))
}

async fn process_payment(
    State(state): State<AppState>,
    Json(req): Json<ProcessPaymentRequest>,
) -> Result<(StatusCode, Json<Payment>), AppError> {
    let request = PaymentRequest {
        booking_id: req.booking_id,
        amount_cents: req.amount_cents,
        method: req.method.parse::<PaymentMethod>()?,
        fields: req.fields,
    };

    // Cancelled if the client goes away before the gateway answers.
    let cancel = CancellationToken::new();
    let _abort_on_disconnect = cancel.clone().drop_guard();

    let payment = state.ledger.process_payment(request, cancel.clone()).await?;
    info!("Payment {} completed for booking {}", payment.transaction_id, payment.booking_id);
    Ok((StatusCode::CREATED, Json(payment)))
}

async fn create_payment(
    State(state): State<AppState>,
    Json(req): Json<ManualPaymentRequest>,
) -> Result<(StatusCode, Json<Payment>), AppError> {
    let request = NewPayment {
        booking_id: req.booking_id,
        amount_cents: req.amount_cents,
        status: req.status.parse::<PaymentStatus>()?,
        method: req.method.as_deref().map(str::parse::<PaymentMethod>).transpose()?,
    };
    let payment = state.ledger.create_payment(request).await?;
    Ok((StatusCode::CREATED, Json(payment)))
}

async fn list_payments(
    State(state): State<AppState>,
    Query(filter): Query<PaymentFilter>,
) -> Result<Json<Vec<Payment>>, AppError> {
    let payments = match filter.status.as_deref() {
        Some(status) => state.ledger.list_payments_by_status(status).await?,
        None => state.ledger.list_payments().await?,
    };
    Ok(Json(payments))
}

async fn get_payment(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Payment>, AppError> {
    Ok(Json(state.ledger.get_payment(id).await?))
}

async fn update_payment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdatePaymentRequest>,
) -> Result<Json<Payment>, AppError> {
    let update = PaymentUpdate {
        amount_cents: req.amount_cents,
        status: req.status.as_deref().map(str::parse::<PaymentStatus>).transpose()?,
        transaction_id: req.transaction_id,
    };
    Ok(Json(state.ledger.update_payment(id, update).await?))
}

async fn delete_payment(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<StatusCode, AppError> {
    state.ledger.delete_payment(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn refund_payment(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Payment>, AppError> {
    Ok(Json(state.ledger.refund_payment(id).await?))
}
