use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::orders::OrderDetail,
    dto::payments::{PaymentHistory, ProcessPaymentRequest, RefundRequest, RefundSummary},
    error::AppResult,
    middleware::auth::AuthUser,
    models::PaymentRecord,
    response::ApiResponse,
    services::payment_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(process_payment))
        .route("/history", get(payment_history))
        .route("/{id}", get(get_payment_info))
        .route("/{id}/refund", post(process_refund))
}

#[utoipa::path(
    post,
    path = "/api/payments",
    request_body = ProcessPaymentRequest,
    responses(
        (status = 200, description = "Settle a pending order", body = ApiResponse<OrderDetail>),
        (status = 400, description = "Wrong order state, unsupported method or incomplete card data"),
        (status = 404, description = "Order not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn process_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<ProcessPaymentRequest>,
) -> AppResult<Json<ApiResponse<OrderDetail>>> {
    let resp = payment_service::process_payment(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/payments/history",
    responses(
        (status = 200, description = "Settled payments of the current user", body = ApiResponse<PaymentHistory>)
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn payment_history(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<PaymentHistory>>> {
    let resp = payment_service::payment_history(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/payments/{id}",
    params(("id" = Uuid, Path, description = "Payment ID")),
    responses(
        (status = 200, description = "Flat payment projection", body = ApiResponse<PaymentRecord>),
        (status = 404, description = "Payment not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn get_payment_info(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<PaymentRecord>>> {
    let resp = payment_service::get_payment_info(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/payments/{id}/refund",
    params(("id" = Uuid, Path, description = "Payment ID")),
    request_body = RefundRequest,
    responses(
        (status = 200, description = "Refund a completed payment", body = ApiResponse<RefundSummary>),
        (status = 400, description = "Payment is not refundable"),
        (status = 404, description = "Payment not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn process_refund(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<RefundRequest>,
) -> AppResult<Json<ApiResponse<RefundSummary>>> {
    let resp = payment_service::process_refund(&state, &user, id, payload).await?;
    Ok(Json(resp))
}
