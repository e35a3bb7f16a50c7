use std::collections::HashMap;

use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::{
        orders::OrderDetail,
        payments::{PaymentHistory, ProcessPaymentRequest, RefundRequest, RefundSummary},
    },
    entity::{
        order_items::{Column as OrderItemCol, Entity as OrderItems},
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders},
        payments::{ActiveModel as PaymentActive, Column as PaymentCol, Entity as Payments},
        users::Entity as Users,
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{self, OrderStatus, PaymentMethod, PaymentStatus},
    response::{ApiResponse, Meta},
    state::AppState,
};

/// Card payments must carry the card number and CVV; the other methods take
/// their data as-is.
pub fn validate_payment_data(
    method: PaymentMethod,
    data: &HashMap<String, String>,
) -> AppResult<()> {
    if method.requires_card_data()
        && (!data.contains_key("card_number") || !data.contains_key("cvv"))
    {
        return Err(AppError::BadRequest("Incomplete card data".into()));
    }
    Ok(())
}

pub fn build_payment_reference(method: PaymentMethod, epoch_millis: i64) -> String {
    format!("{}-REF-{}", method.reference_prefix(), epoch_millis)
}

/// Settle a pending order: creates the completed payment and flips the order
/// to `paid` in one transaction. Paying an order twice, paying someone
/// else's order, or paying a cancelled order all fail before any write.
pub async fn process_payment(
    state: &AppState,
    user: &AuthUser,
    payload: ProcessPaymentRequest,
) -> AppResult<ApiResponse<OrderDetail>> {
    let method = PaymentMethod::parse(&payload.method)
        .ok_or_else(|| AppError::BadRequest("Unsupported payment method".into()))?;
    validate_payment_data(method, &payload.payment_data)?;

    let txn = state.orm.begin().await?;

    if Users::find_by_id(user.user_id).one(&txn).await?.is_none() {
        return Err(AppError::NotFound);
    }

    let order = Orders::find_by_id(payload.order_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    if order.user_id != user.user_id {
        return Err(AppError::BadRequest(
            "Order does not belong to this user".into(),
        ));
    }

    if OrderStatus::parse(&order.status) != Some(OrderStatus::Pending) {
        return Err(AppError::BadRequest(
            "Order has already been processed or cancelled".into(),
        ));
    }

    let now = Utc::now();
    let payment = PaymentActive {
        id: Set(Uuid::new_v4()),
        order_id: Set(order.id),
        amount: Set(order.total),
        method: Set(method.as_str().into()),
        status: Set(PaymentStatus::Completed.as_str().into()),
        reference: Set(build_payment_reference(method, now.timestamp_millis())),
        paid_at: Set(Some(now.into())),
        created_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let mut active: OrderActive = order.into();
    active.status = Set(OrderStatus::Paid.as_str().into());
    active.updated_at = Set(now.into());
    let order = active.update(&txn).await?;

    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .all(&txn)
        .await?
        .into_iter()
        .map(models::OrderItem::from)
        .collect();

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "payment_processed",
        Some("payments"),
        Some(serde_json::json!({
            "order_id": order.id,
            "payment_id": payment.id,
            "method": method.as_str(),
        })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Payment recorded",
        OrderDetail {
            order: order.into(),
            items,
            payment: Some(payment.into()),
        },
        Some(Meta::empty()),
    ))
}

pub async fn get_payment_info(
    state: &AppState,
    user: &AuthUser,
    payment_id: Uuid,
) -> AppResult<ApiResponse<models::PaymentRecord>> {
    let payment = Payments::find_by_id(payment_id).one(&state.orm).await?;
    let payment = match payment {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };

    let order = Orders::find_by_id(payment.order_id).one(&state.orm).await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    if user.role != "admin" && order.user_id != user.user_id {
        return Err(AppError::Forbidden);
    }

    Ok(ApiResponse::success(
        "OK",
        models::PaymentRecord::project(payment, order.status),
        Some(Meta::empty()),
    ))
}

/// Every settled payment of the user, joined with the state its order is in.
/// Orders still pending or cancelled carry no settled payment and are left
/// out.
pub async fn payment_history(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<PaymentHistory>> {
    if Users::find_by_id(user.user_id)
        .one(&state.orm)
        .await?
        .is_none()
    {
        return Err(AppError::NotFound);
    }

    let orders = Orders::find()
        .filter(OrderCol::UserId.eq(user.user_id))
        .filter(OrderCol::Status.is_in(OrderStatus::paid_states()))
        .all(&state.orm)
        .await?;

    let status_by_order: HashMap<Uuid, String> =
        orders.iter().map(|o| (o.id, o.status.clone())).collect();
    let order_ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();

    let payments: Vec<models::PaymentRecord> = Payments::find()
        .filter(PaymentCol::OrderId.is_in(order_ids))
        .all(&state.orm)
        .await?
        .into_iter()
        .filter_map(|payment| {
            status_by_order
                .get(&payment.order_id)
                .cloned()
                .map(|status| models::PaymentRecord::project(payment, status))
        })
        .collect();

    let total_payments = payments.len();
    Ok(ApiResponse::success(
        "OK",
        PaymentHistory {
            payments,
            total_payments,
        },
        Some(Meta::empty()),
    ))
}

/// Reverse a completed payment: the payment moves to `refunded` and the order
/// to `cancelled`, atomically. Only completed payments can be refunded, so a
/// second refund of the same payment fails.
pub async fn process_refund(
    state: &AppState,
    user: &AuthUser,
    payment_id: Uuid,
    payload: RefundRequest,
) -> AppResult<ApiResponse<RefundSummary>> {
    let txn = state.orm.begin().await?;

    let payment = Payments::find_by_id(payment_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?;
    let payment = match payment {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };

    let order = Orders::find_by_id(payment.order_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    if user.role != "admin" && order.user_id != user.user_id {
        return Err(AppError::Forbidden);
    }

    if PaymentStatus::parse(&payment.status) != Some(PaymentStatus::Completed) {
        return Err(AppError::BadRequest(
            "Payment is not in completed state".into(),
        ));
    }

    let reason = payload
        .reason
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| "customer-requested refund".to_string());

    let payment_id = payment.id;
    let mut payment_active: PaymentActive = payment.into();
    payment_active.status = Set(PaymentStatus::Refunded.as_str().into());
    let payment = payment_active.update(&txn).await?;

    let mut order_active: OrderActive = order.into();
    order_active.status = Set(OrderStatus::Cancelled.as_str().into());
    order_active.updated_at = Set(Utc::now().into());
    let order = order_active.update(&txn).await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "payment_refunded",
        Some("payments"),
        Some(serde_json::json!({ "payment_id": payment_id, "order_id": order.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Refund processed",
        RefundSummary {
            payment_id,
            status: payment.status,
            order_id: order.id,
            order_status: order.status,
            message: format!("Refund processed: {reason}"),
        },
        Some(Meta::empty()),
    ))
}
