use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::PaymentRecord;

#[derive(Debug, Deserialize, ToSchema)]
pub struct ProcessPaymentRequest {
    pub order_id: Uuid,
    pub method: String,
    #[serde(default)]
    pub payment_data: HashMap<String, String>,
}

#[derive(Debug, Deserialize, Default, ToSchema)]
pub struct RefundRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentHistory {
    pub payments: Vec<PaymentRecord>,
    pub total_payments: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RefundSummary {
    pub payment_id: Uuid,
    pub status: String,
    pub order_id: Uuid,
    pub order_status: String,
    pub message: String,
}
