use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entity;

/// Order lifecycle. `Cancelled` is only reachable through a refund while the
/// order has not entered fulfillment; the fulfillment states are stepped
/// forward by the admin surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Paid,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(OrderStatus::Pending),
            "paid" => Some(OrderStatus::Paid),
            "processing" => Some(OrderStatus::Processing),
            "shipped" => Some(OrderStatus::Shipped),
            "delivered" => Some(OrderStatus::Delivered),
            "cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }

    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Paid)
                | (Paid, Processing)
                | (Processing, Shipped)
                | (Shipped, Delivered)
                | (Pending, Cancelled)
                | (Paid, Cancelled)
        )
    }

    /// States in which an order carries a settled payment.
    pub fn paid_states() -> [&'static str; 4] {
        ["paid", "processing", "shipped", "delivered"]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    CreditCard,
    DebitCard,
    Transfer,
    Paypal,
    Cash,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::CreditCard => "credit_card",
            PaymentMethod::DebitCard => "debit_card",
            PaymentMethod::Transfer => "transfer",
            PaymentMethod::Paypal => "paypal",
            PaymentMethod::Cash => "cash",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "credit_card" => Some(PaymentMethod::CreditCard),
            "debit_card" => Some(PaymentMethod::DebitCard),
            "transfer" => Some(PaymentMethod::Transfer),
            "paypal" => Some(PaymentMethod::Paypal),
            "cash" => Some(PaymentMethod::Cash),
            _ => None,
        }
    }

    pub fn reference_prefix(&self) -> &'static str {
        match self {
            PaymentMethod::CreditCard | PaymentMethod::DebitCard => "CARD",
            PaymentMethod::Transfer => "TRANS",
            PaymentMethod::Paypal => "PP",
            PaymentMethod::Cash => "CASH",
        }
    }

    pub fn requires_card_data(&self) -> bool {
        matches!(self, PaymentMethod::CreditCard | PaymentMethod::DebitCard)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Refunded => "refunded",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(PaymentStatus::Pending),
            "completed" => Some(PaymentStatus::Completed),
            "refunded" => Some(PaymentStatus::Refunded),
            _ => None,
        }
    }
}

// Views returned to the HTTP layer. Entity-to-view projection lives here,
// next to the types, rather than inline in each service.

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Store {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub logo_url: Option<String>,
    pub owner_id: Uuid,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<entity::stores::Model> for Store {
    fn from(model: entity::stores::Model) -> Self {
        Store {
            id: model.id,
            name: model.name,
            description: model.description,
            logo_url: model.logo_url,
            owner_id: model.owner_id,
            active: model.active,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<entity::categories::Model> for Category {
    fn from(model: entity::categories::Model) -> Self {
        Category {
            id: model.id,
            name: model.name,
            description: model.description,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Product {
    pub id: Uuid,
    pub store_id: Uuid,
    pub category_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub price: i64,
    pub stock: i32,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<entity::products::Model> for Product {
    fn from(model: entity::products::Model) -> Self {
        Product {
            id: model.id,
            store_id: model.store_id,
            category_id: model.category_id,
            name: model.name,
            description: model.description,
            image_url: model.image_url,
            price: model.price,
            stock: model.stock,
            active: model.active,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CartItem {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub product_image: Option<String>,
    pub unit_price: i64,
    pub quantity: i32,
    pub subtotal: i64,
}

impl CartItem {
    pub fn project(item: entity::cart_items::Model, product: &entity::products::Model) -> Self {
        CartItem {
            id: item.id,
            product_id: product.id,
            product_name: product.name.clone(),
            product_image: product.image_url.clone(),
            unit_price: product.price,
            quantity: item.quantity,
            subtotal: product.price * item.quantity as i64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Cart {
    pub id: Uuid,
    pub user_id: Uuid,
    pub total: i64,
    pub items: Vec<CartItem>,
}

impl Cart {
    pub fn project(
        cart: entity::carts::Model,
        rows: Vec<(entity::cart_items::Model, Option<entity::products::Model>)>,
    ) -> Self {
        let items = rows
            .into_iter()
            .filter_map(|(item, product)| {
                product.map(|product| CartItem::project(item, &product))
            })
            .collect();
        Cart {
            id: cart.id,
            user_id: cart.user_id,
            total: cart.total,
            items,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub total: i64,
    pub status: String,
    pub shipping_address: Option<String>,
    pub contact_phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<entity::orders::Model> for Order {
    fn from(model: entity::orders::Model) -> Self {
        Order {
            id: model.id,
            user_id: model.user_id,
            total: model.total,
            status: model.status,
            shipping_address: model.shipping_address,
            contact_phone: model.contact_phone,
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderItem {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub product_image: Option<String>,
    pub quantity: i32,
    pub unit_price: i64,
    pub subtotal: i64,
}

impl From<entity::order_items::Model> for OrderItem {
    fn from(model: entity::order_items::Model) -> Self {
        OrderItem {
            id: model.id,
            product_id: model.product_id,
            product_name: model.product_name,
            product_image: model.product_image,
            quantity: model.quantity,
            unit_price: model.unit_price,
            subtotal: model.subtotal,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Payment {
    pub id: Uuid,
    pub amount: i64,
    pub method: String,
    pub status: String,
    pub reference: String,
    pub paid_at: Option<DateTime<Utc>>,
}

impl From<entity::payments::Model> for Payment {
    fn from(model: entity::payments::Model) -> Self {
        Payment {
            id: model.id,
            amount: model.amount,
            method: model.method,
            status: model.status,
            reference: model.reference,
            paid_at: model.paid_at.map(|dt| dt.with_timezone(&Utc)),
        }
    }
}

/// Flat payment projection used by the payment-info and history endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaymentRecord {
    pub id: Uuid,
    pub amount: i64,
    pub method: String,
    pub status: String,
    pub reference: String,
    pub paid_at: Option<DateTime<Utc>>,
    pub order_id: Uuid,
    pub order_status: String,
}

impl PaymentRecord {
    pub fn project(payment: entity::payments::Model, order_status: String) -> Self {
        PaymentRecord {
            id: payment.id,
            amount: payment.amount,
            method: payment.method,
            status: payment.status,
            reference: payment.reference,
            paid_at: payment.paid_at.map(|dt| dt.with_timezone(&Utc)),
            order_id: payment.order_id,
            order_status,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Review {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub rating: i32,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<entity::reviews::Model> for Review {
    fn from(model: entity::reviews::Model) -> Self {
        Review {
            id: model.id,
            user_id: model.user_id,
            product_id: model.product_id,
            rating: model.rating,
            comment: model.comment,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}
