use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::Review;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateReviewRequest {
    pub product_id: Uuid,
    pub rating: i32,
    pub comment: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateReviewRequest {
    pub rating: i32,
    pub comment: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct ReviewList {
    #[schema(value_type = Vec<Review>)]
    pub items: Vec<Review>,
}

/// Product review page with the aggregate alongside; `average_rating` is 0.0
/// when the product has no reviews yet.
#[derive(Debug, Serialize, ToSchema)]
pub struct ProductReviews {
    pub items: Vec<Review>,
    pub average_rating: f64,
}

/// Bare aggregate; `null` when the product has no reviews.
#[derive(Debug, Serialize, ToSchema)]
pub struct AverageRating {
    pub average_rating: Option<f64>,
}
