use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    db::OrmConn,
    dto::reviews::{
        AverageRating, CreateReviewRequest, ProductReviews, ReviewList, UpdateReviewRequest,
    },
    entity::{
        products::Entity as Products,
        reviews::{ActiveModel as ReviewActive, Column as ReviewCol, Entity as Reviews},
        users::Entity as Users,
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::Review,
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    state::AppState,
};

pub async fn create_review(
    state: &AppState,
    user: &AuthUser,
    payload: CreateReviewRequest,
) -> AppResult<ApiResponse<Review>> {
    validate_rating(payload.rating)?;

    if Products::find_by_id(payload.product_id)
        .one(&state.orm)
        .await?
        .is_none()
    {
        return Err(AppError::NotFound);
    }
    if Users::find_by_id(user.user_id)
        .one(&state.orm)
        .await?
        .is_none()
    {
        return Err(AppError::NotFound);
    }

    // One review per user and product; the unique index backs this up
    // against races.
    let existing = Reviews::find()
        .filter(ReviewCol::UserId.eq(user.user_id))
        .filter(ReviewCol::ProductId.eq(payload.product_id))
        .one(&state.orm)
        .await?;
    if existing.is_some() {
        return Err(AppError::BadRequest(
            "User has already reviewed this product".into(),
        ));
    }

    let review = ReviewActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        product_id: Set(payload.product_id),
        rating: Set(payload.rating),
        comment: Set(payload.comment),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "review_create",
        Some("reviews"),
        Some(serde_json::json!({ "review_id": review.id, "product_id": review.product_id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Review created",
        review.into(),
        Some(Meta::empty()),
    ))
}

/// Only the rating and comment can change; reviewer, product and creation
/// time are fixed at creation.
pub async fn update_review(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateReviewRequest,
) -> AppResult<ApiResponse<Review>> {
    let review = Reviews::find_by_id(id).one(&state.orm).await?;
    let review = match review {
        Some(r) => r,
        None => return Err(AppError::NotFound),
    };

    if review.user_id != user.user_id {
        return Err(AppError::Forbidden);
    }

    validate_rating(payload.rating)?;

    let mut active: ReviewActive = review.into();
    active.rating = Set(payload.rating);
    active.comment = Set(payload.comment);
    let review = active.update(&state.orm).await?;

    Ok(ApiResponse::success(
        "Review updated",
        review.into(),
        Some(Meta::empty()),
    ))
}

pub async fn delete_review(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let review = Reviews::find_by_id(id).one(&state.orm).await?;
    let review = match review {
        Some(r) => r,
        None => return Err(AppError::NotFound),
    };

    if user.role != "admin" && review.user_id != user.user_id {
        return Err(AppError::Forbidden);
    }

    Reviews::delete_by_id(review.id).exec(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "review_delete",
        Some("reviews"),
        Some(serde_json::json!({ "review_id": id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Review deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub async fn get_average_rating(
    state: &AppState,
    product_id: Uuid,
) -> AppResult<ApiResponse<AverageRating>> {
    if Products::find_by_id(product_id)
        .one(&state.orm)
        .await?
        .is_none()
    {
        return Err(AppError::NotFound);
    }

    let average_rating = average_for_product(&state.orm, product_id).await?;
    Ok(ApiResponse::success(
        "OK",
        AverageRating { average_rating },
        Some(Meta::empty()),
    ))
}

pub async fn list_by_product(
    state: &AppState,
    product_id: Uuid,
    pagination: Pagination,
) -> AppResult<ApiResponse<ProductReviews>> {
    if Products::find_by_id(product_id)
        .one(&state.orm)
        .await?
        .is_none()
    {
        return Err(AppError::NotFound);
    }

    let (page, limit, offset) = pagination.normalize();
    let finder = Reviews::find()
        .filter(ReviewCol::ProductId.eq(product_id))
        .order_by_desc(ReviewCol::CreatedAt);

    let total = finder.clone().count(&state.orm).await? as i64;

    let items: Vec<Review> = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Review::from)
        .collect();

    let average_rating = average_for_product(&state.orm, product_id)
        .await?
        .unwrap_or(0.0);

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "OK",
        ProductReviews {
            items,
            average_rating,
        },
        Some(meta),
    ))
}

pub async fn list_by_user(
    state: &AppState,
    user_id: Uuid,
    pagination: Pagination,
) -> AppResult<ApiResponse<ReviewList>> {
    if Users::find_by_id(user_id).one(&state.orm).await?.is_none() {
        return Err(AppError::NotFound);
    }

    let (page, limit, offset) = pagination.normalize();
    let finder = Reviews::find()
        .filter(ReviewCol::UserId.eq(user_id))
        .order_by_desc(ReviewCol::CreatedAt);

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Review::from)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("OK", ReviewList { items }, Some(meta)))
}

fn validate_rating(rating: i32) -> AppResult<()> {
    if !(1..=5).contains(&rating) {
        return Err(AppError::BadRequest(
            "Rating must be between 1 and 5".into(),
        ));
    }
    Ok(())
}

async fn average_for_product(conn: &OrmConn, product_id: Uuid) -> AppResult<Option<f64>> {
    let ratings: Vec<i32> = Reviews::find()
        .filter(ReviewCol::ProductId.eq(product_id))
        .select_only()
        .column(ReviewCol::Rating)
        .into_tuple()
        .all(conn)
        .await?;

    if ratings.is_empty() {
        return Ok(None);
    }
    let sum: i64 = ratings.iter().map(|r| *r as i64).sum();
    Ok(Some(sum as f64 / ratings.len() as f64))
}
