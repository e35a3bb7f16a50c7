use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait, QueryFilter, QuerySelect, Set,
    TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::cart::{AddItemRequest, UpdateItemRequest},
    entity::{
        cart_items::{ActiveModel as CartItemActive, Column as CartItemCol, Entity as CartItems},
        carts::{ActiveModel as CartActive, Column as CartCol, Entity as Carts, Model as CartModel},
        products::Entity as Products,
        users::Entity as Users,
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::Cart,
    response::{ApiResponse, Meta},
    state::AppState,
};

pub async fn get_cart(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<Cart>> {
    let cart = Carts::find()
        .filter(CartCol::UserId.eq(user.user_id))
        .one(&state.orm)
        .await?;
    let cart = match cart {
        Some(c) => c,
        None => return Err(AppError::NotFound),
    };

    let rows = CartItems::find()
        .filter(CartItemCol::CartId.eq(cart.id))
        .find_also_related(Products)
        .all(&state.orm)
        .await?;

    Ok(ApiResponse::success(
        "OK",
        Cart::project(cart, rows),
        Some(Meta::empty()),
    ))
}

pub async fn add_item(
    state: &AppState,
    user: &AuthUser,
    payload: AddItemRequest,
) -> AppResult<ApiResponse<Cart>> {
    if payload.quantity <= 0 {
        return Err(AppError::BadRequest(
            "quantity must be greater than 0".to_string(),
        ));
    }

    let txn = state.orm.begin().await?;

    let cart = match find_cart_for_update(&txn, user.user_id).await? {
        Some(cart) => cart,
        None => create_cart(&txn, user.user_id).await?,
    };

    let product = Products::find_by_id(payload.product_id).one(&txn).await?;
    let product = match product.filter(|p| p.active) {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };

    let existing = CartItems::find()
        .filter(CartItemCol::CartId.eq(cart.id))
        .filter(CartItemCol::ProductId.eq(product.id))
        .one(&txn)
        .await?;

    // One line per product: adding the same product again raises the quantity.
    match existing {
        Some(item) => {
            let quantity = item.quantity + payload.quantity;
            let mut active: CartItemActive = item.into();
            active.quantity = Set(quantity);
            active.update(&txn).await?;
        }
        None => {
            CartItemActive {
                id: Set(Uuid::new_v4()),
                cart_id: Set(cart.id),
                product_id: Set(product.id),
                quantity: Set(payload.quantity),
                created_at: NotSet,
            }
            .insert(&txn)
            .await?;
        }
    }

    let view = recompute_and_project(&txn, cart).await?;
    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "cart_add_item",
        Some("cart_items"),
        Some(serde_json::json!({ "product_id": payload.product_id, "quantity": payload.quantity })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success("OK", view, Some(Meta::empty())))
}

pub async fn update_item_quantity(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
    payload: UpdateItemRequest,
) -> AppResult<ApiResponse<Cart>> {
    if payload.quantity <= 0 {
        return Err(AppError::BadRequest(
            "quantity must be greater than 0".to_string(),
        ));
    }

    let txn = state.orm.begin().await?;

    let cart = match find_cart_for_update(&txn, user.user_id).await? {
        Some(cart) => cart,
        None => return Err(AppError::NotFound),
    };

    let item = CartItems::find()
        .filter(CartItemCol::CartId.eq(cart.id))
        .filter(CartItemCol::ProductId.eq(product_id))
        .one(&txn)
        .await?;
    let item = match item {
        Some(i) => i,
        None => return Err(AppError::NotFound),
    };

    let mut active: CartItemActive = item.into();
    active.quantity = Set(payload.quantity);
    active.update(&txn).await?;

    let view = recompute_and_project(&txn, cart).await?;
    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "cart_update_item",
        Some("cart_items"),
        Some(serde_json::json!({ "product_id": product_id, "quantity": payload.quantity })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success("OK", view, Some(Meta::empty())))
}

pub async fn remove_item(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
) -> AppResult<ApiResponse<Cart>> {
    let txn = state.orm.begin().await?;

    let cart = match find_cart_for_update(&txn, user.user_id).await? {
        Some(cart) => cart,
        None => return Err(AppError::NotFound),
    };

    // Removing a product that is not in the cart is a no-op.
    CartItems::delete_many()
        .filter(CartItemCol::CartId.eq(cart.id))
        .filter(CartItemCol::ProductId.eq(product_id))
        .exec(&txn)
        .await?;

    let view = recompute_and_project(&txn, cart).await?;
    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "cart_remove_item",
        Some("cart_items"),
        Some(serde_json::json!({ "product_id": product_id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Removed from cart",
        view,
        Some(Meta::empty()),
    ))
}

pub async fn clear(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<Cart>> {
    let txn = state.orm.begin().await?;

    let cart = match find_cart_for_update(&txn, user.user_id).await? {
        Some(cart) => cart,
        None => return Err(AppError::NotFound),
    };

    CartItems::delete_many()
        .filter(CartItemCol::CartId.eq(cart.id))
        .exec(&txn)
        .await?;

    // An emptied cart totals zero by definition; no recompute pass.
    let mut active: CartActive = cart.into();
    active.total = Set(0);
    active.updated_at = Set(Utc::now().into());
    let cart = active.update(&txn).await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "cart_clear",
        Some("cart_items"),
        None,
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Cart cleared",
        Cart::project(cart, Vec::new()),
        Some(Meta::empty()),
    ))
}

async fn find_cart_for_update(
    txn: &DatabaseTransaction,
    user_id: Uuid,
) -> AppResult<Option<CartModel>> {
    Ok(Carts::find()
        .filter(CartCol::UserId.eq(user_id))
        .lock(LockType::Update)
        .one(txn)
        .await?)
}

async fn create_cart(txn: &DatabaseTransaction, user_id: Uuid) -> AppResult<CartModel> {
    let user = Users::find_by_id(user_id).one(txn).await?;
    if user.is_none() {
        return Err(AppError::NotFound);
    }

    Ok(CartActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        total: Set(0),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(txn)
    .await?)
}

/// The cart total is always derived from the current product prices of the
/// lines in the cart, never adjusted incrementally.
async fn recompute_and_project(txn: &DatabaseTransaction, cart: CartModel) -> AppResult<Cart> {
    let rows = CartItems::find()
        .filter(CartItemCol::CartId.eq(cart.id))
        .find_also_related(Products)
        .all(txn)
        .await?;

    let total: i64 = rows
        .iter()
        .filter_map(|(item, product)| {
            product.as_ref().map(|p| p.price * item.quantity as i64)
        })
        .sum();

    let mut active: CartActive = cart.into();
    active.total = Set(total);
    active.updated_at = Set(Utc::now().into());
    let cart = active.update(txn).await?;

    Ok(Cart::project(cart, rows))
}
