use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::stores::{CreateStoreRequest, StoreList, UpdateStoreRequest},
    entity::{
        stores::{ActiveModel, Column, Entity as Stores},
        users::Entity as Users,
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::Store,
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    state::AppState,
};

pub async fn list_stores(
    state: &AppState,
    pagination: Pagination,
) -> AppResult<ApiResponse<StoreList>> {
    let (page, limit, offset) = pagination.normalize();
    let finder = Stores::find()
        .filter(Column::Active.eq(true))
        .order_by_asc(Column::Name);

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Store::from)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Stores", StoreList { items }, Some(meta)))
}

pub async fn get_store(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Store>> {
    let store = Stores::find_by_id(id).one(&state.orm).await?;
    match store {
        Some(s) => Ok(ApiResponse::success("Store", Store::from(s), None)),
        None => Err(AppError::NotFound),
    }
}

pub async fn list_by_owner(
    state: &AppState,
    owner_id: Uuid,
) -> AppResult<ApiResponse<StoreList>> {
    if Users::find_by_id(owner_id).one(&state.orm).await?.is_none() {
        return Err(AppError::NotFound);
    }

    let items = Stores::find()
        .filter(Column::OwnerId.eq(owner_id))
        .order_by_asc(Column::Name)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Store::from)
        .collect();

    Ok(ApiResponse::success(
        "Stores",
        StoreList { items },
        Some(Meta::empty()),
    ))
}

pub async fn create_store(
    state: &AppState,
    user: &AuthUser,
    payload: CreateStoreRequest,
) -> AppResult<ApiResponse<Store>> {
    if Users::find_by_id(user.user_id)
        .one(&state.orm)
        .await?
        .is_none()
    {
        return Err(AppError::NotFound);
    }

    // Pre-check; the unique index turns a lost race into a 409.
    if store_name_taken(state, &payload.name, None).await? {
        return Err(AppError::BadRequest("Store name is already in use".into()));
    }

    let store = ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(payload.name),
        description: Set(payload.description),
        logo_url: Set(payload.logo_url),
        owner_id: Set(user.user_id),
        active: Set(true),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "store_create",
        Some("stores"),
        Some(serde_json::json!({ "store_id": store.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Store created",
        store.into(),
        Some(Meta::empty()),
    ))
}

pub async fn update_store(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateStoreRequest,
) -> AppResult<ApiResponse<Store>> {
    let existing = Stores::find_by_id(id).one(&state.orm).await?;
    let existing = match existing {
        Some(s) => s,
        None => return Err(AppError::NotFound),
    };

    if user.role != "admin" && existing.owner_id != user.user_id {
        return Err(AppError::Forbidden);
    }

    if let Some(name) = payload.name.as_ref() {
        if name != &existing.name && store_name_taken(state, name, Some(existing.id)).await? {
            return Err(AppError::BadRequest("Store name is already in use".into()));
        }
    }

    let mut active: ActiveModel = existing.into();
    if let Some(name) = payload.name {
        active.name = Set(name);
    }
    if let Some(description) = payload.description {
        active.description = Set(Some(description));
    }
    if let Some(logo_url) = payload.logo_url {
        active.logo_url = Set(Some(logo_url));
    }

    let store = active.update(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "store_update",
        Some("stores"),
        Some(serde_json::json!({ "store_id": store.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Updated",
        store.into(),
        Some(Meta::empty()),
    ))
}

/// Stores are deactivated, never hard-deleted; their products keep their
/// history but the store drops out of the public listing.
pub async fn deactivate_store(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let existing = Stores::find_by_id(id).one(&state.orm).await?;
    let existing = match existing {
        Some(s) => s,
        None => return Err(AppError::NotFound),
    };

    if user.role != "admin" && existing.owner_id != user.user_id {
        return Err(AppError::Forbidden);
    }

    let mut active: ActiveModel = existing.into();
    active.active = Set(false);
    active.update(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "store_deactivate",
        Some("stores"),
        Some(serde_json::json!({ "store_id": id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Store deactivated",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

async fn store_name_taken(
    state: &AppState,
    name: &str,
    exclude: Option<Uuid>,
) -> AppResult<bool> {
    let mut finder = Stores::find().filter(Column::Name.eq(name));
    if let Some(id) = exclude {
        finder = finder.filter(Column::Id.ne(id));
    }
    Ok(finder.count(&state.orm).await? > 0)
}
