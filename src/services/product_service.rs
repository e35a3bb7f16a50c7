use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::Expr;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    cache::{self, CatalogCache, scope},
    dto::products::{CreateProductRequest, ProductList, UpdateProductRequest},
    entity::{
        categories::Entity as Categories,
        products::{ActiveModel, Column, Entity as Products},
        stores::Entity as Stores,
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::Product,
    response::{ApiResponse, Meta},
    routes::params::{Pagination, ProductListQuery, ProductSearchQuery, ProductSortBy, SortOrder},
    state::AppState,
};

/// A page of projected products plus its total, in the shape the cache
/// stores it.
#[derive(Serialize, Deserialize)]
struct CachedPage {
    items: Vec<Product>,
    total: i64,
}

pub async fn list_products(
    state: &AppState,
    query: ProductListQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let (page, limit, offset) = query.pagination.normalize();
    let sort_by = query.sort_by.unwrap_or(ProductSortBy::CreatedAt);
    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);

    let cache_key = cache::key(
        scope::PRODUCTS,
        format!("{page}_{limit}_{}_{}", sort_by.as_sql(), sort_order.as_sql()),
    );
    if let Some(cached) = state.cache.get::<CachedPage>(&cache_key) {
        let meta = Meta::new(page, limit, cached.total);
        return Ok(ApiResponse::success(
            "Products",
            ProductList {
                items: cached.items,
            },
            Some(meta),
        ));
    }

    let sort_col = sort_column(sort_by);
    let mut finder = Products::find().filter(Column::Active.eq(true));
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(sort_col),
        SortOrder::Desc => finder.order_by_desc(sort_col),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let items: Vec<Product> = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Product::from)
        .collect();

    state.cache.put(
        cache_key,
        &CachedPage {
            items: items.clone(),
            total,
        },
    );

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Products",
        ProductList { items },
        Some(meta),
    ))
}

/// Keyword search stays uncached; its keyspace is unbounded.
pub async fn search_products(
    state: &AppState,
    query: ProductSearchQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let (page, limit, offset) = query.pagination.normalize();
    let mut condition = Condition::all().add(Column::Active.eq(true));

    if let Some(search) = query.q.as_ref().filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        condition = condition.add(
            Condition::any()
                .add(Expr::col(Column::Name).ilike(pattern.clone()))
                .add(Expr::col(Column::Description).ilike(pattern)),
        );
    }

    if let Some(min_price) = query.min_price {
        condition = condition.add(Column::Price.gte(min_price));
    }

    if let Some(max_price) = query.max_price {
        condition = condition.add(Column::Price.lte(max_price));
    }

    let sort_by = query.sort_by.unwrap_or(ProductSortBy::CreatedAt);
    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    let sort_col = sort_column(sort_by);

    let mut finder = Products::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(sort_col),
        SortOrder::Desc => finder.order_by_desc(sort_col),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Product::from)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Products",
        ProductList { items },
        Some(meta),
    ))
}

pub async fn get_product(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Product>> {
    let cache_key = cache::key(scope::PRODUCT, id);
    if let Some(product) = state.cache.get::<Product>(&cache_key) {
        return Ok(ApiResponse::success("Product", product, None));
    }

    let product = Products::find_by_id(id).one(&state.orm).await?;
    let product = match product.filter(|p| p.active) {
        Some(p) => Product::from(p),
        None => return Err(AppError::NotFound),
    };

    state.cache.put(cache_key, &product);
    Ok(ApiResponse::success("Product", product, None))
}

pub async fn recent_products(state: &AppState) -> AppResult<ApiResponse<ProductList>> {
    if let Some(items) = state.cache.get::<Vec<Product>>(scope::RECENT_PRODUCTS) {
        return Ok(ApiResponse::success(
            "Recent products",
            ProductList { items },
            None,
        ));
    }

    let items: Vec<Product> = Products::find()
        .filter(Column::Active.eq(true))
        .order_by_desc(Column::CreatedAt)
        .limit(10)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Product::from)
        .collect();

    state.cache.put(scope::RECENT_PRODUCTS, &items);
    Ok(ApiResponse::success(
        "Recent products",
        ProductList { items },
        None,
    ))
}

pub async fn list_by_store(
    state: &AppState,
    store_id: Uuid,
    pagination: Pagination,
) -> AppResult<ApiResponse<ProductList>> {
    if Stores::find_by_id(store_id)
        .one(&state.orm)
        .await?
        .is_none()
    {
        return Err(AppError::NotFound);
    }

    let (page, limit, offset) = pagination.normalize();
    let cache_key = cache::key(
        scope::STORE_PRODUCTS,
        format!("{store_id}:{page}_{limit}"),
    );
    if let Some(cached) = state.cache.get::<CachedPage>(&cache_key) {
        let meta = Meta::new(page, limit, cached.total);
        return Ok(ApiResponse::success(
            "Products",
            ProductList {
                items: cached.items,
            },
            Some(meta),
        ));
    }

    let finder = Products::find()
        .filter(Column::StoreId.eq(store_id))
        .filter(Column::Active.eq(true))
        .order_by_desc(Column::CreatedAt);

    let total = finder.clone().count(&state.orm).await? as i64;
    let items: Vec<Product> = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Product::from)
        .collect();

    state.cache.put(
        cache_key,
        &CachedPage {
            items: items.clone(),
            total,
        },
    );

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Products",
        ProductList { items },
        Some(meta),
    ))
}

pub async fn list_by_category(
    state: &AppState,
    category_id: Uuid,
    pagination: Pagination,
) -> AppResult<ApiResponse<ProductList>> {
    if Categories::find_by_id(category_id)
        .one(&state.orm)
        .await?
        .is_none()
    {
        return Err(AppError::NotFound);
    }

    let (page, limit, offset) = pagination.normalize();
    let cache_key = cache::key(
        scope::CATEGORY_PRODUCTS,
        format!("{category_id}:{page}_{limit}"),
    );
    if let Some(cached) = state.cache.get::<CachedPage>(&cache_key) {
        let meta = Meta::new(page, limit, cached.total);
        return Ok(ApiResponse::success(
            "Products",
            ProductList {
                items: cached.items,
            },
            Some(meta),
        ));
    }

    let finder = Products::find()
        .filter(Column::CategoryId.eq(category_id))
        .filter(Column::Active.eq(true))
        .order_by_desc(Column::CreatedAt);

    let total = finder.clone().count(&state.orm).await? as i64;
    let items: Vec<Product> = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Product::from)
        .collect();

    state.cache.put(
        cache_key,
        &CachedPage {
            items: items.clone(),
            total,
        },
    );

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Products",
        ProductList { items },
        Some(meta),
    ))
}

pub async fn create_product(
    state: &AppState,
    user: &AuthUser,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    if payload.price <= 0 {
        return Err(AppError::BadRequest(
            "price must be greater than 0".to_string(),
        ));
    }
    if payload.stock < 0 {
        return Err(AppError::BadRequest("stock cannot be negative".to_string()));
    }

    let store = Stores::find_by_id(payload.store_id).one(&state.orm).await?;
    let store = match store {
        Some(s) => s,
        None => return Err(AppError::NotFound),
    };
    if !store.active {
        return Err(AppError::BadRequest(
            "Cannot add products to an inactive store".into(),
        ));
    }
    if user.role != "admin" && store.owner_id != user.user_id {
        return Err(AppError::Forbidden);
    }

    if let Some(category_id) = payload.category_id {
        if Categories::find_by_id(category_id)
            .one(&state.orm)
            .await?
            .is_none()
        {
            return Err(AppError::NotFound);
        }
    }

    let id = Uuid::new_v4();
    let active = ActiveModel {
        id: Set(id),
        store_id: Set(payload.store_id),
        category_id: Set(payload.category_id),
        name: Set(payload.name),
        description: Set(payload.description),
        image_url: Set(payload.image_url),
        price: Set(payload.price),
        stock: Set(payload.stock),
        active: Set(true),
        created_at: NotSet,
    };
    let product = active.insert(&state.orm).await?;

    evict_after_create(&state.cache, product.store_id, product.category_id);

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "product_create",
        Some("products"),
        Some(serde_json::json!({ "product_id": product.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Product created",
        product.into(),
        Some(Meta::empty()),
    ))
}

pub async fn update_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    let existing = Products::find_by_id(id).one(&state.orm).await?;
    let existing = match existing {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };

    let store = Stores::find_by_id(existing.store_id).one(&state.orm).await?;
    let store = match store {
        Some(s) => s,
        None => return Err(AppError::NotFound),
    };
    if user.role != "admin" && store.owner_id != user.user_id {
        return Err(AppError::Forbidden);
    }

    if let Some(price) = payload.price {
        if price <= 0 {
            return Err(AppError::BadRequest(
                "price must be greater than 0".to_string(),
            ));
        }
    }
    if let Some(stock) = payload.stock {
        if stock < 0 {
            return Err(AppError::BadRequest("stock cannot be negative".to_string()));
        }
    }
    if let Some(category_id) = payload.category_id {
        if Categories::find_by_id(category_id)
            .one(&state.orm)
            .await?
            .is_none()
        {
            return Err(AppError::NotFound);
        }
    }

    let mut active: ActiveModel = existing.into();
    if let Some(category_id) = payload.category_id {
        active.category_id = Set(Some(category_id));
    }
    if let Some(name) = payload.name {
        active.name = Set(name);
    }
    if let Some(description) = payload.description {
        active.description = Set(Some(description));
    }
    if let Some(image_url) = payload.image_url {
        active.image_url = Set(Some(image_url));
    }
    if let Some(price) = payload.price {
        active.price = Set(price);
    }
    if let Some(stock) = payload.stock {
        active.stock = Set(stock);
    }

    let product = active.update(&state.orm).await?;

    evict_product(&state.cache, product.id);

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "product_update",
        Some("products"),
        Some(serde_json::json!({ "product_id": product.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Updated",
        product.into(),
        Some(Meta::empty()),
    ))
}

/// Products are never hard-deleted; they go inactive and drop out of every
/// catalog read.
pub async fn delete_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let existing = Products::find_by_id(id).one(&state.orm).await?;
    let existing = match existing {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };

    let store = Stores::find_by_id(existing.store_id).one(&state.orm).await?;
    let store = match store {
        Some(s) => s,
        None => return Err(AppError::NotFound),
    };
    if user.role != "admin" && store.owner_id != user.user_id {
        return Err(AppError::Forbidden);
    }

    let mut active: ActiveModel = existing.into();
    active.active = Set(false);
    let product = active.update(&state.orm).await?;

    evict_product(&state.cache, product.id);

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "product_delete",
        Some("products"),
        Some(serde_json::json!({ "product_id": id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

/// A new product can only show up in the general listings, its own store's
/// listings and its category's listings; evict exactly those.
fn evict_after_create(cache: &CatalogCache, store_id: Uuid, category_id: Option<Uuid>) {
    cache.invalidate_scope(scope::PRODUCTS);
    cache.invalidate(scope::RECENT_PRODUCTS);
    cache.invalidate_scope(&cache::key(scope::STORE_PRODUCTS, store_id));
    if let Some(category_id) = category_id {
        cache.invalidate_scope(&cache::key(scope::CATEGORY_PRODUCTS, category_id));
    }
}

/// Updates and soft deletes may move a product between categories or out of
/// the catalog entirely, so every listing scope goes.
pub fn evict_product(cache: &CatalogCache, product_id: Uuid) {
    cache.invalidate(&cache::key(scope::PRODUCT, product_id));
    cache.invalidate_scope(scope::PRODUCTS);
    cache.invalidate(scope::RECENT_PRODUCTS);
    cache.invalidate_scope(scope::STORE_PRODUCTS);
    cache.invalidate_scope(scope::CATEGORY_PRODUCTS);
}

fn sort_column(sort_by: ProductSortBy) -> Column {
    match sort_by {
        ProductSortBy::CreatedAt => Column::CreatedAt,
        ProductSortBy::Price => Column::Price,
        ProductSortBy::Name => Column::Name,
    }
}
