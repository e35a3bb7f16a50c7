use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    cache::scope,
    dto::categories::{CategoryList, CreateCategoryRequest},
    entity::categories::{ActiveModel, Column, Entity as Categories},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::Category,
    response::{ApiResponse, Meta},
    state::AppState,
};

pub async fn list_categories(state: &AppState) -> AppResult<ApiResponse<CategoryList>> {
    if let Some(cached) = state.cache.get::<CategoryList>(scope::CATEGORIES) {
        return Ok(ApiResponse::success("Categories", cached, None));
    }

    let items: Vec<Category> = Categories::find()
        .order_by_asc(Column::Name)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Category::from)
        .collect();

    let list = CategoryList { items };
    state.cache.put(scope::CATEGORIES, &list);
    Ok(ApiResponse::success("Categories", list, None))
}

pub async fn get_category(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Category>> {
    let category = Categories::find_by_id(id).one(&state.orm).await?;
    match category {
        Some(c) => Ok(ApiResponse::success("Category", Category::from(c), None)),
        None => Err(AppError::NotFound),
    }
}

pub async fn create_category(
    state: &AppState,
    user: &AuthUser,
    payload: CreateCategoryRequest,
) -> AppResult<ApiResponse<Category>> {
    ensure_admin(user)?;

    let taken = Categories::find()
        .filter(Column::Name.eq(payload.name.as_str()))
        .count(&state.orm)
        .await?
        > 0;
    if taken {
        return Err(AppError::BadRequest(
            "Category name is already in use".into(),
        ));
    }

    let category = ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(payload.name),
        description: Set(payload.description),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    state.cache.invalidate(scope::CATEGORIES);

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "category_create",
        Some("categories"),
        Some(serde_json::json!({ "category_id": category.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Category created",
        category.into(),
        Some(Meta::empty()),
    ))
}
