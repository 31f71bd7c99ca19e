use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::items::{CreateItemRequest, ItemList, UpdateItemRequest},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, Session, ensure_permission},
    models::{Item, Permission},
    response::{ApiResponse, Meta},
    routes::params::ItemQuery,
    state::AppState,
    store::{ItemChanges, ItemFilter, NewItem},
};

pub async fn list_items(state: &AppState, query: ItemQuery) -> AppResult<ApiResponse<ItemList>> {
    let (page, limit, offset) = query.pagination().normalize()?;
    let filter = ItemFilter {
        search: query.search(),
    };

    let total = state.store.count_items(&filter).await?;
    let items = state
        .store
        .list_items(&filter, offset as u64, limit as u64)
        .await?;

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Items", ItemList { items }, Some(meta)))
}

pub async fn get_item(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Item>> {
    let item = state.store.find_item(id).await?.ok_or(AppError::NotFound)?;
    Ok(ApiResponse::success("Item", item, None))
}

pub async fn create_item(
    state: &AppState,
    session: &Session,
    payload: CreateItemRequest,
) -> AppResult<ApiResponse<Item>> {
    let user = session.require()?;
    let title = payload.title.trim().to_string();
    if title.is_empty() {
        return Err(AppError::BadRequest("Title is required".into()));
    }
    validate_price(payload.price)?;

    let item = state
        .store
        .create_item(NewItem {
            user_id: user.user_id,
            title,
            description: payload.description,
            image: payload.image,
            large_image: payload.large_image,
            price: payload.price,
        })
        .await?;

    log_audit(
        state,
        Some(user.user_id),
        "item_create",
        Some("items"),
        Some(serde_json::json!({ "item_id": item.id })),
    )
    .await;

    Ok(ApiResponse::success(
        "Item created",
        item,
        Some(Meta::empty()),
    ))
}

pub async fn update_item(
    state: &AppState,
    session: &Session,
    id: Uuid,
    payload: UpdateItemRequest,
) -> AppResult<ApiResponse<Item>> {
    let user = session.require()?;
    let existing = state.store.find_item(id).await?.ok_or(AppError::NotFound)?;
    ensure_owner_or(user, &existing, &[Permission::Admin, Permission::ItemUpdate])?;

    if let Some(price) = payload.price {
        validate_price(price)?;
    }
    let title = payload.title.map(|t| t.trim().to_string());
    if title.as_deref().is_some_and(str::is_empty) {
        return Err(AppError::BadRequest("Title is required".into()));
    }

    let item = state
        .store
        .update_item(
            id,
            ItemChanges {
                title,
                description: payload.description,
                image: payload.image,
                large_image: payload.large_image,
                price: payload.price,
            },
        )
        .await?;

    log_audit(
        state,
        Some(user.user_id),
        "item_update",
        Some("items"),
        Some(serde_json::json!({ "item_id": item.id })),
    )
    .await;

    Ok(ApiResponse::success("Updated", item, Some(Meta::empty())))
}

pub async fn delete_item(
    state: &AppState,
    session: &Session,
    id: Uuid,
) -> AppResult<ApiResponse<Item>> {
    let user = session.require()?;
    let existing = state.store.find_item(id).await?.ok_or(AppError::NotFound)?;
    ensure_owner_or(user, &existing, &[Permission::Admin, Permission::ItemDelete])?;

    let item = state.store.delete_item(id).await?;

    log_audit(
        state,
        Some(user.user_id),
        "item_delete",
        Some("items"),
        Some(serde_json::json!({ "item_id": item.id, "title": item.title })),
    )
    .await;

    Ok(ApiResponse::success("Deleted", item, Some(Meta::empty())))
}

/// Owners may always change their own items; everyone else needs one of `required`.
fn ensure_owner_or(user: &AuthUser, item: &Item, required: &[Permission]) -> AppResult<()> {
    if item.user_id == user.user_id {
        return Ok(());
    }
    ensure_permission(user, required)
}

fn validate_price(price: i64) -> AppResult<()> {
    if price < 0 {
        return Err(AppError::BadRequest("Price must not be negative".into()));
    }
    Ok(())
}
