use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::cart::{AddToCartRequest, CartView},
    error::{AppError, AppResult},
    middleware::auth::Session,
    models::{CartItem, CartLine},
    response::{ApiResponse, Meta},
    state::AppState,
};

/// Σ price × quantity, failing instead of wrapping on overflow.
pub fn cart_total(lines: &[CartLine]) -> AppResult<i64> {
    lines.iter().try_fold(0_i64, |tally, line| {
        line.line_total()
            .and_then(|amount| tally.checked_add(amount))
            .ok_or_else(|| AppError::BadRequest("Cart total is too large".into()))
    })
}

pub async fn list_cart(state: &AppState, session: &Session) -> AppResult<ApiResponse<CartView>> {
    let user = session.require()?;
    let items = state.store.cart_lines(user.user_id).await?;
    let subtotal = cart_total(&items)?;
    let total = items.len() as i64;

    Ok(ApiResponse::success(
        "OK",
        CartView { items, subtotal },
        Some(Meta::total(total)),
    ))
}

pub async fn add_to_cart(
    state: &AppState,
    session: &Session,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<CartItem>> {
    let user = session.require()?;

    if state.store.find_item(payload.item_id).await?.is_none() {
        return Err(AppError::NotFound);
    }

    let cart_item = state
        .store
        .increment_cart_item(user.user_id, payload.item_id)
        .await?;
    tracing::debug!(
        user_id = %user.user_id,
        item_id = %payload.item_id,
        quantity = cart_item.quantity,
        "cart updated"
    );

    log_audit(
        state,
        Some(user.user_id),
        "cart_add",
        Some("cart_items"),
        Some(serde_json::json!({ "item_id": payload.item_id, "quantity": cart_item.quantity })),
    )
    .await;

    Ok(ApiResponse::success("Added to cart", cart_item, None))
}

pub async fn remove_from_cart(
    state: &AppState,
    session: &Session,
    id: Uuid,
) -> AppResult<ApiResponse<CartItem>> {
    let user = session.require()?;

    let cart_item = state
        .store
        .find_cart_item(id)
        .await?
        .ok_or(AppError::NotFound)?;
    if cart_item.user_id != user.user_id {
        tracing::warn!(user_id = %user.user_id, cart_item_id = %id, "attempt to remove foreign cart item");
        return Err(AppError::NotOwner);
    }

    let removed = state.store.delete_cart_item(id).await?;

    log_audit(
        state,
        Some(user.user_id),
        "cart_remove",
        Some("cart_items"),
        Some(serde_json::json!({ "cart_item_id": id, "item_id": removed.item_id })),
    )
    .await;

    Ok(ApiResponse::success(
        "Removed from cart",
        removed,
        Some(Meta::empty()),
    ))
}
