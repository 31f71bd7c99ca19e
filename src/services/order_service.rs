use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::orders::{CheckoutRequest, OrderList},
    error::{AppError, AppResult, PostChargeStage},
    middleware::auth::{Session, authorize},
    models::{CartLine, OrderWithItems, Permission},
    payment::{Charge, ChargeRequest},
    response::{ApiResponse, Meta},
    services::cart_service::cart_total,
    state::AppState,
    store::{NewCharge, NewOrder, NewOrderItem},
};

/// Turns the caller's cart into a paid order.
///
/// The cart is read once and that snapshot alone prices the charge, fills the order
/// and decides which cart rows are cleared. Nothing is written before the provider
/// confirms the charge; anything that fails after it is raised as
/// [`AppError::PostCharge`] and leaves a pending entry in the charge ledger.
pub async fn checkout(
    state: &AppState,
    session: &Session,
    payload: CheckoutRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let user = session.require()?;
    let token = payload.token.trim();
    if token.is_empty() {
        return Err(AppError::BadRequest("A payment token is required".into()));
    }

    let snapshot = state.store.cart_lines(user.user_id).await?;
    if snapshot.is_empty() {
        return Err(AppError::BadRequest("Your cart is empty".into()));
    }
    let amount = cart_total(&snapshot)?;
    tracing::info!(user_id = %user.user_id, amount, lines = snapshot.len(), "charging");

    let charge = state
        .payments
        .charge(ChargeRequest {
            amount,
            currency: state.config.currency.clone(),
            source: token.to_string(),
            description: format!("Storefront order for {}", user.user_id),
            idempotency_key: idempotency_key(user.user_id, token, &snapshot),
        })
        .await
        .inspect_err(|err| {
            tracing::warn!(user_id = %user.user_id, amount, error = %err, "charge failed");
        })?;

    if charge.amount != amount {
        tracing::warn!(
            charge_id = %charge.id,
            computed = amount,
            confirmed = charge.amount,
            "provider confirmed a different amount"
        );
    }

    let cart_item_ids: Vec<Uuid> = snapshot.iter().map(|line| line.id).collect();

    state
        .store
        .record_charge(NewCharge {
            charge_id: charge.id.clone(),
            user_id: user.user_id,
            amount: charge.amount,
            currency: charge.currency.clone(),
            cart_item_ids: cart_item_ids.clone(),
        })
        .await
        .map_err(|err| post_charge_failure(&charge, PostChargeStage::RecordCharge, err))?;

    let order = state
        .store
        .create_order(NewOrder {
            user_id: user.user_id,
            charge_id: charge.id.clone(),
            total: charge.amount,
            items: materialize_order_items(&snapshot),
        })
        .await
        .map_err(|err| post_charge_failure(&charge, PostChargeStage::CreateOrder, err))?;

    let cleared = state
        .store
        .delete_cart_items(&cart_item_ids)
        .await
        .map_err(|err| post_charge_failure(&charge, PostChargeStage::ClearCart, err))?;

    tracing::info!(
        user_id = %user.user_id,
        order_id = %order.order.id,
        charge_id = %charge.id,
        total = order.order.total,
        cleared,
        "order created"
    );

    log_audit(
        state,
        Some(user.user_id),
        "checkout",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.order.id, "charge_id": charge.id })),
    )
    .await;

    Ok(ApiResponse::success(
        "Checkout success",
        order,
        Some(Meta::empty()),
    ))
}

pub async fn list_orders(
    state: &AppState,
    session: &Session,
) -> AppResult<ApiResponse<OrderList>> {
    let user = session.require()?;
    let orders = state.store.list_orders(user.user_id).await?;
    let total = orders.len() as i64;

    Ok(ApiResponse::success(
        "Ok",
        OrderList { items: orders },
        Some(Meta::total(total)),
    ))
}

pub async fn get_order(
    state: &AppState,
    session: &Session,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let user = session.require()?;
    let order = state.store.find_order(id).await?.ok_or(AppError::NotFound)?;

    let owns_order = order.order.user_id == user.user_id;
    if !owns_order && !authorize(&user.permissions, &[Permission::Admin]) {
        return Err(AppError::NotOwner);
    }

    Ok(ApiResponse::success("OK", order, Some(Meta::empty())))
}

/// Copies item fields so later edits or deletion of the item never reach the order.
pub fn materialize_order_items(snapshot: &[CartLine]) -> Vec<NewOrderItem> {
    snapshot
        .iter()
        .map(|line| NewOrderItem {
            title: line.item.title.clone(),
            description: line.item.description.clone(),
            image: line.item.image.clone(),
            large_image: line.item.large_image.clone(),
            price: line.item.price,
            quantity: line.quantity,
        })
        .collect()
}

/// Stable for one user, one payment token and one exact cart, so a retried checkout
/// replays the original provider charge.
pub fn idempotency_key(user_id: Uuid, token: &str, snapshot: &[CartLine]) -> String {
    let mut lines: Vec<String> = snapshot
        .iter()
        .map(|line| format!("{}:{}", line.id, line.quantity))
        .collect();
    lines.sort();
    let name = format!("{user_id}|{token}|{}", lines.join(","));
    Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string()
}

fn post_charge_failure(charge: &Charge, stage: PostChargeStage, err: AppError) -> AppError {
    tracing::error!(
        charge_id = %charge.id,
        amount = charge.amount,
        %stage,
        error = %err,
        "charge taken but checkout did not complete; reconcile this charge"
    );
    AppError::PostCharge {
        charge_id: charge.id.clone(),
        stage,
        source: Box::new(err),
    }
}
