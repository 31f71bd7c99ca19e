use crate::{
    dto::orders::ChargeList,
    error::AppResult,
    middleware::auth::{Session, ensure_permission},
    models::Permission,
    response::{ApiResponse, Meta},
    state::AppState,
};

/// Charges the provider confirmed for which no order was completed.
pub async fn pending_charges(
    state: &AppState,
    session: &Session,
) -> AppResult<ApiResponse<ChargeList>> {
    let user = session.require()?;
    ensure_permission(user, &[Permission::Admin])?;

    let items = state.store.pending_charges().await?;
    if !items.is_empty() {
        tracing::warn!(count = items.len(), "unreconciled charges present");
    }
    let total = items.len() as i64;
    Ok(ApiResponse::success(
        "Pending charges",
        ChargeList { items },
        Some(Meta::total(total)),
    ))
}
