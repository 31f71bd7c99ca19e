use axum::{Json, Router, extract::State, routing::get};

use crate::{
    dto::orders::ChargeList,
    error::AppResult,
    middleware::auth::Session,
    response::ApiResponse,
    services::admin_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/charges", get(pending_charges))
}

#[utoipa::path(
    get,
    path = "/api/admin/charges",
    responses(
        (status = 200, description = "Charges taken without a completed order", body = ApiResponse<ChargeList>),
        (status = 403, description = "Requires ADMIN"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn pending_charges(
    State(state): State<AppState>,
    session: Session,
) -> AppResult<Json<ApiResponse<ChargeList>>> {
    let resp = admin_service::pending_charges(&state, &session).await?;
    Ok(Json(resp))
}
