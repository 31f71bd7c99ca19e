use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::users::{UpdatePermissionsRequest, UserList},
    error::AppResult,
    middleware::auth::{Session, ensure_permission},
    models::{Permission, User},
    response::{ApiResponse, Meta},
    state::AppState,
};

const USER_ADMIN: [Permission; 2] = [Permission::Admin, Permission::PermissionUpdate];

pub async fn list_users(state: &AppState, session: &Session) -> AppResult<ApiResponse<UserList>> {
    let user = session.require()?;
    ensure_permission(user, &USER_ADMIN)?;

    let items = state.store.list_users().await?;
    let total = items.len() as i64;
    Ok(ApiResponse::success(
        "Users",
        UserList { items },
        Some(Meta::total(total)),
    ))
}

pub async fn update_permissions(
    state: &AppState,
    session: &Session,
    user_id: Uuid,
    payload: UpdatePermissionsRequest,
) -> AppResult<ApiResponse<User>> {
    let caller = session.require()?;
    ensure_permission(caller, &USER_ADMIN)?;

    let permissions = dedupe(payload.permissions);
    let updated = state.store.set_permissions(user_id, &permissions).await?;
    tracing::info!(
        by = %caller.user_id,
        user_id = %updated.id,
        permissions = ?updated.permissions,
        "permissions updated"
    );

    log_audit(
        state,
        Some(caller.user_id),
        "permissions_update",
        Some("users"),
        Some(serde_json::json!({ "user_id": updated.id, "permissions": updated.permissions })),
    )
    .await;

    Ok(ApiResponse::success(
        "Permissions updated",
        updated,
        Some(Meta::empty()),
    ))
}

fn dedupe(permissions: Vec<Permission>) -> Vec<Permission> {
    let mut unique = Vec::with_capacity(permissions.len());
    for permission in permissions {
        if !unique.contains(&permission) {
            unique.push(permission);
        }
    }
    unique
}
