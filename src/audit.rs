use serde_json::Value;
use uuid::Uuid;

use crate::state::AppState;

#[derive(Debug, Clone, PartialEq)]
pub struct AuditEntry {
    pub user_id: Option<Uuid>,
    pub action: String,
    pub resource: Option<String>,
    pub metadata: Option<Value>,
}

/// Appends an audit entry. Failures are logged and never fail the caller's operation.
pub async fn log_audit(
    state: &AppState,
    user_id: Option<Uuid>,
    action: &str,
    resource: Option<&str>,
    metadata: Option<Value>,
) {
    let entry = AuditEntry {
        user_id,
        action: action.to_string(),
        resource: resource.map(str::to_string),
        metadata,
    };

    if let Err(err) = state.store.append_audit(entry).await {
        tracing::warn!(error = %err, action, "audit log failed");
    }
}
