use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Permission {
    Admin,
    User,
    ItemCreate,
    ItemUpdate,
    ItemDelete,
    PermissionUpdate,
}

impl Permission {
    pub const ALL: [Permission; 6] = [
        Permission::Admin,
        Permission::User,
        Permission::ItemCreate,
        Permission::ItemUpdate,
        Permission::ItemDelete,
        Permission::PermissionUpdate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::Admin => "ADMIN",
            Permission::User => "USER",
            Permission::ItemCreate => "ITEMCREATE",
            Permission::ItemUpdate => "ITEMUPDATE",
            Permission::ItemDelete => "ITEMDELETE",
            Permission::PermissionUpdate => "PERMISSIONUPDATE",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Permission::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| AppError::BadRequest(format!("unknown permission {s}")))
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    #[serde(skip)]
    pub password_hash: String,
    pub permissions: Vec<Permission>,
    #[serde(skip)]
    pub reset_token: Option<String>,
    #[serde(skip)]
    pub reset_token_expiry: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Item {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: String,
    pub image: Option<String>,
    pub large_image: Option<String>,
    /// Minor currency unit.
    pub price: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct CartItem {
    pub id: Uuid,
    pub user_id: Uuid,
    pub item_id: Uuid,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
}

/// A cart item resolved against its item, as read for display or checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct CartLine {
    pub id: Uuid,
    pub quantity: i32,
    pub item: Item,
}

impl CartLine {
    pub fn line_total(&self) -> Option<i64> {
        self.item.price.checked_mul(i64::from(self.quantity))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub total: i64,
    pub charge: String,
    pub created_at: DateTime<Utc>,
}

/// Copy of an item's fields at purchase time. Never points back at the live item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub title: String,
    pub description: String,
    pub image: Option<String>,
    pub large_image: Option<String>,
    pub price: i64,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct OrderWithItems {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ChargeStatus {
    Pending,
    Reconciled,
}

impl ChargeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChargeStatus::Pending => "pending",
            ChargeStatus::Reconciled => "reconciled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(ChargeStatus::Pending),
            "reconciled" => Some(ChargeStatus::Reconciled),
            _ => None,
        }
    }
}

/// Ledger entry written after the provider confirms a charge and before the order exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ChargeRecord {
    pub charge_id: String,
    pub user_id: Uuid,
    pub amount: i64,
    pub currency: String,
    pub cart_item_ids: Vec<Uuid>,
    pub order_id: Option<Uuid>,
    pub status: ChargeStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permissions_round_trip_through_their_tokens() {
        for permission in Permission::ALL {
            assert_eq!(permission.as_str().parse::<Permission>().ok(), Some(permission));
        }
        assert_eq!("itemdelete".parse::<Permission>().ok(), Some(Permission::ItemDelete));
        assert!("SUPERUSER".parse::<Permission>().is_err());
    }

    #[test]
    fn permission_serializes_as_uppercase_token() {
        let json = serde_json::to_string(&vec![Permission::PermissionUpdate, Permission::User])
            .expect("serialize");
        assert_eq!(json, r#"["PERMISSIONUPDATE","USER"]"#);
    }

    #[test]
    fn line_total_detects_overflow() {
        let now = Utc::now();
        let line = CartLine {
            id: Uuid::new_v4(),
            quantity: 3,
            item: Item {
                id: Uuid::new_v4(),
                user_id: Uuid::new_v4(),
                title: "Mug".into(),
                description: "Ceramic".into(),
                image: None,
                large_image: None,
                price: i64::MAX / 2,
                created_at: now,
                updated_at: now,
            },
        };
        assert_eq!(line.line_total(), None);
    }
}
