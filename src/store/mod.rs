//! Typed capability interface over persisted entities.
//!
//! Handlers never build queries themselves; every read and write they need is a method
//! here. Writes are atomic per call. Nothing spans calls, so multi-step flows such as
//! checkout must tolerate a failure between two calls.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    audit::AuditEntry,
    error::AppResult,
    models::{CartItem, CartLine, ChargeRecord, Item, Order, OrderWithItems, Permission, User},
};

pub mod memory;
pub mod orm;

pub use memory::MemoryStore;
pub use orm::OrmStore;

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub permissions: Vec<Permission>,
}

#[derive(Debug, Clone)]
pub struct NewItem {
    pub user_id: Uuid,
    pub title: String,
    pub description: String,
    pub image: Option<String>,
    pub large_image: Option<String>,
    pub price: i64,
}

/// Partial update; `None` leaves the field as is.
#[derive(Debug, Clone, Default)]
pub struct ItemChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub large_image: Option<String>,
    pub price: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct ItemFilter {
    /// Matches items whose title or description contains this text.
    pub search: Option<String>,
}

impl ItemFilter {
    pub fn matches(&self, item: &Item) -> bool {
        match self.search.as_deref() {
            Some(term) => item.title.contains(term) || item.description.contains(term),
            None => true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewCharge {
    pub charge_id: String,
    pub user_id: Uuid,
    pub amount: i64,
    pub currency: String,
    pub cart_item_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderItem {
    pub title: String,
    pub description: String,
    pub image: Option<String>,
    pub large_image: Option<String>,
    pub price: i64,
    pub quantity: i32,
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: Uuid,
    pub charge_id: String,
    pub total: i64,
    pub items: Vec<NewOrderItem>,
}

#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn find_user(&self, id: Uuid) -> AppResult<Option<User>>;

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>>;

    /// User holding `token` whose reset window has not closed at `now`.
    async fn find_user_by_reset_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<User>>;

    /// Fails with `BadRequest` when the email is taken.
    async fn create_user(&self, user: NewUser) -> AppResult<User>;

    async fn list_users(&self) -> AppResult<Vec<User>>;

    async fn set_permissions(&self, user_id: Uuid, permissions: &[Permission])
    -> AppResult<User>;

    async fn set_reset_token(
        &self,
        user_id: Uuid,
        token: &str,
        expiry: DateTime<Utc>,
    ) -> AppResult<()>;

    /// Stores a new password hash and clears any reset token.
    async fn update_password(&self, user_id: Uuid, password_hash: &str) -> AppResult<User>;

    /// Newest first.
    async fn list_items(&self, filter: &ItemFilter, offset: u64, limit: u64)
    -> AppResult<Vec<Item>>;

    async fn count_items(&self, filter: &ItemFilter) -> AppResult<i64>;

    async fn find_item(&self, id: Uuid) -> AppResult<Option<Item>>;

    async fn create_item(&self, item: NewItem) -> AppResult<Item>;

    async fn update_item(&self, id: Uuid, changes: ItemChanges) -> AppResult<Item>;

    /// Also removes cart items pointing at the item. Order items are untouched.
    async fn delete_item(&self, id: Uuid) -> AppResult<Item>;

    async fn find_cart_item(&self, id: Uuid) -> AppResult<Option<CartItem>>;

    /// Atomic upsert on `(user_id, item_id)`: inserts quantity 1 or adds 1.
    async fn increment_cart_item(&self, user_id: Uuid, item_id: Uuid) -> AppResult<CartItem>;

    async fn delete_cart_item(&self, id: Uuid) -> AppResult<CartItem>;

    /// The user's cart items joined with their items, oldest first.
    async fn cart_lines(&self, user_id: Uuid) -> AppResult<Vec<CartLine>>;

    /// Deletes exactly these ids and returns how many rows went away.
    async fn delete_cart_items(&self, ids: &[Uuid]) -> AppResult<u64>;

    /// Idempotent on `charge_id`: an existing record is returned unchanged.
    async fn record_charge(&self, charge: NewCharge) -> AppResult<ChargeRecord>;

    async fn pending_charges(&self) -> AppResult<Vec<ChargeRecord>>;

    /// Writes the order, its items and marks the charge reconciled as one unit.
    /// Returns the existing order when one was already created for the charge.
    async fn create_order(&self, order: NewOrder) -> AppResult<OrderWithItems>;

    async fn find_order(&self, id: Uuid) -> AppResult<Option<OrderWithItems>>;

    /// Newest first.
    async fn list_orders(&self, user_id: Uuid) -> AppResult<Vec<Order>>;

    async fn append_audit(&self, entry: AuditEntry) -> AppResult<()>;
}
