use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::{
    audit::AuditEntry,
    error::{AppError, AppResult},
    models::{
        CartItem, CartLine, ChargeRecord, ChargeStatus, Item, Order, OrderItem, OrderWithItems,
        Permission, User,
    },
};

use super::{EntityStore, ItemChanges, ItemFilter, NewCharge, NewItem, NewOrder, NewUser};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    items: HashMap<Uuid, Item>,
    cart_items: HashMap<Uuid, CartItem>,
    charges: HashMap<String, ChargeRecord>,
    orders: HashMap<Uuid, Order>,
    order_items: Vec<OrderItem>,
    audit: Vec<AuditEntry>,
}

impl Tables {
    fn order_with_items(&self, order: &Order) -> OrderWithItems {
        OrderWithItems {
            order: order.clone(),
            items: self
                .order_items
                .iter()
                .filter(|item| item.order_id == order.id)
                .cloned()
                .collect(),
        }
    }
}

/// In-process store. Every call takes one lock, which makes each call atomic the
/// same way a single-statement write is atomic in Postgres.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn audit_entries(&self) -> Vec<AuditEntry> {
        self.tables.lock().audit.clone()
    }

    pub fn order_count(&self) -> usize {
        self.tables.lock().orders.len()
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn find_user(&self, id: Uuid) -> AppResult<Option<User>> {
        Ok(self.tables.lock().users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let tables = self.tables.lock();
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_reset_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<User>> {
        let tables = self.tables.lock();
        Ok(tables
            .users
            .values()
            .find(|u| {
                u.reset_token.as_deref() == Some(token)
                    && u.reset_token_expiry.is_some_and(|expiry| expiry >= now)
            })
            .cloned())
    }

    async fn create_user(&self, user: NewUser) -> AppResult<User> {
        let mut tables = self.tables.lock();
        if tables.users.values().any(|u| u.email == user.email) {
            return Err(AppError::BadRequest("Email is already taken".into()));
        }
        let created = User {
            id: Uuid::new_v4(),
            email: user.email,
            name: user.name,
            password_hash: user.password_hash,
            permissions: user.permissions,
            reset_token: None,
            reset_token_expiry: None,
            created_at: Utc::now(),
        };
        tables.users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn list_users(&self) -> AppResult<Vec<User>> {
        let mut users: Vec<User> = self.tables.lock().users.values().cloned().collect();
        users.sort_by_key(|u| u.created_at);
        Ok(users)
    }

    async fn set_permissions(
        &self,
        user_id: Uuid,
        permissions: &[Permission],
    ) -> AppResult<User> {
        let mut tables = self.tables.lock();
        let user = tables.users.get_mut(&user_id).ok_or(AppError::NotFound)?;
        user.permissions = permissions.to_vec();
        Ok(user.clone())
    }

    async fn set_reset_token(
        &self,
        user_id: Uuid,
        token: &str,
        expiry: DateTime<Utc>,
    ) -> AppResult<()> {
        let mut tables = self.tables.lock();
        let user = tables.users.get_mut(&user_id).ok_or(AppError::NotFound)?;
        user.reset_token = Some(token.to_string());
        user.reset_token_expiry = Some(expiry);
        Ok(())
    }

    async fn update_password(&self, user_id: Uuid, password_hash: &str) -> AppResult<User> {
        let mut tables = self.tables.lock();
        let user = tables.users.get_mut(&user_id).ok_or(AppError::NotFound)?;
        user.password_hash = password_hash.to_string();
        user.reset_token = None;
        user.reset_token_expiry = None;
        Ok(user.clone())
    }

    async fn list_items(
        &self,
        filter: &ItemFilter,
        offset: u64,
        limit: u64,
    ) -> AppResult<Vec<Item>> {
        let tables = self.tables.lock();
        let mut items: Vec<Item> = tables
            .items
            .values()
            .filter(|item| filter.matches(item))
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(items
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn count_items(&self, filter: &ItemFilter) -> AppResult<i64> {
        let tables = self.tables.lock();
        Ok(tables.items.values().filter(|item| filter.matches(item)).count() as i64)
    }

    async fn find_item(&self, id: Uuid) -> AppResult<Option<Item>> {
        Ok(self.tables.lock().items.get(&id).cloned())
    }

    async fn create_item(&self, item: NewItem) -> AppResult<Item> {
        let now = Utc::now();
        let created = Item {
            id: Uuid::new_v4(),
            user_id: item.user_id,
            title: item.title,
            description: item.description,
            image: item.image,
            large_image: item.large_image,
            price: item.price,
            created_at: now,
            updated_at: now,
        };
        self.tables.lock().items.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_item(&self, id: Uuid, changes: ItemChanges) -> AppResult<Item> {
        let mut tables = self.tables.lock();
        let item = tables.items.get_mut(&id).ok_or(AppError::NotFound)?;
        if let Some(title) = changes.title {
            item.title = title;
        }
        if let Some(description) = changes.description {
            item.description = description;
        }
        if let Some(image) = changes.image {
            item.image = Some(image);
        }
        if let Some(large_image) = changes.large_image {
            item.large_image = Some(large_image);
        }
        if let Some(price) = changes.price {
            item.price = price;
        }
        item.updated_at = Utc::now();
        Ok(item.clone())
    }

    async fn delete_item(&self, id: Uuid) -> AppResult<Item> {
        let mut tables = self.tables.lock();
        let item = tables.items.remove(&id).ok_or(AppError::NotFound)?;
        tables.cart_items.retain(|_, cart_item| cart_item.item_id != id);
        Ok(item)
    }

    async fn find_cart_item(&self, id: Uuid) -> AppResult<Option<CartItem>> {
        Ok(self.tables.lock().cart_items.get(&id).cloned())
    }

    async fn increment_cart_item(&self, user_id: Uuid, item_id: Uuid) -> AppResult<CartItem> {
        let mut tables = self.tables.lock();
        if let Some(existing) = tables
            .cart_items
            .values_mut()
            .find(|c| c.user_id == user_id && c.item_id == item_id)
        {
            existing.quantity += 1;
            return Ok(existing.clone());
        }
        let created = CartItem {
            id: Uuid::new_v4(),
            user_id,
            item_id,
            quantity: 1,
            created_at: Utc::now(),
        };
        tables.cart_items.insert(created.id, created.clone());
        Ok(created)
    }

    async fn delete_cart_item(&self, id: Uuid) -> AppResult<CartItem> {
        self.tables
            .lock()
            .cart_items
            .remove(&id)
            .ok_or(AppError::NotFound)
    }

    async fn cart_lines(&self, user_id: Uuid) -> AppResult<Vec<CartLine>> {
        let tables = self.tables.lock();
        let mut cart: Vec<&CartItem> = tables
            .cart_items
            .values()
            .filter(|c| c.user_id == user_id)
            .collect();
        cart.sort_by_key(|c| c.created_at);
        Ok(cart
            .into_iter()
            .filter_map(|c| {
                tables.items.get(&c.item_id).map(|item| CartLine {
                    id: c.id,
                    quantity: c.quantity,
                    item: item.clone(),
                })
            })
            .collect())
    }

    async fn delete_cart_items(&self, ids: &[Uuid]) -> AppResult<u64> {
        let mut tables = self.tables.lock();
        let removed = ids
            .iter()
            .filter(|id| tables.cart_items.remove(*id).is_some())
            .count();
        Ok(removed as u64)
    }

    async fn record_charge(&self, charge: NewCharge) -> AppResult<ChargeRecord> {
        let mut tables = self.tables.lock();
        let now = Utc::now();
        let record = tables
            .charges
            .entry(charge.charge_id.clone())
            .or_insert_with(|| ChargeRecord {
                charge_id: charge.charge_id,
                user_id: charge.user_id,
                amount: charge.amount,
                currency: charge.currency,
                cart_item_ids: charge.cart_item_ids,
                order_id: None,
                status: ChargeStatus::Pending,
                created_at: now,
                updated_at: now,
            });
        Ok(record.clone())
    }

    async fn pending_charges(&self) -> AppResult<Vec<ChargeRecord>> {
        let tables = self.tables.lock();
        let mut pending: Vec<ChargeRecord> = tables
            .charges
            .values()
            .filter(|c| c.status == ChargeStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by_key(|c| c.created_at);
        Ok(pending)
    }

    async fn create_order(&self, order: NewOrder) -> AppResult<OrderWithItems> {
        let mut tables = self.tables.lock();
        if let Some(existing) = tables.orders.values().find(|o| o.charge == order.charge_id) {
            return Ok(tables.order_with_items(existing));
        }

        let now = Utc::now();
        let created = Order {
            id: Uuid::new_v4(),
            user_id: order.user_id,
            total: order.total,
            charge: order.charge_id.clone(),
            created_at: now,
        };
        let items: Vec<OrderItem> = order
            .items
            .into_iter()
            .map(|line| OrderItem {
                id: Uuid::new_v4(),
                order_id: created.id,
                title: line.title,
                description: line.description,
                image: line.image,
                large_image: line.large_image,
                price: line.price,
                quantity: line.quantity,
                created_at: now,
            })
            .collect();

        if let Some(charge) = tables.charges.get_mut(&order.charge_id) {
            charge.status = ChargeStatus::Reconciled;
            charge.order_id = Some(created.id);
            charge.updated_at = now;
        }
        tables.orders.insert(created.id, created.clone());
        tables.order_items.extend(items.iter().cloned());

        Ok(OrderWithItems {
            order: created,
            items,
        })
    }

    async fn find_order(&self, id: Uuid) -> AppResult<Option<OrderWithItems>> {
        let tables = self.tables.lock();
        Ok(tables
            .orders
            .get(&id)
            .map(|order| tables.order_with_items(order)))
    }

    async fn list_orders(&self, user_id: Uuid) -> AppResult<Vec<Order>> {
        let tables = self.tables.lock();
        let mut orders: Vec<Order> = tables
            .orders
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn append_audit(&self, entry: AuditEntry) -> AppResult<()> {
        self.tables.lock().audit.push(entry);
        Ok(())
    }
}
