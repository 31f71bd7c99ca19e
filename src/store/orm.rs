use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, Condition, DatabaseConnection,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, SqlxPostgresConnector,
    TransactionTrait,
    sea_query::{Expr, OnConflict},
};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    audit::AuditEntry,
    db::DbPool,
    entity::{
        cart_items::{Column as CartCol, Entity as CartItems, Model as CartItemModel},
        charges::{
            ActiveModel as ChargeActive, Column as ChargeCol, Entity as Charges,
            Model as ChargeModel,
        },
        items::{ActiveModel as ItemActive, Column as ItemCol, Entity as Items, Model as ItemModel},
        order_items::{
            ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems,
            Model as OrderItemModel,
        },
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
        users::{ActiveModel as UserActive, Column as UserCol, Entity as Users, Model as UserModel},
    },
    error::{AppError, AppResult},
    models::{
        CartItem, CartLine, ChargeRecord, ChargeStatus, Item, Order, OrderItem, OrderWithItems,
        Permission, User,
    },
};

use super::{EntityStore, ItemChanges, ItemFilter, NewCharge, NewItem, NewOrder, NewUser};

/// Postgres store. CRUD and relations go through SeaORM; the cart upsert and the audit
/// insert are plain SQL on the same pool.
#[derive(Clone)]
pub struct OrmStore {
    orm: DatabaseConnection,
    pool: DbPool,
}

impl OrmStore {
    pub fn new(pool: DbPool) -> Self {
        let orm = SqlxPostgresConnector::from_sqlx_postgres_pool(pool.clone());
        Self { orm, pool }
    }
}

#[async_trait]
impl EntityStore for OrmStore {
    async fn find_user(&self, id: Uuid) -> AppResult<Option<User>> {
        let user = Users::find_by_id(id).one(&self.orm).await?;
        Ok(user.map(user_from_entity))
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let user = Users::find()
            .filter(UserCol::Email.eq(email))
            .one(&self.orm)
            .await?;
        Ok(user.map(user_from_entity))
    }

    async fn find_user_by_reset_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<User>> {
        let user = Users::find()
            .filter(
                Condition::all()
                    .add(UserCol::ResetToken.eq(token))
                    .add(UserCol::ResetTokenExpiry.gte(now)),
            )
            .one(&self.orm)
            .await?;
        Ok(user.map(user_from_entity))
    }

    async fn create_user(&self, user: NewUser) -> AppResult<User> {
        let taken = Users::find()
            .filter(UserCol::Email.eq(user.email.as_str()))
            .one(&self.orm)
            .await?;
        if taken.is_some() {
            return Err(AppError::BadRequest("Email is already taken".into()));
        }

        let created = UserActive {
            id: Set(Uuid::new_v4()),
            email: Set(user.email),
            name: Set(user.name),
            password_hash: Set(user.password_hash),
            permissions: Set(permissions_to_json(&user.permissions)),
            reset_token: Set(None),
            reset_token_expiry: Set(None),
            created_at: NotSet,
        }
        .insert(&self.orm)
        .await?;

        Ok(user_from_entity(created))
    }

    async fn list_users(&self) -> AppResult<Vec<User>> {
        let users = Users::find()
            .order_by_asc(UserCol::CreatedAt)
            .all(&self.orm)
            .await?
            .into_iter()
            .map(user_from_entity)
            .collect();
        Ok(users)
    }

    async fn set_permissions(
        &self,
        user_id: Uuid,
        permissions: &[Permission],
    ) -> AppResult<User> {
        let user = Users::find_by_id(user_id)
            .one(&self.orm)
            .await?
            .ok_or(AppError::NotFound)?;

        let mut active: UserActive = user.into();
        active.permissions = Set(permissions_to_json(permissions));
        let user = active.update(&self.orm).await?;
        Ok(user_from_entity(user))
    }

    async fn set_reset_token(
        &self,
        user_id: Uuid,
        token: &str,
        expiry: DateTime<Utc>,
    ) -> AppResult<()> {
        let user = Users::find_by_id(user_id)
            .one(&self.orm)
            .await?
            .ok_or(AppError::NotFound)?;

        let mut active: UserActive = user.into();
        active.reset_token = Set(Some(token.to_string()));
        active.reset_token_expiry = Set(Some(expiry.into()));
        active.update(&self.orm).await?;
        Ok(())
    }

    async fn update_password(&self, user_id: Uuid, password_hash: &str) -> AppResult<User> {
        let user = Users::find_by_id(user_id)
            .one(&self.orm)
            .await?
            .ok_or(AppError::NotFound)?;

        let mut active: UserActive = user.into();
        active.password_hash = Set(password_hash.to_string());
        active.reset_token = Set(None);
        active.reset_token_expiry = Set(None);
        let user = active.update(&self.orm).await?;
        Ok(user_from_entity(user))
    }

    async fn list_items(
        &self,
        filter: &ItemFilter,
        offset: u64,
        limit: u64,
    ) -> AppResult<Vec<Item>> {
        let items = Items::find()
            .filter(item_condition(filter))
            .order_by_desc(ItemCol::CreatedAt)
            .limit(limit)
            .offset(offset)
            .all(&self.orm)
            .await?
            .into_iter()
            .map(item_from_entity)
            .collect();
        Ok(items)
    }

    async fn count_items(&self, filter: &ItemFilter) -> AppResult<i64> {
        let total = Items::find()
            .filter(item_condition(filter))
            .count(&self.orm)
            .await?;
        Ok(total as i64)
    }

    async fn find_item(&self, id: Uuid) -> AppResult<Option<Item>> {
        let item = Items::find_by_id(id).one(&self.orm).await?;
        Ok(item.map(item_from_entity))
    }

    async fn create_item(&self, item: NewItem) -> AppResult<Item> {
        let created = ItemActive {
            id: Set(Uuid::new_v4()),
            user_id: Set(item.user_id),
            title: Set(item.title),
            description: Set(item.description),
            image: Set(item.image),
            large_image: Set(item.large_image),
            price: Set(item.price),
            created_at: NotSet,
            updated_at: NotSet,
        }
        .insert(&self.orm)
        .await?;
        Ok(item_from_entity(created))
    }

    async fn update_item(&self, id: Uuid, changes: ItemChanges) -> AppResult<Item> {
        let item = Items::find_by_id(id)
            .one(&self.orm)
            .await?
            .ok_or(AppError::NotFound)?;

        let mut active: ItemActive = item.into();
        if let Some(title) = changes.title {
            active.title = Set(title);
        }
        if let Some(description) = changes.description {
            active.description = Set(description);
        }
        if let Some(image) = changes.image {
            active.image = Set(Some(image));
        }
        if let Some(large_image) = changes.large_image {
            active.large_image = Set(Some(large_image));
        }
        if let Some(price) = changes.price {
            active.price = Set(price);
        }
        active.updated_at = Set(Utc::now().into());
        let item = active.update(&self.orm).await?;
        Ok(item_from_entity(item))
    }

    async fn delete_item(&self, id: Uuid) -> AppResult<Item> {
        let item = Items::find_by_id(id)
            .one(&self.orm)
            .await?
            .ok_or(AppError::NotFound)?;
        // cart_items rows go with it through ON DELETE CASCADE
        Items::delete_by_id(id).exec(&self.orm).await?;
        Ok(item_from_entity(item))
    }

    async fn find_cart_item(&self, id: Uuid) -> AppResult<Option<CartItem>> {
        let cart_item = CartItems::find_by_id(id).one(&self.orm).await?;
        Ok(cart_item.map(cart_item_from_entity))
    }

    async fn increment_cart_item(&self, user_id: Uuid, item_id: Uuid) -> AppResult<CartItem> {
        let cart_item = sqlx::query_as::<_, CartItem>(
            r#"
            INSERT INTO cart_items (id, user_id, item_id, quantity)
            VALUES ($1, $2, $3, 1)
            ON CONFLICT (user_id, item_id)
            DO UPDATE SET quantity = cart_items.quantity + 1
            RETURNING id, user_id, item_id, quantity, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(item_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(cart_item)
    }

    async fn delete_cart_item(&self, id: Uuid) -> AppResult<CartItem> {
        let cart_item = CartItems::find_by_id(id)
            .one(&self.orm)
            .await?
            .ok_or(AppError::NotFound)?;
        CartItems::delete_by_id(id).exec(&self.orm).await?;
        Ok(cart_item_from_entity(cart_item))
    }

    async fn cart_lines(&self, user_id: Uuid) -> AppResult<Vec<CartLine>> {
        let rows = CartItems::find()
            .filter(CartCol::UserId.eq(user_id))
            .order_by_asc(CartCol::CreatedAt)
            .find_also_related(Items)
            .all(&self.orm)
            .await?;

        let lines = rows
            .into_iter()
            .filter_map(|(cart_item, item)| match item {
                Some(item) => Some(CartLine {
                    id: cart_item.id,
                    quantity: cart_item.quantity,
                    item: item_from_entity(item),
                }),
                None => {
                    tracing::warn!(cart_item_id = %cart_item.id, "cart item without item skipped");
                    None
                }
            })
            .collect();
        Ok(lines)
    }

    async fn delete_cart_items(&self, ids: &[Uuid]) -> AppResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = CartItems::delete_many()
            .filter(CartCol::Id.is_in(ids.iter().copied()))
            .exec(&self.orm)
            .await?;
        Ok(result.rows_affected)
    }

    async fn record_charge(&self, charge: NewCharge) -> AppResult<ChargeRecord> {
        let charge_id = charge.charge_id.clone();
        let active = ChargeActive {
            charge_id: Set(charge.charge_id),
            user_id: Set(charge.user_id),
            amount: Set(charge.amount),
            currency: Set(charge.currency),
            cart_item_ids: Set(uuids_to_json(&charge.cart_item_ids)),
            order_id: Set(None),
            status: Set(ChargeStatus::Pending.as_str().to_string()),
            created_at: NotSet,
            updated_at: NotSet,
        };
        Charges::insert(active)
            .on_conflict(OnConflict::column(ChargeCol::ChargeId).do_nothing().to_owned())
            .exec_without_returning(&self.orm)
            .await?;

        let record = Charges::find_by_id(charge_id)
            .one(&self.orm)
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("charge record vanished")))?;
        Ok(charge_from_entity(record))
    }

    async fn pending_charges(&self) -> AppResult<Vec<ChargeRecord>> {
        let charges = Charges::find()
            .filter(ChargeCol::Status.eq(ChargeStatus::Pending.as_str()))
            .order_by_asc(ChargeCol::CreatedAt)
            .all(&self.orm)
            .await?
            .into_iter()
            .map(charge_from_entity)
            .collect();
        Ok(charges)
    }

    async fn create_order(&self, order: NewOrder) -> AppResult<OrderWithItems> {
        let txn = self.orm.begin().await?;

        // A concurrent checkout replaying the same charge waits on the unique charge
        // column here and then skips its insert.
        let order_id = Uuid::new_v4();
        let inserted = Orders::insert(OrderActive {
            id: Set(order_id),
            user_id: Set(order.user_id),
            total: Set(order.total),
            charge: Set(order.charge_id.clone()),
            created_at: NotSet,
        })
        .on_conflict(OnConflict::column(OrderCol::Charge).do_nothing().to_owned())
        .exec_without_returning(&txn)
        .await?;

        if inserted == 0 {
            let existing = Orders::find()
                .filter(OrderCol::Charge.eq(order.charge_id.as_str()))
                .one(&txn)
                .await?
                .ok_or_else(|| AppError::Internal(anyhow::anyhow!("order for charge vanished")))?;
            let items = OrderItems::find()
                .filter(OrderItemCol::OrderId.eq(existing.id))
                .all(&txn)
                .await?;
            txn.commit().await?;
            tracing::info!(
                charge_id = %order.charge_id,
                order_id = %existing.id,
                "order already exists for charge"
            );
            return Ok(order_with_items(existing, items));
        }

        let created = Orders::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("order insert vanished")))?;

        let mut items = Vec::with_capacity(order.items.len());
        for line in order.items {
            let item = OrderItemActive {
                id: Set(Uuid::new_v4()),
                order_id: Set(created.id),
                title: Set(line.title),
                description: Set(line.description),
                image: Set(line.image),
                large_image: Set(line.large_image),
                price: Set(line.price),
                quantity: Set(line.quantity),
                created_at: NotSet,
            }
            .insert(&txn)
            .await?;
            items.push(item);
        }

        Charges::update_many()
            .col_expr(ChargeCol::Status, Expr::value(ChargeStatus::Reconciled.as_str()))
            .col_expr(ChargeCol::OrderId, Expr::value(created.id))
            .col_expr(ChargeCol::UpdatedAt, Expr::value(Utc::now()))
            .filter(ChargeCol::ChargeId.eq(order.charge_id.as_str()))
            .exec(&txn)
            .await?;

        txn.commit().await?;
        Ok(order_with_items(created, items))
    }

    async fn find_order(&self, id: Uuid) -> AppResult<Option<OrderWithItems>> {
        let order = match Orders::find_by_id(id).one(&self.orm).await? {
            Some(o) => o,
            None => return Ok(None),
        };
        let items = OrderItems::find()
            .filter(OrderItemCol::OrderId.eq(order.id))
            .all(&self.orm)
            .await?;
        Ok(Some(order_with_items(order, items)))
    }

    async fn list_orders(&self, user_id: Uuid) -> AppResult<Vec<Order>> {
        let orders = Orders::find()
            .filter(OrderCol::UserId.eq(user_id))
            .order_by_desc(OrderCol::CreatedAt)
            .all(&self.orm)
            .await?
            .into_iter()
            .map(order_from_entity)
            .collect();
        Ok(orders)
    }

    async fn append_audit(&self, entry: AuditEntry) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs (id, user_id, action, resource, metadata)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(entry.user_id)
        .bind(entry.action)
        .bind(entry.resource)
        .bind(entry.metadata)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn item_condition(filter: &ItemFilter) -> Condition {
    match filter.search.as_deref() {
        Some(term) => Condition::any()
            .add(ItemCol::Title.contains(term))
            .add(ItemCol::Description.contains(term)),
        None => Condition::all(),
    }
}

fn permissions_to_json(permissions: &[Permission]) -> Value {
    Value::Array(
        permissions
            .iter()
            .map(|p| Value::String(p.as_str().to_string()))
            .collect(),
    )
}

fn permissions_from_json(value: &Value) -> Vec<Permission> {
    let Some(tokens) = value.as_array() else {
        return Vec::new();
    };
    tokens
        .iter()
        .filter_map(|token| {
            let parsed = token.as_str().map(str::parse::<Permission>);
            match parsed {
                Some(Ok(permission)) => Some(permission),
                _ => {
                    tracing::warn!(%token, "ignoring unknown permission");
                    None
                }
            }
        })
        .collect()
}

fn uuids_to_json(ids: &[Uuid]) -> Value {
    Value::Array(ids.iter().map(|id| Value::String(id.to_string())).collect())
}

fn uuids_from_json(value: &Value) -> Vec<Uuid> {
    value
        .as_array()
        .map(|ids| {
            ids.iter()
                .filter_map(|id| id.as_str().and_then(|s| Uuid::parse_str(s).ok()))
                .collect()
        })
        .unwrap_or_default()
}

fn user_from_entity(model: UserModel) -> User {
    User {
        id: model.id,
        email: model.email,
        name: model.name,
        password_hash: model.password_hash,
        permissions: permissions_from_json(&model.permissions),
        reset_token: model.reset_token,
        reset_token_expiry: model.reset_token_expiry.map(|dt| dt.with_timezone(&Utc)),
        created_at: model.created_at.with_timezone(&Utc),
    }
}

fn item_from_entity(model: ItemModel) -> Item {
    Item {
        id: model.id,
        user_id: model.user_id,
        title: model.title,
        description: model.description,
        image: model.image,
        large_image: model.large_image,
        price: model.price,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

fn cart_item_from_entity(model: CartItemModel) -> CartItem {
    CartItem {
        id: model.id,
        user_id: model.user_id,
        item_id: model.item_id,
        quantity: model.quantity,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

fn charge_from_entity(model: ChargeModel) -> ChargeRecord {
    let status = ChargeStatus::parse(&model.status).unwrap_or_else(|| {
        tracing::warn!(charge_id = %model.charge_id, status = %model.status, "unknown charge status");
        ChargeStatus::Pending
    });
    ChargeRecord {
        cart_item_ids: uuids_from_json(&model.cart_item_ids),
        charge_id: model.charge_id,
        user_id: model.user_id,
        amount: model.amount,
        currency: model.currency,
        order_id: model.order_id,
        status,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

fn order_from_entity(model: OrderModel) -> Order {
    Order {
        id: model.id,
        user_id: model.user_id,
        total: model.total,
        charge: model.charge,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

fn order_item_from_entity(model: OrderItemModel) -> OrderItem {
    OrderItem {
        id: model.id,
        order_id: model.order_id,
        title: model.title,
        description: model.description,
        image: model.image,
        large_image: model.large_image,
        price: model.price,
        quantity: model.quantity,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

fn order_with_items(order: OrderModel, items: Vec<OrderItemModel>) -> OrderWithItems {
    OrderWithItems {
        order: order_from_entity(order),
        items: items.into_iter().map(order_item_from_entity).collect(),
    }
}
