#![allow(dead_code)]

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

use storefront_api::{
    audit::AuditEntry,
    config::AppConfig,
    error::{AppError, AppResult},
    mailer::{Email, MailError, Mailer},
    middleware::auth::{AuthUser, Session},
    models::{CartItem, CartLine, ChargeRecord, Item, Order, OrderWithItems, Permission, User},
    payment::{Charge, ChargeRequest, PaymentError, PaymentGateway},
    state::AppState,
    store::{
        EntityStore, ItemChanges, ItemFilter, MemoryStore, NewCharge, NewItem, NewOrder, NewUser,
    },
};

/// Gateway double: records every request and answers from a script.
pub struct FakeGateway {
    pub requests: Mutex<Vec<ChargeRequest>>,
    charge_id: Mutex<String>,
    decline: Mutex<Option<String>>,
    confirmed_amount: Mutex<Option<i64>>,
    during_charge: Mutex<Option<(Arc<MemoryStore>, Uuid, Uuid)>>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            charge_id: Mutex::new("c_123".to_string()),
            decline: Mutex::new(None),
            confirmed_amount: Mutex::new(None),
            during_charge: Mutex::new(None),
        }
    }

    pub fn set_charge_id(&self, id: &str) {
        *self.charge_id.lock() = id.to_string();
    }

    pub fn decline_with(&self, message: &str) {
        *self.decline.lock() = Some(message.to_string());
    }

    /// Answer with `amount` instead of echoing the requested amount.
    pub fn confirm_amount(&self, amount: i64) {
        *self.confirmed_amount.lock() = Some(amount);
    }

    /// While the charge is in flight, add `item_id` to `user_id`'s cart.
    pub fn add_to_cart_during_charge(&self, store: Arc<MemoryStore>, user_id: Uuid, item_id: Uuid) {
        *self.during_charge.lock() = Some((store, user_id, item_id));
    }

    pub fn charge_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn charge(&self, request: ChargeRequest) -> Result<Charge, PaymentError> {
        self.requests.lock().push(request.clone());

        let concurrent = self.during_charge.lock().take();
        if let Some((store, user_id, item_id)) = concurrent {
            store
                .increment_cart_item(user_id, item_id)
                .await
                .map_err(|e| PaymentError::Unavailable(e.to_string()))?;
        }

        if let Some(message) = self.decline.lock().clone() {
            return Err(PaymentError::Declined(message));
        }
        Ok(Charge {
            id: self.charge_id.lock().clone(),
            amount: self.confirmed_amount.lock().unwrap_or(request.amount),
            currency: request.currency,
        })
    }
}

#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<Email>>,
    pub fail: AtomicBool,
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: Email) -> Result<(), MailError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(MailError("smtp down".into()));
        }
        self.sent.lock().push(email);
        Ok(())
    }
}

/// Which post-charge write should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailAt {
    Nothing,
    RecordCharge,
    CreateOrder,
    ClearCart,
}

/// Delegates to a [`MemoryStore`] but can be told to fail one checkout write.
pub struct FlakyStore {
    pub inner: Arc<MemoryStore>,
    pub fail_at: Mutex<FailAt>,
}

impl FlakyStore {
    fn check(&self, stage: FailAt) -> AppResult<()> {
        if *self.fail_at.lock() == stage {
            return Err(AppError::Internal(anyhow::anyhow!("injected {stage:?} failure")));
        }
        Ok(())
    }
}

#[async_trait]
impl EntityStore for FlakyStore {
    async fn find_user(&self, id: Uuid) -> AppResult<Option<User>> {
        self.inner.find_user(id).await
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        self.inner.find_user_by_email(email).await
    }

    async fn find_user_by_reset_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<User>> {
        self.inner.find_user_by_reset_token(token, now).await
    }

    async fn create_user(&self, user: NewUser) -> AppResult<User> {
        self.inner.create_user(user).await
    }

    async fn list_users(&self) -> AppResult<Vec<User>> {
        self.inner.list_users().await
    }

    async fn set_permissions(
        &self,
        user_id: Uuid,
        permissions: &[Permission],
    ) -> AppResult<User> {
        self.inner.set_permissions(user_id, permissions).await
    }

    async fn set_reset_token(
        &self,
        user_id: Uuid,
        token: &str,
        expiry: DateTime<Utc>,
    ) -> AppResult<()> {
        self.inner.set_reset_token(user_id, token, expiry).await
    }

    async fn update_password(&self, user_id: Uuid, password_hash: &str) -> AppResult<User> {
        self.inner.update_password(user_id, password_hash).await
    }

    async fn list_items(
        &self,
        filter: &ItemFilter,
        offset: u64,
        limit: u64,
    ) -> AppResult<Vec<Item>> {
        self.inner.list_items(filter, offset, limit).await
    }

    async fn count_items(&self, filter: &ItemFilter) -> AppResult<i64> {
        self.inner.count_items(filter).await
    }

    async fn find_item(&self, id: Uuid) -> AppResult<Option<Item>> {
        self.inner.find_item(id).await
    }

    async fn create_item(&self, item: NewItem) -> AppResult<Item> {
        self.inner.create_item(item).await
    }

    async fn update_item(&self, id: Uuid, changes: ItemChanges) -> AppResult<Item> {
        self.inner.update_item(id, changes).await
    }

    async fn delete_item(&self, id: Uuid) -> AppResult<Item> {
        self.inner.delete_item(id).await
    }

    async fn find_cart_item(&self, id: Uuid) -> AppResult<Option<CartItem>> {
        self.inner.find_cart_item(id).await
    }

    async fn increment_cart_item(&self, user_id: Uuid, item_id: Uuid) -> AppResult<CartItem> {
        self.inner.increment_cart_item(user_id, item_id).await
    }

    async fn delete_cart_item(&self, id: Uuid) -> AppResult<CartItem> {
        self.inner.delete_cart_item(id).await
    }

    async fn cart_lines(&self, user_id: Uuid) -> AppResult<Vec<CartLine>> {
        self.inner.cart_lines(user_id).await
    }

    async fn delete_cart_items(&self, ids: &[Uuid]) -> AppResult<u64> {
        self.check(FailAt::ClearCart)?;
        self.inner.delete_cart_items(ids).await
    }

    async fn record_charge(&self, charge: NewCharge) -> AppResult<ChargeRecord> {
        self.check(FailAt::RecordCharge)?;
        self.inner.record_charge(charge).await
    }

    async fn pending_charges(&self) -> AppResult<Vec<ChargeRecord>> {
        self.inner.pending_charges().await
    }

    async fn create_order(&self, order: NewOrder) -> AppResult<OrderWithItems> {
        self.check(FailAt::CreateOrder)?;
        self.inner.create_order(order).await
    }

    async fn find_order(&self, id: Uuid) -> AppResult<Option<OrderWithItems>> {
        self.inner.find_order(id).await
    }

    async fn list_orders(&self, user_id: Uuid) -> AppResult<Vec<Order>> {
        self.inner.list_orders(user_id).await
    }

    async fn append_audit(&self, entry: AuditEntry) -> AppResult<()> {
        self.inner.append_audit(entry).await
    }
}

pub struct TestApp {
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub flaky: Arc<FlakyStore>,
    pub payments: Arc<FakeGateway>,
    pub mailer: Arc<RecordingMailer>,
}

impl TestApp {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let flaky = Arc::new(FlakyStore {
            inner: store.clone(),
            fail_at: Mutex::new(FailAt::Nothing),
        });
        let payments = Arc::new(FakeGateway::new());
        let mailer = Arc::new(RecordingMailer::default());
        let state = AppState::new(
            flaky.clone(),
            payments.clone(),
            mailer.clone(),
            AppConfig::for_tests(),
        );
        Self {
            state,
            store,
            flaky,
            payments,
            mailer,
        }
    }

    pub fn fail_at(&self, stage: FailAt) {
        *self.flaky.fail_at.lock() = stage;
    }

    pub async fn user(&self, email: &str, permissions: &[Permission]) -> Session {
        let user = self
            .store
            .create_user(NewUser {
                email: email.to_string(),
                name: email.split('@').next().unwrap_or(email).to_string(),
                password_hash: "not-a-real-hash".to_string(),
                permissions: permissions.to_vec(),
            })
            .await
            .expect("create user");
        Session::authenticated(AuthUser {
            user_id: user.id,
            permissions: user.permissions,
        })
    }

    pub async fn item(&self, owner: &Session, title: &str, price: i64) -> Item {
        let owner = owner.user().expect("signed in owner");
        self.store
            .create_item(NewItem {
                user_id: owner.user_id,
                title: title.to_string(),
                description: format!("{title} description"),
                image: Some(format!("{title}.jpg")),
                large_image: Some(format!("{title}-large.jpg")),
                price,
            })
            .await
            .expect("create item")
    }
}

pub fn user_id(session: &Session) -> Uuid {
    session.user().expect("signed in").user_id
}
