use storefront_api::{
    db::{create_pool, run_migrations},
    models::{ChargeStatus, Permission},
    store::{EntityStore, NewCharge, NewOrder, NewOrderItem, NewUser, OrmStore},
};
use uuid::Uuid;

async fn connect() -> anyhow::Result<Option<OrmStore>> {
    // Allow skipping when no DB is configured in the environment.
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!("Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run store tests.");
            return Ok(None);
        }
    };
    let pool = create_pool(&database_url).await?;
    run_migrations(&pool).await?;
    Ok(Some(OrmStore::new(pool)))
}

fn order_for(user_id: Uuid, charge_id: &str) -> NewOrder {
    NewOrder {
        user_id,
        charge_id: charge_id.to_string(),
        total: 1500,
        items: vec![NewOrderItem {
            title: "Mug".into(),
            description: "Stoneware".into(),
            image: None,
            large_image: None,
            price: 1500,
            quantity: 1,
        }],
    }
}

// Two checkouts replaying one provider charge must land on a single order.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_orders_for_one_charge_share_the_order() -> anyhow::Result<()> {
    let Some(store) = connect().await? else {
        return Ok(());
    };

    let user = store
        .create_user(NewUser {
            email: format!("double-submit-{}@example.com", Uuid::new_v4()),
            name: "Double".into(),
            password_hash: "not-a-real-hash".into(),
            permissions: vec![Permission::User],
        })
        .await?;
    let charge_id = format!("ch_{}", Uuid::new_v4().simple());
    store
        .record_charge(NewCharge {
            charge_id: charge_id.clone(),
            user_id: user.id,
            amount: 1500,
            currency: "usd".into(),
            cart_item_ids: vec![],
        })
        .await?;

    let (first, second) = tokio::join!(
        store.create_order(order_for(user.id, &charge_id)),
        store.create_order(order_for(user.id, &charge_id)),
    );
    let (first, second) = (first?, second?);

    assert_eq!(first.order.id, second.order.id);
    assert_eq!(first.items.len(), 1);
    assert_eq!(second.items.len(), 1);
    assert_eq!(store.list_orders(user.id).await?.len(), 1);

    let still_pending = store
        .pending_charges()
        .await?
        .into_iter()
        .any(|c| c.charge_id == charge_id && c.status == ChargeStatus::Pending);
    assert!(!still_pending);
    Ok(())
}
