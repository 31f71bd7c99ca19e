use argon2::{
    Argon2, PasswordHasher,
    password_hash::{SaltString, rand_core::OsRng},
};
use storefront_api::{
    config::AppConfig,
    db::{create_pool, run_migrations},
    models::Permission,
    store::{EntityStore, ItemFilter, NewItem, NewUser, OrmStore},
};
use uuid::Uuid;

const ITEMS: [(&str, &str, i64); 4] = [
    ("Belt", "A belt that holds your pants up", 2000),
    ("Hat", "Keeps the sun off", 3500),
    ("Scarf", "Warm and long", 1500),
    ("Socks", "A pair of wool socks", 900),
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    run_migrations(&pool).await?;
    let store = OrmStore::new(pool);

    let admin_id = ensure_user(&store, "admin@example.com", "Admin", "admin123").await?;
    store.set_permissions(admin_id, &Permission::ALL).await?;
    let user_id = ensure_user(&store, "user@example.com", "User", "user123").await?;
    let seeded = seed_items(&store, admin_id).await?;

    println!("Seed completed. Admin ID: {admin_id}, User ID: {user_id}, items added: {seeded}");
    Ok(())
}

async fn ensure_user(
    store: &OrmStore,
    email: &str,
    name: &str,
    password: &str,
) -> anyhow::Result<Uuid> {
    if let Some(existing) = store.find_user_by_email(email).await? {
        return Ok(existing.id);
    }

    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?
        .to_string();

    let user = store
        .create_user(NewUser {
            email: email.to_string(),
            name: name.to_string(),
            password_hash,
            permissions: vec![Permission::User],
        })
        .await?;
    Ok(user.id)
}

async fn seed_items(store: &OrmStore, owner: Uuid) -> anyhow::Result<usize> {
    if store.count_items(&ItemFilter::default()).await? > 0 {
        return Ok(0);
    }

    for (title, description, price) in ITEMS {
        store
            .create_item(NewItem {
                user_id: owner,
                title: title.to_string(),
                description: description.to_string(),
                image: None,
                large_image: None,
                price,
            })
            .await?;
    }
    Ok(ITEMS.len())
}
