mod common;

use common::{TestApp, user_id};
use storefront_api::{
    dto::cart::AddToCartRequest,
    error::AppError,
    middleware::auth::Session,
    models::Permission,
    services::cart_service,
    store::EntityStore,
};
use uuid::Uuid;

#[tokio::test]
async fn adding_twice_increments_one_line() -> anyhow::Result<()> {
    let app = TestApp::new();
    let seller = app.user("seller@example.com", &[Permission::User]).await;
    let buyer = app.user("buyer@example.com", &[Permission::User]).await;
    let hat = app.item(&seller, "Hat", 1000).await;

    let first = cart_service::add_to_cart(&app.state, &buyer, AddToCartRequest { item_id: hat.id })
        .await?
        .data
        .expect("cart item");
    assert_eq!(first.quantity, 1);

    let second =
        cart_service::add_to_cart(&app.state, &buyer, AddToCartRequest { item_id: hat.id })
            .await?
            .data
            .expect("cart item");
    assert_eq!(second.id, first.id);
    assert_eq!(second.quantity, 2);

    let view = cart_service::list_cart(&app.state, &buyer)
        .await?
        .data
        .expect("cart");
    assert_eq!(view.items.len(), 1);
    assert_eq!(view.subtotal, 2000);
    Ok(())
}

#[tokio::test]
async fn concurrent_adds_are_not_lost() -> anyhow::Result<()> {
    let app = TestApp::new();
    let seller = app.user("seller@example.com", &[Permission::User]).await;
    let buyer = app.user("buyer@example.com", &[Permission::User]).await;
    let hat = app.item(&seller, "Hat", 1000).await;

    let item_id = hat.id;
    let mut handles = Vec::new();
    for _ in 0..8 {
        let state = app.state.clone();
        let session = buyer.clone();
        handles.push(tokio::spawn(async move {
            cart_service::add_to_cart(&state, &session, AddToCartRequest { item_id }).await
        }));
    }
    for handle in handles {
        handle.await??;
    }

    let lines = app.store.cart_lines(user_id(&buyer)).await?;
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].quantity, 8);
    Ok(())
}

#[tokio::test]
async fn adding_requires_sign_in_and_an_existing_item() {
    let app = TestApp::new();
    let err = cart_service::add_to_cart(
        &app.state,
        &Session::anonymous(),
        AddToCartRequest {
            item_id: Uuid::new_v4(),
        },
    )
    .await
    .expect_err("anonymous");
    assert!(matches!(err, AppError::Unauthenticated));

    let buyer = app.user("buyer@example.com", &[Permission::User]).await;
    let err = cart_service::add_to_cart(
        &app.state,
        &buyer,
        AddToCartRequest {
            item_id: Uuid::new_v4(),
        },
    )
    .await
    .expect_err("missing item");
    assert!(matches!(err, AppError::NotFound));
}

#[tokio::test]
async fn only_the_owner_can_remove_a_cart_item() -> anyhow::Result<()> {
    let app = TestApp::new();
    let seller = app.user("seller@example.com", &[Permission::User]).await;
    let buyer = app.user("buyer@example.com", &[Permission::User]).await;
    let other = app
        .user("other@example.com", &[Permission::User, Permission::Admin])
        .await;
    let hat = app.item(&seller, "Hat", 1000).await;

    let line = cart_service::add_to_cart(&app.state, &buyer, AddToCartRequest { item_id: hat.id })
        .await?
        .data
        .expect("cart item");

    let err = cart_service::remove_from_cart(&app.state, &other, line.id)
        .await
        .expect_err("not owner");
    assert!(matches!(err, AppError::NotOwner));

    let removed = cart_service::remove_from_cart(&app.state, &buyer, line.id)
        .await?
        .data
        .expect("removed");
    assert_eq!(removed.id, line.id);

    let err = cart_service::remove_from_cart(&app.state, &buyer, line.id)
        .await
        .expect_err("already gone");
    assert!(matches!(err, AppError::NotFound));
    Ok(())
}

#[tokio::test]
async fn deleting_an_item_drops_it_from_carts() -> anyhow::Result<()> {
    let app = TestApp::new();
    let seller = app.user("seller@example.com", &[Permission::User]).await;
    let buyer = app.user("buyer@example.com", &[Permission::User]).await;
    let hat = app.item(&seller, "Hat", 1000).await;
    cart_service::add_to_cart(&app.state, &buyer, AddToCartRequest { item_id: hat.id }).await?;

    app.store.delete_item(hat.id).await?;

    let view = cart_service::list_cart(&app.state, &buyer)
        .await?
        .data
        .expect("cart");
    assert!(view.items.is_empty());
    assert_eq!(view.subtotal, 0);
    Ok(())
}
