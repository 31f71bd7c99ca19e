mod common;

use std::sync::atomic::Ordering;

use chrono::{Duration, Utc};
use common::TestApp;
use storefront_api::{
    dto::auth::{RequestResetRequest, ResetPasswordRequest, SigninRequest, SignupRequest},
    error::AppError,
    middleware::auth::{Session, decode_token},
    models::Permission,
    services::auth_service,
    store::EntityStore,
};

fn signup_request(email: &str, password: &str) -> SignupRequest {
    SignupRequest {
        email: email.to_string(),
        name: "Wes".to_string(),
        password: password.to_string(),
    }
}

#[tokio::test]
async fn signup_then_signin() -> anyhow::Result<()> {
    let app = TestApp::new();

    let created = auth_service::signup(&app.state, signup_request("Wes@Example.com", "pw123"))
        .await?
        .data
        .expect("session");
    assert_eq!(created.user.email, "wes@example.com");
    assert_eq!(created.user.permissions, vec![Permission::User]);
    assert_eq!(
        decode_token(&created.token, &app.state.config.jwt_secret).ok(),
        Some(created.user.id)
    );

    let signed_in = auth_service::signin(
        &app.state,
        SigninRequest {
            email: "wes@example.com".into(),
            password: "pw123".into(),
        },
    )
    .await?
    .data
    .expect("session");
    assert_eq!(signed_in.user.id, created.user.id);

    let err = auth_service::signin(
        &app.state,
        SigninRequest {
            email: "wes@example.com".into(),
            password: "wrong".into(),
        },
    )
    .await
    .expect_err("bad password");
    assert!(matches!(err, AppError::BadRequest(_)));
    Ok(())
}

#[tokio::test]
async fn duplicate_email_is_rejected() -> anyhow::Result<()> {
    let app = TestApp::new();
    auth_service::signup(&app.state, signup_request("wes@example.com", "pw")).await?;

    let err = auth_service::signup(&app.state, signup_request("WES@example.com", "pw"))
        .await
        .expect_err("duplicate");
    assert!(matches!(err, AppError::BadRequest(_)));
    Ok(())
}

#[tokio::test]
async fn me_is_empty_for_anonymous_requests() -> anyhow::Result<()> {
    let app = TestApp::new();
    let resp = auth_service::me(&app.state, &Session::anonymous()).await?;
    assert!(matches!(resp.data, Some(None)));

    let session = app.user("wes@example.com", &[Permission::User]).await;
    let resp = auth_service::me(&app.state, &session).await?;
    let user = resp.data.flatten().expect("user");
    assert_eq!(user.email, "wes@example.com");
    Ok(())
}

#[tokio::test]
async fn password_reset_round_trip() -> anyhow::Result<()> {
    let app = TestApp::new();
    auth_service::signup(&app.state, signup_request("wes@example.com", "old-pw")).await?;

    auth_service::request_reset(
        &app.state,
        RequestResetRequest {
            email: "wes@example.com".into(),
        },
    )
    .await?;

    let sent = app.mailer.sent.lock().clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "wes@example.com");

    let user = app
        .store
        .find_user_by_email("wes@example.com")
        .await?
        .expect("user");
    let reset_token = user.reset_token.clone().expect("reset token");
    assert!(sent[0].html.contains(&reset_token));

    let err = auth_service::reset_password(
        &app.state,
        ResetPasswordRequest {
            reset_token: reset_token.clone(),
            password: "new-pw".into(),
            confirm_password: "other".into(),
        },
    )
    .await
    .expect_err("mismatch");
    assert!(matches!(err, AppError::BadRequest(_)));

    let session = auth_service::reset_password(
        &app.state,
        ResetPasswordRequest {
            reset_token: reset_token.clone(),
            password: "new-pw".into(),
            confirm_password: "new-pw".into(),
        },
    )
    .await?
    .data
    .expect("session");
    assert_eq!(session.user.id, user.id);

    // the token is single use
    let err = auth_service::reset_password(
        &app.state,
        ResetPasswordRequest {
            reset_token,
            password: "again".into(),
            confirm_password: "again".into(),
        },
    )
    .await
    .expect_err("token consumed");
    assert!(matches!(err, AppError::BadRequest(_)));

    auth_service::signin(
        &app.state,
        SigninRequest {
            email: "wes@example.com".into(),
            password: "new-pw".into(),
        },
    )
    .await?;
    Ok(())
}

#[tokio::test]
async fn expired_reset_token_is_rejected() -> anyhow::Result<()> {
    let app = TestApp::new();
    let session = app.user("wes@example.com", &[Permission::User]).await;
    let user_id = session.user().expect("user").user_id;
    app.store
        .set_reset_token(user_id, "stale", Utc::now() - Duration::minutes(1))
        .await?;

    let err = auth_service::reset_password(
        &app.state,
        ResetPasswordRequest {
            reset_token: "stale".into(),
            password: "pw".into(),
            confirm_password: "pw".into(),
        },
    )
    .await
    .expect_err("expired");
    assert!(matches!(err, AppError::BadRequest(_)));
    Ok(())
}

#[tokio::test]
async fn mail_failure_does_not_fail_the_reset_request() -> anyhow::Result<()> {
    let app = TestApp::new();
    app.user("wes@example.com", &[Permission::User]).await;
    app.mailer.fail.store(true, Ordering::SeqCst);

    auth_service::request_reset(
        &app.state,
        RequestResetRequest {
            email: "wes@example.com".into(),
        },
    )
    .await?;

    let user = app
        .store
        .find_user_by_email("wes@example.com")
        .await?
        .expect("user");
    assert!(user.reset_token.is_some());

    let err = auth_service::request_reset(
        &app.state,
        RequestResetRequest {
            email: "nobody@example.com".into(),
        },
    )
    .await
    .expect_err("unknown email");
    assert!(matches!(err, AppError::NotFound));
    Ok(())
}
