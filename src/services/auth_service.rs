use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use chrono::{Duration, Utc};
use password_hash::rand_core::{OsRng, RngCore};

use crate::{
    audit::log_audit,
    dto::auth::{
        RequestResetRequest, ResetPasswordRequest, SessionResponse, SigninRequest, SignupRequest,
    },
    error::{AppError, AppResult},
    mailer::{Email, make_a_nice_email},
    middleware::auth::{Session, issue_token},
    models::{Permission, User},
    response::{ApiResponse, MessageData, Meta},
    state::AppState,
    store::NewUser,
};

const RESET_TOKEN_TTL_HOURS: i64 = 1;
const RESET_TOKEN_BYTES: usize = 20;

pub async fn signup(
    state: &AppState,
    payload: SignupRequest,
) -> AppResult<ApiResponse<SessionResponse>> {
    let email = normalize_email(&payload.email);
    let name = payload.name.trim().to_string();
    if email.is_empty() || name.is_empty() {
        return Err(AppError::BadRequest("Email and name are required".into()));
    }
    if payload.password.is_empty() {
        return Err(AppError::BadRequest("Password is required".into()));
    }

    let password_hash = hash_password(&payload.password)?;
    let user = state
        .store
        .create_user(NewUser {
            email,
            name,
            password_hash,
            permissions: vec![Permission::User],
        })
        .await?;

    let token = issue_token(user.id, &state.config)?;

    log_audit(
        state,
        Some(user.id),
        "user_signup",
        Some("users"),
        Some(serde_json::json!({ "user_id": user.id })),
    )
    .await;

    Ok(ApiResponse::success(
        "User created",
        SessionResponse { token, user },
        Some(Meta::empty()),
    ))
}

pub async fn signin(
    state: &AppState,
    payload: SigninRequest,
) -> AppResult<ApiResponse<SessionResponse>> {
    let email = normalize_email(&payload.email);
    let user = match state.store.find_user_by_email(&email).await? {
        Some(u) => u,
        None => return Err(AppError::BadRequest("Invalid email or password".into())),
    };

    let parsed_hash = PasswordHash::new(&user.password_hash)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Invalid password hash")))?;

    let argon2 = Argon2::default();
    if argon2
        .verify_password(payload.password.as_bytes(), &parsed_hash)
        .is_err()
    {
        return Err(AppError::BadRequest("Invalid email or password".into()));
    }

    let token = issue_token(user.id, &state.config)?;

    log_audit(
        state,
        Some(user.id),
        "user_signin",
        Some("users"),
        Some(serde_json::json!({ "user_id": user.id })),
    )
    .await;

    Ok(ApiResponse::success(
        "Logged in",
        SessionResponse { token, user },
        Some(Meta::empty()),
    ))
}

pub fn signout() -> ApiResponse<MessageData> {
    ApiResponse::success("Signed out", MessageData::new("Goodbye!"), Some(Meta::empty()))
}

/// Mails a one-hour reset link. Delivery problems are logged, not surfaced.
pub async fn request_reset(
    state: &AppState,
    payload: RequestResetRequest,
) -> AppResult<ApiResponse<MessageData>> {
    let email = normalize_email(&payload.email);
    let user = state
        .store
        .find_user_by_email(&email)
        .await?
        .ok_or(AppError::NotFound)?;

    let reset_token = generate_reset_token();
    let expiry = Utc::now() + Duration::hours(RESET_TOKEN_TTL_HOURS);
    state
        .store
        .set_reset_token(user.id, &reset_token, expiry)
        .await?;

    let link = format!(
        "{}/reset?resetToken={}",
        state.config.frontend_url.trim_end_matches('/'),
        reset_token
    );
    let email = Email {
        from: state.config.mail_from.clone(),
        to: user.email.clone(),
        subject: "Your Password Reset Token".into(),
        html: make_a_nice_email(&format!(
            "Your Password Reset Token is here!\n\n<a href=\"{link}\">Click Here to Reset</a>"
        )),
    };
    if let Err(err) = state.mailer.send(email).await {
        tracing::warn!(user_id = %user.id, error = %err, "reset email not delivered");
    }

    log_audit(
        state,
        Some(user.id),
        "password_reset_requested",
        Some("users"),
        None,
    )
    .await;

    Ok(ApiResponse::success(
        "Reset requested",
        MessageData::new("Thanks!"),
        Some(Meta::empty()),
    ))
}

pub async fn reset_password(
    state: &AppState,
    payload: ResetPasswordRequest,
) -> AppResult<ApiResponse<SessionResponse>> {
    if payload.password != payload.confirm_password {
        return Err(AppError::BadRequest("Your passwords don't match".into()));
    }
    if payload.password.is_empty() {
        return Err(AppError::BadRequest("Password is required".into()));
    }

    let user = state
        .store
        .find_user_by_reset_token(payload.reset_token.trim(), Utc::now())
        .await?
        .ok_or_else(|| AppError::BadRequest("This token is either invalid or expired".into()))?;

    let password_hash = hash_password(&payload.password)?;
    let user = state.store.update_password(user.id, &password_hash).await?;
    let token = issue_token(user.id, &state.config)?;

    log_audit(state, Some(user.id), "password_reset", Some("users"), None).await;

    Ok(ApiResponse::success(
        "Password updated",
        SessionResponse { token, user },
        Some(Meta::empty()),
    ))
}

/// The signed-in user, or `None` for an anonymous request.
pub async fn me(state: &AppState, session: &Session) -> AppResult<ApiResponse<Option<User>>> {
    let user = match session.user() {
        Some(auth) => state.store.find_user(auth.user_id).await?,
        None => None,
    };
    Ok(ApiResponse::success("OK", user, Some(Meta::empty())))
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?
        .to_string();
    Ok(hash)
}

fn generate_reset_token() -> String {
    let mut bytes = [0u8; RESET_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
