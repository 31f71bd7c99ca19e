use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dto::auth::Claims,
    error::{AppError, AppResult},
    models::Permission,
    state::AppState,
};

pub const SESSION_COOKIE: &str = "token";

/// Identity resolved for the current request, with permissions as stored right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub permissions: Vec<Permission>,
}

/// Allow iff the caller holds at least one of the required permissions.
pub fn authorize(held: &[Permission], required: &[Permission]) -> bool {
    held.iter().any(|permission| required.contains(permission))
}

pub fn ensure_permission(user: &AuthUser, required: &[Permission]) -> Result<(), AppError> {
    if !authorize(&user.permissions, required) {
        tracing::debug!(user_id = %user.user_id, ?required, "permission denied");
        return Err(AppError::Forbidden);
    }
    Ok(())
}

/// Request-scoped session. Anonymous when the request carries no credential.
#[derive(Debug, Clone, Default)]
pub struct Session {
    user: Option<AuthUser>,
}

impl Session {
    pub fn anonymous() -> Self {
        Self { user: None }
    }

    pub fn authenticated(user: AuthUser) -> Self {
        Self { user: Some(user) }
    }

    pub fn user(&self) -> Option<&AuthUser> {
        self.user.as_ref()
    }

    pub fn require(&self) -> Result<&AuthUser, AppError> {
        self.user.as_ref().ok_or(AppError::Unauthenticated)
    }
}

pub fn issue_token(user_id: Uuid, config: &AppConfig) -> AppResult<String> {
    let expiration = Utc::now()
        .checked_add_signed(Duration::hours(config.session_ttl_hours))
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to set expiration")))?;

    let claims = Claims {
        sub: user_id.to_string(),
        exp: expiration.timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))
}

pub fn decode_token(token: &str, secret: &str) -> AppResult<Uuid> {
    let decoded = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::Unauthenticated)?;

    Uuid::parse_str(&decoded.claims.sub).map_err(|_| AppError::Unauthenticated)
}

pub fn session_cookie(token: &str, ttl_hours: i64) -> String {
    format!(
        "{SESSION_COOKIE}={token}; HttpOnly; Path=/; Max-Age={}; SameSite=Lax",
        ttl_hours * 3600
    )
}

pub fn clear_session_cookie() -> String {
    format!("{SESSION_COOKIE}=; HttpOnly; Path=/; Max-Age=0; SameSite=Lax")
}

fn cookie_value<'a>(cookies: &'a str, name: &str) -> Option<&'a str> {
    cookies.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name && !value.is_empty()).then_some(value)
    })
}

fn token_from_parts(parts: &Parts) -> AppResult<Option<String>> {
    if let Some(auth_header) = parts.headers.get(header::AUTHORIZATION) {
        let auth_str = auth_header
            .to_str()
            .map_err(|_| AppError::BadRequest("Invalid Authorization header".into()))?;
        let token = auth_str
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::BadRequest("Invalid Authorization scheme".into()))?;
        return Ok(Some(token.trim().to_string()));
    }

    let token = parts
        .headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(|cookies| cookie_value(cookies, SESSION_COOKIE))
        .map(str::to_string);
    Ok(token)
}

impl FromRequestParts<AppState> for Session {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(token) = token_from_parts(parts)? else {
            return Ok(Session::anonymous());
        };

        let user_id = decode_token(&token, &state.config.jwt_secret)?;

        // permissions are read per request so revocations apply immediately
        let session = match state.store.find_user(user_id).await? {
            Some(user) => Session::authenticated(AuthUser {
                user_id: user.id,
                permissions: user.permissions,
            }),
            None => {
                tracing::debug!(%user_id, "token for unknown user");
                Session::anonymous()
            }
        };
        Ok(session)
    }
}
