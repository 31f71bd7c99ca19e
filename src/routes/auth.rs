use axum::{
    Json, Router,
    extract::State,
    http::header::SET_COOKIE,
    response::AppendHeaders,
    routing::post,
};

use crate::{
    dto::auth::{
        RequestResetRequest, ResetPasswordRequest, SessionResponse, SigninRequest, SignupRequest,
    },
    error::AppResult,
    middleware::auth::{Session, clear_session_cookie, session_cookie},
    models::User,
    response::{ApiResponse, MessageData},
    services::auth_service,
    state::AppState,
};

type WithCookie<T> = (AppendHeaders<[(axum::http::HeaderName, String); 1]>, Json<T>);

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/signin", post(signin))
        .route("/signout", post(signout))
        .route("/request-reset", post(request_reset))
        .route("/reset-password", post(reset_password))
}

fn with_session_cookie(
    state: &AppState,
    resp: ApiResponse<SessionResponse>,
) -> WithCookie<ApiResponse<SessionResponse>> {
    let cookie = resp
        .data
        .as_ref()
        .map(|session| session_cookie(&session.token, state.config.session_ttl_hours))
        .unwrap_or_else(clear_session_cookie);
    (AppendHeaders([(SET_COOKIE, cookie)]), Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 200, description = "Create an account and sign in", body = ApiResponse<SessionResponse>),
        (status = 400, description = "Email is already taken")
    ),
    tag = "Auth"
)]
pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupRequest>,
) -> AppResult<WithCookie<ApiResponse<SessionResponse>>> {
    let resp = auth_service::signup(&state, payload).await?;
    Ok(with_session_cookie(&state, resp))
}

#[utoipa::path(
    post,
    path = "/api/auth/signin",
    request_body = SigninRequest,
    responses(
        (status = 200, description = "Sign in", body = ApiResponse<SessionResponse>),
        (status = 400, description = "Invalid credentials")
    ),
    tag = "Auth"
)]
pub async fn signin(
    State(state): State<AppState>,
    Json(payload): Json<SigninRequest>,
) -> AppResult<WithCookie<ApiResponse<SessionResponse>>> {
    let resp = auth_service::signin(&state, payload).await?;
    Ok(with_session_cookie(&state, resp))
}

#[utoipa::path(
    post,
    path = "/api/auth/signout",
    responses(
        (status = 200, description = "Clear the session cookie", body = ApiResponse<MessageData>)
    ),
    tag = "Auth"
)]
pub async fn signout() -> WithCookie<ApiResponse<MessageData>> {
    (
        AppendHeaders([(SET_COOKIE, clear_session_cookie())]),
        Json(auth_service::signout()),
    )
}

#[utoipa::path(
    post,
    path = "/api/auth/request-reset",
    request_body = RequestResetRequest,
    responses(
        (status = 200, description = "Reset link mailed", body = ApiResponse<MessageData>),
        (status = 404, description = "No user with that email")
    ),
    tag = "Auth"
)]
pub async fn request_reset(
    State(state): State<AppState>,
    Json(payload): Json<RequestResetRequest>,
) -> AppResult<Json<ApiResponse<MessageData>>> {
    let resp = auth_service::request_reset(&state, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/auth/reset-password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password changed and signed in", body = ApiResponse<SessionResponse>),
        (status = 400, description = "Passwords differ or token invalid or expired")
    ),
    tag = "Auth"
)]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> AppResult<WithCookie<ApiResponse<SessionResponse>>> {
    let resp = auth_service::reset_password(&state, payload).await?;
    Ok(with_session_cookie(&state, resp))
}

#[utoipa::path(
    get,
    path = "/api/me",
    responses(
        (status = 200, description = "Signed-in user, data is null when anonymous", body = ApiResponse<User>)
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn me(
    State(state): State<AppState>,
    session: Session,
) -> AppResult<Json<ApiResponse<Option<User>>>> {
    let resp = auth_service::me(&state, &session).await?;
    Ok(Json(resp))
}
