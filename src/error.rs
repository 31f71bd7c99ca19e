use std::fmt;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::{
    payment::PaymentError,
    response::{ApiResponse, Meta},
};

/// Checkout step that failed after the provider had already taken the money.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostChargeStage {
    RecordCharge,
    CreateOrder,
    ClearCart,
}

impl fmt::Display for PostChargeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self {
            PostChargeStage::RecordCharge => "recording the charge",
            PostChargeStage::CreateOrder => "creating the order",
            PostChargeStage::ClearCart => "clearing the cart",
        };
        f.write_str(stage)
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("You must be signed in to do that")]
    Unauthenticated,

    #[error("You don't have permission to do that")]
    Forbidden,

    #[error("This does not belong to you")]
    NotOwner,

    #[error("Not Found")]
    NotFound,

    #[error("Bad Request {0}")]
    BadRequest(String),

    #[error("Payment failed: {0}")]
    Payment(#[from] PaymentError),

    #[error("Charge {charge_id} succeeded but {stage} failed")]
    PostCharge {
        charge_id: String,
        stage: PostChargeStage,
        #[source]
        source: Box<AppError>,
    },

    #[error("Database error")]
    DbError(#[from] sqlx::Error),

    #[error("ORM error")]
    OrmError(#[from] sea_orm::DbErr),

    #[error("Internal Server Error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::Forbidden | AppError::NotOwner => StatusCode::FORBIDDEN,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Payment(PaymentError::Declined(_)) => StatusCode::PAYMENT_REQUIRED,
            AppError::Payment(_) => StatusCode::BAD_GATEWAY,
            AppError::PostCharge { .. }
            | AppError::DbError(_)
            | AppError::OrmError(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorData {
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = ?self, "request failed");
        }

        let message = self.to_string();
        let body = ApiResponse {
            message: message.clone(),
            data: Some(ErrorData { error: message }),
            meta: Some(Meta::empty()),
        };

        (status, axum::Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
