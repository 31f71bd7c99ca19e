use async_trait::async_trait;
use thiserror::Error;

pub mod stripe;

pub use stripe::StripeGateway;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeRequest {
    /// Minor currency unit.
    pub amount: i64,
    pub currency: String,
    /// One-time token from the client-side payment form. Never a card number.
    pub source: String,
    pub description: String,
    /// Same key, same provider charge: retries of an identical cart never charge twice.
    pub idempotency_key: String,
}

/// What the provider says it actually charged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Charge {
    pub id: String,
    pub amount: i64,
    pub currency: String,
}

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("payment declined: {0}")]
    Declined(String),

    #[error("payment provider rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("payment provider unavailable: {0}")]
    Unavailable(String),
}

impl From<reqwest::Error> for PaymentError {
    fn from(err: reqwest::Error) -> Self {
        PaymentError::Unavailable(err.to_string())
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn charge(&self, request: ChargeRequest) -> Result<Charge, PaymentError>;
}
