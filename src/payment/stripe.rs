use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use super::{Charge, ChargeRequest, PaymentError, PaymentGateway};

/// Charges through Stripe's `/v1/charges` endpoint.
#[derive(Clone)]
pub struct StripeGateway {
    client: Client,
    api_base: String,
    secret_key: String,
}

#[derive(Debug, Deserialize)]
struct StripeCharge {
    id: String,
    amount: i64,
    currency: String,
    #[serde(default)]
    paid: bool,
    #[serde(default)]
    failure_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

impl StripeGateway {
    pub fn new(api_base: impl Into<String>, secret_key: impl Into<String>) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            secret_key: secret_key.into(),
        })
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    #[tracing::instrument(skip(self, request), fields(amount = request.amount, currency = %request.currency))]
    async fn charge(&self, request: ChargeRequest) -> Result<Charge, PaymentError> {
        let amount = request.amount.to_string();
        let form = [
            ("amount", amount.as_str()),
            ("currency", request.currency.as_str()),
            ("source", request.source.as_str()),
            ("description", request.description.as_str()),
        ];

        let response = self
            .client
            .post(format!("{}/v1/charges", self.api_base))
            .basic_auth(&self.secret_key, None::<&str>)
            .header("Idempotency-Key", &request.idempotency_key)
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let body = response.text().await.inspect_err(|err| {
                tracing::error!(
                    idempotency_key = %request.idempotency_key,
                    error = %err,
                    "charge accepted but response body was lost; the card may have been charged"
                );
            })?;
            return confirmed_charge(&body, &request.idempotency_key);
        }

        let message = match response.json::<StripeErrorBody>().await {
            Ok(body) => body
                .error
                .message
                .or(body.error.code)
                .unwrap_or_else(|| status.to_string()),
            Err(_) => status.to_string(),
        };
        tracing::warn!(status = %status, %message, "charge rejected by provider");

        Err(classify_failure(status, message))
    }
}

/// Reads a 2xx charge body. An unreadable body still means the provider may have taken
/// the money, so it is logged with the idempotency key that replays it.
fn confirmed_charge(body: &str, idempotency_key: &str) -> Result<Charge, PaymentError> {
    let charge: StripeCharge = serde_json::from_str(body).map_err(|err| {
        tracing::error!(
            %idempotency_key,
            error = %err,
            "charge accepted but response body is unreadable; the card may have been charged"
        );
        PaymentError::Unavailable(format!("unreadable charge response: {err}"))
    })?;

    if !charge.paid {
        let reason = charge
            .failure_message
            .unwrap_or_else(|| "charge was not paid".to_string());
        return Err(PaymentError::Declined(reason));
    }
    tracing::info!(charge_id = %charge.id, amount = charge.amount, "charge created");
    Ok(Charge {
        id: charge.id,
        amount: charge.amount,
        currency: charge.currency,
    })
}

fn classify_failure(status: StatusCode, message: String) -> PaymentError {
    match status {
        StatusCode::PAYMENT_REQUIRED => PaymentError::Declined(message),
        s if s.is_server_error() || s == StatusCode::TOO_MANY_REQUESTS => {
            PaymentError::Unavailable(message)
        }
        s => PaymentError::Rejected {
            status: s.as_u16(),
            message,
        },
    }
}
