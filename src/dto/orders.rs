use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{ChargeRecord, Order};

/// Only the payment token is read; any other field a client sends, such as a total, is ignored.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CheckoutRequest {
    pub token: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<Order>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ChargeList {
    pub items: Vec<ChargeRecord>,
}
