use std::sync::Arc;

use crate::{
    config::AppConfig, mailer::Mailer, payment::PaymentGateway, store::EntityStore,
};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn EntityStore>,
    pub payments: Arc<dyn PaymentGateway>,
    pub mailer: Arc<dyn Mailer>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn EntityStore>,
        payments: Arc<dyn PaymentGateway>,
        mailer: Arc<dyn Mailer>,
        config: AppConfig,
    ) -> Self {
        Self {
            store,
            payments,
            mailer,
            config: Arc::new(config),
        }
    }
}
