use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub session_ttl_hours: i64,
    pub frontend_url: String,
    pub stripe_secret_key: String,
    pub stripe_api_base: String,
    pub currency: String,
    pub mail_from: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_SECRET is not set"))?;
        let stripe_secret_key = env::var("STRIPE_SECRET_KEY")
            .map_err(|_| anyhow::anyhow!("STRIPE_SECRET_KEY is not set"))?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        let session_ttl_hours = env::var("SESSION_TTL_HOURS")
            .ok()
            .and_then(|h| h.parse::<i64>().ok())
            .filter(|h| *h > 0)
            .unwrap_or(24);
        let frontend_url =
            env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:7777".to_string());
        let stripe_api_base =
            env::var("STRIPE_API_BASE").unwrap_or_else(|_| "https://api.stripe.com".to_string());
        let currency = env::var("CHARGE_CURRENCY")
            .map(|c| c.to_lowercase())
            .unwrap_or_else(|_| "usd".to_string());
        let mail_from =
            env::var("MAIL_FROM").unwrap_or_else(|_| "no-reply@storefront.local".to_string());

        Ok(Self {
            database_url,
            host,
            port,
            jwt_secret,
            session_ttl_hours,
            frontend_url,
            stripe_secret_key,
            stripe_api_base,
            currency,
            mail_from,
        })
    }

    /// Configuration for tests and local runs that never reach Postgres or Stripe.
    pub fn for_tests() -> Self {
        Self {
            database_url: String::new(),
            host: "127.0.0.1".to_string(),
            port: 0,
            jwt_secret: "test-secret".to_string(),
            session_ttl_hours: 24,
            frontend_url: "http://localhost:7777".to_string(),
            stripe_secret_key: String::new(),
            stripe_api_base: "http://127.0.0.1:0".to_string(),
            currency: "usd".to_string(),
            mail_from: "no-reply@storefront.local".to_string(),
        }
    }
}
