use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub payment: PaymentConfig,
    pub app: AppConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// `memory://` keeps everything in process; any other URL goes to SurrealDB
    /// (`mem://`, `http://host:8000`, ...).
    pub url: String,
    pub namespace: String,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentConfig {
    pub key_id: Option<String>,
    pub key_secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub port: u16,
    pub currency: String,
    /// Admin routes reject every request when unset.
    pub admin_token: Option<String>,
}

impl DatabaseConfig {
    pub const IN_PROCESS: &'static str = "memory://";

    pub fn is_in_process(&self) -> bool {
        self.url == Self::IN_PROCESS
    }
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        Ok(Config {
            database: DatabaseConfig {
                url: env::var("DATABASE_URL")
                    .unwrap_or_else(|_| DatabaseConfig::IN_PROCESS.to_string()),
                namespace: env::var("DATABASE_NAMESPACE")
                    .unwrap_or_else(|_| "storefront".to_string()),
                database: env::var("DATABASE_NAME")
                    .unwrap_or_else(|_| "main".to_string()),
                username: env::var("DATABASE_USER").ok(),
                password: env::var("DATABASE_PASS").ok(),
            },

            payment: PaymentConfig {
                key_id: env::var("PAYMENT_KEY_ID").ok(),
                key_secret: env::var("PAYMENT_KEY_SECRET")?,
            },

            app: AppConfig {
                port: env::var("PORT")
                    .unwrap_or_else(|_| "8080".to_string())
                    .parse()
                    .unwrap_or(8080),
                currency: env::var("CURRENCY")
                    .unwrap_or_else(|_| "INR".to_string()),
                admin_token: env::var("ADMIN_TOKEN")
                    .ok()
                    .filter(|token| !token.trim().is_empty()),
            },
        })
    }
}
