//! Server configuration
//!
//! All settings come from environment variables (a `.env` file is loaded
//! before this runs). Every variable has a development-friendly default so
//! a bare `cargo run` starts a working server.
//!
//! | Variable                  | Default                 | Meaning                                      |
//! |---------------------------|-------------------------|----------------------------------------------|
//! | `HTTP_PORT`               | `3000`                  | HTTP listen port                             |
//! | `DATA_DIR`                | `./data`                | Directory for the redb database files        |
//! | `ENVIRONMENT`             | `development`           | `development` / `production`                 |
//! | `LOG_LEVEL`               | `info`                  | tracing level filter                         |
//! | `LOG_DIR`                 | unset                   | When set, also write daily-rolling log files |
//! | `CURRENCY`                | `INR`                   | Currency code stamped on every pricing block |
//! | `SHIPPING_FEE`            | `50`                    | Flat shipping fee                            |
//! | `FREE_SHIPPING_THRESHOLD` | `1000`                  | Subtotal at which shipping becomes free      |
//! | `TAX_RATE_PERCENT`        | `0`                     | Tax percentage applied to the subtotal       |
//! | `PAYMENT_GATEWAY_URL`     | `http://localhost:9090` | Payment gateway base URL                     |
//! | `PAYMENT_KEY_ID`          | `bzr_test_key`          | Gateway API key id                           |
//! | `PAYMENT_KEY_SECRET`      | `dev-callback-secret`   | HMAC secret for callback signatures          |
//! | `PAYMENT_WEBHOOK_SECRET`  | `dev-webhook-secret`    | HMAC secret for webhook signatures           |
//! | `PAYMENT_EXPIRY_MINUTES`  | `30`                    | Unpaid orders are cancelled after this       |
//! | `PAYMENT_GRACE_SECONDS`   | `300`                   | Grace window after a failed payment attempt  |
//! | `GATEWAY_TIMEOUT_MS`      | `10000`                 | HTTP timeout for gateway calls               |
//! | `NOTIFY_RELAY_URL`        | unset                   | Notification relay; unset logs instead       |
//! | `NOTIFY_MAX_RETRIES`      | `3`                     | Delivery attempts before dead-lettering      |

use std::path::PathBuf;

/// Runtime configuration, resolved once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP listen port
    pub http_port: u16,
    /// Directory holding the redb database files
    pub data_dir: String,
    /// Deployment environment (development / production)
    pub environment: String,
    /// tracing level filter
    pub log_level: String,
    /// Optional directory for daily-rolling log files
    pub log_dir: Option<String>,

    /// Currency code stamped on every pricing block
    pub currency: String,
    /// Flat shipping fee
    pub shipping_fee: f64,
    /// Subtotal at which shipping becomes free
    pub free_shipping_threshold: f64,
    /// Tax percentage applied to the subtotal
    pub tax_rate_percent: f64,

    /// Payment gateway base URL
    pub payment_gateway_url: String,
    /// Gateway API key id
    pub payment_key_id: String,
    /// HMAC secret for payment callback signatures
    pub payment_key_secret: String,
    /// HMAC secret for webhook signatures (distinct from the callback secret)
    pub payment_webhook_secret: String,
    /// Minutes a Pending order may stay unpaid before the sweeper cancels it
    pub payment_expiry_minutes: i64,
    /// Seconds of grace after a failed payment attempt before cancellation
    pub payment_grace_seconds: i64,
    /// HTTP timeout for gateway calls, in milliseconds
    pub gateway_timeout_ms: u64,

    /// Notification relay endpoint; `None` logs notifications instead
    pub notify_relay_url: Option<String>,
    /// Delivery attempts before a notification is dead-lettered
    pub notify_max_retries: u32,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            http_port: std::env::var("HTTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            data_dir: std::env::var("DATA_DIR").unwrap_or_else(|_| "./data".to_string()),
            environment: std::env::var("ENVIRONMENT")
                .unwrap_or_else(|_| "development".to_string()),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_dir: std::env::var("LOG_DIR").ok(),

            currency: std::env::var("CURRENCY").unwrap_or_else(|_| "INR".to_string()),
            shipping_fee: std::env::var("SHIPPING_FEE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(50.0),
            free_shipping_threshold: std::env::var("FREE_SHIPPING_THRESHOLD")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1000.0),
            tax_rate_percent: std::env::var("TAX_RATE_PERCENT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0.0),

            payment_gateway_url: std::env::var("PAYMENT_GATEWAY_URL")
                .unwrap_or_else(|_| "http://localhost:9090".to_string()),
            payment_key_id: std::env::var("PAYMENT_KEY_ID")
                .unwrap_or_else(|_| "bzr_test_key".to_string()),
            payment_key_secret: std::env::var("PAYMENT_KEY_SECRET")
                .unwrap_or_else(|_| "dev-callback-secret".to_string()),
            payment_webhook_secret: std::env::var("PAYMENT_WEBHOOK_SECRET")
                .unwrap_or_else(|_| "dev-webhook-secret".to_string()),
            payment_expiry_minutes: std::env::var("PAYMENT_EXPIRY_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
            payment_grace_seconds: std::env::var("PAYMENT_GRACE_SECONDS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(300),
            gateway_timeout_ms: std::env::var("GATEWAY_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10_000),

            notify_relay_url: std::env::var("NOTIFY_RELAY_URL").ok(),
            notify_max_retries: std::env::var("NOTIFY_MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3),
        }
    }

    /// Load from environment, then apply overrides. Used by tests that need
    /// an isolated data directory and a random port.
    pub fn with_overrides(data_dir: Option<String>, http_port: Option<u16>) -> Self {
        let mut config = Self::from_env();
        if let Some(dir) = data_dir {
            config.data_dir = dir;
        }
        if let Some(port) = http_port {
            config.http_port = port;
        }
        config
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn is_development(&self) -> bool {
        !self.is_production()
    }

    /// Path of the order event store
    pub fn orders_db_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join("orders.redb")
    }

    /// Path of the inventory ledger
    pub fn inventory_db_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join("inventory.redb")
    }

    /// Path of the product catalog
    pub fn catalog_db_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join("catalog.redb")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
