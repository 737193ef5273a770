//! Application configuration loaded from environment variables.

use std::time::Duration;

use checkout::PAYSTACK_API_BASE;

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`, `PORT`: bind address (default `0.0.0.0:3000`)
/// - `RUST_LOG`: tracing filter directive (default `"info"`)
/// - `DATABASE_URL`: Postgres connection string; the in-memory store is used
///   when unset
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default `10`)
/// - `PAYSTACK_BASE_URL`, `PAYSTACK_SECRET_KEY`: gateway API root and key
/// - `PAYSTACK_WEBHOOK_SECRET`: webhook HMAC key (default: the secret key)
/// - `PAYSTACK_CALLBACK_URL`: where the gateway sends the customer back
/// - `GATEWAY_TIMEOUT_SECS`, `VERIFY_TIMEOUT_SECS`: gateway call bounds
/// - `JWT_SECRET`: HS256 key for bearer tokens; every caller is a guest
///   when unset
/// - `NOTIFY_MAX_ATTEMPTS`, `NOTIFY_BACKOFF_MS`: notification retry policy
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub paystack_base_url: String,
    pub paystack_secret_key: String,
    pub webhook_secret: String,
    pub callback_url: String,
    pub gateway_timeout: Duration,
    pub verify_timeout: Duration,
    pub jwt_secret: Option<String>,
    pub notify_max_attempts: u32,
    pub notify_backoff: Duration,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from any key lookup, falling back to defaults
    /// for missing or unparseable values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let parsed = |key: &str| non_empty(key).and_then(|v| v.trim().parse::<u64>().ok());

        let paystack_secret_key = non_empty("PAYSTACK_SECRET_KEY").unwrap_or_default();
        Self {
            host: non_empty("HOST").unwrap_or(defaults.host),
            port: non_empty("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: non_empty("RUST_LOG").unwrap_or(defaults.log_level),
            database_url: non_empty("DATABASE_URL"),
            database_max_connections: parsed("DATABASE_MAX_CONNECTIONS")
                .and_then(|n| u32::try_from(n).ok())
                .unwrap_or(defaults.database_max_connections),
            paystack_base_url: non_empty("PAYSTACK_BASE_URL").unwrap_or(defaults.paystack_base_url),
            webhook_secret: non_empty("PAYSTACK_WEBHOOK_SECRET")
                .unwrap_or_else(|| paystack_secret_key.clone()),
            paystack_secret_key,
            callback_url: non_empty("PAYSTACK_CALLBACK_URL").unwrap_or(defaults.callback_url),
            gateway_timeout: parsed("GATEWAY_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.gateway_timeout),
            verify_timeout: parsed("VERIFY_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.verify_timeout),
            jwt_secret: non_empty("JWT_SECRET"),
            notify_max_attempts: parsed("NOTIFY_MAX_ATTEMPTS")
                .and_then(|n| u32::try_from(n).ok())
                .unwrap_or(defaults.notify_max_attempts),
            notify_backoff: parsed("NOTIFY_BACKOFF_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.notify_backoff),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            database_max_connections: 10,
            paystack_base_url: PAYSTACK_API_BASE.to_string(),
            paystack_secret_key: String::new(),
            webhook_secret: String::new(),
            callback_url: "http://localhost:3000/payments/callback".to_string(),
            gateway_timeout: Duration::from_secs(10),
            verify_timeout: Duration::from_secs(5),
            jwt_secret: None,
            notify_max_attempts: 3,
            notify_backoff: Duration::from_millis(200),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.database_url, None);
        assert_eq!(config.paystack_base_url, "https://api.paystack.co");
        assert_eq!(config.verify_timeout, Duration::from_secs(5));
        assert_eq!(config.notify_max_attempts, 3);
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_webhook_secret_defaults_to_secret_key() {
        let config = from_pairs(&[("PAYSTACK_SECRET_KEY", "sk_live_abc")]);
        assert_eq!(config.webhook_secret, "sk_live_abc");

        let config = from_pairs(&[
            ("PAYSTACK_SECRET_KEY", "sk_live_abc"),
            ("PAYSTACK_WEBHOOK_SECRET", "whsec"),
        ]);
        assert_eq!(config.webhook_secret, "whsec");
        assert_eq!(config.paystack_secret_key, "sk_live_abc");
    }

    #[test]
    fn test_overrides_and_bad_values() {
        let config = from_pairs(&[
            ("PORT", "8081"),
            ("DATABASE_URL", "postgres://localhost/checkout"),
            ("VERIFY_TIMEOUT_SECS", "2"),
            ("GATEWAY_TIMEOUT_SECS", "soon"),
            ("JWT_SECRET", "  "),
            ("NOTIFY_BACKOFF_MS", "50"),
        ]);
        assert_eq!(config.port, 8081);
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/checkout")
        );
        assert_eq!(config.verify_timeout, Duration::from_secs(2));
        assert_eq!(config.gateway_timeout, Duration::from_secs(10));
        assert_eq!(config.jwt_secret, None);
        assert_eq!(config.notify_backoff, Duration::from_millis(50));
    }
}
