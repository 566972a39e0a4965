use std::net::SocketAddr;

use anyhow::Context;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_STOCK_LOCATION: &str = "Main warehouse";

/// Process configuration, read once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    /// Postgres connection string; `None` selects the in-memory store.
    pub database_url: Option<String>,
    /// Location that newly registered products are stocked at.
    pub default_stock_location: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let bind_addr = lookup("BIND_ADDR")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_addr
            .trim()
            .parse::<SocketAddr>()
            .with_context(|| format!("BIND_ADDR is not a socket address: {bind_addr}"))?;

        let database_url = lookup("DATABASE_URL").filter(|v| !v.trim().is_empty());

        let default_stock_location = lookup("DEFAULT_STOCK_LOCATION")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_STOCK_LOCATION.to_string());

        Ok(Self {
            bind_addr,
            database_url,
            default_stock_location,
        })
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            database_url: None,
            default_stock_location: DEFAULT_STOCK_LOCATION.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> anyhow::Result<AppConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn reads_overrides() {
        let config = config_from(&[
            ("BIND_ADDR", "127.0.0.1:9000"),
            ("DATABASE_URL", "postgres://localhost/orderflow"),
            ("DEFAULT_STOCK_LOCATION", "  Dock B "),
        ])
        .unwrap();

        assert_eq!(config.bind_addr, "127.0.0.1:9000".parse().unwrap());
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/orderflow"));
        assert_eq!(config.default_stock_location, "Dock B");
    }

    #[test]
    fn blank_database_url_means_in_memory() {
        let config = config_from(&[("DATABASE_URL", "  ")]).unwrap();
        assert!(config.database_url.is_none());
    }

    #[test]
    fn rejects_bad_bind_addr() {
        assert!(config_from(&[("BIND_ADDR", "not-an-addr")]).is_err());
    }
}
