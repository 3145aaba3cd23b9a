use comanda_catalog::PricingConfig;
use comanda_order::LifecycleConfig;
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Restaurant delivery pricing used until the database provides one
    #[serde(default)]
    pub pricing: PricingConfig,
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// No URL means orders live in memory only
    pub url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Untracked local overrides
            .add_source(config::File::with_name("config/local").required(false))
            // Eg.. `COMANDA_PRICING__BASE_FEE=3500` sets `pricing.base_fee`
            .add_source(config::Environment::with_prefix("COMANDA").prefix_separator("_").separator("__"))
            .build()?;

        s.try_deserialize()
    }

    /// Parse a TOML document, without touching files or the environment
    pub fn from_toml(source: &str) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = Config::from_toml("[server]\nport = 8080\n").unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.database.url, None);
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.pricing, PricingConfig::default());
        assert_eq!(config.lifecycle.tip_ceiling_ratio, 1.0);
    }

    #[test]
    fn test_pricing_section() {
        let config = Config::from_toml(
            r#"
            [server]
            port = 3000

            [database]
            url = "postgres://localhost/comanda"

            [pricing]
            base_fee = 3500
            base_distance_km = 2.0
            fee_per_extra_km = 1200
            max_delivery_distance_km = 6.5
            estimated_prep_minutes = 40

            [lifecycle]
            tip_ceiling_ratio = 0.5
            "#,
        )
        .unwrap();

        assert_eq!(config.database.url.as_deref(), Some("postgres://localhost/comanda"));
        assert_eq!(config.pricing.base_fee, 3500);
        assert_eq!(config.pricing.max_delivery_distance_km, 6.5);
        assert_eq!(config.lifecycle.tip_ceiling_ratio, 0.5);
    }

    #[test]
    fn test_negative_tip_ceiling_rejected_on_validate() {
        let config = Config::from_toml("[server]\nport = 8080\n\n[lifecycle]\ntip_ceiling_ratio = -1.0\n").unwrap();
        assert!(config.lifecycle.validate().is_err());
    }

    #[test]
    fn test_missing_server_section_fails() {
        assert!(Config::from_toml("[pricing]\nbase_fee = 1\n").is_err());
    }
}
