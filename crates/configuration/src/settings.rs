use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use crate::error::ConfigError;

/// The root configuration structure for the entire application.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub swap: SwapSettings,
    pub gateway: GatewayConfig,
    pub simulation: SimulationConfig,
    pub telegram: TelegramConfig,
    pub logging: LoggingConfig,
}

/// Where the HTTP surface listens.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
        }
    }
}

/// Longest accepted order time-to-live: 30 days.
pub const MAX_ORDER_TTL_SECS: u64 = 30 * 24 * 60 * 60;

/// Parameters of the swap order lifecycle.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SwapSettings {
    /// The service fee taken from every swap.
    /// 0.003 corresponds to 0.3%.
    pub fee_rate: Decimal,
    /// How long a pending order waits for its deposit.
    pub order_ttl_secs: u64,
    /// Period of the background reconciliation cycle.
    pub reconcile_interval_secs: u64,
    /// Upper bound for any single exchange call.
    pub gateway_timeout_secs: u64,
}

impl Default for SwapSettings {
    fn default() -> Self {
        Self {
            fee_rate: dec!(0.003),
            order_ttl_secs: 20 * 60,
            reconcile_interval_secs: 10,
            gateway_timeout_secs: 15,
        }
    }
}

impl SwapSettings {
    pub fn order_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.order_ttl_secs as i64)
    }

    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval_secs)
    }

    pub fn gateway_timeout(&self) -> Duration {
        Duration::from_secs(self.gateway_timeout_secs)
    }
}

/// Which exchange gateway implementation backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayMode {
    Mexc,
    #[default]
    Simulated,
}

/// Connection settings for the exchange REST API.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub mode: GatewayMode,
    pub base_url: String,
    pub api_key: String,
    pub api_secret: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            mode: GatewayMode::default(),
            base_url: "https://api.mexc.com".to_string(),
            api_key: String::new(),
            api_secret: String::new(),
        }
    }
}

/// Price table of the simulated gateway, keyed by exchange symbol (e.g. "BTCUSDT").
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub prices: HashMap<String, Decimal>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        let prices = HashMap::from([
            ("BTCUSDT".to_string(), dec!(60000)),
            ("ETHUSDT".to_string(), dec!(3000)),
            ("ETHBTC".to_string(), dec!(0.05)),
            ("SOLUSDT".to_string(), dec!(150)),
        ]);
        Self { prices }
    }
}

/// Telegram bot used for operator alerts. Empty values disable alerting.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub token: String,
    pub chat_id: String,
}

/// Log verbosity and the optional rolling log file location.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default `EnvFilter` directive, overridden by `RUST_LOG`.
    pub level: String,
    /// When set, logs are also written to a daily-rolling file in this directory.
    pub directory: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
        }
    }
}

impl Config {
    /// Rejects settings the service cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let swap = &self.swap;
        if swap.fee_rate < Decimal::ZERO || swap.fee_rate >= Decimal::ONE {
            return Err(ConfigError::ValidationError(format!(
                "swap.fee_rate must be in [0, 1), got {}",
                swap.fee_rate
            )));
        }
        if swap.order_ttl_secs == 0 || swap.order_ttl_secs > MAX_ORDER_TTL_SECS {
            return Err(ConfigError::ValidationError(format!(
                "swap.order_ttl_secs must be in 1..={}, got {}",
                MAX_ORDER_TTL_SECS, swap.order_ttl_secs
            )));
        }
        if swap.reconcile_interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "swap.reconcile_interval_secs must be positive".to_string(),
            ));
        }
        if swap.gateway_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "swap.gateway_timeout_secs must be positive".to_string(),
            ));
        }
        if self.gateway.mode == GatewayMode::Mexc
            && (self.gateway.api_key.is_empty() || self.gateway.api_secret.is_empty())
        {
            return Err(ConfigError::ValidationError(
                "gateway.api_key and gateway.api_secret are required in mexc mode".to_string(),
            ));
        }
        Ok(())
    }
}
