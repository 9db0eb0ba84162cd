use crate::error::ConfigError;
use std::path::Path;

// Declare the modules that make up this crate.
pub mod error;
pub mod logging;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use logging::init_tracing;
pub use settings::{
    Config, GatewayConfig, GatewayMode, LoggingConfig, ServerConfig, SimulationConfig,
    SwapSettings, TelegramConfig,
};

/// Loads the application configuration.
///
/// Reads `path` if it exists, then layers `SWAPDESK__`-prefixed environment
/// variables on top (e.g. `SWAPDESK__GATEWAY__API_KEY`), deserializes the
/// result into our strongly-typed `Config` and validates it.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let builder = config::Config::builder()
        .add_source(config::File::from(path).required(false))
        .add_source(
            config::Environment::with_prefix("SWAPDESK")
                .prefix_separator("__")
                .separator("__"),
        )
        .build()?;

    let config = builder.try_deserialize::<Config>()?;
    config.validate()?;

    Ok(config)
}
