//! Logger initialisation
//!
//! Every crate logs through the `log` facade. Binaries and tests call
//! [`init_logging`] once; repeated calls are harmless.

use serde::{Deserialize, Serialize};

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level filter (`error`, `warn`, `info`, `debug`, `trace`, `off`)
    pub level: String,
    /// Per-module overrides, e.g. `("tessera_matching", "debug")`
    pub module_levels: Vec<(String, String)>,
    /// Honour `RUST_LOG` on top of this configuration
    pub use_env: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            module_levels: Vec::new(),
            use_env: true,
        }
    }
}

impl LoggingConfig {
    /// Filter string in `env_logger` syntax
    pub fn filters(&self) -> String {
        let mut parts = vec![self.level.clone()];
        parts.extend(
            self.module_levels
                .iter()
                .map(|(module, level)| format!("{module}={level}")),
        );
        parts.join(",")
    }
}

/// Install the global logger; returns false if one was already installed
pub fn init_logging(config: &LoggingConfig) -> bool {
    let mut builder = env_logger::Builder::new();
    builder.parse_filters(&config.filters());
    if config.use_env {
        if let Ok(env) = std::env::var("RUST_LOG") {
            builder.parse_filters(&env);
        }
    }
    builder.format_timestamp_micros();
    builder.try_init().is_ok()
}
