//! Logging setup shared by the lifecycle setup binaries.

mod config;
mod tracing_init;

pub use config::{LogConfig, LogFormat};
pub use tracing_init::init_logging;

/// Reads the log configuration from the environment and installs the subscriber.
pub fn install(service_name: &str) -> anyhow::Result<()> {
    init_logging(&LogConfig::from_env(service_name))
}
