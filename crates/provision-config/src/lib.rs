mod config;
mod error;
mod file;

pub use config::{
    DEFAULT_CONFIG_FILE, DEFAULT_HUB_URL, DEFAULT_STATE_DIR, ProvisioningConfig, SimulationConfig,
};
pub use error::ConfigError;
pub use file::load_config;
