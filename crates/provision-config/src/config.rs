use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "provisioning.toml";
pub const DEFAULT_HUB_URL: &str = "https://tenant.example.com/sites/projects-hub";
pub const DEFAULT_STATE_DIR: &str = ".provisioning";
pub(crate) const DEFAULT_SIMULATION_LATENCY_MS: u64 = 250;

/// Settings for the fixed-latency stand-in used outside production.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationConfig {
    pub(crate) enabled: bool,
    pub(crate) latency: Duration,
    pub(crate) fail_at_step: Option<u8>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            latency: Duration::from_millis(DEFAULT_SIMULATION_LATENCY_MS),
            fail_at_step: None,
        }
    }
}

impl SimulationConfig {
    #[must_use]
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    #[must_use]
    pub fn latency(&self) -> Duration {
        self.latency
    }

    /// Step at which the simulated platform reports a failure, if any.
    #[must_use]
    pub fn fail_at_step(&self) -> Option<u8> {
        self.fail_at_step
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisioningConfig {
    pub(crate) hub_url: String,
    pub(crate) state_dir: PathBuf,
    pub(crate) step_timeout: Option<Duration>,
    pub(crate) offline_queue: bool,
    pub(crate) hub_navigation: bool,
    pub(crate) notification_recipients: Vec<String>,
    pub(crate) simulation: SimulationConfig,
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        Self {
            hub_url: DEFAULT_HUB_URL.to_string(),
            state_dir: PathBuf::from(DEFAULT_STATE_DIR),
            step_timeout: None,
            offline_queue: false,
            hub_navigation: true,
            notification_recipients: Vec::new(),
            simulation: SimulationConfig::default(),
        }
    }
}

impl ProvisioningConfig {
    /// Address of the parent hub new workspaces are associated with.
    #[must_use]
    pub fn hub_url(&self) -> &str {
        &self.hub_url
    }

    /// Directory holding provisioning logs and the offline queue.
    #[must_use]
    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    /// Upper bound for a single step or compensation; `None` waits forever.
    #[must_use]
    pub fn step_timeout(&self) -> Option<Duration> {
        self.step_timeout
    }

    #[must_use]
    pub fn offline_queue(&self) -> bool {
        self.offline_queue
    }

    #[must_use]
    pub fn hub_navigation(&self) -> bool {
        self.hub_navigation
    }

    #[must_use]
    pub fn notification_recipients(&self) -> &[String] {
        &self.notification_recipients
    }

    #[must_use]
    pub fn simulation(&self) -> &SimulationConfig {
        &self.simulation
    }

    /// Resolve relative paths against `base` (the config file's directory).
    #[must_use]
    pub fn with_base_dir(mut self, base: &Path) -> Self {
        if self.state_dir.is_relative() {
            self.state_dir = base.join(&self.state_dir);
        }
        self
    }

    #[must_use]
    pub fn with_state_dir(mut self, state_dir: PathBuf) -> Self {
        self.state_dir = state_dir;
        self
    }

    #[must_use]
    pub fn with_step_timeout(mut self, step_timeout: Option<Duration>) -> Self {
        self.step_timeout = step_timeout;
        self
    }
}
