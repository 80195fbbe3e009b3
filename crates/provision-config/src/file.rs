use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use provision_core::TOTAL_STEPS;
use serde::Deserialize;
use tracing::debug;

use crate::config::{ProvisioningConfig, SimulationConfig};
use crate::error::ConfigError;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    hub_url: Option<String>,
    state_dir: Option<PathBuf>,
    step_timeout_secs: Option<u64>,
    offline_queue: Option<bool>,
    #[serde(default)]
    simulation: Option<SimulationSection>,
    #[serde(default)]
    notifications: Option<NotificationsSection>,
    #[serde(default)]
    hub_navigation: Option<HubNavigationSection>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SimulationSection {
    enabled: Option<bool>,
    latency_ms: Option<u64>,
    fail_at_step: Option<u8>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct NotificationsSection {
    #[serde(default)]
    recipients: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct HubNavigationSection {
    enabled: Option<bool>,
}

/// Loads configuration from `path`.
///
/// A missing file yields the defaults. Relative paths inside the file are
/// resolved against the file's directory.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed, or if a
/// value is out of range.
pub fn load_config(path: &Path) -> Result<ProvisioningConfig, ConfigError> {
    let base = path.parent().unwrap_or_else(|| Path::new("."));

    if !path.exists() {
        debug!(path = %path.display(), "config file not found, using defaults");
        return Ok(ProvisioningConfig::default().with_base_dir(base));
    }

    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let file: ConfigFile = toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(build_config(file)?.with_base_dir(base))
}

fn build_config(file: ConfigFile) -> Result<ProvisioningConfig, ConfigError> {
    let defaults = ProvisioningConfig::default();

    let step_timeout = match file.step_timeout_secs {
        Some(0) => {
            return Err(ConfigError::Invalid {
                field: "step_timeout_secs",
                reason: "must be greater than zero".to_string(),
            });
        }
        Some(secs) => Some(Duration::from_secs(secs)),
        None => None,
    };

    let hub_url = file.hub_url.unwrap_or(defaults.hub_url);
    if hub_url.trim().is_empty() {
        return Err(ConfigError::Invalid {
            field: "hub_url",
            reason: "must not be empty".to_string(),
        });
    }

    Ok(ProvisioningConfig {
        hub_url: hub_url.trim_end_matches('/').to_string(),
        state_dir: file.state_dir.unwrap_or(defaults.state_dir),
        step_timeout,
        offline_queue: file.offline_queue.unwrap_or(defaults.offline_queue),
        hub_navigation: file
            .hub_navigation
            .and_then(|section| section.enabled)
            .unwrap_or(defaults.hub_navigation),
        notification_recipients: file
            .notifications
            .map(|section| section.recipients)
            .unwrap_or_default(),
        simulation: build_simulation(file.simulation)?,
    })
}

fn build_simulation(section: Option<SimulationSection>) -> Result<SimulationConfig, ConfigError> {
    let defaults = SimulationConfig::default();
    let Some(section) = section else {
        return Ok(defaults);
    };

    if let Some(step) = section.fail_at_step {
        if !(1..=TOTAL_STEPS).contains(&step) {
            return Err(ConfigError::Invalid {
                field: "simulation.fail_at_step",
                reason: format!("step {step} is outside 1..={TOTAL_STEPS}"),
            });
        }
    }

    Ok(SimulationConfig {
        enabled: section.enabled.unwrap_or(defaults.enabled),
        latency: section
            .latency_ms
            .map_or(defaults.latency, Duration::from_millis),
        fail_at_step: section.fail_at_step,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_HUB_URL;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("provisioning.toml");
        fs::write(&path, content).expect("write config");
        path
    }

    #[test]
    fn missing_file_yields_defaults_under_base_dir() {
        let dir = TempDir::new().expect("create temp dir");

        let config = load_config(&dir.path().join("provisioning.toml")).expect("load defaults");

        assert_eq!(config.hub_url(), DEFAULT_HUB_URL);
        assert_eq!(config.state_dir(), dir.path().join(".provisioning"));
        assert!(config.step_timeout().is_none());
        assert!(!config.simulation().enabled());
        assert!(config.hub_navigation());
    }

    #[test]
    fn full_file_is_parsed() {
        let dir = TempDir::new().expect("create temp dir");
        let path = write_config(
            &dir,
            r#"
hub_url = "https://contoso.example.com/sites/hub/"
state_dir = "state"
step_timeout_secs = 45
offline_queue = true

[simulation]
enabled = true
latency_ms = 0
fail_at_step = 4

[notifications]
recipients = ["pm@example.com", "it@example.com"]

[hub_navigation]
enabled = false
"#,
        );

        let config = load_config(&path).expect("load config");

        assert_eq!(config.hub_url(), "https://contoso.example.com/sites/hub");
        assert_eq!(config.state_dir(), dir.path().join("state"));
        assert_eq!(config.step_timeout(), Some(Duration::from_secs(45)));
        assert!(config.offline_queue());
        assert!(!config.hub_navigation());
        assert_eq!(config.notification_recipients().len(), 2);
        assert!(config.simulation().enabled());
        assert_eq!(config.simulation().latency(), Duration::ZERO);
        assert_eq!(config.simulation().fail_at_step(), Some(4));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let dir = TempDir::new().expect("create temp dir");
        let path = write_config(&dir, "step_timeout_secs = 0\n");

        let err = load_config(&path).expect_err("zero timeout should fail");

        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "step_timeout_secs",
                ..
            }
        ));
    }

    #[test]
    fn out_of_range_fail_step_is_rejected() {
        let dir = TempDir::new().expect("create temp dir");
        let path = write_config(&dir, "[simulation]\nfail_at_step = 8\n");

        let err = load_config(&path).expect_err("step 8 should fail");

        assert!(err.to_string().contains("simulation.fail_at_step"));
    }

    #[test]
    fn malformed_file_reports_path() {
        let dir = TempDir::new().expect("create temp dir");
        let path = write_config(&dir, "hub_url = [not toml");

        let err = load_config(&path).expect_err("parse should fail");

        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("provisioning.toml"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = TempDir::new().expect("create temp dir");
        let path = write_config(&dir, "hub = \"typo\"\n");

        assert!(load_config(&path).is_err());
    }
}
