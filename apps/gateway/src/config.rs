//! Gateway configuration.
//!
//! Stored as TOML, `hearthlink.toml` in the working directory unless the
//! first argument or `HEARTHLINK_CONFIG` names another file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use hearthlink_devices::{ReceiverSettings, VolumeRange};
use hearthlink_discovery::DiscoveryConfig;
use hearthlink_hub_connection::HubSettings;

pub const DEFAULT_CONFIG_FILE: &str = "hearthlink.toml";
pub const CONFIG_ENV: &str = "HEARTHLINK_CONFIG";

/// Top-level configuration. A missing section disables that platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub hub: Option<HubSection>,

    #[serde(default)]
    pub receiver: Option<ReceiverSection>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            hub: None,
            receiver: Some(ReceiverSection::default()),
        }
    }
}

/// Home-automation hub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HubSection {
    #[serde(default = "default_name")]
    pub name: String,
    pub host: String,
    /// Socket port of the hub's line protocol.
    pub port: u16,
    /// Scheme for the catalog request.
    #[serde(default = "default_protocol")]
    pub protocol: String,
    /// Port of the hub's HTTP interface.
    pub http_port: u16,
    #[serde(default = "default_send_interval_ms")]
    pub send_interval_ms: u64,
    #[serde(default = "default_heartbeat_period_secs")]
    pub heartbeat_period_secs: u64,
    #[serde(default = "default_heartbeat_timeout_secs")]
    pub heartbeat_timeout_secs: u64,
}

impl HubSection {
    /// Rejects pacing values the connection cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        let periods = [
            ("send_interval_ms", self.send_interval_ms),
            ("heartbeat_period_secs", self.heartbeat_period_secs),
            ("heartbeat_timeout_secs", self.heartbeat_timeout_secs),
        ];
        for (key, value) in periods {
            if value == 0 {
                anyhow::bail!("hub.{key} must be greater than zero");
            }
        }
        Ok(())
    }

    pub fn settings(&self) -> HubSettings {
        let mut settings = HubSettings::new(self.host.clone(), self.port);
        settings.send_interval = Duration::from_millis(self.send_interval_ms);
        settings.heartbeat_period = Duration::from_secs(self.heartbeat_period_secs);
        settings.heartbeat_timeout = Duration::from_secs(self.heartbeat_timeout_secs);
        settings
    }
}

/// AV receivers found by browsing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiverSection {
    /// Volume in dB applied when switching on.
    #[serde(default)]
    pub play_volume: Option<f64>,
    #[serde(default = "default_min_volume")]
    pub min_volume: f64,
    #[serde(default = "default_max_volume")]
    pub max_volume: f64,
    #[serde(default)]
    pub set_main_input_to: Option<String>,
    #[serde(default = "default_expected_devices")]
    pub expected_devices: usize,
    /// Seconds.
    #[serde(default = "default_discovery_timeout")]
    pub discovery_timeout: u64,
}

impl Default for ReceiverSection {
    fn default() -> Self {
        Self {
            play_volume: None,
            min_volume: default_min_volume(),
            max_volume: default_max_volume(),
            set_main_input_to: None,
            expected_devices: default_expected_devices(),
            discovery_timeout: default_discovery_timeout(),
        }
    }
}

impl ReceiverSection {
    pub fn settings(&self) -> ReceiverSettings {
        ReceiverSettings {
            play_volume: self.play_volume,
            volume: VolumeRange {
                min: self.min_volume,
                max: self.max_volume,
            },
            set_main_input_to: self.set_main_input_to.clone(),
        }
    }

    pub fn discovery(&self) -> DiscoveryConfig {
        DiscoveryConfig {
            target_count: self.expected_devices,
            deadline: Duration::from_secs(self.discovery_timeout),
            ..DiscoveryConfig::default()
        }
    }
}

fn default_name() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "hearthlink".into())
}

fn default_protocol() -> String {
    "http".into()
}

fn default_send_interval_ms() -> u64 {
    500
}

fn default_heartbeat_period_secs() -> u64 {
    60
}

fn default_heartbeat_timeout_secs() -> u64 {
    150
}

fn default_min_volume() -> f64 {
    -50.0
}

fn default_max_volume() -> f64 {
    -20.0
}

fn default_expected_devices() -> usize {
    100
}

fn default_discovery_timeout() -> u64 {
    30
}

impl GatewayConfig {
    /// Loads configuration from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::warn!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: GatewayConfig =
            toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
        if let Some(hub) = &config.hub {
            hub.validate()
                .with_context(|| format!("invalid configuration in {}", path.display()))?;
        }
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }
}

/// Resolves the config file: explicit argument, then environment, then default.
pub fn config_path(arg: Option<String>, env: Option<String>) -> PathBuf {
    arg.or(env)
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
[hub]
name = "Living Room"
host = "192.168.1.2"
port = 5000
http_port = 5001

[receiver]
play_volume = -35.0
set_main_input_to = "AirPlay"
expected_devices = 1
discovery_timeout = 10
"#;

    #[test]
    fn default_config_browses_receivers_only() {
        let config = GatewayConfig::default();
        assert!(config.hub.is_none());
        let receiver = config.receiver.unwrap();
        assert_eq!(receiver.min_volume, -50.0);
        assert_eq!(receiver.max_volume, -20.0);
        assert_eq!(receiver.expected_devices, 100);
        assert_eq!(receiver.discovery_timeout, 30);
    }

    #[test]
    fn full_config_with_defaults_filled_in() {
        let config: GatewayConfig = toml::from_str(FULL).unwrap();

        let hub = config.hub.unwrap();
        assert_eq!(hub.protocol, "http");
        let settings = hub.settings();
        assert_eq!(settings.address(), "192.168.1.2:5000");
        assert_eq!(settings.send_interval, Duration::from_millis(500));
        assert_eq!(settings.heartbeat_timeout, Duration::from_secs(150));

        let receiver = config.receiver.unwrap();
        assert_eq!(receiver.settings().play_volume, Some(-35.0));
        assert_eq!(receiver.settings().set_main_input_to.as_deref(), Some("AirPlay"));
        let discovery = receiver.discovery();
        assert_eq!(discovery.target_count, 1);
        assert_eq!(discovery.deadline, Duration::from_secs(10));
        assert_eq!(discovery.check_interval, Duration::from_secs(5));
    }

    #[test]
    fn omitted_section_disables_platform() {
        let config: GatewayConfig =
            toml::from_str("[hub]\nhost = \"hub\"\nport = 5000\nhttp_port = 5001\n").unwrap();
        assert!(config.hub.is_some());
        assert!(config.receiver.is_none());
        assert!(!config.hub.unwrap().name.is_empty());
    }

    #[test]
    fn hub_without_host_is_rejected() {
        assert!(toml::from_str::<GatewayConfig>("[hub]\nport = 5000\n").is_err());
    }

    #[test]
    fn load_from_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("hearthlink.toml");
        std::fs::write(&path, FULL).unwrap();

        let config = GatewayConfig::load(&path).unwrap();
        assert_eq!(config.hub.unwrap().name, "Living Room");
    }

    #[test]
    fn missing_file_yields_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let config = GatewayConfig::load(&tmp.path().join("absent.toml")).unwrap();
        assert_eq!(config, GatewayConfig::default());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("bad.toml");
        std::fs::write(&path, "[hub\nhost=").unwrap();
        let err = GatewayConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("parsing"));
    }

    #[test]
    fn zero_pacing_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        for key in ["send_interval_ms", "heartbeat_period_secs", "heartbeat_timeout_secs"] {
            let path = tmp.path().join(format!("{key}.toml"));
            std::fs::write(
                &path,
                format!("[hub]\nhost = \"hub\"\nport = 5000\nhttp_port = 5001\n{key} = 0\n"),
            )
            .unwrap();

            let err = GatewayConfig::load(&path).unwrap_err();
            assert!(err.to_string().contains("invalid configuration"));
            assert!(format!("{err:#}").contains(key), "{err:#}");
        }
    }

    #[test]
    fn path_resolution_order() {
        assert_eq!(
            config_path(Some("a.toml".into()), Some("b.toml".into())),
            PathBuf::from("a.toml")
        );
        assert_eq!(config_path(None, Some("b.toml".into())), PathBuf::from("b.toml"));
        assert_eq!(config_path(None, None), PathBuf::from(DEFAULT_CONFIG_FILE));
    }
}
