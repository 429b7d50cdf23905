//! Module configuration.
//!
//! Loaded once from a JSON file at startup. Every field has a default, so `{}`
//! is a valid configuration:
//!
//! ```json
//! {
//!   "general":   { "name": "jointControl", "sampling_time": 0.01,
//!                  "dataset_type": "walking", "dataset_root": "/data", "joint_count": 23 },
//!   "trigger":   { "contact_threshold": 100.0, "feedback_timeout_ms": 100 },
//!   "startup":   { "initial_move_secs": 5.0, "countdown_ticks": 5 },
//!   "estimator": { "peers": { "/base-estimator/rpc": "127.0.0.1:10001" } }
//! }
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::coordinator::PrepareSettings;
use crate::handshake::{Countdown, EstimatorNames};

/// Upper bound for any duration given in seconds (one day).
pub const MAX_SETTING_SECS: f64 = 86_400.0;

/// Seconds to a `Duration`, clamped to `0..=MAX_SETTING_SECS`. NaN maps to zero.
fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value.clamp(0.0, MAX_SETTING_SECS)).unwrap_or_default()
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleConfig {
    pub general: GeneralConfig,
    pub trigger: TriggerConfig,
    pub startup: StartupConfig,
    pub estimator: EstimatorConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Module name, used as a prefix for log output.
    pub name: String,
    /// Control period in seconds.
    pub sampling_time: f64,
    /// Dataset directory under `<dataset_root>/txtDatasets/`.
    pub dataset_type: String,
    pub dataset_root: PathBuf,
    /// Values per dataset line.
    pub joint_count: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            name: "jointControl".to_string(),
            sampling_time: 0.01,
            dataset_type: "default".to_string(),
            dataset_root: PathBuf::from("."),
            joint_count: crate::dataset::DEFAULT_JOINT_COUNT,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerConfig {
    /// Vertical force both feet must exceed, newtons.
    pub contact_threshold: f64,
    pub feedback_timeout_ms: u64,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            contact_threshold: crate::gate::DEFAULT_CONTACT_THRESHOLD,
            feedback_timeout_ms: 100,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StartupConfig {
    /// Wait after connecting to the robot, before loading the dataset.
    pub pre_load_delay_secs: f64,
    pub initial_move_secs: f64,
    pub motion_timeout_secs: f64,
    pub motion_poll_ms: u64,
    pub settle_secs: f64,
    pub countdown_ticks: u32,
    pub countdown_tick_secs: f64,
}

impl Default for StartupConfig {
    fn default() -> Self {
        Self {
            pre_load_delay_secs: 2.0,
            initial_move_secs: 5.0,
            motion_timeout_secs: 15.0,
            motion_poll_ms: 10,
            settle_secs: 2.0,
            countdown_ticks: 5,
            countdown_tick_secs: 1.0,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    pub rpc_name: String,
    pub state_source: String,
    pub state_sink: String,
    pub start_command: String,
    pub connect_timeout_ms: u64,
    pub reply_timeout_ms: u64,
    /// Name registry: peer name -> `host:port`.
    pub peers: HashMap<String, String>,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        let names = EstimatorNames::default();
        Self {
            rpc_name: names.rpc,
            state_source: names.state_source,
            state_sink: names.state_sink,
            start_command: names.start_command,
            connect_timeout_ms: 1000,
            reply_timeout_ms: 2000,
            peers: HashMap::new(),
        }
    }
}

impl ModuleConfig {
    /// Read and validate a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let g = &self.general;
        if g.name.trim().is_empty() {
            anyhow::bail!("general.name must not be empty");
        }
        if !(g.sampling_time > 0.0 && g.sampling_time <= MAX_SETTING_SECS) {
            anyhow::bail!(
                "general.sampling_time must be in (0, {}] seconds, got {}",
                MAX_SETTING_SECS,
                g.sampling_time
            );
        }
        if g.joint_count == 0 {
            anyhow::bail!("general.joint_count must be positive");
        }
        if !self.trigger.contact_threshold.is_finite() {
            anyhow::bail!("trigger.contact_threshold must be finite");
        }

        let s = &self.startup;
        for (key, secs) in [
            ("startup.pre_load_delay_secs", s.pre_load_delay_secs),
            ("startup.initial_move_secs", s.initial_move_secs),
            ("startup.motion_timeout_secs", s.motion_timeout_secs),
            ("startup.settle_secs", s.settle_secs),
            ("startup.countdown_tick_secs", s.countdown_tick_secs),
        ] {
            if !(0.0..=MAX_SETTING_SECS).contains(&secs) {
                anyhow::bail!(
                    "{} must be in [0, {}] seconds, got {}",
                    key,
                    MAX_SETTING_SECS,
                    secs
                );
            }
        }
        Ok(())
    }

    pub fn period(&self) -> Duration {
        seconds(self.general.sampling_time)
    }

    pub fn dataset_path(&self) -> PathBuf {
        crate::dataset::dataset_path(&self.general.dataset_root, &self.general.dataset_type)
    }

    pub fn feedback_timeout(&self) -> Duration {
        Duration::from_millis(self.trigger.feedback_timeout_ms)
    }

    pub fn pre_load_delay(&self) -> Duration {
        seconds(self.startup.pre_load_delay_secs)
    }

    pub fn prepare_settings(&self) -> PrepareSettings {
        let s = &self.startup;
        PrepareSettings {
            initial_move: seconds(s.initial_move_secs),
            motion_timeout: seconds(s.motion_timeout_secs),
            poll_interval: Duration::from_millis(s.motion_poll_ms),
            settle: seconds(s.settle_secs),
        }
    }

    pub fn countdown(&self) -> Countdown {
        Countdown {
            ticks: self.startup.countdown_ticks,
            tick: seconds(self.startup.countdown_tick_secs),
        }
    }

    pub fn estimator_names(&self) -> EstimatorNames {
        let e = &self.estimator;
        EstimatorNames {
            rpc: e.rpc_name.clone(),
            state_source: e.state_source.clone(),
            state_sink: e.state_sink.clone(),
            start_command: e.start_command.clone(),
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.estimator.connect_timeout_ms)
    }

    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.estimator.reply_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_object_uses_defaults() {
        let config: ModuleConfig = serde_json::from_str("{}").unwrap();
        config.validate().unwrap();
        assert_eq!(config.period(), Duration::from_millis(10));
        assert_eq!(config.general.joint_count, 23);
        assert_eq!(config.trigger.contact_threshold, 100.0);
        assert_eq!(config.feedback_timeout(), Duration::from_millis(100));
        assert_eq!(config.countdown().ticks, 5);
        assert_eq!(config.estimator_names().rpc, "/base-estimator/rpc");
        assert_eq!(
            config.dataset_path(),
            PathBuf::from("./txtDatasets/default/jointDataset.txt")
        );
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let config: ModuleConfig = serde_json::from_str(
            r#"{
                "general": { "dataset_type": "walking", "sampling_time": 0.005 },
                "estimator": { "peers": { "/logger": "127.0.0.1:9000" } }
            }"#,
        )
        .unwrap();
        config.validate().unwrap();
        assert_eq!(config.general.name, "jointControl");
        assert_eq!(config.period(), Duration::from_millis(5));
        assert_eq!(config.estimator.peers["/logger"], "127.0.0.1:9000");
        assert_eq!(config.prepare_settings().initial_move, Duration::from_secs(5));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = ModuleConfig::default();
        config.general.sampling_time = 0.0;
        assert!(config.validate().is_err());

        let mut config = ModuleConfig::default();
        config.general.joint_count = 0;
        assert!(config.validate().is_err());

        let mut config = ModuleConfig::default();
        config.startup.settle_secs = -1.0;
        assert!(config.validate().is_err());

        let mut config = ModuleConfig::default();
        config.general.name = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_out_of_range_durations_are_rejected() {
        let config: ModuleConfig =
            serde_json::from_str(r#"{ "startup": { "settle_secs": 1e20 } }"#).unwrap();
        assert!(config.validate().is_err());
        assert_eq!(
            config.prepare_settings().settle,
            Duration::from_secs_f64(MAX_SETTING_SECS)
        );

        let mut config = ModuleConfig::default();
        config.general.sampling_time = 1e30;
        assert!(config.validate().is_err());
        assert_eq!(config.period(), Duration::from_secs_f64(MAX_SETTING_SECS));

        let mut config = ModuleConfig::default();
        config.startup.countdown_tick_secs = f64::NAN;
        assert!(config.validate().is_err());
        assert_eq!(config.countdown().tick, Duration::ZERO);

        let mut config = ModuleConfig::default();
        config.startup.motion_timeout_secs = MAX_SETTING_SECS;
        config.validate().unwrap();
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jointControl.json");
        std::fs::write(&path, r#"{ "trigger": { "contact_threshold": 80.0 } }"#).unwrap();
        let config = ModuleConfig::from_file(&path).unwrap();
        assert_eq!(config.trigger.contact_threshold, 80.0);

        std::fs::write(&path, r#"{ "general": { "joint_count": 0 } }"#).unwrap();
        assert!(ModuleConfig::from_file(&path).is_err());
        assert!(ModuleConfig::from_file(dir.path().join("missing.json")).is_err());
    }
}
