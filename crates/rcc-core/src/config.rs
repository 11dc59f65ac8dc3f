//! Timing configuration
//!
//! Values are layered: the built-in baseline, then `RCC_TIMING_*`
//! environment variables, then an optional `config.json`, then an optional
//! `band-plan.json`. The merged result is validated before use.
//!
//! Durations in the environment and in `config.json` use humantime syntax
//! (`"500ms"`, `"15s"`, `"1h"`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::band_plan::BandPlan;

/// Prefix shared by all timing environment variables
pub const ENV_PREFIX: &str = "RCC_TIMING_";

/// Inline band plan JSON
pub const BAND_PLAN_ENV: &str = "RCC_BAND_PLAN";

/// Timing override file name
pub const CONFIG_FILE: &str = "config.json";

/// Band plan file name
pub const BAND_PLAN_FILE: &str = "band-plan.json";

const MIN_COMMAND_TIMEOUT: Duration = Duration::from_millis(100);
const MAX_COMMAND_TIMEOUT: Duration = Duration::from_secs(5 * 60);
const MAX_BACKOFF: f64 = 10.0;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A config file exists but could not be read
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A config file or inline JSON could not be parsed
    #[error("failed to parse {what}: {source}")]
    Parse {
        what: String,
        #[source]
        source: serde_json::Error,
    },

    /// A single override value is malformed
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },

    /// The merged configuration breaks a rule
    #[error("configuration validation failed: {0}")]
    Invalid(String),
}

/// Heartbeat cadence for adapter transports
#[derive(Debug, Clone, PartialEq)]
pub struct HeartbeatConfig {
    pub interval: Duration,
    pub jitter: Duration,
    pub timeout: Duration,
}

/// Exponential probe schedule for one radio health state
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeBackoff {
    pub initial: Duration,
    pub backoff: f64,
    pub max: Duration,
}

/// Health probe cadence for adapter transports
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeConfig {
    pub normal_interval: Duration,
    pub recovering: ProbeBackoff,
    pub offline: ProbeBackoff,
}

/// Deadline applied to each command type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandTimeouts {
    pub set_power: Duration,
    pub set_channel: Duration,
    pub select_radio: Duration,
    pub get_state: Duration,
}

impl Default for CommandTimeouts {
    fn default() -> Self {
        Self {
            set_power: Duration::from_secs(10),
            set_channel: Duration::from_secs(30),
            select_radio: Duration::from_secs(5),
            get_state: Duration::from_secs(5),
        }
    }
}

impl CommandTimeouts {
    fn named(&self) -> [(&'static str, Duration); 4] {
        [
            ("setPower", self.set_power),
            ("setChannel", self.set_channel),
            ("selectRadio", self.select_radio),
            ("getState", self.get_state),
        ]
    }
}

/// Per-radio telemetry buffer limits
#[derive(Debug, Clone, PartialEq)]
pub struct EventBufferConfig {
    pub size: usize,
    pub retention: Duration,
}

/// Complete timing configuration
#[derive(Debug, Clone, PartialEq)]
pub struct TimingConfig {
    pub heartbeat: HeartbeatConfig,
    pub probe: ProbeConfig,
    pub commands: CommandTimeouts,
    pub event_buffer: EventBufferConfig,
    pub band_plan: Option<BandPlan>,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self::baseline()
    }
}

/// Partial timing values from the environment or `config.json`
///
/// Only fields that are present override the current configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct TimingOverrides {
    pub heartbeat_interval: Option<String>,
    pub heartbeat_jitter: Option<String>,
    pub heartbeat_timeout: Option<String>,
    pub probe_normal_interval: Option<String>,
    pub probe_recovering_initial: Option<String>,
    pub probe_recovering_backoff: Option<f64>,
    pub probe_recovering_max: Option<String>,
    pub probe_offline_initial: Option<String>,
    pub probe_offline_backoff: Option<f64>,
    pub probe_offline_max: Option<String>,
    pub command_timeout_set_power: Option<String>,
    pub command_timeout_set_channel: Option<String>,
    pub command_timeout_select_radio: Option<String>,
    pub command_timeout_get_state: Option<String>,
    pub event_buffer_size: Option<usize>,
    pub event_buffer_retention: Option<String>,
}

impl TimingOverrides {
    /// Read `RCC_TIMING_*` variables through `lookup`
    ///
    /// Empty values count as unset.
    pub fn from_env<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |suffix: &str| lookup(&format!("{ENV_PREFIX}{suffix}")).filter(|v| !v.is_empty());
        let number = |suffix: &str| -> Result<Option<f64>, ConfigError> {
            get(suffix)
                .map(|v| {
                    v.trim().parse::<f64>().map_err(|_| ConfigError::InvalidValue {
                        key: format!("{ENV_PREFIX}{suffix}"),
                        value: v.clone(),
                    })
                })
                .transpose()
        };

        let event_buffer_size = get("EVENT_BUFFER_SIZE")
            .map(|v| {
                v.trim().parse::<usize>().map_err(|_| ConfigError::InvalidValue {
                    key: format!("{ENV_PREFIX}EVENT_BUFFER_SIZE"),
                    value: v.clone(),
                })
            })
            .transpose()?;

        Ok(Self {
            heartbeat_interval: get("HEARTBEAT_INTERVAL"),
            heartbeat_jitter: get("HEARTBEAT_JITTER"),
            heartbeat_timeout: get("HEARTBEAT_TIMEOUT"),
            probe_normal_interval: get("PROBE_NORMAL_INTERVAL"),
            probe_recovering_initial: get("PROBE_RECOVERING_INITIAL"),
            probe_recovering_backoff: number("PROBE_RECOVERING_BACKOFF")?,
            probe_recovering_max: get("PROBE_RECOVERING_MAX"),
            probe_offline_initial: get("PROBE_OFFLINE_INITIAL"),
            probe_offline_backoff: number("PROBE_OFFLINE_BACKOFF")?,
            probe_offline_max: get("PROBE_OFFLINE_MAX"),
            command_timeout_set_power: get("COMMAND_SET_POWER"),
            command_timeout_set_channel: get("COMMAND_SET_CHANNEL"),
            command_timeout_select_radio: get("COMMAND_SELECT_RADIO"),
            command_timeout_get_state: get("COMMAND_GET_STATE"),
            event_buffer_size,
            event_buffer_retention: get("EVENT_BUFFER_RETENTION"),
        })
    }
}

fn parse_duration(key: &str, value: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(value.trim()).map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn apply_duration(target: &mut Duration, key: &str, value: &Option<String>) -> Result<(), ConfigError> {
    if let Some(value) = value {
        *target = parse_duration(key, value)?;
    }
    Ok(())
}

impl TimingConfig {
    /// Built-in timing baseline
    pub fn baseline() -> Self {
        Self {
            heartbeat: HeartbeatConfig {
                interval: Duration::from_secs(15),
                jitter: Duration::from_secs(2),
                timeout: Duration::from_secs(45),
            },
            probe: ProbeConfig {
                normal_interval: Duration::from_secs(30),
                recovering: ProbeBackoff {
                    initial: Duration::from_secs(5),
                    backoff: 1.5,
                    max: Duration::from_secs(15),
                },
                offline: ProbeBackoff {
                    initial: Duration::from_secs(10),
                    backoff: 2.0,
                    max: Duration::from_secs(300),
                },
            },
            commands: CommandTimeouts::default(),
            event_buffer: EventBufferConfig {
                size: 50,
                retention: Duration::from_secs(60 * 60),
            },
            band_plan: None,
        }
    }

    /// Load from the process environment and the current directory
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Path::new("."), |key| std::env::var(key).ok())
    }

    /// Load with an explicit config directory and environment lookup
    pub fn load_from<F>(dir: &Path, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::baseline();

        config.apply_overrides(&TimingOverrides::from_env(&lookup)?)?;
        if let Some(json) = lookup(BAND_PLAN_ENV).filter(|v| !v.is_empty()) {
            let plan = BandPlan::from_json(&json).map_err(|source| ConfigError::Parse {
                what: BAND_PLAN_ENV.to_string(),
                source,
            })?;
            config.band_plan = Some(plan);
        }

        let config_path = dir.join(CONFIG_FILE);
        if let Some(text) = read_optional(&config_path)? {
            let overrides: TimingOverrides =
                serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
                    what: config_path.display().to_string(),
                    source,
                })?;
            config.apply_overrides(&overrides)?;
            debug!("Applied timing overrides from {}", config_path.display());
        }

        let plan_path = dir.join(BAND_PLAN_FILE);
        if let Some(text) = read_optional(&plan_path)? {
            let plan = BandPlan::from_json(&text).map_err(|source| ConfigError::Parse {
                what: plan_path.display().to_string(),
                source,
            })?;
            info!("Loaded band plan with {} models", plan.models.len());
            config.band_plan = Some(plan);
        }

        config.validate()?;
        Ok(config)
    }

    /// Apply the fields present in `overrides`
    pub fn apply_overrides(&mut self, o: &TimingOverrides) -> Result<(), ConfigError> {
        apply_duration(&mut self.heartbeat.interval, "heartbeatInterval", &o.heartbeat_interval)?;
        apply_duration(&mut self.heartbeat.jitter, "heartbeatJitter", &o.heartbeat_jitter)?;
        apply_duration(&mut self.heartbeat.timeout, "heartbeatTimeout", &o.heartbeat_timeout)?;

        apply_duration(
            &mut self.probe.normal_interval,
            "probeNormalInterval",
            &o.probe_normal_interval,
        )?;
        apply_duration(
            &mut self.probe.recovering.initial,
            "probeRecoveringInitial",
            &o.probe_recovering_initial,
        )?;
        apply_duration(
            &mut self.probe.recovering.max,
            "probeRecoveringMax",
            &o.probe_recovering_max,
        )?;
        apply_duration(
            &mut self.probe.offline.initial,
            "probeOfflineInitial",
            &o.probe_offline_initial,
        )?;
        apply_duration(&mut self.probe.offline.max, "probeOfflineMax", &o.probe_offline_max)?;
        if let Some(backoff) = o.probe_recovering_backoff {
            self.probe.recovering.backoff = backoff;
        }
        if let Some(backoff) = o.probe_offline_backoff {
            self.probe.offline.backoff = backoff;
        }

        apply_duration(
            &mut self.commands.set_power,
            "commandTimeoutSetPower",
            &o.command_timeout_set_power,
        )?;
        apply_duration(
            &mut self.commands.set_channel,
            "commandTimeoutSetChannel",
            &o.command_timeout_set_channel,
        )?;
        apply_duration(
            &mut self.commands.select_radio,
            "commandTimeoutSelectRadio",
            &o.command_timeout_select_radio,
        )?;
        apply_duration(
            &mut self.commands.get_state,
            "commandTimeoutGetState",
            &o.command_timeout_get_state,
        )?;

        if let Some(size) = o.event_buffer_size {
            self.event_buffer.size = size;
        }
        apply_duration(
            &mut self.event_buffer.retention,
            "eventBufferRetention",
            &o.event_buffer_retention,
        )?;

        Ok(())
    }

    /// Check the rules every configuration must satisfy
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        let hb = &self.heartbeat;
        if hb.interval.is_zero() {
            return invalid("heartbeat interval must be positive".into());
        }
        if hb.jitter > hb.interval / 2 {
            return invalid(format!(
                "heartbeat jitter {:?} exceeds 50% of interval {:?}",
                hb.jitter, hb.interval
            ));
        }
        if hb.timeout < hb.interval {
            return invalid(format!(
                "heartbeat timeout {:?} must be >= interval {:?}",
                hb.timeout, hb.interval
            ));
        }

        if self.probe.normal_interval.is_zero() {
            return invalid("probe normal interval must be positive".into());
        }
        for (name, probe) in [("recovering", &self.probe.recovering), ("offline", &self.probe.offline)] {
            if probe.initial.is_zero() {
                return invalid(format!("probe {name} initial must be positive"));
            }
            if probe.backoff.is_nan() || probe.backoff < 1.0 {
                return invalid(format!("probe {name} backoff must be >= 1.0, got {}", probe.backoff));
            }
            if probe.max < probe.initial {
                return invalid(format!(
                    "probe {name} max {:?} must be >= initial {:?}",
                    probe.max, probe.initial
                ));
            }
        }

        for (name, timeout) in self.commands.named() {
            if timeout.is_zero() {
                return invalid(format!("command timeout {name} must be positive"));
            }
        }

        if self.event_buffer.size == 0 {
            return invalid("event buffer size must be positive".into());
        }
        if self.event_buffer.retention.is_zero() {
            return invalid("event buffer retention must be positive".into());
        }

        if let Some(plan) = &self.band_plan {
            plan.validate().map_err(ConfigError::Invalid)?;
        }

        Ok(())
    }

    /// Stricter operational limits on top of [`validate`](Self::validate)
    pub fn validate_constraints(&self) -> Result<(), ConfigError> {
        for (name, probe) in [("recovering", &self.probe.recovering), ("offline", &self.probe.offline)] {
            if probe.backoff > MAX_BACKOFF {
                return Err(ConfigError::Invalid(format!(
                    "probe {name} backoff {} is too aggressive (max {MAX_BACKOFF})",
                    probe.backoff
                )));
            }
        }

        for (name, timeout) in self.commands.named() {
            if !(MIN_COMMAND_TIMEOUT..=MAX_COMMAND_TIMEOUT).contains(&timeout) {
                return Err(ConfigError::Invalid(format!(
                    "command timeout {name} {timeout:?} outside [{MIN_COMMAND_TIMEOUT:?}, {MAX_COMMAND_TIMEOUT:?}]"
                )));
            }
        }

        Ok(())
    }
}

fn read_optional(path: &Path) -> Result<Option<String>, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_baseline_is_valid() {
        let config = TimingConfig::baseline();
        assert!(config.validate().is_ok());
        assert!(config.validate_constraints().is_ok());
        assert_eq!(config.commands.set_channel, Duration::from_secs(30));
        assert_eq!(config.event_buffer.size, 50);
    }

    #[test]
    fn test_env_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let config = TimingConfig::load_from(
            dir.path(),
            env(&[
                ("RCC_TIMING_COMMAND_SET_POWER", "2s"),
                ("RCC_TIMING_PROBE_OFFLINE_BACKOFF", "3"),
                ("RCC_TIMING_EVENT_BUFFER_SIZE", "10"),
                ("RCC_TIMING_HEARTBEAT_JITTER", ""),
            ]),
        )
        .unwrap();

        assert_eq!(config.commands.set_power, Duration::from_secs(2));
        assert_eq!(config.probe.offline.backoff, 3.0);
        assert_eq!(config.event_buffer.size, 10);
        assert_eq!(config.heartbeat.jitter, Duration::from_secs(2));
    }

    #[test]
    fn test_malformed_env_value_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = TimingConfig::load_from(
            dir.path(),
            env(&[("RCC_TIMING_COMMAND_GET_STATE", "soon")]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_file_overrides_env() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            r#"{"commandTimeoutSetPower": "750ms", "eventBufferSize": 5}"#,
        )
        .unwrap();

        let config = TimingConfig::load_from(
            dir.path(),
            env(&[("RCC_TIMING_COMMAND_SET_POWER", "2s")]),
        )
        .unwrap();
        assert_eq!(config.commands.set_power, Duration::from_millis(750));
        assert_eq!(config.event_buffer.size, 5);
        assert_eq!(config.commands.get_state, Duration::from_secs(5));
    }

    #[test]
    fn test_band_plan_file_wins_over_env() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(BAND_PLAN_FILE),
            r#"{"models": {"A": {"default": [{"channelIndex": 1, "frequencyMhz": 2412.0}]}}}"#,
        )
        .unwrap();

        let config = TimingConfig::load_from(
            dir.path(),
            env(&[(BAND_PLAN_ENV, r#"{"models": {"B": {}}}"#)]),
        )
        .unwrap();
        let plan = config.band_plan.unwrap();
        assert_eq!(plan.models(), vec!["A"]);
    }

    #[test]
    fn test_invalid_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "{not json").unwrap();
        let err = TimingConfig::load_from(dir.path(), env(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_validation_rules() {
        let mut config = TimingConfig::baseline();
        config.heartbeat.jitter = Duration::from_secs(8);
        assert!(config.validate().is_err());

        let mut config = TimingConfig::baseline();
        config.probe.recovering.backoff = 0.5;
        assert!(config.validate().is_err());

        let mut config = TimingConfig::baseline();
        config.probe.offline.max = Duration::from_secs(1);
        assert!(config.validate().is_err());

        let mut config = TimingConfig::baseline();
        config.commands.select_radio = Duration::ZERO;
        assert!(config.validate().is_err());

        let mut config = TimingConfig::baseline();
        config.event_buffer.size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_constraints() {
        let mut config = TimingConfig::baseline();
        config.probe.offline.backoff = 12.0;
        assert!(config.validate().is_ok());
        assert!(config.validate_constraints().is_err());

        let mut config = TimingConfig::baseline();
        config.commands.set_power = Duration::from_millis(50);
        assert!(config.validate_constraints().is_err());

        let mut config = TimingConfig::baseline();
        config.commands.set_channel = Duration::from_secs(600);
        assert!(config.validate_constraints().is_err());
    }
}
