//! Configuration management for callguard wrappers.
//!
//! Settings hold the data-only part of each wrapper's configuration so it can
//! be loaded from YAML. Callbacks, receivers and bound arguments are added in
//! code on the [`GuardConfig`] built from them.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::error::{GuardError, Result};
use crate::wrap::{GuardConfig, DEFAULT_QUIET_PERIOD, DEFAULT_THRESHOLD};

/// Settings for all three wrappers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WrapperSettings {
    /// Guarded invoker settings
    #[serde(default)]
    pub guard: GuardSettings,

    /// Throttle settings
    #[serde(default)]
    pub throttle: ThrottleSettings,

    /// Debounce settings
    #[serde(default)]
    pub debounce: DebounceSettings,
}

/// Guarded invoker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardSettings {
    /// Number of permitted calls
    #[serde(default = "default_invocation_limit")]
    pub invocation_limit: u32,

    /// Window during which calls are permitted, in milliseconds
    #[serde(default)]
    pub time_limit_ms: Option<u64>,

    /// Drop violating calls instead of returning an error
    #[serde(default)]
    pub fail_silently: bool,

    /// Defer permitted calls by this many milliseconds
    #[serde(default)]
    pub delay_ms: u64,

    /// Whether the deadline may be extended
    #[serde(default = "default_extension_allowed")]
    pub extension_allowed: bool,

    /// Label attached to log events
    #[serde(default)]
    pub name: Option<String>,
}

impl Default for GuardSettings {
    fn default() -> Self {
        Self {
            invocation_limit: default_invocation_limit(),
            time_limit_ms: None,
            fail_silently: false,
            delay_ms: 0,
            extension_allowed: default_extension_allowed(),
            name: None,
        }
    }
}

fn default_invocation_limit() -> u32 {
    1
}

fn default_extension_allowed() -> bool {
    true
}

impl GuardSettings {
    /// The configured time limit.
    pub fn time_limit(&self) -> Option<Duration> {
        self.time_limit_ms.map(Duration::from_millis)
    }

    /// The configured delay.
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

impl<S, A> From<GuardSettings> for GuardConfig<S, A> {
    fn from(settings: GuardSettings) -> Self {
        let mut config = GuardConfig::new()
            .invocation_limit(settings.invocation_limit)
            .fail_silently(settings.fail_silently)
            .delay(settings.delay())
            .extension_allowed(settings.extension_allowed);

        if let Some(time_limit) = settings.time_limit() {
            config = config.time_limit(time_limit);
        }

        if let Some(name) = settings.name {
            config = config.name(name);
        }

        config
    }
}

/// Throttle settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThrottleSettings {
    /// Minimum spacing between effective calls, in milliseconds
    #[serde(default = "default_threshold_ms")]
    pub threshold_ms: u64,
}

impl Default for ThrottleSettings {
    fn default() -> Self {
        Self {
            threshold_ms: default_threshold_ms(),
        }
    }
}

fn default_threshold_ms() -> u64 {
    DEFAULT_THRESHOLD.as_millis() as u64
}

impl ThrottleSettings {
    /// The configured threshold.
    pub fn threshold(&self) -> Duration {
        Duration::from_millis(self.threshold_ms)
    }
}

/// Debounce settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebounceSettings {
    /// Quiet period before a burst's last call runs, in milliseconds
    #[serde(default = "default_quiet_period_ms")]
    pub quiet_period_ms: u64,
}

impl Default for DebounceSettings {
    fn default() -> Self {
        Self {
            quiet_period_ms: default_quiet_period_ms(),
        }
    }
}

fn default_quiet_period_ms() -> u64 {
    DEFAULT_QUIET_PERIOD.as_millis() as u64
}

impl DebounceSettings {
    /// The configured quiet period.
    pub fn quiet_period(&self) -> Duration {
        Duration::from_millis(self.quiet_period_ms)
    }
}

impl WrapperSettings {
    /// Load settings from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading wrapper settings");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load settings from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| GuardError::Config(format!("Failed to parse wrapper settings: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_settings() {
        let yaml = r#"
guard:
  invocation_limit: 3
  time_limit_ms: 1000
  fail_silently: true
  delay_ms: 20
  extension_allowed: false
  name: checkout
throttle:
  threshold_ms: 100
debounce:
  quiet_period_ms: 400
"#;
        let settings = WrapperSettings::from_yaml(yaml).unwrap();

        assert_eq!(settings.guard.invocation_limit, 3);
        assert_eq!(settings.guard.time_limit(), Some(Duration::from_secs(1)));
        assert!(settings.guard.fail_silently);
        assert_eq!(settings.guard.delay(), Duration::from_millis(20));
        assert!(!settings.guard.extension_allowed);
        assert_eq!(settings.guard.name.as_deref(), Some("checkout"));
        assert_eq!(settings.throttle.threshold(), Duration::from_millis(100));
        assert_eq!(settings.debounce.quiet_period(), Duration::from_millis(400));
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let settings = WrapperSettings::from_yaml("guard:\n  time_limit_ms: 50\n").unwrap();

        assert_eq!(settings.guard.invocation_limit, 1);
        assert_eq!(settings.guard.time_limit(), Some(Duration::from_millis(50)));
        assert!(settings.guard.extension_allowed);
        assert!(!settings.guard.fail_silently);
        assert_eq!(settings.throttle.threshold(), DEFAULT_THRESHOLD);
        assert_eq!(settings.debounce.quiet_period(), DEFAULT_QUIET_PERIOD);
    }

    #[test]
    fn test_invalid_yaml_is_config_error() {
        let result = WrapperSettings::from_yaml("guard:\n  invocation_limit: lots\n");
        assert!(matches!(result, Err(GuardError::Config(_))));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = WrapperSettings::from_file("/nonexistent/callguard.yaml");
        assert!(matches!(result, Err(GuardError::Io(_))));
    }

    #[test]
    fn test_guard_settings_into_config() {
        let settings = GuardSettings {
            invocation_limit: 4,
            time_limit_ms: Some(250),
            fail_silently: true,
            delay_ms: 10,
            extension_allowed: false,
            name: Some("settings".to_string()),
        };

        let config: GuardConfig<(), i32> = settings.into();

        assert_eq!(config.invocation_limit, 4);
        assert_eq!(config.time_limit, Some(Duration::from_millis(250)));
        assert!(config.fail_silently);
        assert_eq!(config.delay, Duration::from_millis(10));
        assert!(!config.extension_allowed);
        assert_eq!(config.name.as_deref(), Some("settings"));
        assert!(config.on_timeout.is_none());
    }

    #[test]
    fn test_settings_drive_a_guard() {
        let settings = WrapperSettings::from_yaml("guard:\n  invocation_limit: 2\n").unwrap();
        let guarded = crate::wrap::guard(|_: &(), args: &[i32]| args.len(), settings.guard);

        assert_eq!(guarded.call((), vec![1, 2]).unwrap(), Some(2));
        assert_eq!(guarded.call((), Vec::new()).unwrap(), Some(0));
        assert!(matches!(
            guarded.call((), Vec::new()),
            Err(GuardError::InvocationLimitExceeded)
        ));
    }
}
