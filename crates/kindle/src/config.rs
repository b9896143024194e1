//! Context configuration.
//!
//! ```ignore
//! let config = ContextConfig::default()
//!     .run_in_background(true)
//!     .max_delta_secs(1.0 / 30.0);
//! let ctx = Context::with_config(config);
//! ```
//!
//! Configs can also be read from JSON; missing keys take their defaults.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const DEFAULT_MAX_DELTA_SECS: f32 = 0.1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Keep ticking while the host reports the view as hidden.
    pub run_in_background: bool,
    /// Upper bound for a single frame's delta, in seconds.
    pub max_delta_secs: f32,
    /// Multiplier applied to the clamped delta.
    pub time_scale: f32,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            run_in_background: false,
            max_delta_secs: DEFAULT_MAX_DELTA_SECS,
            time_scale: 1.0,
        }
    }
}

impl ContextConfig {
    /// Parse and validate a JSON config.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.max_delta_secs.is_finite() && self.max_delta_secs > 0.0) {
            return Err(ConfigError::MaxDelta(self.max_delta_secs));
        }
        if !(self.time_scale.is_finite() && self.time_scale >= 0.0) {
            return Err(ConfigError::TimeScale(self.time_scale));
        }
        Ok(())
    }

    pub fn run_in_background(mut self, value: bool) -> Self {
        self.run_in_background = value;
        self
    }

    pub fn max_delta_secs(mut self, secs: f32) -> Self {
        self.max_delta_secs = secs;
        self
    }

    pub fn time_scale(mut self, scale: f32) -> Self {
        self.time_scale = scale;
        self
    }

    /// The delta clamp. Values `validate` would reject fall back to the
    /// default.
    pub(crate) fn max_delta(&self) -> Duration {
        let default = Duration::from_secs_f32(DEFAULT_MAX_DELTA_SECS);
        if self.max_delta_secs.is_finite() && self.max_delta_secs > 0.0 {
            Duration::try_from_secs_f32(self.max_delta_secs).unwrap_or(default)
        } else {
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_uses_defaults() {
        let config = ContextConfig::from_json(r#"{ "run_in_background": true }"#).unwrap();
        assert!(config.run_in_background);
        assert_eq!(config.max_delta_secs, 0.1);
        assert_eq!(config.time_scale, 1.0);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            ContextConfig::from_json(r#"{ "max_delta_secs": 0 }"#),
            Err(ConfigError::MaxDelta(_))
        ));
        assert!(matches!(
            ContextConfig::from_json(r#"{ "time_scale": -1 }"#),
            Err(ConfigError::TimeScale(_))
        ));
        assert!(matches!(
            ContextConfig::from_json("not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn rejects_non_finite_values() {
        let infinite_scale = ContextConfig::default().time_scale(f32::INFINITY);
        assert!(matches!(infinite_scale.validate(), Err(ConfigError::TimeScale(_))));
        let nan_scale = ContextConfig::default().time_scale(f32::NAN);
        assert!(matches!(nan_scale.validate(), Err(ConfigError::TimeScale(_))));
        let infinite_clamp = ContextConfig::default().max_delta_secs(f32::INFINITY);
        assert!(matches!(infinite_clamp.validate(), Err(ConfigError::MaxDelta(_))));
    }

    #[test]
    fn bad_clamp_falls_back_to_default() {
        let default = ContextConfig::default().max_delta();
        assert_eq!(ContextConfig::default().max_delta_secs(f32::INFINITY).max_delta(), default);
        assert_eq!(ContextConfig::default().max_delta_secs(f32::NAN).max_delta(), default);
        assert_eq!(ContextConfig::default().max_delta_secs(-1.0).max_delta(), default);
        assert_eq!(ContextConfig::default().max_delta_secs(f32::MAX).max_delta(), default);
    }

    #[test]
    fn builder_setters() {
        let config = ContextConfig::default()
            .run_in_background(true)
            .time_scale(2.0);
        assert!(config.run_in_background);
        assert_eq!(config.time_scale, 2.0);
        assert!(config.validate().is_ok());
    }
}
