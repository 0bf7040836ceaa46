//! Rendering options carried on a job.
//!
//! Records and messages carry options as an [`OptionsBag`]: the raw JSON the
//! API accepted. Typing happens in [`OptionsBag::resolve`], which ignores
//! unknown keys and rejects badly typed or out-of-range values, so a bad bag
//! fails the job instead of the decode of the record or message carrying it.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;

use crate::error::{ModelError, ModelResult};

/// x264 encoder preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    Fast,
    Medium,
    #[default]
    Slow,
}

impl Preset {
    pub fn as_str(&self) -> &'static str {
        match self {
            Preset::Fast => "fast",
            Preset::Medium => "medium",
            Preset::Slow => "slow",
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RenderOptions {
    /// Target frame rate for motion interpolation
    #[serde(default = "default_interpolation_fps")]
    #[validate(range(min = 1, max = 240))]
    pub interpolation_fps: u32,

    #[serde(default)]
    pub preset: Preset,

    /// Number of transcode passes; only the last is kept. Load testing only.
    #[serde(default = "default_work_factor")]
    #[validate(range(min = 1, max = 16))]
    pub work_factor: u32,

    /// Playback slow-down factor (2.0 = half speed)
    #[serde(default = "default_slow_factor")]
    #[validate(range(min = 1.0, max = 16.0))]
    pub slow_factor: f64,
}

fn default_interpolation_fps() -> u32 {
    60
}

fn default_work_factor() -> u32 {
    1
}

fn default_slow_factor() -> f64 {
    2.0
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            interpolation_fps: default_interpolation_fps(),
            preset: Preset::default(),
            work_factor: default_work_factor(),
            slow_factor: default_slow_factor(),
        }
    }
}

impl RenderOptions {
    /// Check option ranges.
    pub fn check(&self) -> ModelResult<()> {
        if !self.slow_factor.is_finite() {
            return Err(ModelError::invalid_options("slowFactor must be finite"));
        }
        self.validate()
            .map_err(|e| ModelError::invalid_options(e.to_string()))
    }

    /// Transcode passes to run, at least one.
    pub fn passes(&self) -> u32 {
        self.work_factor.max(1)
    }
}

/// Untyped options as stored on a job record or carried on a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct OptionsBag(serde_json::Value);

impl OptionsBag {
    /// Decode and range-check. A missing or `null` bag yields the defaults.
    pub fn resolve(&self) -> ModelResult<RenderOptions> {
        let options = if self.0.is_null() {
            RenderOptions::default()
        } else {
            RenderOptions::deserialize(&self.0)
                .map_err(|e| ModelError::invalid_options(e.to_string()))?
        };
        options.check()?;
        Ok(options)
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }
}

impl Default for OptionsBag {
    fn default() -> Self {
        Self(serde_json::Value::Object(serde_json::Map::new()))
    }
}

impl From<RenderOptions> for OptionsBag {
    fn from(options: RenderOptions) -> Self {
        // Plain fields and a unit enum: serialization cannot fail.
        Self(serde_json::to_value(options).unwrap_or_default())
    }
}

impl From<serde_json::Value> for OptionsBag {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_object() {
        let opts: RenderOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(opts, RenderOptions::default());
        assert_eq!(opts.interpolation_fps, 60);
        assert_eq!(opts.preset, Preset::Slow);
        assert_eq!(opts.work_factor, 1);
        assert_eq!(opts.slow_factor, 2.0);
        assert!(opts.check().is_ok());
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let opts: RenderOptions =
            serde_json::from_str(r#"{"preset":"fast","watermark":true,"slowFactor":4}"#).unwrap();
        assert_eq!(opts.preset, Preset::Fast);
        assert_eq!(opts.slow_factor, 4.0);
    }

    #[test]
    fn test_unknown_preset_rejected() {
        let result = serde_json::from_str::<RenderOptions>(r#"{"preset":"placebo"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_bag_resolves_defaults_and_typed_values() {
        assert_eq!(OptionsBag::default().resolve().unwrap(), RenderOptions::default());
        assert_eq!(
            OptionsBag::from(serde_json::Value::Null).resolve().unwrap(),
            RenderOptions::default()
        );

        let typed = RenderOptions {
            preset: Preset::Fast,
            work_factor: 2,
            ..Default::default()
        };
        assert_eq!(OptionsBag::from(typed).resolve().unwrap(), typed);
    }

    #[test]
    fn test_bag_with_bad_types_decodes_but_fails_resolve() {
        let bag: OptionsBag =
            serde_json::from_str(r#"{"interpolationFps":"60","preset":"veryfast"}"#).unwrap();
        assert!(matches!(bag.resolve(), Err(ModelError::InvalidOptions(_))));

        let bag: OptionsBag = serde_json::from_str(r#"{"workFactor":99}"#).unwrap();
        assert!(matches!(bag.resolve(), Err(ModelError::InvalidOptions(_))));

        let bag: OptionsBag = serde_json::from_str(r#""fast""#).unwrap();
        assert!(bag.resolve().is_err());
    }

    #[test]
    fn test_out_of_range_values_fail_check() {
        let zero_work = RenderOptions {
            work_factor: 0,
            ..Default::default()
        };
        assert!(matches!(zero_work.check(), Err(ModelError::InvalidOptions(_))));
        assert_eq!(zero_work.passes(), 1);

        let speed_up = RenderOptions {
            slow_factor: 0.5,
            ..Default::default()
        };
        assert!(speed_up.check().is_err());

        let nan = RenderOptions {
            slow_factor: f64::NAN,
            ..Default::default()
        };
        assert!(nan.check().is_err());
    }
}
