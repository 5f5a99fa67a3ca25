use std::ops::RangeInclusive;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

/// Every knob the post-processing chain reads, passed by value each frame.
///
/// Fields missing from a preset take the value from [`PipelineConfig::default`],
/// which disables every effect.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    #[serde(deserialize_with = "deserialize_toggle")]
    pub curve: bool,
    #[serde(deserialize_with = "deserialize_toggle")]
    pub rounded_corners: bool,
    #[serde(deserialize_with = "deserialize_toggle")]
    pub bevel: bool,
    #[serde(deserialize_with = "deserialize_toggle")]
    pub shine: bool,
    #[serde(deserialize_with = "deserialize_toggle")]
    pub mask: bool,
    #[serde(deserialize_with = "deserialize_toggle")]
    pub scanlines: bool,
    #[serde(deserialize_with = "deserialize_toggle")]
    pub interference: bool,
    #[serde(deserialize_with = "deserialize_toggle")]
    pub noise: bool,
    #[serde(deserialize_with = "deserialize_toggle")]
    pub fringing: bool,
    #[serde(deserialize_with = "deserialize_toggle")]
    pub ghosting: bool,
    #[serde(deserialize_with = "deserialize_toggle")]
    pub phosphor: bool,

    pub curve_amount: f32,
    pub mask_intensity: f32,
    pub scanlines_intensity: f32,
    pub interference_level: f32,
    pub noise_level: f32,
    pub fringing_amount: f32,
    pub ghosting_amount: f32,
    pub black_level: f32,
    /// Blur radius in texels of a 1080-line reference height.
    pub sharpness: f32,
    pub phosphor_latency: f32,
    pub phosphor_bloom: f32,
    /// Frame-to-frame persistence used when `phosphor` is off.
    pub pixel_perfect_fade: f32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            curve: false,
            rounded_corners: false,
            bevel: false,
            shine: false,
            mask: false,
            scanlines: false,
            interference: false,
            noise: false,
            fringing: false,
            ghosting: false,
            phosphor: false,
            curve_amount: 0.5,
            mask_intensity: 0.07,
            scanlines_intensity: 0.08,
            interference_level: 0.15,
            noise_level: 0.19,
            fringing_amount: 0.15,
            ghosting_amount: 0.3,
            black_level: 0.0,
            sharpness: 0.0,
            phosphor_latency: 0.5,
            phosphor_bloom: 0.0,
            pixel_perfect_fade: 0.0,
        }
    }
}

impl PipelineConfig {
    /// Whether the final stage has anything to do beyond copying colour through.
    pub fn effects_enabled(&self) -> bool {
        self.curve
            || self.rounded_corners
            || self.bevel
            || self.shine
            || self.mask
            || self.scanlines
            || self.interference
            || self.noise
            || self.fringing
    }

    /// Persistence applied by the accumulation stage this frame.
    pub fn latency(&self) -> f32 {
        if self.phosphor {
            self.phosphor_latency
        } else {
            self.pixel_perfect_fade
        }
    }

    /// Bloom strength, which only applies while the phosphor toggle is on.
    pub fn bloom(&self) -> f32 {
        if self.phosphor {
            self.phosphor_bloom
        } else {
            0.0
        }
    }

    /// Each float parameter with its name and accepted range.
    pub fn ranged_fields(&self) -> [(&'static str, f32, RangeInclusive<f32>); 12] {
        [
            ("curve_amount", self.curve_amount, 0.0..=1.0),
            ("mask_intensity", self.mask_intensity, 0.0..=1.0),
            ("scanlines_intensity", self.scanlines_intensity, 0.0..=1.0),
            ("interference_level", self.interference_level, 0.0..=1.0),
            ("noise_level", self.noise_level, 0.0..=1.0),
            ("fringing_amount", self.fringing_amount, 0.0..=1.0),
            ("ghosting_amount", self.ghosting_amount, 0.0..=1.0),
            ("black_level", self.black_level, 0.0..=1.0),
            ("sharpness", self.sharpness, 0.0..=8.0),
            ("phosphor_latency", self.phosphor_latency, 0.0..=1.0),
            ("phosphor_bloom", self.phosphor_bloom, 0.0..=2.0),
            ("pixel_perfect_fade", self.pixel_perfect_fade, 0.0..=1.0),
        ]
    }

    /// First out-of-range or non-finite float, if any.
    pub fn out_of_range(&self) -> Option<(&'static str, f32, RangeInclusive<f32>)> {
        self.ranged_fields()
            .into_iter()
            .find(|(_, value, range)| !value.is_finite() || !range.contains(value))
    }
}

// Toggles accept `true`/`false` as well as the 0/1 the shaders see.
fn deserialize_toggle<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Helper {
        Bool(bool),
        Num(i64),
    }

    match Helper::deserialize(deserializer)? {
        Helper::Bool(value) => Ok(value),
        Helper::Num(0) => Ok(false),
        Helper::Num(1) => Ok(true),
        Helper::Num(other) => Err(de::Error::custom(format!(
            "toggle must be true, false, 0 or 1; got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_has_no_effects() {
        let config = PipelineConfig::default();
        assert!(!config.effects_enabled());
        assert!(config.out_of_range().is_none());
        assert_eq!(config.latency(), 0.0);
    }

    #[test]
    fn latency_follows_phosphor_toggle() {
        let config = PipelineConfig {
            phosphor_latency: 0.7,
            pixel_perfect_fade: 0.2,
            phosphor_bloom: 1.0,
            ..PipelineConfig::default()
        };
        assert_eq!(config.latency(), 0.2);
        assert_eq!(config.bloom(), 0.0);

        let config = PipelineConfig {
            phosphor: true,
            ..config
        };
        assert_eq!(config.latency(), 0.7);
        assert_eq!(config.bloom(), 1.0);
    }

    #[test]
    fn ghosting_and_phosphor_are_not_final_stage_effects() {
        let config = PipelineConfig {
            ghosting: true,
            phosphor: true,
            ..PipelineConfig::default()
        };
        assert!(!config.effects_enabled());

        let config = PipelineConfig {
            noise: true,
            ..PipelineConfig::default()
        };
        assert!(config.effects_enabled());
    }

    #[test]
    fn nan_is_out_of_range() {
        let config = PipelineConfig {
            sharpness: f32::NAN,
            ..PipelineConfig::default()
        };
        let (name, _, _) = config.out_of_range().unwrap();
        assert_eq!(name, "sharpness");
    }

    #[test]
    fn toggles_accept_integers() {
        let config: PipelineConfig = toml::from_str("mask = 1\nscanlines = 0\n").unwrap();
        assert!(config.mask);
        assert!(!config.scanlines);

        assert!(toml::from_str::<PipelineConfig>("mask = 2\n").is_err());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(toml::from_str::<PipelineConfig>("scanline = true\n").is_err());
    }
}
