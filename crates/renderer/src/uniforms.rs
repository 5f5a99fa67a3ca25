//! Mapping from [`PipelineConfig`] to the values each stage program reads.
//!
//! Toggles become `int` 0/1 and floats pass through unchanged. The one
//! exception is the blur radius, which is configured in texels of a reference
//! height and converted to a texture-coordinate offset for the current output.

use crtconfig::PipelineConfig;

use crate::device::{UniformDecl, UniformValue};
use crate::runtime::FrameTime;

/// Output height the `sharpness` radius is expressed against.
pub const REFERENCE_HEIGHT: f32 = 1080.0;

/// Share of the pre-accumulation image mixed back in after the blur.
pub const BLEND_FRACTION: f32 = 0.32;

pub(crate) type Uniforms = Vec<(&'static str, UniformValue)>;

pub fn toggle(enabled: bool) -> i32 {
    i32::from(enabled)
}

/// Texture-coordinate offset for a blur of `radius` reference texels.
///
/// The vertical offset is `radius / REFERENCE_HEIGHT`; the horizontal one is
/// scaled by the aspect ratio so the blur stays round in output pixels.
pub fn blur_offset(radius: f32, output: (u32, u32)) -> [f32; 2] {
    let (width, height) = (output.0.max(1) as f32, output.1.max(1) as f32);
    let dy = radius / REFERENCE_HEIGHT;
    [dy * height / width, dy]
}

pub(crate) const GHOSTING_UNIFORMS: &[UniformDecl] = &[
    UniformDecl::float("u_ghosting_amount"),
    UniformDecl::float("u_time"),
];

pub(crate) fn ghosting(config: &PipelineConfig, time: &FrameTime) -> Uniforms {
    vec![
        ("u_ghosting_amount", UniformValue::Float(config.ghosting_amount)),
        ("u_time", UniformValue::Float(time.seconds)),
    ]
}

pub(crate) const PHOSPHOR_UNIFORMS: &[UniformDecl] = &[UniformDecl::float("u_latency")];

pub(crate) fn phosphor(config: &PipelineConfig) -> Uniforms {
    vec![("u_latency", UniformValue::Float(config.latency()))]
}

pub(crate) const BLACK_LEVEL_UNIFORMS: &[UniformDecl] = &[
    UniformDecl::int("u_curve"),
    UniformDecl::float("u_black_level"),
];

pub(crate) fn black_level(config: &PipelineConfig) -> Uniforms {
    vec![
        ("u_curve", UniformValue::Int(toggle(config.curve))),
        ("u_black_level", UniformValue::Float(config.black_level)),
    ]
}

pub(crate) const BLUR_UNIFORMS: &[UniformDecl] = &[UniformDecl::vec2("u_blur_offset")];

pub(crate) fn blur(radius: f32, output: (u32, u32)) -> Uniforms {
    vec![("u_blur_offset", UniformValue::Vec2(blur_offset(radius, output)))]
}

pub(crate) const BLEND_UNIFORMS: &[UniformDecl] = &[UniformDecl::float("u_blend_fraction")];

pub(crate) fn blend() -> Uniforms {
    vec![("u_blend_fraction", UniformValue::Float(BLEND_FRACTION))]
}

pub(crate) const EFFECTS_UNIFORMS: &[UniformDecl] = &[
    UniformDecl::int("u_curve"),
    UniformDecl::int("u_rounded_corners"),
    UniformDecl::int("u_bevel"),
    UniformDecl::int("u_shine"),
    UniformDecl::int("u_mask"),
    UniformDecl::int("u_scanlines"),
    UniformDecl::int("u_interference"),
    UniformDecl::int("u_noise"),
    UniformDecl::int("u_fringing"),
    UniformDecl::float("u_curve_amount"),
    UniformDecl::float("u_mask_intensity"),
    UniformDecl::float("u_scanlines_intensity"),
    UniformDecl::float("u_interference_level"),
    UniformDecl::float("u_noise_level"),
    UniformDecl::float("u_fringing_amount"),
    UniformDecl::float("u_time"),
    UniformDecl::float("u_noise_seed"),
    UniformDecl::vec2("u_resolution"),
];

pub(crate) fn effects(config: &PipelineConfig, time: &FrameTime, output: (u32, u32)) -> Uniforms {
    let int = |enabled| UniformValue::Int(toggle(enabled));
    vec![
        ("u_curve", int(config.curve)),
        ("u_rounded_corners", int(config.rounded_corners)),
        ("u_bevel", int(config.bevel)),
        ("u_shine", int(config.shine)),
        ("u_mask", int(config.mask)),
        ("u_scanlines", int(config.scanlines)),
        ("u_interference", int(config.interference)),
        ("u_noise", int(config.noise)),
        ("u_fringing", int(config.fringing)),
        ("u_curve_amount", UniformValue::Float(config.curve_amount)),
        ("u_mask_intensity", UniformValue::Float(config.mask_intensity)),
        ("u_scanlines_intensity", UniformValue::Float(config.scanlines_intensity)),
        ("u_interference_level", UniformValue::Float(config.interference_level)),
        ("u_noise_level", UniformValue::Float(config.noise_level)),
        ("u_fringing_amount", UniformValue::Float(config.fringing_amount)),
        ("u_time", UniformValue::Float(time.seconds)),
        ("u_noise_seed", UniformValue::Float(time.noise_seed)),
        (
            "u_resolution",
            UniformValue::Vec2([output.0 as f32, output.1 as f32]),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIME: FrameTime = FrameTime {
        seconds: 1.5,
        frame_index: 90,
        noise_seed: 0.25,
    };

    fn lookup(uniforms: &Uniforms, name: &str) -> UniformValue {
        uniforms
            .iter()
            .find(|(uniform, _)| *uniform == name)
            .map(|(_, value)| *value)
            .unwrap_or_else(|| panic!("missing uniform {name}"))
    }

    #[test]
    fn effects_cover_every_declaration() {
        let uniforms = effects(&PipelineConfig::default(), &TIME, (640, 480));
        assert_eq!(uniforms.len(), EFFECTS_UNIFORMS.len());
        for (decl, (name, value)) in EFFECTS_UNIFORMS.iter().zip(&uniforms) {
            assert_eq!(decl.name, *name);
            assert_eq!(decl.kind, value.kind());
        }
    }

    #[test]
    fn toggles_map_to_integers_and_floats_pass_through() {
        let config = PipelineConfig {
            scanlines: true,
            mask: false,
            scanlines_intensity: 0.42,
            ..PipelineConfig::default()
        };
        let uniforms = effects(&config, &TIME, (640, 480));
        assert_eq!(lookup(&uniforms, "u_scanlines"), UniformValue::Int(1));
        assert_eq!(lookup(&uniforms, "u_mask"), UniformValue::Int(0));
        assert_eq!(
            lookup(&uniforms, "u_scanlines_intensity"),
            UniformValue::Float(0.42)
        );
        assert_eq!(lookup(&uniforms, "u_noise_seed"), UniformValue::Float(0.25));
    }

    #[test]
    fn blur_is_normalised_by_reference_height() {
        let [dx, dy] = blur_offset(2.0, (1920, 1080));
        assert!((dy - 2.0 / 1080.0).abs() < 1e-9);
        assert!((dx - 2.0 / 1920.0).abs() < 1e-9);

        assert_eq!(blur_offset(0.0, (320, 200)), [0.0, 0.0]);
    }

    #[test]
    fn phosphor_latency_switches_with_toggle() {
        let config = PipelineConfig {
            phosphor_latency: 0.6,
            pixel_perfect_fade: 0.1,
            ..PipelineConfig::default()
        };
        assert_eq!(lookup(&phosphor(&config), "u_latency"), UniformValue::Float(0.1));
        let config = PipelineConfig {
            phosphor: true,
            ..config
        };
        assert_eq!(lookup(&phosphor(&config), "u_latency"), UniformValue::Float(0.6));
    }
}
