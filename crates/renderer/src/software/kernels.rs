//! CPU versions of the stage shaders in `src/shaders`. Each kernel computes
//! one fragment from its texture coordinate, the way the GLSL body does.

use crate::device::{StageKind, UniformDecl, UniformValue, MAX_TEXTURE_UNITS};

use super::SoftTexture;

type Rgba = [f32; 4];

pub(crate) struct Env<'a> {
    pub decls: &'a [UniformDecl],
    pub values: &'a [UniformValue],
    pub samplers: [Option<&'a SoftTexture>; MAX_TEXTURE_UNITS],
}

impl Env<'_> {
    fn value(&self, name: &str) -> Option<UniformValue> {
        self.decls
            .iter()
            .position(|decl| decl.name == name)
            .and_then(|index| self.values.get(index).copied())
    }

    fn float(&self, name: &str) -> f32 {
        match self.value(name) {
            Some(UniformValue::Float(value)) => value,
            _ => 0.0,
        }
    }

    fn int(&self, name: &str) -> i32 {
        match self.value(name) {
            Some(UniformValue::Int(value)) => value,
            _ => 0,
        }
    }

    fn vec2(&self, name: &str) -> [f32; 2] {
        match self.value(name) {
            Some(UniformValue::Vec2(value)) => value,
            _ => [0.0; 2],
        }
    }

    fn sample(&self, unit: usize, u: f32, v: f32) -> Rgba {
        match self.samplers.get(unit).copied().flatten() {
            Some(texture) => texture.sample(u, v),
            None => [0.0; 4],
        }
    }
}

pub(crate) fn shade(kind: StageKind, env: &Env<'_>, u: f32, v: f32) -> Rgba {
    match kind {
        StageKind::Scale => env.sample(0, u, v),
        StageKind::Ghosting => ghosting(env, u, v),
        StageKind::Phosphor => mix4(
            env.sample(0, u, v),
            env.sample(1, u, v),
            env.float("u_latency"),
        ),
        StageKind::BlackLevel => black_level(env, u, v),
        StageKind::Blur => blur(env, u, v),
        StageKind::Blend => mix4(
            env.sample(0, u, v),
            env.sample(1, u, v),
            env.float("u_blend_fraction"),
        ),
        StageKind::Effects => effects(env, u, v),
        StageKind::Passthrough => {
            let color = env.sample(0, u, v);
            composite(rgb(color), env.sample(1, u, v))
        }
    }
}

fn ghosting(env: &Env<'_>, u: f32, v: f32) -> Rgba {
    let shift = 0.006 + 0.002 * (env.float("u_time") * 3.0).sin();
    let amount = env.float("u_ghosting_amount");
    let color = env.sample(0, u, v);
    let ghost = env.sample(0, u - shift, v);
    let mut out = color;
    for channel in 0..3 {
        out[channel] = (color[channel] + ghost[channel] * amount * 0.5).min(1.0);
    }
    out
}

fn black_level(env: &Env<'_>, u: f32, v: f32) -> Rgba {
    let mut color = env.sample(0, u, v);
    if env.int("u_curve") == 1 {
        let black = env.float("u_black_level");
        for channel in color.iter_mut().take(3) {
            *channel = black + *channel * (1.0 - black);
        }
    }
    color
}

fn blur(env: &Env<'_>, u: f32, v: f32) -> Rgba {
    let [dx, dy] = env.vec2("u_blur_offset");
    let center = env.sample(0, u, v);
    let taps = [
        env.sample(0, u + dx, v),
        env.sample(0, u - dx, v),
        env.sample(0, u, v + dy),
        env.sample(0, u, v - dy),
    ];
    let mut out = [0.0; 4];
    for channel in 0..4 {
        let neighbours: f32 = taps.iter().map(|tap| tap[channel]).sum();
        out[channel] = center[channel] * 0.4 + neighbours * 0.15;
    }
    out
}

const CORNER_RADIUS: f32 = 0.03;
const BEVEL_WIDTH: f32 = 0.02;

fn effects(env: &Env<'_>, u0: f32, v0: f32) -> Rgba {
    let (mut u, mut v) = (u0, v0);
    if env.int("u_curve") == 1 {
        let (cx, cy) = (u - 0.5, v - 0.5);
        let scale = 1.0 + (cx * cx + cy * cy) * env.float("u_curve_amount") * 0.5;
        u = 0.5 + cx * scale;
        v = 0.5 + cy * scale;
    }
    let mut outside = !(0.0..=1.0).contains(&u) || !(0.0..=1.0).contains(&v);

    if env.int("u_interference") == 1 {
        let wave = (v * 240.0 + env.float("u_time") * 8.0).sin();
        u += wave * env.float("u_interference_level") * 0.004;
    }

    let [width, height] = env.vec2("u_resolution");
    let mut color = if env.int("u_fringing") == 1 {
        let shift = env.float("u_fringing_amount") * 2.0 / width.max(1.0);
        [
            env.sample(0, u + shift, v)[0],
            env.sample(0, u, v)[1],
            env.sample(0, u - shift, v)[2],
        ]
    } else {
        rgb(env.sample(0, u, v))
    };

    let (px, py) = ((u0 * width).floor(), (v0 * height).floor());
    if env.int("u_scanlines") == 1 && py.rem_euclid(2.0) >= 1.0 {
        let keep = 1.0 - env.float("u_scanlines_intensity");
        color = color.map(|channel| channel * keep);
    }
    if env.int("u_mask") == 1 {
        let lane = px.rem_euclid(3.0) as usize;
        let mut tint = [1.0 - env.float("u_mask_intensity"); 3];
        tint[lane.min(2)] = 1.0;
        for (channel, weight) in color.iter_mut().zip(tint) {
            *channel *= weight;
        }
    }
    if env.int("u_noise") == 1 {
        let seed = env.float("u_noise_seed") * 1000.0;
        let grain = (noise_hash(px + seed, py + seed) - 0.5) * env.float("u_noise_level");
        color = color.map(|channel| channel + grain);
    }
    if env.int("u_shine") == 1 {
        let distance = ((u0 - 0.3).powi(2) + (v0 - 0.2).powi(2)).sqrt();
        let shine = (1.0 - distance * 2.0).max(0.0) * 0.08;
        color = color.map(|channel| channel + shine);
    }
    if env.int("u_bevel") == 1 {
        let edge = u.min(1.0 - u).min(v.min(1.0 - v));
        let falloff = smoothstep(0.0, BEVEL_WIDTH, edge);
        color = color.map(|channel| channel * falloff);
    }
    if env.int("u_rounded_corners") == 1 {
        let cx = ((u - 0.5).abs() - (0.5 - CORNER_RADIUS)).max(0.0);
        let cy = ((v - 0.5).abs() - (0.5 - CORNER_RADIUS)).max(0.0);
        if (cx * cx + cy * cy).sqrt() > CORNER_RADIUS {
            outside = true;
        }
    }
    if outside {
        color = [0.0; 3];
    }

    composite(color.map(|channel| channel.clamp(0.0, 1.0)), env.sample(1, u0, v0))
}

fn composite(color: [f32; 3], overlay: Rgba) -> Rgba {
    let alpha = overlay[3];
    [
        color[0] * (1.0 - alpha) + overlay[0] * alpha,
        color[1] * (1.0 - alpha) + overlay[1] * alpha,
        color[2] * (1.0 - alpha) + overlay[2] * alpha,
        1.0,
    ]
}

fn rgb(color: Rgba) -> [f32; 3] {
    [color[0], color[1], color[2]]
}

fn mix4(a: Rgba, b: Rgba, t: f32) -> Rgba {
    [
        a[0] * (1.0 - t) + b[0] * t,
        a[1] * (1.0 - t) + b[1] * t,
        a[2] * (1.0 - t) + b[2] * t,
        a[3] * (1.0 - t) + b[3] * t,
    ]
}

fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

fn noise_hash(x: f32, y: f32) -> f32 {
    let value = (x * 12.9898 + y * 78.233).sin() * 43758.545;
    value - value.floor()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mix_is_convex() {
        let out = mix4([1.0; 4], [0.0; 4], 0.25);
        assert_eq!(out, [0.75; 4]);
    }

    #[test]
    fn smoothstep_saturates() {
        assert_eq!(smoothstep(0.0, 1.0, -1.0), 0.0);
        assert_eq!(smoothstep(0.0, 1.0, 2.0), 1.0);
        assert_eq!(smoothstep(0.0, 1.0, 0.5), 0.5);
    }

    #[test]
    fn noise_hash_is_fractional() {
        for i in 0..32 {
            let value = noise_hash(i as f32, (i * 7) as f32);
            assert!((0.0..=1.0).contains(&value));
        }
    }

    #[test]
    fn opaque_overlay_replaces_colour() {
        let out = composite([0.2, 0.4, 0.6], [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(out, [1.0, 0.0, 0.0, 1.0]);
    }
}
