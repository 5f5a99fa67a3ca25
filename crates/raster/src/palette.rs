use std::f32::consts::TAU;

/// Number of distinct colours the TIA can emit (bit 0 of the index is unused).
pub const PALETTE_ENTRIES: usize = 128;

pub const BLACK: [u8; 4] = [0, 0, 0, 255];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaletteKind {
    Ntsc,
    Pal,
    Secam,
}

/// Precomputed colour lookup for one television standard.
///
/// Colour indices follow the TIA register layout: hue in bits 7..4,
/// luminance in bits 3..1.
#[derive(Clone)]
pub struct Palette {
    kind: PaletteKind,
    entries: [[u8; 4]; PALETTE_ENTRIES],
}

impl Palette {
    pub fn new(kind: PaletteKind) -> Self {
        let mut entries = [BLACK; PALETTE_ENTRIES];
        for (slot, entry) in entries.iter_mut().enumerate() {
            let index = (slot << 1) as u8;
            *entry = match kind {
                PaletteKind::Ntsc => ntsc_entry(index),
                PaletteKind::Pal => pal_entry(index),
                PaletteKind::Secam => secam_entry(index),
            };
        }
        Self { kind, entries }
    }

    pub fn kind(&self) -> PaletteKind {
        self.kind
    }

    pub fn lookup(&self, color_index: u8) -> [u8; 4] {
        self.entries[(color_index >> 1) as usize]
    }
}

impl std::fmt::Debug for Palette {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Palette").field("kind", &self.kind).finish()
    }
}

fn luminance(index: u8) -> f32 {
    let level = ((index >> 1) & 0x07) as f32;
    0.08 + level / 7.0 * 0.84
}

fn ntsc_entry(index: u8) -> [u8; 4] {
    let hue = index >> 4;
    let y = luminance(index);
    if hue == 0 {
        return from_yiq(y, 0.0, 0.0);
    }
    let angle = (hue as f32 - 1.0) * TAU / 15.0 + 0.45;
    from_yiq(y, 0.22 * angle.cos(), 0.22 * angle.sin())
}

fn pal_entry(index: u8) -> [u8; 4] {
    let hue = index >> 4;
    let y = luminance(index);
    if matches!(hue, 0 | 1 | 14 | 15) {
        return from_yuv(y, 0.0, 0.0);
    }
    // PAL hues alternate sides of the colour wheel as the index increases.
    let step = (hue - 2) as f32;
    let side = if hue % 2 == 0 { 1.0 } else { -1.0 };
    let angle = side * (step / 2.0) * TAU / 12.0 + 1.1;
    from_yuv(y, 0.18 * angle.cos(), 0.18 * angle.sin())
}

fn secam_entry(index: u8) -> [u8; 4] {
    const COLOURS: [[u8; 4]; 8] = [
        [0, 0, 0, 255],
        [33, 33, 255, 255],
        [240, 60, 121, 255],
        [255, 80, 255, 255],
        [127, 255, 0, 255],
        [127, 255, 255, 255],
        [255, 255, 63, 255],
        [255, 255, 255, 255],
    ];
    COLOURS[((index >> 1) & 0x07) as usize]
}

fn from_yiq(y: f32, i: f32, q: f32) -> [u8; 4] {
    let r = y + 0.956 * i + 0.621 * q;
    let g = y - 0.272 * i - 0.647 * q;
    let b = y - 1.106 * i + 1.703 * q;
    [channel(r), channel(g), channel(b), 255]
}

fn from_yuv(y: f32, u: f32, v: f32) -> [u8; 4] {
    let r = y + 1.140 * v;
    let g = y - 0.395 * u - 0.581 * v;
    let b = y + 2.032 * u;
    [channel(r), channel(g), channel(b), 255]
}

fn channel(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_zero_does_not_change_colour() {
        let palette = Palette::new(PaletteKind::Ntsc);
        assert_eq!(palette.lookup(0x1E), palette.lookup(0x1F));
    }

    #[test]
    fn hue_zero_is_grey_ramp() {
        let palette = Palette::new(PaletteKind::Ntsc);
        let mut last = 0;
        for lum in 0..8u8 {
            let [r, g, b, a] = palette.lookup(lum << 1);
            assert_eq!(r, g);
            assert_eq!(g, b);
            assert_eq!(a, 255);
            assert!(r >= last);
            last = r;
        }
    }

    #[test]
    fn secam_ignores_hue() {
        let palette = Palette::new(PaletteKind::Secam);
        assert_eq!(palette.lookup(0x0E), [255, 255, 255, 255]);
        assert_eq!(palette.lookup(0x4E), [255, 255, 255, 255]);
        assert_eq!(palette.lookup(0x42), palette.lookup(0x02));
    }
}
