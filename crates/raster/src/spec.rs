use std::fmt;

use crate::palette::PaletteKind;

/// Colour clocks per scanline, including horizontal blank.
pub const CLOCKS_PER_SCANLINE: u32 = 228;

/// Colour clocks spent in horizontal blank at the start of each scanline.
pub const HORIZONTAL_BLANK: u32 = 68;

/// Television standard the emulated console is generating.
///
/// The raster is always sized to the full signal (`clocks_per_scanline` ×
/// `total_scanlines`); the visible window only decides which rows are handed
/// on to the GPU.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoSpec {
    pub id: &'static str,
    pub clocks_per_scanline: u32,
    pub total_scanlines: u32,
    pub default_top: u32,
    pub default_visible: u32,
    pub refresh_rate: f32,
    pub palette: PaletteKind,
}

impl VideoSpec {
    pub const NTSC: VideoSpec = VideoSpec {
        id: "NTSC",
        clocks_per_scanline: CLOCKS_PER_SCANLINE,
        total_scanlines: 262,
        default_top: 40,
        default_visible: 192,
        refresh_rate: 60.0,
        palette: PaletteKind::Ntsc,
    };

    pub const PAL: VideoSpec = VideoSpec {
        id: "PAL",
        clocks_per_scanline: CLOCKS_PER_SCANLINE,
        total_scanlines: 312,
        default_top: 44,
        default_visible: 228,
        refresh_rate: 50.0,
        palette: PaletteKind::Pal,
    };

    pub const PAL_M: VideoSpec = VideoSpec {
        id: "PAL-M",
        clocks_per_scanline: CLOCKS_PER_SCANLINE,
        total_scanlines: 262,
        default_top: 40,
        default_visible: 192,
        refresh_rate: 60.0,
        palette: PaletteKind::Pal,
    };

    pub const SECAM: VideoSpec = VideoSpec {
        id: "SECAM",
        clocks_per_scanline: CLOCKS_PER_SCANLINE,
        total_scanlines: 312,
        default_top: 44,
        default_visible: 228,
        refresh_rate: 50.0,
        palette: PaletteKind::Secam,
    };

    pub const ALL: [VideoSpec; 4] = [Self::NTSC, Self::PAL, Self::PAL_M, Self::SECAM];

    /// Looks a spec up by identifier, ignoring case and `-`/`_` differences.
    pub fn from_id(id: &str) -> Option<VideoSpec> {
        let normalized: String = id
            .trim()
            .chars()
            .filter(|ch| *ch != '-' && *ch != '_')
            .map(|ch| ch.to_ascii_uppercase())
            .collect();
        Self::ALL
            .into_iter()
            .find(|spec| spec.id.replace('-', "") == normalized)
    }

    pub fn raster_size(&self) -> (u32, u32) {
        (self.clocks_per_scanline, self.total_scanlines)
    }
}

impl fmt::Display for VideoSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id)
    }
}

/// Complete raster geometry requested by a `resize`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geometry {
    pub spec: VideoSpec,
    pub top: u32,
    pub visible: u32,
}

impl Geometry {
    pub fn new(spec: VideoSpec, top: u32, visible: u32) -> Self {
        Self { spec, top, visible }
    }

    pub fn default_for(spec: VideoSpec) -> Self {
        Self::new(spec, spec.default_top, spec.default_visible)
    }

    pub fn width(&self) -> u32 {
        self.spec.clocks_per_scanline
    }

    pub fn height(&self) -> u32 {
        self.spec.total_scanlines
    }

    /// First scanline past the visible window.
    pub fn bottom(&self) -> u32 {
        self.top + self.visible
    }

    /// Checks the visible window sits inside the raster.
    pub fn is_valid(&self) -> bool {
        self.visible > 0 && self.bottom() <= self.spec.total_scanlines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn looks_up_specs_by_loose_identifier() {
        assert_eq!(VideoSpec::from_id("ntsc"), Some(VideoSpec::NTSC));
        assert_eq!(VideoSpec::from_id("pal_m"), Some(VideoSpec::PAL_M));
        assert_eq!(VideoSpec::from_id(" Secam "), Some(VideoSpec::SECAM));
        assert_eq!(VideoSpec::from_id("mesecam"), None);
    }

    #[test]
    fn geometry_rejects_window_outside_raster() {
        assert!(Geometry::new(VideoSpec::NTSC, 40, 192).is_valid());
        assert!(!Geometry::new(VideoSpec::NTSC, 100, 192).is_valid());
        assert!(!Geometry::new(VideoSpec::PAL, 10, 0).is_valid());
    }
}
