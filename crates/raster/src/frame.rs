use crate::spec::{Geometry, VideoSpec};

const TRANSPARENT: [u8; 4] = [0, 0, 0, 0];

/// Full-signal RGBA raster plus the debug overlay layer drawn on top of it.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterFrame {
    width: u32,
    height: u32,
    pixels: Vec<[u8; 4]>,
    overlay: Vec<[u8; 4]>,
}

impl RasterFrame {
    pub fn new(width: u32, height: u32) -> Self {
        let cells = (width as usize) * (height as usize);
        Self {
            width,
            height,
            pixels: vec![[0, 0, 0, 255]; cells],
            overlay: vec![TRANSPARENT; cells],
        }
    }

    pub fn empty() -> Self {
        Self::new(0, 0)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn index(&self, x: u32, y: u32) -> Option<usize> {
        if x < self.width && y < self.height {
            Some(y as usize * self.width as usize + x as usize)
        } else {
            None
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        self.index(x, y).map(|index| self.pixels[index])
    }

    pub fn overlay_pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        self.index(x, y).map(|index| self.overlay[index])
    }

    /// Writes one cell; returns false when the coordinate lies outside the raster.
    pub fn set_pixel(&mut self, x: u32, y: u32, rgba: [u8; 4]) -> bool {
        match self.index(x, y) {
            Some(index) => {
                self.pixels[index] = rgba;
                true
            }
            None => false,
        }
    }

    pub fn set_overlay(&mut self, x: u32, y: u32, rgba: [u8; 4]) -> bool {
        match self.index(x, y) {
            Some(index) => {
                self.overlay[index] = rgba;
                true
            }
            None => false,
        }
    }

    pub fn pixels(&self) -> &[[u8; 4]] {
        &self.pixels
    }

    /// Rows `top..bottom` of the raster as tightly packed RGBA bytes.
    pub fn rows(&self, top: u32, bottom: u32) -> &[u8] {
        bytes_of_rows(&self.pixels, self.width, self.height, top, bottom)
    }

    pub fn overlay_rows(&self, top: u32, bottom: u32) -> &[u8] {
        bytes_of_rows(&self.overlay, self.width, self.height, top, bottom)
    }

    /// Makes `self` an exact copy of `source` while reusing the existing allocation.
    ///
    /// The overlay is per-frame and starts out transparent instead of being carried.
    pub(crate) fn carry_forward(&mut self, source: &RasterFrame) {
        self.width = source.width;
        self.height = source.height;
        self.pixels.clear();
        self.pixels.extend_from_slice(&source.pixels);
        self.overlay.clear();
        self.overlay.resize(source.overlay.len(), TRANSPARENT);
    }
}

fn bytes_of_rows(cells: &[[u8; 4]], width: u32, height: u32, top: u32, bottom: u32) -> &[u8] {
    let bottom = bottom.min(height);
    let top = top.min(bottom);
    let start = top as usize * width as usize;
    let end = bottom as usize * width as usize;
    cells[start..end].as_flattened()
}

/// Metadata attached to every completed frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInfo {
    pub spec: VideoSpec,
    pub visible_top: u32,
    pub visible_bottom: u32,
    pub total_scanlines: u32,
    pub vsync: bool,
    pub frame_number: u64,
    pub stable: bool,
}

impl FrameInfo {
    pub fn for_geometry(geometry: &Geometry) -> Self {
        Self {
            spec: geometry.spec,
            visible_top: geometry.top,
            visible_bottom: geometry.bottom(),
            total_scanlines: geometry.spec.total_scanlines,
            vsync: false,
            frame_number: 0,
            stable: false,
        }
    }

    pub fn visible_scanlines(&self) -> u32 {
        self.visible_bottom.saturating_sub(self.visible_top)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_writes_are_refused() {
        let mut frame = RasterFrame::new(4, 3);
        assert!(frame.set_pixel(3, 2, [1, 2, 3, 4]));
        assert!(!frame.set_pixel(4, 0, [1, 2, 3, 4]));
        assert!(!frame.set_pixel(0, 3, [1, 2, 3, 4]));
        assert_eq!(frame.pixel(3, 2), Some([1, 2, 3, 4]));
        assert_eq!(frame.pixel(4, 0), None);
    }

    #[test]
    fn carry_forward_copies_pixels_and_resets_overlay() {
        let mut source = RasterFrame::new(2, 2);
        source.set_pixel(1, 1, [9, 9, 9, 255]);
        source.set_overlay(1, 1, [255, 0, 0, 128]);

        let mut target = RasterFrame::new(5, 5);
        target.carry_forward(&source);

        assert_eq!(target.size(), (2, 2));
        assert_eq!(target.pixel(1, 1), Some([9, 9, 9, 255]));
        assert_eq!(target.overlay_pixel(1, 1), Some([0, 0, 0, 0]));
    }

    #[test]
    fn rows_are_clamped_to_the_raster() {
        let mut frame = RasterFrame::new(2, 4);
        frame.set_pixel(0, 1, [7, 7, 7, 7]);
        let rows = frame.rows(1, 10);
        assert_eq!(rows.len(), 2 * 3 * 4);
        assert_eq!(&rows[0..4], &[7, 7, 7, 7]);
    }
}
