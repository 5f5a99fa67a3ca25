use std::sync::{Mutex, MutexGuard};
use std::thread::{self, ThreadId};

use tracing::{debug, trace};

use crate::error::RasterError;
use crate::frame::{FrameInfo, RasterFrame};
use crate::palette::{Palette, BLACK};
use crate::signal::{Annotation, Signal};
use crate::spec::Geometry;

/// State shared between the plotter and the stager. Only ever touched under the mutex.
#[derive(Debug)]
pub(crate) struct RasterState {
    pub frames: [RasterFrame; 2],
    pub active: usize,
    pub dirty: bool,
    pub geometry: Geometry,
    pub palette: Palette,
    pub stable_info: Option<FrameInfo>,
    pub cursor: Option<(u32, u32)>,
    pub last_plot: Option<(u32, u32)>,
    pub scanlines_seen: u32,
    pub generation: u64,
    pub ended: bool,
    pub render_thread: ThreadId,
}

impl RasterState {
    fn new(geometry: Geometry) -> Self {
        let (width, height) = geometry.spec.raster_size();
        Self {
            frames: [RasterFrame::new(width, height), RasterFrame::new(width, height)],
            active: 0,
            dirty: false,
            geometry,
            palette: Palette::new(geometry.spec.palette),
            stable_info: None,
            cursor: None,
            last_plot: None,
            scanlines_seen: 0,
            generation: 0,
            ended: false,
            render_thread: thread::current().id(),
        }
    }

    pub fn stable_index(&self) -> usize {
        1 - self.active
    }

    pub fn plot(&mut self, signal: Signal) {
        let rgba = if signal.vblank {
            BLACK
        } else {
            self.palette.lookup(signal.color_index)
        };
        let (x, y) = (signal.horizontal_position, signal.scanline);
        if !self.frames[self.active].set_pixel(x, y, rgba) {
            trace!(x, y, "dropped out-of-range pixel");
            return;
        }
        self.last_plot = Some((x, y));
        if signal.is_current {
            self.cursor = Some((x, y));
        }
    }

    pub fn reflect(&mut self, annotation: Annotation) {
        if let Some((x, y)) = self.last_plot {
            self.frames[self.active].set_overlay(x, y, annotation.color());
        }
    }

    pub fn new_scanline(&mut self, scanline: u32) {
        self.scanlines_seen = self.scanlines_seen.max(scanline.saturating_add(1));
    }

    /// Completes the active frame and starts the next one from its contents.
    pub fn new_frame(&mut self, frame_number: u64, stable: bool) {
        let completed = self.active;
        let next = 1 - completed;
        let [first, second] = &mut self.frames;
        let (source, target) = if completed == 0 {
            (&*first, second)
        } else {
            (&*second, first)
        };
        target.carry_forward(source);

        let mut info = FrameInfo::for_geometry(&self.geometry);
        info.frame_number = frame_number;
        info.stable = stable;
        info.vsync = self.scanlines_seen == self.geometry.spec.total_scanlines;
        self.stable_info = Some(info);
        self.scanlines_seen = 0;
        self.last_plot = None;
        self.active = next;
        self.dirty = true;
    }

    pub fn apply_resize(&mut self, geometry: Geometry) -> Result<(), RasterError> {
        if !geometry.is_valid() {
            return Err(RasterError::InvalidGeometry {
                spec: geometry.spec.id,
                top: geometry.top,
                visible: geometry.visible,
                total: geometry.spec.total_scanlines,
            });
        }

        let (width, height) = geometry.spec.raster_size();
        if self.frames[0].size() != (width, height) || self.frames[1].size() != (width, height) {
            self.frames = [RasterFrame::new(width, height), RasterFrame::new(width, height)];
        }
        if self.geometry.spec.palette != geometry.spec.palette {
            self.palette = Palette::new(geometry.spec.palette);
        }
        self.geometry = geometry;
        self.active = 0;
        self.dirty = false;
        self.stable_info = None;
        self.cursor = None;
        self.last_plot = None;
        self.scanlines_seen = 0;
        self.generation += 1;
        debug!(
            spec = geometry.spec.id,
            width,
            height,
            top = geometry.top,
            visible = geometry.visible,
            "resized raster"
        );
        Ok(())
    }
}

#[derive(Debug)]
pub(crate) struct Shared {
    state: Mutex<RasterState>,
}

impl Shared {
    pub fn new(geometry: Geometry) -> Self {
        Self {
            state: Mutex::new(RasterState::new(geometry)),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, RasterState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
