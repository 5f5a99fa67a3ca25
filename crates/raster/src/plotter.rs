use std::sync::{Arc, MutexGuard};
use std::thread;

use tracing::{debug, info};

use crate::error::RasterError;
use crate::resize::ResizeClient;
use crate::signal::{Annotation, Signal};
use crate::spec::{Geometry, VideoSpec};
use crate::state::{RasterState, Shared};

/// Interface the emulation core drives once per colour clock / scanline / frame.
pub trait PixelRenderer {
    fn resize(&mut self, spec: VideoSpec, top: u32, visible: u32) -> Result<(), RasterError>;
    fn new_frame(&mut self, frame_number: u64, is_stable: bool) -> Result<(), RasterError>;
    fn new_scanline(&mut self, scanline: u32) -> Result<(), RasterError>;
    fn set_pixel(&mut self, signal: Signal) -> Result<(), RasterError>;
    fn end_rendering(&mut self) -> Result<(), RasterError>;

    fn reflect(&mut self, _annotation: Annotation) -> Result<(), RasterError> {
        Ok(())
    }
}

/// Emulation-thread end of the raster staging buffer.
#[derive(Debug)]
pub struct PixelPlotter {
    shared: Arc<Shared>,
    resizes: ResizeClient,
}

impl PixelPlotter {
    pub(crate) fn new(shared: Arc<Shared>, resizes: ResizeClient) -> Self {
        Self { shared, resizes }
    }

    /// Opens a batch of plotting operations under a single lock acquisition.
    ///
    /// The lock is released when the returned batch is dropped (or passed to
    /// [`PlotBatch::end_update`]). The render thread can never observe any of
    /// the batch's writes before that point.
    pub fn begin_update(&mut self) -> PlotBatch<'_> {
        PlotBatch {
            state: self.shared.lock(),
        }
    }

    pub fn geometry(&self) -> Geometry {
        self.shared.lock().geometry
    }

    /// Position of the last signal flagged `is_current`.
    pub fn cursor(&self) -> Option<(u32, u32)> {
        self.shared.lock().cursor
    }
}

impl PixelRenderer for PixelPlotter {
    fn resize(&mut self, spec: VideoSpec, top: u32, visible: u32) -> Result<(), RasterError> {
        let geometry = Geometry::new(spec, top, visible);
        {
            let mut state = self.shared.lock();
            if state.render_thread == thread::current().id() {
                return state.apply_resize(geometry);
            }
        }
        debug!(spec = spec.id, top, visible, "requesting resize from render thread");
        self.resizes.request(geometry)
    }

    fn new_frame(&mut self, frame_number: u64, is_stable: bool) -> Result<(), RasterError> {
        self.shared.lock().new_frame(frame_number, is_stable);
        Ok(())
    }

    fn new_scanline(&mut self, scanline: u32) -> Result<(), RasterError> {
        self.shared.lock().new_scanline(scanline);
        Ok(())
    }

    fn set_pixel(&mut self, signal: Signal) -> Result<(), RasterError> {
        self.shared.lock().plot(signal);
        Ok(())
    }

    fn end_rendering(&mut self) -> Result<(), RasterError> {
        self.shared.lock().ended = true;
        info!("emulation finished rendering");
        Ok(())
    }

    fn reflect(&mut self, annotation: Annotation) -> Result<(), RasterError> {
        self.shared.lock().reflect(annotation);
        Ok(())
    }
}

/// Scoped lock over the active raster; dropping it ends the update.
pub struct PlotBatch<'a> {
    state: MutexGuard<'a, RasterState>,
}

impl PlotBatch<'_> {
    pub fn set_pixel(&mut self, signal: Signal) {
        self.state.plot(signal);
    }

    pub fn new_scanline(&mut self, scanline: u32) {
        self.state.new_scanline(scanline);
    }

    pub fn reflect(&mut self, annotation: Annotation) {
        self.state.reflect(annotation);
    }

    pub fn end_update(self) {}
}
