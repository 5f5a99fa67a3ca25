use std::mem;
use std::sync::Arc;
use std::thread;

use crossbeam_channel::TryRecvError;
use tracing::{debug, warn};

use crate::frame::{FrameInfo, RasterFrame};
use crate::resize::ResizeInbox;
use crate::spec::Geometry;
use crate::state::Shared;

/// A completed frame handed to the render thread.
#[derive(Debug, Clone, Copy)]
pub struct StagedFrame<'a> {
    pub frame: &'a RasterFrame,
    pub info: FrameInfo,
    pub cursor: Option<(u32, u32)>,
}

impl StagedFrame<'_> {
    /// Visible rows of the raster as RGBA bytes, ready for upload.
    pub fn visible_rows(&self) -> &[u8] {
        self.frame
            .rows(self.info.visible_top, self.info.visible_bottom)
    }

    pub fn visible_overlay_rows(&self) -> &[u8] {
        self.frame
            .overlay_rows(self.info.visible_top, self.info.visible_bottom)
    }

    pub fn visible_size(&self) -> (u32, u32) {
        (self.frame.width(), self.info.visible_scanlines())
    }
}

/// Render-thread end of the raster staging buffer.
///
/// Owns the read frame the uploader consumes. `render` exchanges it with the
/// ring's stable slot, so the critical section never depends on the raster size.
#[derive(Debug)]
pub struct FrameStager {
    shared: Arc<Shared>,
    resizes: ResizeInbox,
    read: RasterFrame,
    info: Option<FrameInfo>,
    cursor: Option<(u32, u32)>,
    generation: u64,
}

impl FrameStager {
    pub(crate) fn new(shared: Arc<Shared>, resizes: ResizeInbox) -> Self {
        let (width, height) = shared.lock().geometry.spec.raster_size();
        Self {
            shared,
            resizes,
            read: RasterFrame::new(width, height),
            info: None,
            cursor: None,
            generation: 0,
        }
    }

    /// Applies resize requests queued by the emulation thread and acknowledges them.
    ///
    /// Must be called regularly from the thread that owns the GPU context; the
    /// emulation thread is blocked until its request has been serviced here.
    pub fn service_resizes(&mut self) -> usize {
        let mut serviced = 0;
        loop {
            match self.resizes.requests.try_recv() {
                Ok(request) => {
                    let result = {
                        let mut state = self.shared.lock();
                        state.render_thread = thread::current().id();
                        state.apply_resize(request.geometry)
                    };
                    if let Err(err) = &result {
                        warn!(error = %err, "rejected resize request");
                    }
                    self.sync_generation();
                    if request.reply.send(result).is_err() {
                        debug!("resize requester went away before acknowledgement");
                    }
                    serviced += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        serviced
    }

    /// Takes the most recently completed frame if one arrived since the last call.
    pub fn render(&mut self) -> Option<StagedFrame<'_>> {
        self.sync_generation();
        {
            let mut state = self.shared.lock();
            state.render_thread = thread::current().id();
            if !state.dirty || state.generation != self.generation {
                return None;
            }
            let stable = state.stable_index();
            mem::swap(&mut self.read, &mut state.frames[stable]);
            state.dirty = false;
            self.info = state.stable_info;
            self.cursor = state.cursor;
        }
        self.latest()
    }

    /// The last frame handed out by [`render`](Self::render), if any.
    pub fn latest(&self) -> Option<StagedFrame<'_>> {
        self.info.map(|info| StagedFrame {
            frame: &self.read,
            info,
            cursor: self.cursor,
        })
    }

    pub fn geometry(&self) -> Geometry {
        self.shared.lock().geometry
    }

    pub fn is_ended(&self) -> bool {
        self.shared.lock().ended
    }

    /// Sizes of every raster buffer still reachable: both ring slots and the read frame.
    pub fn allocated_sizes(&mut self) -> Vec<(u32, u32)> {
        self.sync_generation();
        let state = self.shared.lock();
        vec![
            state.frames[0].size(),
            state.frames[1].size(),
            self.read.size(),
        ]
    }

    /// Drops a read frame left over from before the last resize.
    fn sync_generation(&mut self) {
        let (generation, (width, height)) = {
            let state = self.shared.lock();
            (state.generation, state.geometry.spec.raster_size())
        };
        if generation != self.generation {
            self.generation = generation;
            self.read = RasterFrame::new(width, height);
            self.info = None;
            self.cursor = None;
        }
    }
}
