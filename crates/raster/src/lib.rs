//! Raster staging between an emulation thread and a render thread.
//!
//! ```text
//!   emulation thread                         render thread (owns the GPU)
//!   ────────────────                         ────────────────────────────
//!   PixelPlotter ── set_pixel ─▶ [frame 0 | frame 1] ◀─ swap ── FrameStager ─▶ upload
//!        │                            ▲
//!        └── resize ─▶ bounded request/response channel ─▶ service_resizes()
//! ```
//!
//! The plotter writes the *active* slot of a two-frame ring; `new_frame`
//! carries its contents forward into the other slot (blanking regions are not
//! replotted every frame) and flips the active index. The stager only ever
//! touches the *stable* slot, which it exchanges with its own read frame in a
//! constant-time swap. Resizes are applied on the render thread, with the
//! emulation thread blocked until the request has been acknowledged.

mod error;
mod frame;
mod palette;
mod plotter;
mod resize;
mod signal;
mod spec;
mod stager;
mod state;

use std::sync::Arc;

pub use error::RasterError;
pub use frame::{FrameInfo, RasterFrame};
pub use palette::{Palette, PaletteKind, BLACK, PALETTE_ENTRIES};
pub use plotter::{PixelPlotter, PixelRenderer, PlotBatch};
pub use signal::{Annotation, Signal};
pub use spec::{Geometry, VideoSpec, CLOCKS_PER_SCANLINE, HORIZONTAL_BLANK};
pub use stager::{FrameStager, StagedFrame};

use resize::resize_channel;
use state::Shared;

/// Creates a connected plotter/stager pair for `geometry`.
///
/// Call this on the render thread: resizes issued from that thread are
/// applied in place, resizes from any other thread go through the stager.
pub fn staging(geometry: Geometry) -> Result<(PixelPlotter, FrameStager), RasterError> {
    if !geometry.is_valid() {
        return Err(RasterError::InvalidGeometry {
            spec: geometry.spec.id,
            top: geometry.top,
            visible: geometry.visible,
            total: geometry.spec.total_scanlines,
        });
    }
    let shared = Arc::new(Shared::new(geometry));
    let (client, inbox) = resize_channel();
    Ok((
        PixelPlotter::new(shared.clone(), client),
        FrameStager::new(shared, inbox),
    ))
}
