//! Synthetic emulation thread: plots colour bars with a moving cursor and
//! periodically switches television standard.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use raster::{
    Annotation, Geometry, PixelPlotter, PixelRenderer, RasterError, Signal, VideoSpec,
    HORIZONTAL_BLANK,
};

/// Hues of the eight vertical bars, as TIA colour indices at full luminance.
const BARS: [u8; 8] = [0x0E, 0x1C, 0x3C, 0x5C, 0x7C, 0x9C, 0xBC, 0xDC];

/// Share of the visible window (in eighths) taken by the bars; the rest is a luminance ramp.
const BAR_EIGHTHS: u32 = 6;

#[derive(Debug, Clone, Copy)]
pub struct TestCard {
    geometry: Geometry,
}

impl TestCard {
    pub fn new(geometry: Geometry) -> Self {
        Self { geometry }
    }

    /// Colour index for the visible cell at (`x`, `line`), `line` counted from the window top.
    pub fn color_at(&self, x: u32, line: u32) -> u8 {
        let active_width = self.geometry.spec.clocks_per_scanline - HORIZONTAL_BLANK;
        let column = x.saturating_sub(HORIZONTAL_BLANK).min(active_width - 1);
        if line * 8 < self.geometry.visible * BAR_EIGHTHS {
            BARS[(column * BARS.len() as u32 / active_width) as usize]
        } else {
            let luminance = (column * 8 / active_width) as u8;
            luminance << 1
        }
    }

    /// Cursor position for `frame`, sweeping the visible area diagonally.
    pub fn cursor(&self, frame: u64) -> (u32, u32) {
        let active_width = u64::from(self.geometry.spec.clocks_per_scanline - HORIZONTAL_BLANK);
        let x = HORIZONTAL_BLANK as u64 + frame % active_width;
        let y = u64::from(self.geometry.top) + frame % u64::from(self.geometry.visible);
        (x as u32, y as u32)
    }

    /// Plots one whole frame, blanking lines outside the visible window.
    pub fn plot(&self, plotter: &mut PixelPlotter, frame: u64) {
        let spec = self.geometry.spec;
        let cursor = self.cursor(frame);
        let mut batch = plotter.begin_update();
        for scanline in 0..spec.total_scanlines {
            batch.new_scanline(scanline);
            let vblank = scanline < self.geometry.top || scanline >= self.geometry.bottom();
            for x in 0..spec.clocks_per_scanline {
                let color_index = if vblank || x < HORIZONTAL_BLANK {
                    0
                } else {
                    self.color_at(x, scanline - self.geometry.top)
                };
                let is_current = (x, scanline) == cursor;
                batch.set_pixel(Signal {
                    horizontal_position: x,
                    scanline,
                    color_index,
                    vblank,
                    is_current,
                });
                if is_current {
                    batch.reflect(Annotation::Collision);
                } else if x == spec.clocks_per_scanline - 1 && !vblank && scanline % 16 == 0 {
                    batch.reflect(Annotation::Wsync);
                }
            }
        }
        batch.end_update();
    }
}

/// Next standard in the switching cycle.
pub fn next_spec(current: VideoSpec) -> VideoSpec {
    let index = VideoSpec::ALL
        .iter()
        .position(|spec| spec.id == current.id)
        .unwrap_or(0);
    VideoSpec::ALL[(index + 1) % VideoSpec::ALL.len()]
}

/// Handle on the running emulation thread.
pub struct Emulation {
    shutdown: Option<Sender<()>>,
    handle: Option<JoinHandle<Result<u64, RasterError>>>,
}

impl Emulation {
    /// Starts plotting frames on a new thread. The plotter's resizes go
    /// through the render thread's stager.
    pub fn spawn(plotter: PixelPlotter, switch_every: u64) -> std::io::Result<Self> {
        let (shutdown, stop) = crossbeam_channel::bounded(0);
        let handle = thread::Builder::new()
            .name("emulation".into())
            .spawn(move || emulate(plotter, &stop, switch_every))?;
        Ok(Self {
            shutdown: Some(shutdown),
            handle: Some(handle),
        })
    }

    /// Signals the thread and waits for it. Drop the stager first so a
    /// blocked resize returns instead of waiting forever.
    pub fn stop(&mut self) {
        self.shutdown.take();
        let Some(handle) = self.handle.take() else {
            return;
        };
        match handle.join() {
            Ok(Ok(frames)) => tracing::info!(frames, "emulation thread finished"),
            Ok(Err(err)) => tracing::warn!(error = %err, "emulation thread failed"),
            Err(_) => tracing::error!("emulation thread panicked"),
        }
    }
}

impl Drop for Emulation {
    fn drop(&mut self) {
        self.stop();
    }
}

fn emulate(
    mut plotter: PixelPlotter,
    stop: &Receiver<()>,
    switch_every: u64,
) -> Result<u64, RasterError> {
    let mut frame = 0u64;
    loop {
        match stop.try_recv() {
            Err(TryRecvError::Empty) => {}
            Ok(()) | Err(TryRecvError::Disconnected) => break,
        }

        let geometry = plotter.geometry();
        let card = TestCard::new(geometry);
        frame += 1;
        card.plot(&mut plotter, frame);
        plotter.new_frame(frame, true)?;
        thread::sleep(Duration::from_secs_f32(1.0 / geometry.spec.refresh_rate));

        if switch_every > 0 && frame % switch_every == 0 {
            let next = next_spec(geometry.spec);
            tracing::info!(from = geometry.spec.id, to = next.id, "switching video spec");
            match plotter.resize(next, next.default_top, next.default_visible) {
                Ok(()) => {}
                Err(RasterError::Closed) => {
                    tracing::debug!("render side closed during resize");
                    break;
                }
                Err(err) => return Err(err),
            }
        }
    }
    plotter.end_rendering()?;
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bars_cover_the_active_width() {
        let card = TestCard::new(Geometry::default_for(VideoSpec::NTSC));
        assert_eq!(card.color_at(HORIZONTAL_BLANK, 0), BARS[0]);
        assert_eq!(card.color_at(VideoSpec::NTSC.clocks_per_scanline - 1, 0), BARS[7]);
        let ramp_line = VideoSpec::NTSC.default_visible - 1;
        assert_eq!(card.color_at(HORIZONTAL_BLANK, ramp_line), 0);
        assert_eq!(
            card.color_at(VideoSpec::NTSC.clocks_per_scanline - 1, ramp_line),
            7 << 1
        );
    }

    #[test]
    fn cursor_stays_inside_the_visible_window() {
        let geometry = Geometry::default_for(VideoSpec::PAL);
        let card = TestCard::new(geometry);
        for frame in [0, 1, 159, 160, 227, 5000] {
            let (x, y) = card.cursor(frame);
            assert!(x >= HORIZONTAL_BLANK && x < geometry.spec.clocks_per_scanline);
            assert!(y >= geometry.top && y < geometry.bottom());
        }
    }

    #[test]
    fn spec_cycle_visits_every_standard() {
        let mut spec = VideoSpec::NTSC;
        let mut seen = Vec::new();
        for _ in 0..VideoSpec::ALL.len() {
            spec = next_spec(spec);
            seen.push(spec.id);
        }
        assert_eq!(seen, ["PAL", "PAL-M", "SECAM", "NTSC"]);
    }

    #[test]
    fn plotted_card_reaches_the_stager_with_cursor_and_vsync() {
        let geometry = Geometry::default_for(VideoSpec::NTSC);
        let (mut plotter, mut stager) = raster::staging(geometry).unwrap();
        let card = TestCard::new(geometry);
        card.plot(&mut plotter, 3);
        plotter.new_frame(3, true).unwrap();

        let staged = stager.render().expect("frame staged");
        assert!(staged.info.vsync);
        assert_eq!(staged.cursor, Some(card.cursor(3)));
        let (x, y) = card.cursor(3);
        assert_eq!(
            staged.frame.overlay_pixel(x, y),
            Some(Annotation::Collision.color())
        );
    }
}
