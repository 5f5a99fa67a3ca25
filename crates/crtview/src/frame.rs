//! One frame of the render loop: take the staged raster, run the pipeline and
//! settle what lands on the window.

use crtconfig::PipelineConfig;
use raster::FrameStager;
use renderer::{FrameOutput, OutputTarget, Pipeline, PipelineError, RenderDevice, RenderTarget};

const CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

/// Uploads any newly staged frame and runs the pipeline over it.
///
/// A failed upload or run only degrades this frame: it is logged and the
/// window is cleared, and the next frame starts over. Only a destroyed
/// pipeline is returned as an error.
pub fn draw_frame(
    device: &mut dyn RenderDevice,
    stager: &mut FrameStager,
    pipeline: &mut Pipeline,
    config: &PipelineConfig,
    output_size: (u32, u32),
    output: OutputTarget,
) -> Result<FrameOutput, PipelineError> {
    let result = match stager.render() {
        Some(frame) => pipeline.upload(device, &frame),
        None => Ok(()),
    }
    .and_then(|()| pipeline.run(device, config, output_size, output));

    let produced = match result {
        Ok(produced) => produced,
        Err(PipelineError::Destroyed) => return Err(PipelineError::Destroyed),
        Err(err) => {
            tracing::warn!(error = %err, "frame degraded");
            FrameOutput::Idle
        }
    };

    if produced != FrameOutput::Presented {
        if let Err(err) = device.clear_framebuffer(RenderTarget::Default, CLEAR_COLOR) {
            tracing::warn!(error = %err, "failed to clear window");
        }
    }
    Ok(produced)
}
