//! The post-processing pipeline: uploads a staged raster and walks the stage
//! chain into the presentation surface or the scratch slot.

use crtconfig::PipelineConfig;
use raster::StagedFrame;
use tracing::{debug, info, trace};

use crate::device::{RenderDevice, TextureHandle};
use crate::error::PipelineError;
use crate::runtime::BoxedFrameClock;
use crate::sequencer::{PipelineSequencer, SETTLING_PASSES};
use crate::stages::{build_chain, PassContext, ShaderStage, StageOutput};
use crate::upload::TextureUploader;

/// Where the final stage draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputTarget {
    /// The device's default target, with the presentation projection.
    #[default]
    Present,
    /// The `Output` slot, vertically flipped for readback or compositing.
    Scratch,
}

/// Result of one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutput {
    Presented,
    Scratch(TextureHandle),
    /// Nothing has been uploaded yet.
    Idle,
}

pub struct Pipeline {
    stages: Vec<Box<dyn ShaderStage>>,
    sequencer: PipelineSequencer,
    uploader: TextureUploader,
    clock: BoxedFrameClock,
    destroyed: bool,
}

impl Pipeline {
    /// Compiles every stage program. Any compile or link failure is returned
    /// and nothing is left allocated on the device.
    pub fn new(
        device: &mut dyn RenderDevice,
        clock: BoxedFrameClock,
    ) -> Result<Self, PipelineError> {
        let stages = build_chain(device)?;
        info!(
            stages = stages.len(),
            "compiled post-processing pipeline"
        );
        Ok(Self {
            stages,
            sequencer: PipelineSequencer::new(),
            uploader: TextureUploader::new(),
            clock,
            destroyed: false,
        })
    }

    /// Uploads the visible window of a staged frame.
    pub fn upload(
        &mut self,
        device: &mut dyn RenderDevice,
        frame: &StagedFrame<'_>,
    ) -> Result<(), PipelineError> {
        self.ensure_live()?;
        self.uploader.upload(device, frame)?;
        trace!(frame = frame.info.frame_number, "uploaded raster");
        Ok(())
    }

    /// Runs the chain over the last uploaded frame.
    ///
    /// Slots follow `output_size`. After a reallocation the phosphor stage
    /// runs [`SETTLING_PASSES`] passes, repeated each frame until one
    /// completes, so the accumulator converges before it is shown.
    pub fn run(
        &mut self,
        device: &mut dyn RenderDevice,
        config: &PipelineConfig,
        output_size: (u32, u32),
        output: OutputTarget,
    ) -> Result<FrameOutput, PipelineError> {
        self.ensure_live()?;
        let Some((raster, overlay)) = self.uploader.textures() else {
            return Ok(FrameOutput::Idle);
        };

        let reallocated = self.sequencer.setup(device, output_size.0, output_size.1)?;
        if reallocated {
            debug!(
                width = output_size.0,
                height = output_size.1,
                passes = SETTLING_PASSES,
                "settling phosphor after reallocation"
            );
        }
        let settling = self.sequencer.is_settling();
        let time = self.clock.sample();

        let mut pass = PassContext {
            device,
            sequencer: &mut self.sequencer,
            config,
            time,
            output_size,
            output,
            source: raster,
            overlay,
            pre_accumulation: None,
            phosphor_passes: if settling { SETTLING_PASSES } else { 1 },
        };
        for stage in self.stages.iter().filter(|stage| stage.is_enabled(config)) {
            match stage.encode(&mut pass)? {
                StageOutput::Texture(texture) => pass.source = texture,
                StageOutput::Finished(result) => {
                    pass.sequencer.settle();
                    return Ok(result);
                }
            }
        }
        Err(PipelineError::Unfinished)
    }

    /// Upload followed by [`run`](Self::run).
    pub fn process_frame(
        &mut self,
        device: &mut dyn RenderDevice,
        frame: &StagedFrame<'_>,
        config: &PipelineConfig,
        output_size: (u32, u32),
        output: OutputTarget,
    ) -> Result<FrameOutput, PipelineError> {
        self.upload(device, frame)?;
        self.run(device, config, output_size, output)
    }

    pub fn sequencer(&self) -> &PipelineSequencer {
        &self.sequencer
    }

    pub fn uploader(&self) -> &TextureUploader {
        &self.uploader
    }

    /// Stage names in chain order.
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    /// Releases all programs, slots and textures. Every later call fails with
    /// [`PipelineError::Destroyed`].
    pub fn destroy(&mut self, device: &mut dyn RenderDevice) {
        if self.destroyed {
            return;
        }
        for stage in self.stages.drain(..) {
            stage.destroy(device);
        }
        self.sequencer.destroy(device);
        self.uploader.destroy(device);
        self.destroyed = true;
        debug!("destroyed post-processing pipeline");
    }

    fn ensure_live(&self) -> Result<(), PipelineError> {
        if self.destroyed {
            Err(PipelineError::Destroyed)
        } else {
            Ok(())
        }
    }
}
