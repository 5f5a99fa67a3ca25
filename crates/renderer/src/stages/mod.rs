//! The ordered shader stages of the post-processing chain.
//!
//! Each stage owns its compiled programs and writes into one named slot. The
//! pipeline walks the chain in order, skipping disabled stages, and feeds each
//! stage's output texture to the next one. The final stage routes to the
//! presentation surface or to the scratch slot.

mod black_level;
mod blend;
mod blur;
mod effects;
mod ghosting;
mod phosphor;
mod program;
mod scale;

use crtconfig::PipelineConfig;

use crate::device::{RenderDevice, TextureHandle};
use crate::error::PipelineError;
use crate::pipeline::{FrameOutput, OutputTarget};
use crate::runtime::FrameTime;
use crate::sequencer::PipelineSequencer;

pub use program::StageProgram;

/// Per-frame state threaded through the chain.
pub struct PassContext<'a> {
    pub device: &'a mut dyn RenderDevice,
    pub sequencer: &'a mut PipelineSequencer,
    pub config: &'a PipelineConfig,
    pub time: FrameTime,
    pub output_size: (u32, u32),
    pub output: OutputTarget,
    /// Output of the previous enabled stage.
    pub source: TextureHandle,
    pub overlay: TextureHandle,
    /// Image as it entered the phosphor stage.
    pub pre_accumulation: Option<TextureHandle>,
    /// Accumulation passes to run this frame.
    pub phosphor_passes: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutput {
    Texture(TextureHandle),
    Finished(FrameOutput),
}

pub trait ShaderStage {
    fn name(&self) -> &'static str;
    fn is_enabled(&self, config: &PipelineConfig) -> bool;
    fn encode(&self, pass: &mut PassContext<'_>) -> Result<StageOutput, PipelineError>;
    fn destroy(&self, device: &mut dyn RenderDevice);
}

/// Compiles every stage in chain order. Any failure releases what was built.
pub fn build_chain(
    device: &mut dyn RenderDevice,
) -> Result<Vec<Box<dyn ShaderStage>>, PipelineError> {
    type Builder = fn(&mut dyn RenderDevice) -> Result<Box<dyn ShaderStage>, PipelineError>;
    let builders: [Builder; 8] = [
        |device| Ok(Box::new(scale::ScaleStage::new(device)?)),
        |device| Ok(Box::new(ghosting::GhostingStage::new(device)?)),
        |device| Ok(Box::new(phosphor::PhosphorStage::new(device)?)),
        |device| Ok(Box::new(black_level::BlackLevelStage::new(device)?)),
        |device| Ok(Box::new(blur::BlurStage::new(device)?)),
        |device| Ok(Box::new(blend::BlendStage::new(device)?)),
        |device| Ok(Box::new(effects::EffectsStage::new(device)?)),
        |device| Ok(Box::new(effects::PassthroughStage::new(device)?)),
    ];

    let mut chain: Vec<Box<dyn ShaderStage>> = Vec::with_capacity(builders.len());
    for build in builders {
        match build(device) {
            Ok(stage) => chain.push(stage),
            Err(err) => {
                for stage in &chain {
                    stage.destroy(device);
                }
                return Err(err);
            }
        }
    }
    Ok(chain)
}
