use crtconfig::PipelineConfig;

use crate::device::{ProgramSource, RenderDevice, StageKind};
use crate::error::PipelineError;
use crate::projection::Projection;
use crate::sequencer::SlotName;
use crate::uniforms;

use super::{PassContext, ShaderStage, StageOutput, StageProgram};

const SOURCE: ProgramSource = ProgramSource {
    label: "blend",
    kind: StageKind::Blend,
    fragment: include_str!("../shaders/blend.frag"),
    uniforms: uniforms::BLEND_UNIFORMS,
    samplers: &["u_source", "u_original"],
};

/// Mixes a fixed share of the image from before accumulation back in, so
/// phosphor trails do not wash out fresh detail.
pub(super) struct BlendStage {
    program: StageProgram,
}

impl BlendStage {
    pub fn new(device: &mut dyn RenderDevice) -> Result<Self, PipelineError> {
        Ok(Self {
            program: StageProgram::compile(device, &SOURCE)?,
        })
    }
}

impl ShaderStage for BlendStage {
    fn name(&self) -> &'static str {
        SOURCE.label
    }

    fn is_enabled(&self, config: &PipelineConfig) -> bool {
        config.phosphor
    }

    fn encode(&self, pass: &mut PassContext<'_>) -> Result<StageOutput, PipelineError> {
        let original = pass.pre_accumulation.unwrap_or(pass.source);
        let inputs = [pass.source, original];
        let values = uniforms::blend();
        let texture = pass
            .sequencer
            .process(pass.device, SlotName::Blend, &inputs, |device, target| {
                self.program
                    .run(device, &inputs, &values, target, &Projection::presentation())
            })?;
        Ok(StageOutput::Texture(texture))
    }

    fn destroy(&self, device: &mut dyn RenderDevice) {
        self.program.destroy(device);
    }
}
