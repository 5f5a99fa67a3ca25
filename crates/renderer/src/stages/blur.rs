use crtconfig::PipelineConfig;

use crate::device::{ProgramSource, RenderDevice, StageKind};
use crate::error::PipelineError;
use crate::projection::Projection;
use crate::sequencer::SlotName;
use crate::uniforms;

use super::{PassContext, ShaderStage, StageOutput, StageProgram};

pub(super) const SOURCE: ProgramSource = ProgramSource {
    label: "blur",
    kind: StageKind::Blur,
    fragment: include_str!("../shaders/blur.frag"),
    uniforms: uniforms::BLUR_UNIFORMS,
    samplers: &["u_source"],
};

/// Softens the image by `sharpness` reference texels. A zero radius samples
/// only the centre texel.
pub(super) struct BlurStage {
    program: StageProgram,
}

impl BlurStage {
    pub fn new(device: &mut dyn RenderDevice) -> Result<Self, PipelineError> {
        Ok(Self {
            program: StageProgram::compile(device, &SOURCE)?,
        })
    }
}

impl ShaderStage for BlurStage {
    fn name(&self) -> &'static str {
        SOURCE.label
    }

    fn is_enabled(&self, _config: &PipelineConfig) -> bool {
        true
    }

    fn encode(&self, pass: &mut PassContext<'_>) -> Result<StageOutput, PipelineError> {
        let inputs = [pass.source];
        let values = uniforms::blur(pass.config.sharpness, pass.output_size);
        let texture = pass
            .sequencer
            .process(pass.device, SlotName::Blur, &inputs, |device, target| {
                self.program
                    .run(device, &inputs, &values, target, &Projection::presentation())
            })?;
        Ok(StageOutput::Texture(texture))
    }

    fn destroy(&self, device: &mut dyn RenderDevice) {
        self.program.destroy(device);
    }
}
