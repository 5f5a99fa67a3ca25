use crtconfig::PipelineConfig;

use crate::device::{ProgramSource, RenderDevice, StageKind};
use crate::error::PipelineError;
use crate::projection::Projection;
use crate::sequencer::SlotName;

use super::{PassContext, ShaderStage, StageOutput, StageProgram};

const SOURCE: ProgramSource = ProgramSource {
    label: "scale",
    kind: StageKind::Scale,
    fragment: include_str!("../shaders/scale.frag"),
    uniforms: &[],
    samplers: &["u_source"],
};

/// Resamples the visible raster to the output resolution.
pub(super) struct ScaleStage {
    program: StageProgram,
}

impl ScaleStage {
    pub fn new(device: &mut dyn RenderDevice) -> Result<Self, PipelineError> {
        Ok(Self {
            program: StageProgram::compile(device, &SOURCE)?,
        })
    }
}

impl ShaderStage for ScaleStage {
    fn name(&self) -> &'static str {
        SOURCE.label
    }

    fn is_enabled(&self, _config: &PipelineConfig) -> bool {
        true
    }

    fn encode(&self, pass: &mut PassContext<'_>) -> Result<StageOutput, PipelineError> {
        let inputs = [pass.source];
        let texture = pass
            .sequencer
            .process(pass.device, SlotName::Scaled, &inputs, |device, target| {
                self.program
                    .run(device, &inputs, &[], target, &Projection::presentation())
            })?;
        Ok(StageOutput::Texture(texture))
    }

    fn destroy(&self, device: &mut dyn RenderDevice) {
        self.program.destroy(device);
    }
}
