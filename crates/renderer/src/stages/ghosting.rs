use crtconfig::PipelineConfig;

use crate::device::{ProgramSource, RenderDevice, StageKind};
use crate::error::PipelineError;
use crate::projection::Projection;
use crate::sequencer::SlotName;
use crate::uniforms;

use super::{PassContext, ShaderStage, StageOutput, StageProgram};

const SOURCE: ProgramSource = ProgramSource {
    label: "ghosting",
    kind: StageKind::Ghosting,
    fragment: include_str!("../shaders/ghosting.frag"),
    uniforms: uniforms::GHOSTING_UNIFORMS,
    samplers: &["u_source"],
};

pub(super) struct GhostingStage {
    program: StageProgram,
}

impl GhostingStage {
    pub fn new(device: &mut dyn RenderDevice) -> Result<Self, PipelineError> {
        Ok(Self {
            program: StageProgram::compile(device, &SOURCE)?,
        })
    }
}

impl ShaderStage for GhostingStage {
    fn name(&self) -> &'static str {
        SOURCE.label
    }

    fn is_enabled(&self, config: &PipelineConfig) -> bool {
        config.ghosting
    }

    fn encode(&self, pass: &mut PassContext<'_>) -> Result<StageOutput, PipelineError> {
        let inputs = [pass.source];
        let values = uniforms::ghosting(pass.config, &pass.time);
        let texture = pass
            .sequencer
            .process(pass.device, SlotName::Ghost, &inputs, |device, target| {
                self.program
                    .run(device, &inputs, &values, target, &Projection::presentation())
            })?;
        Ok(StageOutput::Texture(texture))
    }

    fn destroy(&self, device: &mut dyn RenderDevice) {
        self.program.destroy(device);
    }
}
