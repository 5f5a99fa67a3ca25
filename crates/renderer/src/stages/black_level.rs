use crtconfig::PipelineConfig;

use crate::device::{ProgramSource, RenderDevice, StageKind};
use crate::error::PipelineError;
use crate::projection::Projection;
use crate::sequencer::SlotName;
use crate::uniforms;

use super::{PassContext, ShaderStage, StageOutput, StageProgram};

const SOURCE: ProgramSource = ProgramSource {
    label: "black level",
    kind: StageKind::BlackLevel,
    fragment: include_str!("../shaders/black_level.frag"),
    uniforms: uniforms::BLACK_LEVEL_UNIFORMS,
    samplers: &["u_source"],
};

/// Lifts the black floor. Always runs; the shader only applies the lift while
/// the screen is curved.
pub(super) struct BlackLevelStage {
    program: StageProgram,
}

impl BlackLevelStage {
    pub fn new(device: &mut dyn RenderDevice) -> Result<Self, PipelineError> {
        Ok(Self {
            program: StageProgram::compile(device, &SOURCE)?,
        })
    }
}

impl ShaderStage for BlackLevelStage {
    fn name(&self) -> &'static str {
        SOURCE.label
    }

    fn is_enabled(&self, _config: &PipelineConfig) -> bool {
        true
    }

    fn encode(&self, pass: &mut PassContext<'_>) -> Result<StageOutput, PipelineError> {
        let inputs = [pass.source];
        let values = uniforms::black_level(pass.config);
        let texture = pass
            .sequencer
            .process(pass.device, SlotName::BlackLevel, &inputs, |device, target| {
                self.program
                    .run(device, &inputs, &values, target, &Projection::presentation())
            })?;
        Ok(StageOutput::Texture(texture))
    }

    fn destroy(&self, device: &mut dyn RenderDevice) {
        self.program.destroy(device);
    }
}
