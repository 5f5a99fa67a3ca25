use crtconfig::PipelineConfig;

use crate::device::{ProgramSource, RenderDevice, RenderTarget, StageKind, UniformValue};
use crate::error::PipelineError;
use crate::pipeline::{FrameOutput, OutputTarget};
use crate::projection::Projection;
use crate::sequencer::SlotName;
use crate::uniforms;

use super::{PassContext, ShaderStage, StageOutput, StageProgram};

const EFFECTS_SOURCE: ProgramSource = ProgramSource {
    label: "effects",
    kind: StageKind::Effects,
    fragment: include_str!("../shaders/effects.frag"),
    uniforms: uniforms::EFFECTS_UNIFORMS,
    samplers: &["u_source", "u_overlay"],
};

const PASSTHROUGH_SOURCE: ProgramSource = ProgramSource {
    label: "passthrough",
    kind: StageKind::Passthrough,
    fragment: include_str!("../shaders/passthrough.frag"),
    uniforms: &[],
    samplers: &["u_source", "u_overlay"],
};

/// Screen effects plus the debug overlay, as the last stage of the chain.
pub(super) struct EffectsStage {
    program: StageProgram,
}

impl EffectsStage {
    pub fn new(device: &mut dyn RenderDevice) -> Result<Self, PipelineError> {
        Ok(Self {
            program: StageProgram::compile(device, &EFFECTS_SOURCE)?,
        })
    }
}

impl ShaderStage for EffectsStage {
    fn name(&self) -> &'static str {
        EFFECTS_SOURCE.label
    }

    fn is_enabled(&self, config: &PipelineConfig) -> bool {
        config.effects_enabled()
    }

    fn encode(&self, pass: &mut PassContext<'_>) -> Result<StageOutput, PipelineError> {
        let values = uniforms::effects(pass.config, &pass.time, pass.output_size);
        finish(&self.program, pass, &values)
    }

    fn destroy(&self, device: &mut dyn RenderDevice) {
        self.program.destroy(device);
    }
}

/// Last stage when no effect is enabled: copies colour and composites the overlay.
pub(super) struct PassthroughStage {
    program: StageProgram,
}

impl PassthroughStage {
    pub fn new(device: &mut dyn RenderDevice) -> Result<Self, PipelineError> {
        Ok(Self {
            program: StageProgram::compile(device, &PASSTHROUGH_SOURCE)?,
        })
    }
}

impl ShaderStage for PassthroughStage {
    fn name(&self) -> &'static str {
        PASSTHROUGH_SOURCE.label
    }

    fn is_enabled(&self, config: &PipelineConfig) -> bool {
        !config.effects_enabled()
    }

    fn encode(&self, pass: &mut PassContext<'_>) -> Result<StageOutput, PipelineError> {
        finish(&self.program, pass, &[])
    }

    fn destroy(&self, device: &mut dyn RenderDevice) {
        self.program.destroy(device);
    }
}

/// Draws the final image to exactly one destination.
fn finish(
    program: &StageProgram,
    pass: &mut PassContext<'_>,
    values: &[(&str, UniformValue)],
) -> Result<StageOutput, PipelineError> {
    let inputs = [pass.source, pass.overlay];
    match pass.output {
        OutputTarget::Present => {
            program.run(
                pass.device,
                &inputs,
                values,
                RenderTarget::Default,
                &Projection::presentation(),
            )?;
            Ok(StageOutput::Finished(FrameOutput::Presented))
        }
        OutputTarget::Scratch => {
            pass.sequencer.clear(pass.device, SlotName::Output)?;
            let texture = pass
                .sequencer
                .process(pass.device, SlotName::Output, &inputs, |device, target| {
                    program.run(device, &inputs, values, target, &Projection::flipped())
                })?;
            Ok(StageOutput::Finished(FrameOutput::Scratch(texture)))
        }
    }
}
