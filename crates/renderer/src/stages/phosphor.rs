use crtconfig::PipelineConfig;

use crate::device::{ProgramSource, RenderDevice, StageKind};
use crate::error::PipelineError;
use crate::projection::Projection;
use crate::sequencer::SlotName;
use crate::uniforms;

use super::{blur, PassContext, ShaderStage, StageOutput, StageProgram};

const SOURCE: ProgramSource = ProgramSource {
    label: "phosphor",
    kind: StageKind::Phosphor,
    fragment: include_str!("../shaders/phosphor.frag"),
    uniforms: uniforms::PHOSPHOR_UNIFORMS,
    samplers: &["u_source", "u_previous"],
};

const BLOOM_SOURCE: ProgramSource = ProgramSource {
    label: "phosphor bloom",
    ..blur::SOURCE
};

/// Reference texels of bloom per unit of `phosphor_bloom`.
const BLOOM_RADIUS: f32 = 4.0;

/// Blends each new frame into the feedback slot:
/// `out = new * (1 - latency) + previous * latency`.
///
/// With bloom enabled the previous accumulator is blurred into the bloom slot
/// before it decays. Runs every frame; with the phosphor toggle off the
/// latency is `pixel_perfect_fade`.
pub(super) struct PhosphorStage {
    program: StageProgram,
    bloom: StageProgram,
}

impl PhosphorStage {
    pub fn new(device: &mut dyn RenderDevice) -> Result<Self, PipelineError> {
        let program = StageProgram::compile(device, &SOURCE)?;
        let bloom = match StageProgram::compile(device, &BLOOM_SOURCE) {
            Ok(bloom) => bloom,
            Err(err) => {
                program.destroy(device);
                return Err(err);
            }
        };
        Ok(Self { program, bloom })
    }
}

impl ShaderStage for PhosphorStage {
    fn name(&self) -> &'static str {
        SOURCE.label
    }

    fn is_enabled(&self, _config: &PipelineConfig) -> bool {
        true
    }

    fn encode(&self, pass: &mut PassContext<'_>) -> Result<StageOutput, PipelineError> {
        pass.pre_accumulation = Some(pass.source);
        let values = uniforms::phosphor(pass.config);
        let bloom = pass.config.bloom();
        let bloom_values = uniforms::blur(bloom * BLOOM_RADIUS, pass.output_size);

        let mut produced = pass.sequencer.texture(SlotName::Phosphor)?;
        for _ in 0..pass.phosphor_passes.max(1) {
            let previous = pass.sequencer.texture(SlotName::Phosphor)?;
            let decay = if bloom > 0.0 {
                let inputs = [previous];
                pass.sequencer
                    .process(pass.device, SlotName::Bloom, &inputs, |device, target| {
                        self.bloom.run(
                            device,
                            &inputs,
                            &bloom_values,
                            target,
                            &Projection::presentation(),
                        )
                    })?
            } else {
                previous
            };

            let inputs = [pass.source, decay];
            produced = pass
                .sequencer
                .process(pass.device, SlotName::Phosphor, &inputs, |device, target| {
                    self.program
                        .run(device, &inputs, &values, target, &Projection::presentation())
                })?;
        }
        Ok(StageOutput::Texture(produced))
    }

    fn destroy(&self, device: &mut dyn RenderDevice) {
        self.program.destroy(device);
        self.bloom.destroy(device);
    }
}
