use tracing::warn;

use crate::device::{
    ProgramHandle, ProgramSource, RenderDevice, RenderTarget, TextureHandle, UniformLocation,
    UniformValue, PROJECTION_UNIFORM,
};
use crate::error::{DeviceError, PipelineError};
use crate::projection::Projection;

/// A compiled stage program plus the uniform locations it was built with.
pub struct StageProgram {
    label: &'static str,
    handle: ProgramHandle,
    projection: UniformLocation,
    locations: Vec<(&'static str, UniformLocation)>,
    samplers: usize,
}

impl StageProgram {
    pub fn compile(
        device: &mut dyn RenderDevice,
        source: &ProgramSource,
    ) -> Result<Self, PipelineError> {
        let label = source.label;
        let compile_error = |message: String| PipelineError::Compile {
            stage: label,
            source: DeviceError::Compile { label, message },
        };
        let handle = device
            .compile_program(source)
            .map_err(|err| PipelineError::Compile {
                stage: label,
                source: err,
            })?;

        let Some(projection) = device.uniform_location(handle, PROJECTION_UNIFORM) else {
            device.destroy_program(handle);
            return Err(compile_error(format!("missing {PROJECTION_UNIFORM}")));
        };
        let mut locations = Vec::with_capacity(source.uniforms.len());
        for decl in source.uniforms {
            match device.uniform_location(handle, decl.name) {
                Some(location) => locations.push((decl.name, location)),
                None => {
                    device.destroy_program(handle);
                    return Err(compile_error(format!(
                        "uniform '{}' has no location",
                        decl.name
                    )));
                }
            }
        }

        Ok(Self {
            label: source.label,
            handle,
            projection,
            locations,
            samplers: source.samplers.len(),
        })
    }

    pub fn bind(&self, device: &mut dyn RenderDevice, inputs: &[TextureHandle]) {
        for (unit, texture) in inputs.iter().take(self.samplers).enumerate() {
            device.bind_texture(unit as u32, *texture);
        }
    }

    pub fn set_uniforms(&self, device: &mut dyn RenderDevice, values: &[(&str, UniformValue)]) {
        for (name, value) in values {
            let Some((_, location)) = self.locations.iter().find(|(known, _)| known == name) else {
                warn!(program = self.label, uniform = *name, "program has no such uniform");
                continue;
            };
            match value {
                UniformValue::Int(v) => device.set_uniform_int(*location, *v),
                UniformValue::Float(v) => device.set_uniform_float(*location, *v),
                UniformValue::Vec2(v) => device.set_uniform_vec2(*location, *v),
                UniformValue::Mat4(v) => {
                    device.set_uniform_matrix4(*location, &Projection::from_columns(*v))
                }
            }
        }
    }

    pub fn draw(
        &self,
        device: &mut dyn RenderDevice,
        target: RenderTarget,
        projection: &Projection,
    ) -> Result<(), PipelineError> {
        device.set_uniform_matrix4(self.projection, projection);
        device.draw_fullscreen_quad(self.handle, target)?;
        Ok(())
    }

    /// Binds `inputs`, applies `values` and draws into `target`.
    pub fn run(
        &self,
        device: &mut dyn RenderDevice,
        inputs: &[TextureHandle],
        values: &[(&str, UniformValue)],
        target: RenderTarget,
        projection: &Projection,
    ) -> Result<(), PipelineError> {
        self.bind(device, inputs);
        self.set_uniforms(device, values);
        self.draw(device, target, projection)
    }

    pub fn destroy(&self, device: &mut dyn RenderDevice) {
        device.destroy_program(self.handle);
    }
}
