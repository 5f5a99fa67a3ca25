//! CPU reference implementation of [`RenderDevice`].
//!
//! Runs the same stage kernels as the GLSL programs, one fragment per target
//! pixel, and keeps every texture readable. Used wherever a GPU is not
//! available, most notably the test-suite.

mod kernels;

use std::collections::{HashMap, HashSet};

use tracing::{trace, warn};

use crate::device::{
    FramebufferHandle, ProgramHandle, ProgramSource, RenderDevice, RenderTarget, StageKind,
    TextureFormat, TextureHandle, UniformDecl, UniformLocation, UniformValue, MAX_TEXTURE_UNITS,
};
use crate::error::DeviceError;
use crate::projection::Projection;

/// A readable RGBA texture with `f32` channels in `0.0..=1.0`.
#[derive(Debug, Clone, PartialEq)]
pub struct SoftTexture {
    width: u32,
    height: u32,
    format: TextureFormat,
    texels: Vec<[f32; 4]>,
}

impl SoftTexture {
    fn new(width: u32, height: u32, format: TextureFormat) -> Self {
        Self {
            width,
            height,
            format,
            texels: vec![[0.0; 4]; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> TextureFormat {
        self.format
    }

    /// Texel at `(x, y)`, row 0 being the top row.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[f32; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.texels.get((y * self.width + x) as usize).copied()
    }

    pub fn texels(&self) -> &[[f32; 4]] {
        &self.texels
    }

    /// Bilinear sample with clamp-to-edge addressing.
    pub fn sample(&self, u: f32, v: f32) -> [f32; 4] {
        if self.texels.is_empty() {
            return [0.0; 4];
        }
        let x = u * self.width as f32 - 0.5;
        let y = v * self.height as f32 - 0.5;
        let (x0, y0) = (x.floor(), y.floor());
        let (fx, fy) = (x - x0, y - y0);
        let texel = |tx: f32, ty: f32| {
            let cx = (tx as i64).clamp(0, self.width as i64 - 1) as usize;
            let cy = (ty as i64).clamp(0, self.height as i64 - 1) as usize;
            self.texels[cy * self.width as usize + cx]
        };
        let (a, b) = (texel(x0, y0), texel(x0 + 1.0, y0));
        let (c, d) = (texel(x0, y0 + 1.0), texel(x0 + 1.0, y0 + 1.0));
        let mut out = [0.0; 4];
        for channel in 0..4 {
            let top = a[channel] + (b[channel] - a[channel]) * fx;
            let bottom = c[channel] + (d[channel] - c[channel]) * fx;
            out[channel] = top + (bottom - top) * fy;
        }
        out
    }
}

struct SoftProgram {
    source: ProgramSource,
    decls: Vec<UniformDecl>,
    values: Vec<UniformValue>,
}

/// One recorded draw, for inspecting what the pipeline did.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawRecord {
    pub label: &'static str,
    pub kind: StageKind,
    pub target: RenderTarget,
    pub inputs: Vec<TextureHandle>,
    pub uniforms: Vec<(&'static str, UniformValue)>,
}

impl DrawRecord {
    pub fn uniform(&self, name: &str) -> Option<UniformValue> {
        self.uniforms
            .iter()
            .find(|(uniform, _)| *uniform == name)
            .map(|(_, value)| *value)
    }
}

#[derive(Default)]
pub struct SoftwareDevice {
    next_id: u32,
    textures: HashMap<TextureHandle, SoftTexture>,
    framebuffers: HashMap<FramebufferHandle, TextureHandle>,
    programs: HashMap<ProgramHandle, SoftProgram>,
    units: [Option<TextureHandle>; MAX_TEXTURE_UNITS],
    default_target: Option<SoftTexture>,
    texture_budget: Option<usize>,
    rejected_programs: HashSet<&'static str>,
    draws: Vec<DrawRecord>,
}

impl SoftwareDevice {
    /// A device whose default target is `width`×`height`.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            default_target: Some(SoftTexture::new(width, height, TextureFormat::Rgba8)),
            ..Self::default()
        }
    }

    /// A device with nothing to present to; only offscreen output works.
    pub fn headless() -> Self {
        Self::default()
    }

    pub fn resize_default(&mut self, width: u32, height: u32) {
        self.default_target = Some(SoftTexture::new(width, height, TextureFormat::Rgba8));
    }

    pub fn read_texture(&self, texture: TextureHandle) -> Option<&SoftTexture> {
        self.textures.get(&texture)
    }

    pub fn read_default(&self) -> Option<&SoftTexture> {
        self.default_target.as_ref()
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn live_framebuffers(&self) -> usize {
        self.framebuffers.len()
    }

    pub fn live_programs(&self) -> usize {
        self.programs.len()
    }

    /// Caps the number of live textures; creation beyond it fails with `OutOfMemory`.
    pub fn set_texture_budget(&mut self, budget: Option<usize>) {
        self.texture_budget = budget;
    }

    /// Makes compilation of the program labelled `label` fail.
    pub fn reject_program(&mut self, label: &'static str) {
        self.rejected_programs.insert(label);
    }

    pub fn draws(&self) -> &[DrawRecord] {
        &self.draws
    }

    pub fn take_draws(&mut self) -> Vec<DrawRecord> {
        std::mem::take(&mut self.draws)
    }

    fn allocate_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn target_texture(&self, target: RenderTarget) -> Result<Option<TextureHandle>, DeviceError> {
        match target {
            RenderTarget::Default => {
                if self.default_target.is_none() {
                    return Err(DeviceError::NoDefaultTarget);
                }
                Ok(None)
            }
            RenderTarget::Framebuffer(framebuffer) => self
                .framebuffers
                .get(&framebuffer)
                .copied()
                .map(Some)
                .ok_or(DeviceError::UnknownFramebuffer(framebuffer)),
        }
    }

    fn target_mut(&mut self, texture: Option<TextureHandle>) -> Option<&mut SoftTexture> {
        match texture {
            Some(texture) => self.textures.get_mut(&texture),
            None => self.default_target.as_mut(),
        }
    }

    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue) {
        let Some(program) = self.programs.get_mut(&location.program) else {
            warn!(?location, "uniform set on unknown program");
            return;
        };
        let index = location.index as usize;
        match program.decls.get(index) {
            Some(decl) if decl.kind == value.kind() => program.values[index] = value,
            Some(decl) => warn!(
                name = decl.name,
                expected = ?decl.kind,
                got = ?value.kind(),
                "uniform type mismatch"
            ),
            None => warn!(?location, "uniform location out of range"),
        }
    }
}

impl RenderDevice for SoftwareDevice {
    fn compile_program(&mut self, source: &ProgramSource) -> Result<ProgramHandle, DeviceError> {
        if self.rejected_programs.contains(source.label) {
            return Err(DeviceError::Compile {
                label: source.label,
                message: "rejected by device".into(),
            });
        }
        if source.fragment.trim().is_empty() {
            return Err(DeviceError::Compile {
                label: source.label,
                message: "empty fragment body".into(),
            });
        }
        if source.samplers.len() > MAX_TEXTURE_UNITS {
            return Err(DeviceError::Compile {
                label: source.label,
                message: format!(
                    "{} samplers exceed the {MAX_TEXTURE_UNITS} available units",
                    source.samplers.len()
                ),
            });
        }
        let decls = source.all_uniforms();
        for (index, decl) in decls.iter().enumerate() {
            if decls[..index].iter().any(|other| other.name == decl.name) {
                return Err(DeviceError::Compile {
                    label: source.label,
                    message: format!("uniform '{}' declared twice", decl.name),
                });
            }
        }

        let values = decls.iter().map(|decl| UniformValue::zeroed(decl.kind)).collect();
        let handle = ProgramHandle(self.allocate_id());
        self.programs.insert(
            handle,
            SoftProgram {
                source: *source,
                decls,
                values,
            },
        );
        Ok(handle)
    }

    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<UniformLocation> {
        let index = self
            .programs
            .get(&program)?
            .decls
            .iter()
            .position(|decl| decl.name == name)?;
        Some(UniformLocation {
            program,
            index: index as u32,
        })
    }

    fn destroy_program(&mut self, program: ProgramHandle) {
        self.programs.remove(&program);
    }

    fn create_texture(
        &mut self,
        width: u32,
        height: u32,
        format: TextureFormat,
    ) -> Result<TextureHandle, DeviceError> {
        if width == 0 || height == 0 {
            return Err(DeviceError::InvalidSize { width, height });
        }
        if self
            .texture_budget
            .is_some_and(|budget| self.textures.len() >= budget)
        {
            return Err(DeviceError::OutOfMemory);
        }
        let handle = TextureHandle(self.allocate_id());
        self.textures
            .insert(handle, SoftTexture::new(width, height, format));
        Ok(handle)
    }

    fn upload_texture(&mut self, texture: TextureHandle, rgba: &[u8]) -> Result<(), DeviceError> {
        let target = self
            .textures
            .get_mut(&texture)
            .ok_or(DeviceError::UnknownTexture(texture))?;
        let expected = target.texels.len() * 4;
        if rgba.len() != expected {
            return Err(DeviceError::UploadSize {
                expected,
                actual: rgba.len(),
            });
        }
        for (texel, bytes) in target.texels.iter_mut().zip(rgba.chunks_exact(4)) {
            for (channel, byte) in texel.iter_mut().zip(bytes) {
                *channel = f32::from(*byte) / 255.0;
            }
        }
        Ok(())
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        self.textures.remove(&texture);
        for unit in self.units.iter_mut() {
            if *unit == Some(texture) {
                *unit = None;
            }
        }
    }

    fn create_framebuffer(
        &mut self,
        texture: TextureHandle,
    ) -> Result<FramebufferHandle, DeviceError> {
        if !self.textures.contains_key(&texture) {
            return Err(DeviceError::UnknownTexture(texture));
        }
        let handle = FramebufferHandle(self.allocate_id());
        self.framebuffers.insert(handle, texture);
        Ok(handle)
    }

    fn destroy_framebuffer(&mut self, framebuffer: FramebufferHandle) {
        self.framebuffers.remove(&framebuffer);
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureHandle) {
        match self.units.get_mut(unit as usize) {
            Some(slot) => *slot = Some(texture),
            None => warn!(unit, "texture unit out of range"),
        }
    }

    fn set_uniform_int(&mut self, location: UniformLocation, value: i32) {
        self.set_uniform(location, UniformValue::Int(value));
    }

    fn set_uniform_float(&mut self, location: UniformLocation, value: f32) {
        self.set_uniform(location, UniformValue::Float(value));
    }

    fn set_uniform_vec2(&mut self, location: UniformLocation, value: [f32; 2]) {
        self.set_uniform(location, UniformValue::Vec2(value));
    }

    fn set_uniform_matrix4(&mut self, location: UniformLocation, value: &Projection) {
        self.set_uniform(location, UniformValue::Mat4(*value.columns()));
    }

    fn clear_framebuffer(
        &mut self,
        target: RenderTarget,
        color: [f32; 4],
    ) -> Result<(), DeviceError> {
        let texture = self.target_texture(target)?;
        if let Some(surface) = self.target_mut(texture) {
            surface.texels.fill(color);
        }
        Ok(())
    }

    fn draw_fullscreen_quad(
        &mut self,
        program: ProgramHandle,
        target: RenderTarget,
    ) -> Result<(), DeviceError> {
        let target_texture = self.target_texture(target)?;
        let shader = self
            .programs
            .get(&program)
            .ok_or(DeviceError::UnknownProgram(program))?;

        let unit_count = shader.source.samplers.len();
        let inputs: Vec<TextureHandle> =
            self.units[..unit_count].iter().flatten().copied().collect();
        if let Some(texture) = target_texture {
            if inputs.contains(&texture) {
                return Err(DeviceError::FeedbackLoop(texture));
            }
        }

        let mut samplers = [None; MAX_TEXTURE_UNITS];
        for (unit, bound) in self.units[..unit_count].iter().enumerate() {
            samplers[unit] = match bound {
                Some(texture) => Some(
                    self.textures
                        .get(texture)
                        .ok_or(DeviceError::UnknownTexture(*texture))?,
                ),
                None => None,
            };
        }

        let projection = match shader.values.first() {
            Some(UniformValue::Mat4(columns)) => Projection::from_columns(*columns),
            _ => Projection::from_columns([0.0; 16]),
        };
        let (width, height) = match target_texture {
            Some(texture) => self
                .textures
                .get(&texture)
                .map(|surface| (surface.width, surface.height))
                .ok_or(DeviceError::UnknownTexture(texture))?,
            None => self
                .default_target
                .as_ref()
                .map(|surface| (surface.width, surface.height))
                .ok_or(DeviceError::NoDefaultTarget)?,
        };

        let env = kernels::Env {
            decls: &shader.decls,
            values: &shader.values,
            samplers,
        };
        let mut fragments = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            let ndc_y = 1.0 - (y as f32 + 0.5) / height as f32 * 2.0;
            for x in 0..width {
                let ndc_x = (x as f32 + 0.5) / width as f32 * 2.0 - 1.0;
                let (u, v) = projection.unproject(ndc_x, ndc_y).ok_or_else(|| {
                    DeviceError::Backend(format!(
                        "'{}' drawn with a singular projection",
                        shader.source.label
                    ))
                })?;
                fragments.push(kernels::shade(shader.source.kind, &env, u, v));
            }
        }

        let record = DrawRecord {
            label: shader.source.label,
            kind: shader.source.kind,
            target,
            inputs,
            uniforms: shader
                .decls
                .iter()
                .zip(&shader.values)
                .map(|(decl, value)| (decl.name, *value))
                .collect(),
        };
        trace!(label = record.label, width, height, "software draw");
        self.draws.push(record);

        if let Some(surface) = self.target_mut(target_texture) {
            surface.texels = fragments;
        }
        Ok(())
    }

    fn default_target_size(&self) -> Option<(u32, u32)> {
        self.default_target
            .as_ref()
            .map(|surface| (surface.width, surface.height))
    }
}
