//! The graphics interface the pipeline is written against.
//!
//! It is deliberately shaped like a small GL: programs own their uniform
//! values, textures are bound to numbered units, and framebuffers wrap a single
//! colour texture. [`crate::gpu::WgpuDevice`] maps it onto wgpu render passes;
//! [`crate::software::SoftwareDevice`] runs the same stages on the CPU.

use crate::error::DeviceError;
use crate::projection::Projection;

/// Texture units a program may sample from.
pub const MAX_TEXTURE_UNITS: usize = 4;

/// Name of the projection uniform every program carries.
pub const PROJECTION_UNIFORM: &str = "u_projection";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(pub(crate) u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FramebufferHandle(pub(crate) u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramHandle(pub(crate) u32);

/// Uniform slot inside one program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformLocation {
    pub(crate) program: ProgramHandle,
    pub(crate) index: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    /// Raster and overlay uploads.
    Rgba8,
    /// Intermediate pipeline slots.
    Rgba16Float,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderTarget {
    Framebuffer(FramebufferHandle),
    /// The presentation surface.
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformKind {
    Int,
    Float,
    Vec2,
    Mat4,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Int(i32),
    Float(f32),
    Vec2([f32; 2]),
    Mat4([f32; 16]),
}

impl UniformValue {
    pub fn kind(&self) -> UniformKind {
        match self {
            UniformValue::Int(_) => UniformKind::Int,
            UniformValue::Float(_) => UniformKind::Float,
            UniformValue::Vec2(_) => UniformKind::Vec2,
            UniformValue::Mat4(_) => UniformKind::Mat4,
        }
    }

    pub(crate) fn zeroed(kind: UniformKind) -> Self {
        match kind {
            UniformKind::Int => UniformValue::Int(0),
            UniformKind::Float => UniformValue::Float(0.0),
            UniformKind::Vec2 => UniformValue::Vec2([0.0; 2]),
            UniformKind::Mat4 => UniformValue::Mat4([0.0; 16]),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformDecl {
    pub name: &'static str,
    pub kind: UniformKind,
}

impl UniformDecl {
    pub const fn int(name: &'static str) -> Self {
        Self {
            name,
            kind: UniformKind::Int,
        }
    }

    pub const fn float(name: &'static str) -> Self {
        Self {
            name,
            kind: UniformKind::Float,
        }
    }

    pub const fn vec2(name: &'static str) -> Self {
        Self {
            name,
            kind: UniformKind::Vec2,
        }
    }
}

/// Which kernel a program runs. The GPU device ignores it; the software device
/// dispatches on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    Scale,
    Ghosting,
    Phosphor,
    BlackLevel,
    Blur,
    Blend,
    Effects,
    Passthrough,
}

/// Everything needed to build one fullscreen program.
///
/// `uniforms` excludes the projection, which is always present. `samplers`
/// are bound to texture units in order.
#[derive(Debug, Clone, Copy)]
pub struct ProgramSource {
    pub label: &'static str,
    pub kind: StageKind,
    pub fragment: &'static str,
    pub uniforms: &'static [UniformDecl],
    pub samplers: &'static [&'static str],
}

impl ProgramSource {
    /// Declarations in block order, projection first.
    pub fn all_uniforms(&self) -> Vec<UniformDecl> {
        let mut decls = Vec::with_capacity(self.uniforms.len() + 1);
        decls.push(UniformDecl {
            name: PROJECTION_UNIFORM,
            kind: UniformKind::Mat4,
        });
        decls.extend_from_slice(self.uniforms);
        decls
    }
}

pub trait RenderDevice {
    fn compile_program(&mut self, source: &ProgramSource) -> Result<ProgramHandle, DeviceError>;
    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<UniformLocation>;
    fn destroy_program(&mut self, program: ProgramHandle);

    fn create_texture(
        &mut self,
        width: u32,
        height: u32,
        format: TextureFormat,
    ) -> Result<TextureHandle, DeviceError>;
    /// Replaces the full contents of `texture` with tightly packed RGBA8 rows.
    fn upload_texture(&mut self, texture: TextureHandle, rgba: &[u8]) -> Result<(), DeviceError>;
    fn destroy_texture(&mut self, texture: TextureHandle);

    fn create_framebuffer(&mut self, texture: TextureHandle)
        -> Result<FramebufferHandle, DeviceError>;
    fn destroy_framebuffer(&mut self, framebuffer: FramebufferHandle);

    fn bind_texture(&mut self, unit: u32, texture: TextureHandle);

    fn set_uniform_int(&mut self, location: UniformLocation, value: i32);
    fn set_uniform_float(&mut self, location: UniformLocation, value: f32);
    fn set_uniform_vec2(&mut self, location: UniformLocation, value: [f32; 2]);
    fn set_uniform_matrix4(&mut self, location: UniformLocation, value: &Projection);

    fn clear_framebuffer(&mut self, target: RenderTarget, color: [f32; 4])
        -> Result<(), DeviceError>;
    /// Runs `program` over every pixel of `target`, sampling the bound units.
    fn draw_fullscreen_quad(
        &mut self,
        program: ProgramHandle,
        target: RenderTarget,
    ) -> Result<(), DeviceError>;

    /// Size of [`RenderTarget::Default`], if one is attached.
    fn default_target_size(&self) -> Option<(u32, u32)>;
}
