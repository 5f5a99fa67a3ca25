use std::borrow::Cow;
use std::fmt::Write as _;

use wgpu::naga::ShaderStage;

use crate::device::{ProgramSource, UniformDecl, UniformKind, UniformValue};

/// Compiles the unit-quad vertex shader shared by every stage.
pub(crate) fn compile_vertex_shader(device: &wgpu::Device) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("unit quad vertex"),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Borrowed(VERTEX_SHADER_GLSL),
            stage: ShaderStage::Vertex,
            defines: &[],
        },
    })
}

/// Wraps a stage body with its generated prelude and compiles it as GLSL.
pub(crate) fn compile_fragment_shader(
    device: &wgpu::Device,
    source: &ProgramSource,
) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(source.label),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Owned(wrap_fragment(source)),
            stage: ShaderStage::Fragment,
            defines: &[],
        },
    })
}

/// Produces a self-contained GLSL fragment shader from a stage body.
///
/// The prelude declares one std140 block holding the projection and the
/// stage's uniforms (aliased by macro so bodies use bare names), plus a
/// texture/sampler pair per declared sampler.
pub(crate) fn wrap_fragment(source: &ProgramSource) -> String {
    let decls = source.all_uniforms();
    let mut header = String::from(
        "#version 450\nlayout(location = 0) in vec2 v_uv;\nlayout(location = 0) out vec4 frag_color;\n\n",
    );

    header.push_str("layout(std140, set = 0, binding = 0) uniform StageParams {\n");
    for decl in &decls {
        let _ = writeln!(header, "    {} _{};", glsl_type(decl.kind), decl.name);
    }
    header.push_str("} params;\n\n");
    for decl in &decls {
        let _ = writeln!(header, "#define {0} params._{0}", decl.name);
    }
    header.push('\n');

    for (unit, name) in source.samplers.iter().enumerate() {
        let texture_binding = unit * 2;
        let sampler_binding = texture_binding + 1;
        let _ = writeln!(
            header,
            "layout(set = 1, binding = {texture_binding}) uniform texture2D stage_texture{unit};"
        );
        let _ = writeln!(
            header,
            "layout(set = 1, binding = {sampler_binding}) uniform sampler stage_sampler{unit};"
        );
        let _ = writeln!(
            header,
            "#define {name} sampler2D(stage_texture{unit}, stage_sampler{unit})"
        );
    }

    format!("{header}\n#line 1\n{}", source.fragment)
}

fn glsl_type(kind: UniformKind) -> &'static str {
    match kind {
        UniformKind::Int => "int",
        UniformKind::Float => "float",
        UniformKind::Vec2 => "vec2",
        UniformKind::Mat4 => "mat4",
    }
}

/// Byte layout of a program's std140 uniform block.
#[derive(Debug, Clone)]
pub(crate) struct UniformLayout {
    offsets: Vec<usize>,
    size: usize,
}

impl UniformLayout {
    pub fn new(decls: &[UniformDecl]) -> Self {
        let mut offsets = Vec::with_capacity(decls.len());
        let mut cursor: usize = 0;
        for decl in decls {
            let (align, size) = match decl.kind {
                UniformKind::Int | UniformKind::Float => (4, 4),
                UniformKind::Vec2 => (8, 8),
                UniformKind::Mat4 => (16, 64),
            };
            cursor = cursor.next_multiple_of(align);
            offsets.push(cursor);
            cursor += size;
        }
        Self {
            offsets,
            size: cursor.next_multiple_of(16).max(16),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Packs `values` (in declaration order) into a block-sized buffer.
    pub fn pack(&self, values: &[UniformValue]) -> Vec<u8> {
        let mut bytes = vec![0u8; self.size];
        for (offset, value) in self.offsets.iter().zip(values) {
            let encoded: &[u8] = match value {
                UniformValue::Int(v) => bytemuck::bytes_of(v),
                UniformValue::Float(v) => bytemuck::bytes_of(v),
                UniformValue::Vec2(v) => bytemuck::cast_slice(v),
                UniformValue::Mat4(v) => bytemuck::cast_slice(v),
            };
            bytes[*offset..*offset + encoded.len()].copy_from_slice(encoded);
        }
        bytes
    }
}

/// Unit quad drawn as two triangles; texture coordinates equal positions.
const VERTEX_SHADER_GLSL: &str = r"#version 450
layout(location = 0) out vec2 v_uv;

layout(std140, set = 0, binding = 0) uniform StageParams {
    mat4 u_projection;
} params;

const vec2 corners[6] = vec2[6](
    vec2(0.0, 0.0),
    vec2(1.0, 0.0),
    vec2(0.0, 1.0),
    vec2(0.0, 1.0),
    vec2(1.0, 0.0),
    vec2(1.0, 1.0)
);

void main() {
    vec2 pos = corners[gl_VertexIndex];
    v_uv = pos;
    gl_Position = params.u_projection * vec4(pos, 0.0, 1.0);
}
";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::StageKind;

    const SOURCE: ProgramSource = ProgramSource {
        label: "test",
        kind: StageKind::Blend,
        fragment: "void main() { frag_color = texture(u_source, v_uv) * u_gain; }\n",
        uniforms: &[UniformDecl::float("u_gain"), UniformDecl::vec2("u_offset")],
        samplers: &["u_source", "u_other"],
    };

    #[test]
    fn wrap_declares_block_and_samplers() {
        let wrapped = wrap_fragment(&SOURCE);
        assert!(wrapped.starts_with("#version 450"));
        assert!(wrapped.contains("mat4 _u_projection;"));
        assert!(wrapped.contains("#define u_gain params._u_gain"));
        assert!(wrapped.contains("layout(set = 1, binding = 2) uniform texture2D stage_texture1;"));
        assert!(wrapped.contains("#define u_other sampler2D(stage_texture1, stage_sampler1)"));
        assert!(wrapped.ends_with(SOURCE.fragment));
    }

    #[test]
    fn std140_offsets_respect_alignment() {
        let layout = UniformLayout::new(&[
            UniformDecl {
                name: "u_projection",
                kind: UniformKind::Mat4,
            },
            UniformDecl::float("a"),
            UniformDecl::vec2("b"),
            UniformDecl::int("c"),
        ]);
        assert_eq!(layout.offsets[0], 0);
        assert_eq!(layout.offsets[1], 64);
        assert_eq!(layout.offsets[2], 72);
        assert_eq!(layout.offsets[3], 80);
        assert_eq!(layout.size(), 96);
    }

    #[test]
    fn pack_writes_values_at_offsets() {
        let layout = UniformLayout::new(&[UniformDecl::float("a"), UniformDecl::int("b")]);
        let bytes = layout.pack(&[UniformValue::Float(1.5), UniformValue::Int(7)]);
        assert_eq!(bytes.len(), 16);
        assert_eq!(&bytes[0..4], &1.5f32.to_ne_bytes());
        assert_eq!(&bytes[4..8], &7i32.to_ne_bytes());
    }
}
