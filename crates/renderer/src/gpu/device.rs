use std::collections::HashMap;

use tracing::{debug, trace, warn};
use wgpu::util::DeviceExt;

use crate::compile::{compile_fragment_shader, compile_vertex_shader, UniformLayout};
use crate::device::{
    FramebufferHandle, ProgramHandle, ProgramSource, RenderDevice, RenderTarget, TextureFormat,
    TextureHandle, UniformDecl, UniformLocation, UniformValue, MAX_TEXTURE_UNITS,
};
use crate::error::DeviceError;
use crate::projection::Projection;

struct GpuTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    width: u32,
    height: u32,
    format: TextureFormat,
}

struct GpuProgram {
    label: &'static str,
    decls: Vec<UniformDecl>,
    values: Vec<UniformValue>,
    layout: UniformLayout,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    texture_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    fragment: wgpu::ShaderModule,
    sampler_count: usize,
    pipelines: HashMap<wgpu::TextureFormat, wgpu::RenderPipeline>,
}

struct DefaultTarget {
    view: wgpu::TextureView,
    format: wgpu::TextureFormat,
    size: (u32, u32),
}

/// [`RenderDevice`] backed by wgpu.
///
/// Passes are recorded into one command encoder and sent to the queue by
/// [`submit`](Self::submit), so every draw of a frame executes in call order.
/// Uniform values are copied into each program's buffer on the encoder right
/// before its pass.
pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    uniform_layout: wgpu::BindGroupLayout,
    vertex_module: wgpu::ShaderModule,
    sampler: wgpu::Sampler,
    placeholder: GpuTexture,
    next_id: u32,
    textures: HashMap<TextureHandle, GpuTexture>,
    framebuffers: HashMap<FramebufferHandle, TextureHandle>,
    programs: HashMap<ProgramHandle, GpuProgram>,
    units: [Option<TextureHandle>; MAX_TEXTURE_UNITS],
    default_target: Option<DefaultTarget>,
    encoder: Option<wgpu::CommandEncoder>,
}

impl WgpuDevice {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("stage uniform layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let vertex_module = compile_vertex_shader(&device);
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("stage sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        let placeholder = create_placeholder(&device, &queue);

        Self {
            device,
            queue,
            uniform_layout,
            vertex_module,
            sampler,
            placeholder,
            next_id: 0,
            textures: HashMap::new(),
            framebuffers: HashMap::new(),
            programs: HashMap::new(),
            units: [None; MAX_TEXTURE_UNITS],
            default_target: None,
            encoder: None,
        }
    }

    /// Attaches the surface view that [`RenderTarget::Default`] draws into.
    pub fn set_default_target(
        &mut self,
        view: wgpu::TextureView,
        format: wgpu::TextureFormat,
        size: (u32, u32),
    ) {
        self.default_target = Some(DefaultTarget { view, format, size });
    }

    pub fn clear_default_target(&mut self) {
        self.default_target = None;
    }

    /// Sends every recorded pass to the queue.
    pub fn submit(&mut self) {
        if let Some(encoder) = self.encoder.take() {
            self.queue.submit(std::iter::once(encoder.finish()));
        }
    }

    fn allocate_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn encoder(&mut self) -> &mut wgpu::CommandEncoder {
        let device = &self.device;
        self.encoder.get_or_insert_with(|| {
            device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("post-processing encoder"),
            })
        })
    }

    fn target_view(
        &self,
        target: RenderTarget,
    ) -> Result<(Option<TextureHandle>, wgpu::TextureView, wgpu::TextureFormat), DeviceError> {
        match target {
            RenderTarget::Default => self
                .default_target
                .as_ref()
                .map(|default| (None, default.view.clone(), default.format))
                .ok_or(DeviceError::NoDefaultTarget),
            RenderTarget::Framebuffer(framebuffer) => {
                let texture = self
                    .framebuffers
                    .get(&framebuffer)
                    .copied()
                    .ok_or(DeviceError::UnknownFramebuffer(framebuffer))?;
                let stored = self
                    .textures
                    .get(&texture)
                    .ok_or(DeviceError::UnknownTexture(texture))?;
                Ok((Some(texture), stored.view.clone(), wgpu_format(stored.format)))
            }
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

    fn build_pipeline(
        &self,
        program: &GpuProgram,
        format: wgpu::TextureFormat,
    ) -> wgpu::RenderPipeline {
        self.device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(program.label),
                layout: Some(&program.pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &self.vertex_module,
                    entry_point: Some("main"),
                    buffers: &[],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                fragment: Some(wgpu::FragmentState {
                    module: &program.fragment,
                    entry_point: Some("main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                multiview: None,
                cache: None,
            })
    }

    /// Runs `build` inside a validation error scope and reports any error as a
    /// compile failure of `label`.
    fn validated<T>(
        &self,
        label: &'static str,
        build: impl FnOnce(&Self) -> T,
    ) -> Result<T, DeviceError> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = build(self);
        match pollster::block_on(self.device.pop_error_scope()) {
            Some(err) => Err(DeviceError::Compile {
                label,
                message: err.to_string(),
            }),
            None => Ok(value),
        }
    }
}

impl RenderDevice for WgpuDevice {
    fn compile_program(&mut self, source: &ProgramSource) -> Result<ProgramHandle, DeviceError> {
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
        let layout = UniformLayout::new(&decls);
        let fragment = self.validated(source.label, |this| {
            compile_fragment_shader(&this.device, source)
        })?;

        let uniform_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(source.label),
            size: layout.size() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let uniform_bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("stage uniform bind group"),
            layout: &self.uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });
        let texture_layout = self
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("stage texture layout"),
                entries: &texture_layout_entries(source.samplers.len()),
            });
        let pipeline_layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("stage pipeline layout"),
                bind_group_layouts: &[&self.uniform_layout, &texture_layout],
                push_constant_ranges: &[],
            });

        let mut program = GpuProgram {
            label: source.label,
            values: decls
                .iter()
                .map(|decl| UniformValue::zeroed(decl.kind))
                .collect(),
            decls,
            layout,
            uniform_buffer,
            uniform_bind_group,
            texture_layout,
            pipeline_layout,
            fragment,
            sampler_count: source.samplers.len(),
            pipelines: HashMap::new(),
        };

        // Linking happens at pipeline creation; build the slot-format variant now.
        let slot_format = wgpu_format(TextureFormat::Rgba16Float);
        let pipeline = self.validated(source.label, |this| {
            this.build_pipeline(&program, slot_format)
        })?;
        program.pipelines.insert(slot_format, pipeline);

        let handle = ProgramHandle(self.allocate_id());
        debug!(label = source.label, ?handle, "compiled stage program");
        self.programs.insert(handle, program);
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
        if let Some(program) = self.programs.remove(&program) {
            program.uniform_buffer.destroy();
        }
    }

    fn create_texture(
        &mut self,
        width: u32,
        height: u32,
        format: TextureFormat,
    ) -> Result<TextureHandle, DeviceError> {
        let max = self.device.limits().max_texture_dimension_2d;
        if width == 0 || height == 0 || width > max || height > max {
            return Err(DeviceError::InvalidSize { width, height });
        }
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("pipeline texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu_format(format),
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        if pollster::block_on(self.device.pop_error_scope()).is_some() {
            return Err(DeviceError::OutOfMemory);
        }
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let handle = TextureHandle(self.allocate_id());
        self.textures.insert(
            handle,
            GpuTexture {
                texture,
                view,
                width,
                height,
                format,
            },
        );
        Ok(handle)
    }

    fn upload_texture(&mut self, texture: TextureHandle, rgba: &[u8]) -> Result<(), DeviceError> {
        let target = self
            .textures
            .get(&texture)
            .ok_or(DeviceError::UnknownTexture(texture))?;
        if target.format != TextureFormat::Rgba8 {
            return Err(DeviceError::Backend(format!(
                "texture {texture:?} is not an RGBA8 upload target"
            )));
        }
        let expected = target.width as usize * target.height as usize * 4;
        if rgba.len() != expected {
            return Err(DeviceError::UploadSize {
                expected,
                actual: rgba.len(),
            });
        }
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &target.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            rgba,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(target.width * 4),
                rows_per_image: Some(target.height),
            },
            wgpu::Extent3d {
                width: target.width,
                height: target.height,
                depth_or_array_layers: 1,
            },
        );
        Ok(())
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        if let Some(stored) = self.textures.remove(&texture) {
            stored.texture.destroy();
        }
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
        let (_, view, _) = self.target_view(target)?;
        let [r, g, b, a] = color.map(f64::from);
        let encoder = self.encoder();
        let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("clear pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a }),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            occlusion_query_set: None,
            timestamp_writes: None,
        });
        Ok(())
    }

    fn draw_fullscreen_quad(
        &mut self,
        program: ProgramHandle,
        target: RenderTarget,
    ) -> Result<(), DeviceError> {
        let (target_texture, view, format) = self.target_view(target)?;
        let sampler_count = self
            .programs
            .get(&program)
            .ok_or(DeviceError::UnknownProgram(program))?
            .sampler_count;

        let bound = &self.units[..sampler_count];
        if let Some(texture) = target_texture {
            if bound.contains(&Some(texture)) {
                return Err(DeviceError::FeedbackLoop(texture));
            }
        }
        let mut views = Vec::with_capacity(sampler_count);
        for unit in bound {
            views.push(match unit {
                Some(texture) => {
                    &self
                        .textures
                        .get(texture)
                        .ok_or(DeviceError::UnknownTexture(*texture))?
                        .view
                }
                None => &self.placeholder.view,
            });
        }

        let missing_pipeline = !self.programs[&program].pipelines.contains_key(&format);
        if missing_pipeline {
            let stored = &self.programs[&program];
            let pipeline =
                self.validated(stored.label, |this| this.build_pipeline(stored, format))?;
            if let Some(stored) = self.programs.get_mut(&program) {
                stored.pipelines.insert(format, pipeline);
            }
        }
        let stored = &self.programs[&program];
        let Some(pipeline) = stored.pipelines.get(&format) else {
            return Err(DeviceError::Backend(format!(
                "no pipeline for '{}' at {format:?}",
                stored.label
            )));
        };

        let mut entries = Vec::with_capacity(views.len() * 2);
        for (unit, view) in views.iter().enumerate() {
            entries.push(wgpu::BindGroupEntry {
                binding: unit as u32 * 2,
                resource: wgpu::BindingResource::TextureView(view),
            });
            entries.push(wgpu::BindGroupEntry {
                binding: unit as u32 * 2 + 1,
                resource: wgpu::BindingResource::Sampler(&self.sampler),
            });
        }
        let texture_bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("stage texture bind group"),
            layout: &stored.texture_layout,
            entries: &entries,
        });

        let staging = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("uniform staging"),
                contents: &stored.layout.pack(&stored.values),
                usage: wgpu::BufferUsages::COPY_SRC,
            });

        let encoder = self.encoder.get_or_insert_with(|| {
            self.device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("post-processing encoder"),
                })
        });
        encoder.copy_buffer_to_buffer(
            &staging,
            0,
            &stored.uniform_buffer,
            0,
            stored.layout.size() as u64,
        );
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(stored.label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            occlusion_query_set: None,
            timestamp_writes: None,
        });
        render_pass.set_pipeline(pipeline);
        render_pass.set_bind_group(0, &stored.uniform_bind_group, &[]);
        render_pass.set_bind_group(1, &texture_bind_group, &[]);
        render_pass.draw(0..6, 0..1);
        trace!(label = stored.label, ?target, "encoded stage draw");
        Ok(())
    }

    fn default_target_size(&self) -> Option<(u32, u32)> {
        self.default_target.as_ref().map(|default| default.size)
    }
}

fn wgpu_format(format: TextureFormat) -> wgpu::TextureFormat {
    match format {
        TextureFormat::Rgba8 => wgpu::TextureFormat::Rgba8Unorm,
        TextureFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
    }
}

fn texture_layout_entries(count: usize) -> Vec<wgpu::BindGroupLayoutEntry> {
    let mut entries = Vec::with_capacity(count * 2);
    for unit in 0..count as u32 {
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: unit * 2,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        });
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: unit * 2 + 1,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        });
    }
    entries
}

/// Transparent 1×1 texture sampled by units nothing is bound to.
fn create_placeholder(device: &wgpu::Device, queue: &wgpu::Queue) -> GpuTexture {
    let texture = device.create_texture_with_data(
        queue,
        &wgpu::TextureDescriptor {
            label: Some("placeholder stage texture"),
            size: wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        },
        wgpu::util::TextureDataOrder::LayerMajor,
        &[0, 0, 0, 0],
    );
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    GpuTexture {
        texture,
        view,
        width: 1,
        height: 1,
        format: TextureFormat::Rgba8,
    }
}
