//! Multi-pass CRT post-processing for a staged emulator raster.
//!
//! ```text
//!   FrameStager::render ─▶ TextureUploader ─▶ Pipeline::run
//!                                                 │
//!     scale ─▶ ghosting ─▶ phosphor ⟲ ─▶ black level ─▶ blur ─▶ blend ─▶ effects
//!                                                                          │
//!                                          default target ◀── Present ─────┤
//!                                          Output slot    ◀── Scratch ─────┘
//! ```
//!
//! Every stage renders into a named slot owned by the [`PipelineSequencer`],
//! which reallocates all slots together when the output size changes. The
//! phosphor slot feeds back into itself across frames.
//!
//! The pipeline only talks to a [`RenderDevice`]. [`gpu::WgpuDevice`] draws
//! with wgpu; [`software::SoftwareDevice`] runs the same stage kernels on the
//! CPU and can read every texture back.

mod compile;
mod device;
mod error;
pub mod gpu;
mod pipeline;
mod projection;
mod runtime;
pub mod sequencer;
pub mod software;
mod stages;
pub mod uniforms;
mod upload;

pub use device::{
    FramebufferHandle, ProgramHandle, ProgramSource, RenderDevice, RenderTarget, StageKind,
    TextureFormat, TextureHandle, UniformDecl, UniformKind, UniformLocation, UniformValue,
    MAX_TEXTURE_UNITS, PROJECTION_UNIFORM,
};
pub use error::{DeviceError, PipelineError};
pub use pipeline::{FrameOutput, OutputTarget, Pipeline};
pub use projection::Projection;
pub use runtime::{clock_for_seed, BoxedFrameClock, FrameClock, FrameTime, SeededClock, SystemClock};
pub use sequencer::{PipelineSequencer, PipelineSlot, SequencerState, SlotName, SETTLING_PASSES};
pub use stages::{PassContext, ShaderStage, StageOutput, StageProgram};
pub use upload::TextureUploader;
