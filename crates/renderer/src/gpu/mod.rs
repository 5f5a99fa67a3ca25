//! wgpu binding of [`RenderDevice`](crate::RenderDevice).
//!
//! - `context` owns the instance, surface and device for a window and
//!   reconfigures the swapchain on resize.
//! - `device` implements the render device: stage programs become render
//!   pipelines with a std140 uniform block in set 0 and texture/sampler pairs
//!   in set 1, and every pass is recorded into one encoder per frame.

mod context;
mod device;

pub use context::{GpuContext, SurfaceFrame};
pub use device::WgpuDevice;
