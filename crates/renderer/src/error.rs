use crate::device::{FramebufferHandle, ProgramHandle, TextureHandle};
use crate::sequencer::SlotName;

/// Failures reported by a [`RenderDevice`](crate::RenderDevice) implementation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DeviceError {
    #[error("failed to compile program '{label}': {message}")]
    Compile { label: &'static str, message: String },
    #[error("unknown texture {0:?}")]
    UnknownTexture(TextureHandle),
    #[error("unknown framebuffer {0:?}")]
    UnknownFramebuffer(FramebufferHandle),
    #[error("unknown program {0:?}")]
    UnknownProgram(ProgramHandle),
    #[error("invalid texture size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },
    #[error("texture upload expected {expected} bytes, got {actual}")]
    UploadSize { expected: usize, actual: usize },
    #[error("texture {0:?} is bound for sampling and cannot be rendered into")]
    FeedbackLoop(TextureHandle),
    #[error("no default render target is available")]
    NoDefaultTarget,
    #[error("out of texture memory")]
    OutOfMemory,
    #[error("{0}")]
    Backend(String),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PipelineError {
    #[error("failed to build stage '{stage}'")]
    Compile {
        stage: &'static str,
        #[source]
        source: DeviceError,
    },
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error("pipeline has been destroyed")]
    Destroyed,
    #[error("slot {0:?} cannot sample its own render target")]
    SelfFeedback(SlotName),
    #[error("slot {0:?} has not been allocated")]
    UnknownSlot(SlotName),
    #[error("invalid pipeline size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },
    #[error("no enabled stage produced a final image")]
    Unfinished,
}
