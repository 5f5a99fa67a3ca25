use tracing::{debug, warn};

use crate::device::{
    FramebufferHandle, RenderDevice, RenderTarget, TextureFormat, TextureHandle,
};
use crate::error::{DeviceError, PipelineError};

/// Phosphor passes run in the frame that reallocated the slots, so the
/// accumulator converges from transparent black instead of fading in.
pub const SETTLING_PASSES: u32 = 3;

/// Render targets the stage chain writes into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotName {
    Scaled,
    Ghost,
    Phosphor,
    Bloom,
    BlackLevel,
    Blur,
    Blend,
    Output,
}

impl SlotName {
    pub const ALL: [SlotName; 8] = [
        SlotName::Scaled,
        SlotName::Ghost,
        SlotName::Phosphor,
        SlotName::Bloom,
        SlotName::BlackLevel,
        SlotName::Blur,
        SlotName::Blend,
        SlotName::Output,
    ];

    pub fn purpose(self) -> SlotPurpose {
        match self {
            SlotName::Phosphor => SlotPurpose::Feedback,
            SlotName::Output => SlotPurpose::Scratch,
            _ => SlotPurpose::Intermediate,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotPurpose {
    Intermediate,
    /// Read back by the next frame; holds a front and a back target.
    Feedback,
    /// Final image kept offscreen for further compositing.
    Scratch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Target {
    texture: TextureHandle,
    framebuffer: FramebufferHandle,
}

/// One named render target at pipeline resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSlot {
    pub name: SlotName,
    pub width: u32,
    pub height: u32,
    pub purpose: SlotPurpose,
    front: Target,
    back: Option<Target>,
}

impl PipelineSlot {
    /// Texture holding the slot's latest output.
    pub fn texture(&self) -> TextureHandle {
        self.front.texture
    }

    pub fn framebuffer(&self) -> FramebufferHandle {
        self.front.framebuffer
    }

    fn targets(&self) -> impl Iterator<Item = Target> {
        std::iter::once(self.front).chain(self.back)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerState {
    Uninitialized,
    Ready { width: u32, height: u32 },
    /// Slots were reallocated at this size and the feedback slot has not
    /// settled yet.
    Resizing { width: u32, height: u32 },
    Destroyed,
}

/// Owns the pipeline slots and runs passes into them.
#[derive(Debug)]
pub struct PipelineSequencer {
    state: SequencerState,
    slots: Vec<PipelineSlot>,
    format: TextureFormat,
}

impl Default for PipelineSequencer {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineSequencer {
    pub fn new() -> Self {
        Self {
            state: SequencerState::Uninitialized,
            slots: Vec::new(),
            format: TextureFormat::Rgba16Float,
        }
    }

    pub fn state(&self) -> SequencerState {
        self.state
    }

    /// Makes every slot `width`×`height`. Returns `true` only when the slots
    /// were (re)allocated; a repeat call with the current size does nothing.
    ///
    /// Reallocation leaves the sequencer [`Resizing`](SequencerState::Resizing)
    /// until [`settle`](Self::settle). All slots are built before any old one
    /// is released, so a failure leaves the previous set in place.
    pub fn setup(
        &mut self,
        device: &mut dyn RenderDevice,
        width: u32,
        height: u32,
    ) -> Result<bool, PipelineError> {
        let previous = match self.state {
            SequencerState::Destroyed => return Err(PipelineError::Destroyed),
            SequencerState::Ready {
                width: current_width,
                height: current_height,
            }
            | SequencerState::Resizing {
                width: current_width,
                height: current_height,
            } if current_width == width && current_height == height => return Ok(false),
            state => state,
        };
        if width == 0 || height == 0 {
            return Err(PipelineError::InvalidSize { width, height });
        }

        let mut created = Vec::with_capacity(SlotName::ALL.len());
        for name in SlotName::ALL {
            match self.create_slot(device, name, width, height) {
                Ok(slot) => created.push(slot),
                Err(err) => {
                    warn!(?name, width, height, error = %err, "slot allocation failed");
                    release(device, &created);
                    self.state = previous;
                    return Err(err.into());
                }
            }
        }

        let old = std::mem::replace(&mut self.slots, created);
        release(device, &old);
        self.state = SequencerState::Resizing { width, height };
        debug!(width, height, slots = self.slots.len(), "recreated pipeline slots");
        Ok(true)
    }

    /// Whether the feedback slot still needs its settling passes.
    pub fn is_settling(&self) -> bool {
        matches!(self.state, SequencerState::Resizing { .. })
    }

    /// Marks the reallocated slots as settled.
    pub fn settle(&mut self) {
        if let SequencerState::Resizing { width, height } = self.state {
            self.state = SequencerState::Ready { width, height };
        }
    }

    fn create_slot(
        &self,
        device: &mut dyn RenderDevice,
        name: SlotName,
        width: u32,
        height: u32,
    ) -> Result<PipelineSlot, DeviceError> {
        let purpose = name.purpose();
        let front = create_target(device, width, height, self.format)?;
        let back = if purpose == SlotPurpose::Feedback {
            match create_target(device, width, height, self.format) {
                Ok(target) => Some(target),
                Err(err) => {
                    destroy_target(device, front);
                    return Err(err);
                }
            }
        } else {
            None
        };
        let slot = PipelineSlot {
            name,
            width,
            height,
            purpose,
            front,
            back,
        };
        for target in slot.targets() {
            if let Err(err) = device.clear_framebuffer(
                RenderTarget::Framebuffer(target.framebuffer),
                [0.0; 4],
            ) {
                for target in slot.targets() {
                    destroy_target(device, target);
                }
                return Err(err);
            }
        }
        Ok(slot)
    }

    pub fn slot(&self, name: SlotName) -> Option<&PipelineSlot> {
        self.slots.iter().find(|slot| slot.name == name)
    }

    /// Latest output of `name`.
    pub fn texture(&self, name: SlotName) -> Result<TextureHandle, PipelineError> {
        self.live_slot(name).map(|slot| slot.texture())
    }

    fn live_slot(&self, name: SlotName) -> Result<&PipelineSlot, PipelineError> {
        if self.state == SequencerState::Destroyed {
            return Err(PipelineError::Destroyed);
        }
        self.slot(name).ok_or(PipelineError::UnknownSlot(name))
    }

    /// Runs one pass into `name` and returns the texture it produced.
    ///
    /// `inputs` are the textures the pass samples. A slot may never sample the
    /// target it renders into; the feedback slot renders into its back target
    /// and flips, so its previous output is a legal input.
    pub fn process<F>(
        &mut self,
        device: &mut dyn RenderDevice,
        name: SlotName,
        inputs: &[TextureHandle],
        pass: F,
    ) -> Result<TextureHandle, PipelineError>
    where
        F: FnOnce(&mut dyn RenderDevice, RenderTarget) -> Result<(), PipelineError>,
    {
        let slot = *self.live_slot(name)?;
        let target = slot.back.unwrap_or(slot.front);
        if inputs.contains(&target.texture) {
            return Err(PipelineError::SelfFeedback(name));
        }

        pass(device, RenderTarget::Framebuffer(target.framebuffer))?;

        if let Some(back) = slot.back {
            if let Some(stored) = self.slots.iter_mut().find(|stored| stored.name == name) {
                stored.back = Some(stored.front);
                stored.front = back;
            }
        }
        Ok(target.texture)
    }

    /// Forces `name` (both targets of the feedback slot) to transparent black.
    pub fn clear(
        &mut self,
        device: &mut dyn RenderDevice,
        name: SlotName,
    ) -> Result<(), PipelineError> {
        let slot = *self.live_slot(name)?;
        for target in slot.targets() {
            device.clear_framebuffer(RenderTarget::Framebuffer(target.framebuffer), [0.0; 4])?;
        }
        Ok(())
    }

    /// Releases every slot. The sequencer rejects all further use.
    pub fn destroy(&mut self, device: &mut dyn RenderDevice) {
        release(device, &self.slots);
        self.slots.clear();
        if self.state != SequencerState::Destroyed {
            debug!("destroyed pipeline slots");
        }
        self.state = SequencerState::Destroyed;
    }
}

fn create_target(
    device: &mut dyn RenderDevice,
    width: u32,
    height: u32,
    format: TextureFormat,
) -> Result<Target, DeviceError> {
    let texture = device.create_texture(width, height, format)?;
    match device.create_framebuffer(texture) {
        Ok(framebuffer) => Ok(Target {
            texture,
            framebuffer,
        }),
        Err(err) => {
            device.destroy_texture(texture);
            Err(err)
        }
    }
}

fn destroy_target(device: &mut dyn RenderDevice, target: Target) {
    device.destroy_framebuffer(target.framebuffer);
    device.destroy_texture(target.texture);
}

fn release(device: &mut dyn RenderDevice, slots: &[PipelineSlot]) {
    for slot in slots {
        for target in slot.targets() {
            destroy_target(device, target);
        }
    }
}
