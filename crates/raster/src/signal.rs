/// One colour clock of TV signal as produced by the emulation core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Signal {
    /// Colour clock within the scanline, counted from the start of horizontal blank.
    pub horizontal_position: u32,
    pub scanline: u32,
    pub color_index: u8,
    pub vblank: bool,
    /// Set on the signal that corresponds to the emulator's current position.
    pub is_current: bool,
}

/// Debug annotation attached to the most recently plotted pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Annotation {
    Wsync,
    Collision,
    Hmove,
    RegisterWrite,
    Custom([u8; 4]),
}

impl Annotation {
    pub fn color(&self) -> [u8; 4] {
        match self {
            Annotation::Wsync => [0, 0, 200, 160],
            Annotation::Collision => [220, 40, 40, 160],
            Annotation::Hmove => [200, 140, 0, 160],
            Annotation::RegisterWrite => [40, 200, 40, 120],
            Annotation::Custom(rgba) => *rgba,
        }
    }
}
