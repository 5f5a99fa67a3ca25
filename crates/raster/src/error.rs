#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RasterError {
    /// The render side went away while a request was outstanding.
    #[error("raster channel closed")]
    Closed,
    #[error("visible window {top}+{visible} does not fit a {spec} raster of {total} scanlines")]
    InvalidGeometry {
        spec: &'static str,
        top: u32,
        visible: u32,
        total: u32,
    },
}
