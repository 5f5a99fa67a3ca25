/// Column-major 4×4 matrix mapping the unit quad onto clip space.
///
/// The quad's texture coordinates equal its vertex positions, so the matrix
/// also fixes which texture row lands on which framebuffer row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    columns: [f32; 16],
}

impl Projection {
    /// Upright output: `u → 2u − 1`, `v → 1 − 2v`, so texture row 0 is the top row.
    pub fn presentation() -> Self {
        Self::affine(2.0, -2.0, -1.0, 1.0)
    }

    /// Offscreen output with the vertical axis inverted relative to [`presentation`](Self::presentation).
    pub fn flipped() -> Self {
        Self::affine(2.0, 2.0, -1.0, -1.0)
    }

    fn affine(m00: f32, m11: f32, m30: f32, m31: f32) -> Self {
        let mut columns = [0.0; 16];
        columns[0] = m00;
        columns[5] = m11;
        columns[10] = 1.0;
        columns[12] = m30;
        columns[13] = m31;
        columns[15] = 1.0;
        Self { columns }
    }

    pub fn from_columns(columns: [f32; 16]) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &[f32; 16] {
        &self.columns
    }

    /// Clip-space position of texture coordinate `(u, v)`.
    pub fn apply(&self, u: f32, v: f32) -> (f32, f32) {
        let m = &self.columns;
        (
            m[0] * u + m[4] * v + m[12],
            m[1] * u + m[5] * v + m[13],
        )
    }

    /// Texture coordinate that lands on clip-space `(x, y)`, if the matrix is invertible.
    pub fn unproject(&self, x: f32, y: f32) -> Option<(f32, f32)> {
        let m = &self.columns;
        let (a, b, c, d) = (m[0], m[4], m[1], m[5]);
        let det = a * d - b * c;
        if det.abs() <= f32::EPSILON {
            return None;
        }
        let (x, y) = (x - m[12], y - m[13]);
        Some(((d * x - b * y) / det, (a * y - c * x) / det))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presentation_puts_origin_top_left() {
        let projection = Projection::presentation();
        assert_eq!(projection.apply(0.0, 0.0), (-1.0, 1.0));
        assert_eq!(projection.apply(1.0, 1.0), (1.0, -1.0));
    }

    #[test]
    fn flipped_inverts_vertical_axis_only() {
        let presentation = Projection::presentation();
        let flipped = Projection::flipped();
        for (u, v) in [(0.0, 0.0), (0.25, 0.75), (1.0, 0.5)] {
            let (px, py) = presentation.apply(u, v);
            let (fx, fy) = flipped.apply(u, v);
            assert_eq!(px, fx);
            assert_eq!(py, -fy);
        }
    }

    #[test]
    fn unproject_inverts_apply() {
        let projection = Projection::flipped();
        let (x, y) = projection.apply(0.3, 0.6);
        let (u, v) = projection.unproject(x, y).unwrap();
        assert!((u - 0.3).abs() < 1e-6);
        assert!((v - 0.6).abs() < 1e-6);
    }

    #[test]
    fn zero_matrix_has_no_inverse() {
        assert!(Projection::from_columns([0.0; 16]).unproject(0.0, 0.0).is_none());
    }
}
