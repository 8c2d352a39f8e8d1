//! 2D affine transforms used to express buffer coordinates and their per frame deltas.

use cgmath::{Matrix3, Rad, SquareMatrix, Vector3};

use crate::layer::frame_state::FrameState;

/// A 2D affine transform `x' = a*x + c*y + e`, `y' = b*x + d*y + f`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform(Matrix3<f64>);

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform {
    pub fn identity() -> Self {
        Transform(Matrix3::identity())
    }

    /// Builds a transform from the coefficients `[a, b, c, d, e, f]`.
    pub fn from_coefficients([a, b, c, d, e, f]: [f64; 6]) -> Self {
        Transform(Matrix3::new(a, b, 0.0, c, d, 0.0, e, f, 1.0))
    }

    pub fn coefficients(&self) -> [f64; 6] {
        let m = &self.0;
        [m.x.x, m.x.y, m.y.x, m.y.y, m.z.x, m.z.y]
    }

    pub fn translation(dx: f64, dy: f64) -> Self {
        Self::from_coefficients([1.0, 0.0, 0.0, 1.0, dx, dy])
    }

    pub fn scale(sx: f64, sy: f64) -> Self {
        Self::from_coefficients([sx, 0.0, 0.0, sy, 0.0, 0.0])
    }

    pub fn rotation(angle: f64) -> Self {
        Transform(Matrix3::from_angle_z(Rad(angle)))
    }

    /// Translates by `(dx2, dy2)`, rotates by `angle`, scales by `(sx, sy)` and finally translates
    /// by `(dx1, dy1)`.
    pub fn compose(dx1: f64, dy1: f64, sx: f64, sy: f64, angle: f64, dx2: f64, dy2: f64) -> Self {
        Self::translation(dx1, dy1)
            .multiply(&Self::scale(sx, sy))
            .multiply(&Self::rotation(angle))
            .multiply(&Self::translation(dx2, dy2))
    }

    /// Maps world coordinates of the frame to clip space.
    pub fn projection(frame: &FrameState) -> Self {
        let view = &frame.view;
        let [width, height] = frame.size;
        Self::compose(
            0.0,
            0.0,
            2.0 / (view.resolution * width),
            2.0 / (view.resolution * height),
            -view.rotation,
            -view.center[0],
            -view.center[1],
        )
    }

    /// Returns `self * other`, `other` is applied first.
    pub fn multiply(&self, other: &Transform) -> Self {
        Transform(self.0 * other.0)
    }

    pub fn translate(&self, dx: f64, dy: f64) -> Self {
        self.multiply(&Self::translation(dx, dy))
    }

    pub fn invert(&self) -> Option<Self> {
        self.0.invert().map(Transform)
    }

    pub fn apply(&self, [x, y]: [f64; 2]) -> [f64; 2] {
        let v = self.0 * Vector3::new(x, y, 1.0);
        [v.x, v.y]
    }

    /// Column major 4x4 matrix for shader uniforms.
    pub fn to_mat4(&self) -> [f32; 16] {
        let [a, b, c, d, e, f] = self.coefficients().map(|v| v as f32);
        [
            a, b, 0.0, 0.0, //
            c, d, 0.0, 0.0, //
            0.0, 0.0, 1.0, 0.0, //
            e, f, 0.0, 1.0,
        ]
    }
}
