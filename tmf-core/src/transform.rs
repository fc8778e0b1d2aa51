/// Affine 4x3 transforms for components and build items
use nalgebra::{Matrix4, Vector3};

use crate::error::{Error, Result};
use crate::geometry::Position;
use crate::threemf::format_float;

/// A 4x3 affine transform stored row by row.
///
/// Rows 0..3 hold the linear part and row 3 the translation. Points are
/// treated as row vectors, so `p' = p * M`, the same layout the 3MF
/// `transform` attribute uses.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub fields: [[f32; 3]; 4],
}

impl Transform {
    pub fn identity() -> Self {
        Self {
            fields: [
                [1.0, 0.0, 0.0],
                [0.0, 1.0, 0.0],
                [0.0, 0.0, 1.0],
                [0.0, 0.0, 0.0],
            ],
        }
    }

    /// Create a translation transform
    pub fn translation(x: f32, y: f32, z: f32) -> Self {
        let mut t = Self::identity();
        t.fields[3] = [x, y, z];
        t
    }

    /// Create a scale transform
    pub fn scale(sx: f32, sy: f32, sz: f32) -> Self {
        Self::from_matrix4(&Matrix4::new_nonuniform_scaling(&Vector3::new(sx, sy, sz)))
    }

    /// Create a rotation from angles around the three axes (in radians)
    pub fn rotation(rx: f32, ry: f32, rz: f32) -> Self {
        let mx = Matrix4::new_rotation(Vector3::new(rx, 0.0, 0.0));
        let my = Matrix4::new_rotation(Vector3::new(0.0, ry, 0.0));
        let mz = Matrix4::new_rotation(Vector3::new(0.0, 0.0, rz));

        // Apply rotations in order: Z, Y, X
        Self::from_matrix4(&(mz * my * mx))
    }

    /// Column-vector homogeneous matrix equivalent to this transform
    pub fn to_matrix4(&self) -> Matrix4<f32> {
        let f = &self.fields;
        Matrix4::new(
            f[0][0], f[1][0], f[2][0], f[3][0],
            f[0][1], f[1][1], f[2][1], f[3][1],
            f[0][2], f[1][2], f[2][2], f[3][2],
            0.0, 0.0, 0.0, 1.0,
        )
    }

    /// Build from a column-vector matrix; the projective row is ignored
    pub fn from_matrix4(m: &Matrix4<f32>) -> Self {
        let mut fields = [[0.0; 3]; 4];
        for (col, row) in fields.iter_mut().enumerate() {
            for (r, value) in row.iter_mut().enumerate() {
                *value = m[(r, col)];
            }
        }
        Self { fields }
    }

    /// Transform that applies `self` first, then `next`
    pub fn compose(&self, next: &Transform) -> Transform {
        Self::from_matrix4(&(next.to_matrix4() * self.to_matrix4()))
    }

    pub fn apply(&self, p: &Position) -> Position {
        self.to_matrix4().transform_point(p)
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::identity()
    }

    /// Twelve space-separated numbers, row by row
    pub fn to_3mf_string(&self, precision: usize) -> String {
        self.fields
            .iter()
            .flatten()
            .map(|v| format_float(f64::from(*v), precision))
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn parse_3mf(text: &str) -> Result<Self> {
        let values = text
            .split_whitespace()
            .map(|s| s.parse::<f32>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::InvalidTransform(format!("{text:?}: {e}")))?;

        if values.len() != 12 || values.iter().any(|v| !v.is_finite()) {
            return Err(Error::InvalidTransform(format!(
                "{text:?}: expected 12 finite numbers"
            )));
        }

        let mut fields = [[0.0; 3]; 4];
        for (i, v) in values.into_iter().enumerate() {
            fields[i / 3][i % 3] = v;
        }
        Ok(Self { fields })
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}
