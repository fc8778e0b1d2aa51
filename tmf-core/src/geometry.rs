/// Geometry primitives shared by mesh objects, readers and writers
use nalgebra::{Point3, Vector3};

use crate::ResourceId;

/// A vertex position in model units
pub type Position = Point3<f32>;

/// Largest coordinate magnitude accepted for a vertex
pub const MAX_COORDINATE: f32 = 1.0e9;

/// Build a position from three coordinates
pub fn position(x: f32, y: f32, z: f32) -> Position {
    Point3::new(x, y, z)
}

/// True when every coordinate is finite and inside the accepted range
pub fn is_valid_position(p: &Position) -> bool {
    p.iter().all(|c| c.is_finite() && c.abs() < MAX_COORDINATE)
}

/// A triangle face defined by three vertex indices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Triangle {
    pub indices: [u32; 3],
}

impl Triangle {
    pub fn new(v0: u32, v1: u32, v2: u32) -> Self {
        Self {
            indices: [v0, v1, v2],
        }
    }

    /// True when two corners share a vertex
    pub fn is_degenerate(&self) -> bool {
        let [a, b, c] = self.indices;
        a == b || a == c || b == c
    }
}

/// Per-corner property assignment for a triangle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriangleProperties {
    pub resource_id: ResourceId,
    pub property_ids: [u32; 3],
}

impl TriangleProperties {
    pub fn new(resource_id: ResourceId, p1: u32, p2: u32, p3: u32) -> Self {
        Self {
            resource_id,
            property_ids: [p1, p2, p3],
        }
    }

    /// Same property on all three corners
    pub fn uniform(resource_id: ResourceId, property_id: u32) -> Self {
        Self::new(resource_id, property_id, property_id, property_id)
    }

    pub fn is_uniform(&self) -> bool {
        let [a, b, c] = self.property_ids;
        a == b && b == c
    }
}

/// Calculate the face normal of three corners, counter-clockwise winding
pub fn face_normal(corners: &[Position; 3]) -> Vector3<f32> {
    let edge1 = corners[1] - corners[0];
    let edge2 = corners[2] - corners[0];

    let normal = edge1.cross(&edge2);
    let length = normal.norm();
    if length > f32::EPSILON {
        normal / length
    } else {
        Vector3::zeros()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_face_normal() {
        let n = face_normal(&[
            position(0.0, 0.0, 0.0),
            position(1.0, 0.0, 0.0),
            position(0.0, 1.0, 0.0),
        ]);
        assert!((n - Vector3::z()).norm() < 1e-6);
    }

    #[test]
    fn test_collapsed_normal_is_zero() {
        let p = position(1.0, 1.0, 1.0);
        assert_eq!(face_normal(&[p, p, p]), Vector3::zeros());
    }

    #[test]
    fn test_degenerate_triangle() {
        assert!(Triangle::new(0, 1, 1).is_degenerate());
        assert!(!Triangle::new(0, 1, 2).is_degenerate());
    }

    #[test]
    fn test_position_range() {
        assert!(is_valid_position(&position(1.0, -2.0, 3.0)));
        assert!(!is_valid_position(&position(2.0e9, 0.0, 0.0)));
        assert!(!is_valid_position(&position(f32::NAN, 0.0, 0.0)));
    }
}
