/// TMF Core Library - 3MF model building, reading and writing
///
/// This library provides an in-memory 3MF model (mesh objects, components,
/// color groups, beam lattices, build items, metadata) together with
/// named-format readers and writers for 3MF and STL files.

pub mod beam;
pub mod color;
pub mod error;
pub mod geometry;
pub mod io;
pub mod model;
pub mod object;
pub mod stl;
pub mod threemf;
pub mod transform;
pub mod wrapper;

/// Identifier of a resource (object, color group, slice stack) inside a model
pub type ResourceId = u32;

// Re-export commonly used types
pub use beam::{Beam, BeamLattice, BeamLatticeMut, BeamSet, CapMode, ClipMode};
pub use color::{Color, ColorGroup};
pub use error::{Error, Result};
pub use geometry::{position, Position, Triangle, TriangleProperties};
pub use io::{Format, ModelReader, ModelWriter};
pub use model::{BuildItem, Metadata, MetadataGroup, Model, SliceStack, Unit};
pub use object::{Component, ComponentsObject, MeshObject, Object, ObjectType};
pub use transform::Transform;
pub use wrapper::Wrapper;
