/// Model objects: triangle meshes and component assemblies
use std::fmt;
use std::str::FromStr;

use crate::beam::{BeamLattice, BeamLatticeMut};
use crate::error::{Error, Result};
use crate::geometry::{face_normal, is_valid_position, Position, Triangle, TriangleProperties};
use crate::model::MetadataGroup;
use crate::transform::Transform;
use crate::ResourceId;

/// Role of an object in the build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ObjectType {
    #[default]
    Model,
    Support,
    SolidSupport,
    Other,
}

impl ObjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectType::Model => "model",
            ObjectType::Support => "support",
            ObjectType::SolidSupport => "solidsupport",
            ObjectType::Other => "other",
        }
    }

    /// Only model and solid support objects may carry a beam lattice
    pub fn allows_beam_lattice(&self) -> bool {
        matches!(self, ObjectType::Model | ObjectType::SolidSupport)
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "model" => Ok(ObjectType::Model),
            "support" => Ok(ObjectType::Support),
            "solidsupport" => Ok(ObjectType::SolidSupport),
            "other" => Ok(ObjectType::Other),
            _ => Err(Error::invalid_param(format!("invalid object type: {s}"))),
        }
    }
}

/// An indexed triangle mesh with optional properties and beam lattice
#[derive(Debug, Clone, PartialEq)]
pub struct MeshObject {
    id: ResourceId,
    name: Option<String>,
    part_number: Option<String>,
    object_type: ObjectType,
    vertices: Vec<Position>,
    triangles: Vec<Triangle>,
    properties: Vec<Option<TriangleProperties>>,
    object_property: Option<(ResourceId, u32)>,
    beam_lattice: BeamLattice,
    metadata: MetadataGroup,
}

impl MeshObject {
    pub(crate) fn new(id: ResourceId) -> Self {
        Self {
            id,
            name: None,
            part_number: None,
            object_type: ObjectType::Model,
            vertices: Vec::new(),
            triangles: Vec::new(),
            properties: Vec::new(),
            object_property: None,
            beam_lattice: BeamLattice::default(),
            metadata: MetadataGroup::default(),
        }
    }

    pub fn resource_id(&self) -> ResourceId {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    pub fn part_number(&self) -> Option<&str> {
        self.part_number.as_deref()
    }

    pub fn set_part_number(&mut self, part_number: impl Into<String>) {
        self.part_number = Some(part_number.into());
    }

    pub fn object_type(&self) -> ObjectType {
        self.object_type
    }

    /// Metadata attached to this object rather than to the model
    pub fn metadata_group(&self) -> &MetadataGroup {
        &self.metadata
    }

    pub fn metadata_group_mut(&mut self) -> &mut MetadataGroup {
        &mut self.metadata
    }

    pub fn set_type(&mut self, object_type: ObjectType) -> Result<()> {
        Self::check_lattice_type(object_type, &self.beam_lattice)?;
        self.object_type = object_type;
        Ok(())
    }

    fn check_lattice_type(object_type: ObjectType, lattice: &BeamLattice) -> Result<()> {
        if !lattice.is_empty() && !object_type.allows_beam_lattice() {
            return Err(Error::invalid_param(format!(
                "a mesh with a beam lattice cannot be of type {object_type}"
            )));
        }
        Ok(())
    }

    /// Beams can be added after the type is set, so this is checked again on validation
    pub(crate) fn check_type(&self) -> Result<()> {
        Self::check_lattice_type(self.object_type, &self.beam_lattice)
    }

    pub(crate) fn reset_type(&mut self) {
        self.object_type = ObjectType::Model;
    }

    fn check_vertex(&self, index: u32) -> Result<()> {
        if index as usize >= self.vertices.len() {
            return Err(Error::IndexOutOfRange {
                what: "vertex",
                index,
                count: self.vertex_count(),
            });
        }
        Ok(())
    }

    fn check_triangle(&self, triangle: &Triangle) -> Result<()> {
        for &index in &triangle.indices {
            self.check_vertex(index)?;
        }
        if triangle.is_degenerate() {
            return Err(Error::invalid_param(format!(
                "triangle {:?} repeats a vertex",
                triangle.indices
            )));
        }
        Ok(())
    }

    fn check_position(position: &Position) -> Result<()> {
        if !is_valid_position(position) {
            return Err(Error::invalid_param(format!(
                "vertex coordinates out of range: {position}"
            )));
        }
        Ok(())
    }

    /// Append a vertex and return its index
    pub fn add_vertex(&mut self, position: Position) -> Result<u32> {
        Self::check_position(&position)?;
        self.vertices.push(position);
        Ok(self.vertex_count() - 1)
    }

    pub fn set_vertex(&mut self, index: u32, position: Position) -> Result<()> {
        self.check_vertex(index)?;
        Self::check_position(&position)?;
        self.vertices[index as usize] = position;
        Ok(())
    }

    pub fn vertex(&self, index: u32) -> Option<Position> {
        self.vertices.get(index as usize).copied()
    }

    pub fn vertices(&self) -> &[Position] {
        &self.vertices
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertices.len() as u32
    }

    /// Append a triangle and return its index
    pub fn add_triangle(&mut self, triangle: Triangle) -> Result<u32> {
        self.check_triangle(&triangle)?;
        self.triangles.push(triangle);
        self.properties.push(None);
        Ok(self.triangle_count() - 1)
    }

    pub fn triangle(&self, index: u32) -> Option<Triangle> {
        self.triangles.get(index as usize).copied()
    }

    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    pub fn triangle_count(&self) -> u32 {
        self.triangles.len() as u32
    }

    /// Replace vertices and triangles at once.
    ///
    /// Triangle properties are cleared. Beams referencing vertices past the
    /// new vertex count make this fail and leave the mesh unchanged.
    pub fn set_geometry(&mut self, vertices: &[Position], triangles: &[Triangle]) -> Result<()> {
        for position in vertices {
            Self::check_position(position)?;
        }
        let count = vertices.len() as u32;
        for triangle in triangles {
            if let Some(&index) = triangle.indices.iter().find(|i| **i >= count) {
                return Err(Error::IndexOutOfRange {
                    what: "vertex",
                    index,
                    count,
                });
            }
            if triangle.is_degenerate() {
                return Err(Error::invalid_param(format!(
                    "triangle {:?} repeats a vertex",
                    triangle.indices
                )));
            }
        }
        if let Some(beam) = self
            .beam_lattice
            .beams()
            .iter()
            .find(|b| b.indices.iter().any(|i| *i >= count))
        {
            return Err(Error::invalid_param(format!(
                "beam {:?} references a removed vertex",
                beam.indices
            )));
        }

        self.vertices = vertices.to_vec();
        self.triangles = triangles.to_vec();
        self.properties = vec![None; triangles.len()];
        Ok(())
    }

    /// Assign corner properties to a triangle; references are checked on validation
    pub fn set_triangle_properties(&mut self, index: u32, props: TriangleProperties) -> Result<()> {
        let count = self.triangle_count();
        let slot = self
            .properties
            .get_mut(index as usize)
            .ok_or(Error::IndexOutOfRange {
                what: "triangle",
                index,
                count,
            })?;
        *slot = Some(props);
        Ok(())
    }

    pub fn triangle_properties(&self, index: u32) -> Option<TriangleProperties> {
        self.properties.get(index as usize).copied().flatten()
    }

    pub fn clear_triangle_properties(&mut self) {
        self.properties.iter_mut().for_each(|p| *p = None);
    }

    pub(crate) fn clear_triangle_property(&mut self, index: u32) {
        if let Some(slot) = self.properties.get_mut(index as usize) {
            *slot = None;
        }
    }

    pub fn set_object_level_property(&mut self, resource_id: ResourceId, property_id: u32) {
        self.object_property = Some((resource_id, property_id));
    }

    pub fn clear_object_level_property(&mut self) {
        self.object_property = None;
    }

    pub fn object_level_property(&self) -> Option<(ResourceId, u32)> {
        self.object_property
    }

    pub fn beam_lattice(&self) -> &BeamLattice {
        &self.beam_lattice
    }

    pub fn beam_lattice_mut(&mut self) -> BeamLatticeMut<'_> {
        BeamLatticeMut {
            vertex_count: self.vertex_count(),
            lattice: &mut self.beam_lattice,
        }
    }

    /// Lattice fields without vertex checks, for readers and pruning
    pub(crate) fn lattice_data_mut(&mut self) -> &mut BeamLattice {
        &mut self.beam_lattice
    }

    pub fn has_beam_lattice(&self) -> bool {
        !self.beam_lattice.is_empty()
    }

    /// Unit normal of a triangle from its current vertex positions
    pub fn triangle_normal(&self, index: u32) -> Option<nalgebra::Vector3<f32>> {
        self.triangle_corners(index).map(|c| face_normal(&c))
    }

    pub fn triangle_corners(&self, index: u32) -> Option<[Position; 3]> {
        let triangle = self.triangle(index)?;
        let [a, b, c] = triangle.indices;
        Some([self.vertex(a)?, self.vertex(b)?, self.vertex(c)?])
    }
}

/// Reference from an assembly to another object
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Component {
    pub object_id: ResourceId,
    pub transform: Transform,
}

/// An object made of transformed references to other objects
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentsObject {
    id: ResourceId,
    name: Option<String>,
    part_number: Option<String>,
    object_type: ObjectType,
    pub(crate) components: Vec<Component>,
    metadata: MetadataGroup,
}

impl ComponentsObject {
    pub(crate) fn new(id: ResourceId) -> Self {
        Self {
            id,
            name: None,
            part_number: None,
            object_type: ObjectType::Model,
            components: Vec::new(),
            metadata: MetadataGroup::default(),
        }
    }

    pub fn resource_id(&self) -> ResourceId {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    pub fn part_number(&self) -> Option<&str> {
        self.part_number.as_deref()
    }

    pub fn set_part_number(&mut self, part_number: impl Into<String>) {
        self.part_number = Some(part_number.into());
    }

    pub fn object_type(&self) -> ObjectType {
        self.object_type
    }

    pub fn set_type(&mut self, object_type: ObjectType) {
        self.object_type = object_type;
    }

    pub fn metadata_group(&self) -> &MetadataGroup {
        &self.metadata
    }

    pub fn metadata_group_mut(&mut self) -> &mut MetadataGroup {
        &mut self.metadata
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn component(&self, index: u32) -> Option<&Component> {
        self.components.get(index as usize)
    }

    pub fn component_count(&self) -> u32 {
        self.components.len() as u32
    }

    pub fn set_component_transform(&mut self, index: u32, transform: Transform) -> Result<()> {
        let count = self.component_count();
        let component = self
            .components
            .get_mut(index as usize)
            .ok_or(Error::IndexOutOfRange {
                what: "component",
                index,
                count,
            })?;
        component.transform = transform;
        Ok(())
    }
}

/// Any object resource in a model
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    Mesh(MeshObject),
    Components(ComponentsObject),
}

impl Object {
    pub fn resource_id(&self) -> ResourceId {
        match self {
            Object::Mesh(mesh) => mesh.resource_id(),
            Object::Components(components) => components.resource_id(),
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Object::Mesh(mesh) => mesh.name(),
            Object::Components(components) => components.name(),
        }
    }

    pub fn part_number(&self) -> Option<&str> {
        match self {
            Object::Mesh(mesh) => mesh.part_number(),
            Object::Components(components) => components.part_number(),
        }
    }

    pub fn object_type(&self) -> ObjectType {
        match self {
            Object::Mesh(mesh) => mesh.object_type(),
            Object::Components(components) => components.object_type(),
        }
    }

    pub fn metadata_group(&self) -> &MetadataGroup {
        match self {
            Object::Mesh(mesh) => mesh.metadata_group(),
            Object::Components(components) => components.metadata_group(),
        }
    }

    pub fn is_mesh_object(&self) -> bool {
        matches!(self, Object::Mesh(_))
    }

    pub fn is_components_object(&self) -> bool {
        matches!(self, Object::Components(_))
    }

    pub fn as_mesh(&self) -> Option<&MeshObject> {
        match self {
            Object::Mesh(mesh) => Some(mesh),
            Object::Components(_) => None,
        }
    }

    pub fn as_components(&self) -> Option<&ComponentsObject> {
        match self {
            Object::Components(components) => Some(components),
            Object::Mesh(_) => None,
        }
    }
}
