/// The in-memory 3MF model: resources, build items and metadata
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use tracing::debug;

use crate::beam::ClipMode;
use crate::color::ColorGroup;
use crate::error::{Error, Result};
use crate::geometry::{Position, TriangleProperties};
use crate::io::{ModelReader, ModelWriter};
use crate::object::{Component, ComponentsObject, MeshObject, Object, ObjectType};
use crate::transform::Transform;
use crate::ResourceId;

/// Length unit of all model coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Unit {
    MicroMeter,
    #[default]
    MilliMeter,
    CentiMeter,
    Inch,
    Foot,
    Meter,
}

impl Unit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Unit::MicroMeter => "micron",
            Unit::MilliMeter => "millimeter",
            Unit::CentiMeter => "centimeter",
            Unit::Inch => "inch",
            Unit::Foot => "foot",
            Unit::Meter => "meter",
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Unit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "micron" => Ok(Unit::MicroMeter),
            "millimeter" => Ok(Unit::MilliMeter),
            "centimeter" => Ok(Unit::CentiMeter),
            "inch" => Ok(Unit::Inch),
            "foot" => Ok(Unit::Foot),
            "meter" => Ok(Unit::Meter),
            _ => Err(Error::invalid_param(format!("invalid unit: {s}"))),
        }
    }
}

/// A single metadata entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    /// Full key, including a namespace prefix when present (`"ns:Name"`).
    pub name: String,
    pub value: String,
    /// XML schema type, `xs:string` when absent.
    pub data_type: Option<String>,
    pub preserve: bool,
}

impl Metadata {
    pub fn data_type(&self) -> &str {
        self.data_type.as_deref().unwrap_or("xs:string")
    }
}

/// Model-level metadata with unique names
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MetadataGroup {
    entries: Vec<Metadata>,
}

impl MetadataGroup {
    pub fn add_metadata(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<&mut Metadata> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::invalid_param("metadata name must not be empty"));
        }
        if self.by_name(&name).is_some() {
            return Err(Error::invalid_param(format!("duplicate metadata: {name}")));
        }
        self.entries.push(Metadata {
            name,
            value: value.into(),
            data_type: None,
            preserve: false,
        });
        let last = self.entries.len() - 1;
        Ok(&mut self.entries[last])
    }

    pub fn metadata(&self, index: u32) -> Option<&Metadata> {
        self.entries.get(index as usize)
    }

    pub fn by_name(&self, name: &str) -> Option<&Metadata> {
        self.entries.iter().find(|m| m.name == name)
    }

    pub fn metadata_count(&self) -> u32 {
        self.entries.len() as u32
    }

    pub fn remove_metadata(&mut self, index: u32) -> Result<Metadata> {
        if index as usize >= self.entries.len() {
            return Err(Error::IndexOutOfRange {
                what: "metadata",
                index,
                count: self.metadata_count(),
            });
        }
        Ok(self.entries.remove(index as usize))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Metadata> {
        self.entries.iter()
    }
}

/// Placement of an object in the build
#[derive(Debug, Clone, PartialEq)]
pub struct BuildItem {
    pub object_id: ResourceId,
    pub transform: Transform,
    pub part_number: Option<String>,
}

impl BuildItem {
    pub fn has_transform(&self) -> bool {
        !self.transform.is_identity()
    }
}

/// Slice stack seen while reading; kept for inspection only
#[derive(Debug, Clone, PartialEq)]
pub struct SliceStack {
    pub id: ResourceId,
    pub bottom_z: f64,
    pub slice_count: u32,
    pub polygon_count: u32,
}

/// A 3MF model
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    unit: Unit,
    language: String,
    metadata: MetadataGroup,
    objects: Vec<Object>,
    color_groups: Vec<ColorGroup>,
    slice_stacks: Vec<SliceStack>,
    build_items: Vec<BuildItem>,
    next_id: ResourceId,
}

impl Default for Model {
    fn default() -> Self {
        Self::new()
    }
}

impl Model {
    pub fn new() -> Self {
        Self {
            unit: Unit::MilliMeter,
            language: "en-US".to_string(),
            metadata: MetadataGroup::default(),
            objects: Vec::new(),
            color_groups: Vec::new(),
            slice_stacks: Vec::new(),
            build_items: Vec::new(),
            next_id: 1,
        }
    }

    pub fn unit(&self) -> Unit {
        self.unit
    }

    pub fn set_unit(&mut self, unit: Unit) {
        self.unit = unit;
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn set_language(&mut self, language: impl Into<String>) {
        self.language = language.into();
    }

    pub fn metadata_group(&self) -> &MetadataGroup {
        &self.metadata
    }

    pub fn metadata_group_mut(&mut self) -> &mut MetadataGroup {
        &mut self.metadata
    }

    fn allocate_id(&mut self) -> ResourceId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn has_resource(&self, id: ResourceId) -> bool {
        self.object(id).is_some()
            || self.color_group(id).is_some()
            || self.slice_stacks.iter().any(|s| s.id == id)
    }

    pub fn add_mesh_object(&mut self) -> &mut MeshObject {
        let id = self.allocate_id();
        self.objects.push(Object::Mesh(MeshObject::new(id)));
        match self.objects.last_mut() {
            Some(Object::Mesh(mesh)) => mesh,
            _ => unreachable!("mesh object was just pushed"),
        }
    }

    pub fn add_components_object(&mut self) -> &mut ComponentsObject {
        let id = self.allocate_id();
        self.objects.push(Object::Components(ComponentsObject::new(id)));
        match self.objects.last_mut() {
            Some(Object::Components(components)) => components,
            _ => unreachable!("components object was just pushed"),
        }
    }

    pub fn add_color_group(&mut self) -> &mut ColorGroup {
        let id = self.allocate_id();
        self.color_groups.push(ColorGroup::new(id));
        let last = self.color_groups.len() - 1;
        &mut self.color_groups[last]
    }

    /// Insert a resource read from a file, keeping its id
    pub(crate) fn insert_object(&mut self, object: Object) -> Result<()> {
        let id = object.resource_id();
        self.reserve_id(id)?;
        self.objects.push(object);
        Ok(())
    }

    pub(crate) fn insert_color_group(&mut self, group: ColorGroup) -> Result<()> {
        self.reserve_id(group.resource_id())?;
        self.color_groups.push(group);
        Ok(())
    }

    pub(crate) fn insert_slice_stack(&mut self, stack: SliceStack) -> Result<()> {
        self.reserve_id(stack.id)?;
        self.slice_stacks.push(stack);
        Ok(())
    }

    fn reserve_id(&mut self, id: ResourceId) -> Result<()> {
        if id == 0 {
            return Err(Error::invalid_param("resource id 0 is not allowed"));
        }
        if self.has_resource(id) {
            return Err(Error::invalid_param(format!("duplicate resource id {id}")));
        }
        self.next_id = self.next_id.max(id.saturating_add(1));
        Ok(())
    }

    pub fn objects(&self) -> &[Object] {
        &self.objects
    }

    pub fn object(&self, id: ResourceId) -> Option<&Object> {
        self.objects.iter().find(|o| o.resource_id() == id)
    }

    pub fn mesh_object(&self, id: ResourceId) -> Result<&MeshObject> {
        match self.object(id) {
            Some(Object::Mesh(mesh)) => Ok(mesh),
            Some(_) => Err(Error::InvalidResourceType {
                id,
                expected: "mesh object",
            }),
            None => Err(Error::ResourceNotFound(id)),
        }
    }

    pub fn mesh_object_mut(&mut self, id: ResourceId) -> Result<&mut MeshObject> {
        match self.objects.iter_mut().find(|o| o.resource_id() == id) {
            Some(Object::Mesh(mesh)) => Ok(mesh),
            Some(_) => Err(Error::InvalidResourceType {
                id,
                expected: "mesh object",
            }),
            None => Err(Error::ResourceNotFound(id)),
        }
    }

    pub fn components_object(&self, id: ResourceId) -> Result<&ComponentsObject> {
        match self.object(id) {
            Some(Object::Components(components)) => Ok(components),
            Some(_) => Err(Error::InvalidResourceType {
                id,
                expected: "components object",
            }),
            None => Err(Error::ResourceNotFound(id)),
        }
    }

    pub fn components_object_mut(&mut self, id: ResourceId) -> Result<&mut ComponentsObject> {
        match self.objects.iter_mut().find(|o| o.resource_id() == id) {
            Some(Object::Components(components)) => Ok(components),
            Some(_) => Err(Error::InvalidResourceType {
                id,
                expected: "components object",
            }),
            None => Err(Error::ResourceNotFound(id)),
        }
    }

    pub fn color_groups(&self) -> &[ColorGroup] {
        &self.color_groups
    }

    pub fn color_group(&self, id: ResourceId) -> Option<&ColorGroup> {
        self.color_groups.iter().find(|g| g.resource_id() == id)
    }

    pub fn color_group_mut(&mut self, id: ResourceId) -> Option<&mut ColorGroup> {
        self.color_groups.iter_mut().find(|g| g.resource_id() == id)
    }

    pub fn slice_stacks(&self) -> &[SliceStack] {
        &self.slice_stacks
    }

    /// True when `from` is `to` or reaches it through components
    fn reaches(&self, from: ResourceId, to: ResourceId) -> bool {
        let mut stack = vec![from];
        let mut seen = HashSet::new();
        while let Some(id) = stack.pop() {
            if id == to {
                return true;
            }
            if !seen.insert(id) {
                continue;
            }
            if let Some(Object::Components(components)) = self.object(id) {
                stack.extend(components.components.iter().map(|c| c.object_id));
            }
        }
        false
    }

    /// Add a transformed reference to `object_id` and return its index
    pub fn add_component(
        &mut self,
        components_id: ResourceId,
        object_id: ResourceId,
        transform: Transform,
    ) -> Result<u32> {
        self.components_object(components_id)?;
        if self.object(object_id).is_none() {
            return Err(Error::ResourceNotFound(object_id));
        }
        if self.reaches(object_id, components_id) {
            return Err(Error::CyclicComponents {
                from: components_id,
                to: object_id,
            });
        }

        let components = self.components_object_mut(components_id)?;
        components.components.push(Component {
            object_id,
            transform,
        });
        Ok(components.component_count() - 1)
    }

    pub fn add_build_item(
        &mut self,
        object_id: ResourceId,
        transform: Transform,
    ) -> Result<&mut BuildItem> {
        let object = self
            .object(object_id)
            .ok_or(Error::ResourceNotFound(object_id))?;
        if object.object_type() == ObjectType::Other {
            return Err(Error::invalid_param(format!(
                "object {object_id} of type other cannot be a build item"
            )));
        }
        self.build_items.push(BuildItem {
            object_id,
            transform,
            part_number: None,
        });
        let last = self.build_items.len() - 1;
        Ok(&mut self.build_items[last])
    }

    /// Append a build item read from a file; references are checked on validation
    pub(crate) fn push_build_item(&mut self, item: BuildItem) {
        self.build_items.push(item);
    }

    pub fn build_items(&self) -> &[BuildItem] {
        &self.build_items
    }

    pub fn build_item_count(&self) -> u32 {
        self.build_items.len() as u32
    }

    pub fn remove_build_item(&mut self, index: u32) -> Result<BuildItem> {
        if index as usize >= self.build_items.len() {
            return Err(Error::IndexOutOfRange {
                what: "build item",
                index,
                count: self.build_item_count(),
            });
        }
        Ok(self.build_items.remove(index as usize))
    }

    /// Look up a reader for a named format (`"3mf"`, `"stl"`)
    pub fn query_reader(&mut self, name: &str) -> Result<ModelReader<'_>> {
        ModelReader::for_format(self, name)
    }

    /// Look up a writer for a named format (`"3mf"`, `"stl"`)
    pub fn query_writer(&self, name: &str) -> Result<ModelWriter<'_>> {
        ModelWriter::for_format(self, name)
    }

    fn check_property(&self, resource_id: ResourceId, property_id: u32) -> Result<()> {
        let group = self.color_group(resource_id).ok_or_else(|| {
            if self.has_resource(resource_id) {
                Error::InvalidResourceType {
                    id: resource_id,
                    expected: "property resource",
                }
            } else {
                Error::ResourceNotFound(resource_id)
            }
        })?;
        if property_id >= group.count() {
            return Err(Error::IndexOutOfRange {
                what: "property",
                index: property_id,
                count: group.count(),
            });
        }
        Ok(())
    }

    fn check_triangle_properties(&self, props: &TriangleProperties) -> Result<()> {
        for &property_id in &props.property_ids {
            self.check_property(props.resource_id, property_id)?;
        }
        Ok(())
    }

    fn check_lattice_mesh(&self, owner: ResourceId, id: ResourceId) -> Result<()> {
        let mesh = self.mesh_object(id)?;
        if id == owner || mesh.has_beam_lattice() {
            return Err(Error::invalid_param(format!(
                "object {id} cannot be used as a lattice mesh of object {owner}"
            )));
        }
        Ok(())
    }

    /// Every reference problem in the model, in resource order
    pub fn validation_issues(&self) -> Vec<Error> {
        let mut issues = Vec::new();

        for object in &self.objects {
            match object {
                Object::Mesh(mesh) => {
                    if let Err(e) = mesh.check_type() {
                        issues.push(e);
                    }
                    for index in 0..mesh.triangle_count() {
                        if let Some(props) = mesh.triangle_properties(index) {
                            if let Err(e) = self.check_triangle_properties(&props) {
                                issues.push(e);
                            }
                        }
                    }
                    if let Some((resource_id, property_id)) = mesh.object_level_property() {
                        if let Err(e) = self.check_property(resource_id, property_id) {
                            issues.push(e);
                        }
                    }
                    let lattice = mesh.beam_lattice();
                    if !lattice.is_empty() {
                        let (_, clipping) = lattice.clipping();
                        for id in clipping.into_iter().chain(lattice.representation()) {
                            if let Err(e) = self.check_lattice_mesh(mesh.resource_id(), id) {
                                issues.push(e);
                            }
                        }
                    }
                }
                Object::Components(components) => {
                    for component in components.components() {
                        if self.object(component.object_id).is_none() {
                            issues.push(Error::ResourceNotFound(component.object_id));
                        } else if self.reaches(component.object_id, components.resource_id()) {
                            issues.push(Error::CyclicComponents {
                                from: components.resource_id(),
                                to: component.object_id,
                            });
                        }
                    }
                }
            }
        }

        for item in &self.build_items {
            match self.object(item.object_id) {
                None => issues.push(Error::ResourceNotFound(item.object_id)),
                Some(object) if object.object_type() == ObjectType::Other => {
                    issues.push(Error::invalid_param(format!(
                        "build item references object {} of type other",
                        item.object_id
                    )));
                }
                Some(_) => {}
            }
        }

        issues
    }

    /// Fail with the first reference problem, if any
    pub fn validate(&self) -> Result<()> {
        match self.validation_issues().into_iter().next() {
            Some(issue) => Err(issue),
            None => Ok(()),
        }
    }

    /// Drop every reference that would fail validation; returns what was dropped
    pub(crate) fn prune_invalid_references(&mut self) -> Vec<String> {
        let mut dropped = Vec::new();

        let snapshot = self.clone();
        for object in &mut self.objects {
            match object {
                Object::Mesh(mesh) => {
                    let id = mesh.resource_id();
                    if let Err(e) = mesh.check_type() {
                        dropped.push(format!("object {id} type reset to model: {e}"));
                        mesh.reset_type();
                    }
                    for index in 0..mesh.triangle_count() {
                        if let Some(props) = mesh.triangle_properties(index) {
                            if let Err(e) = snapshot.check_triangle_properties(&props) {
                                dropped.push(format!("object {id} triangle {index}: {e}"));
                                mesh.clear_triangle_property(index);
                            }
                        }
                    }
                    if let Some((resource_id, property_id)) = mesh.object_level_property() {
                        if let Err(e) = snapshot.check_property(resource_id, property_id) {
                            dropped.push(format!("object {id} property: {e}"));
                            mesh.clear_object_level_property();
                        }
                    }
                    if let (_, Some(clip_id)) = mesh.beam_lattice().clipping() {
                        if let Err(e) = snapshot.check_lattice_mesh(id, clip_id) {
                            dropped.push(format!("object {id} clipping mesh: {e}"));
                            let lattice = mesh.lattice_data_mut();
                            lattice.clip_mode = ClipMode::None;
                            lattice.clipping_mesh = None;
                        }
                    }
                    if let Some(rep_id) = mesh.beam_lattice().representation() {
                        if let Err(e) = snapshot.check_lattice_mesh(id, rep_id) {
                            dropped.push(format!("object {id} representation mesh: {e}"));
                            mesh.lattice_data_mut().representation_mesh = None;
                        }
                    }
                }
                Object::Components(components) => {
                    let id = components.resource_id();
                    components.components.retain(|c| {
                        let ok = snapshot.object(c.object_id).is_some()
                            && !snapshot.reaches(c.object_id, id);
                        if !ok {
                            dropped.push(format!(
                                "object {id} component -> {}: missing or cyclic",
                                c.object_id
                            ));
                        }
                        ok
                    });
                }
            }
        }

        let objects = &self.objects;
        self.build_items.retain(|item| {
            let ok = objects
                .iter()
                .find(|o| o.resource_id() == item.object_id)
                .is_some_and(|o| o.object_type() != ObjectType::Other);
            if !ok {
                dropped.push(format!("build item -> {}: missing or of type other", item.object_id));
            }
            ok
        });

        dropped
    }

    /// Resource ids ordered so every resource follows the ones it references
    pub fn resource_write_order(&self) -> Result<Vec<ResourceId>> {
        let mut order: Vec<ResourceId> =
            self.color_groups.iter().map(|g| g.resource_id()).collect();
        order.sort_unstable();

        let by_id: HashMap<ResourceId, &Object> =
            self.objects.iter().map(|o| (o.resource_id(), o)).collect();
        let ids: BTreeSet<ResourceId> = by_id.keys().copied().collect();

        let mut done = HashSet::new();
        let mut in_progress = HashSet::new();

        fn visit(
            id: ResourceId,
            by_id: &HashMap<ResourceId, &Object>,
            done: &mut HashSet<ResourceId>,
            in_progress: &mut HashSet<ResourceId>,
            order: &mut Vec<ResourceId>,
        ) -> Result<()> {
            if done.contains(&id) {
                return Ok(());
            }
            let object = by_id.get(&id).ok_or(Error::ResourceNotFound(id))?;
            if !in_progress.insert(id) {
                return Err(Error::CyclicComponents { from: id, to: id });
            }

            let dependencies: Vec<ResourceId> = match object {
                Object::Mesh(mesh) => {
                    let lattice = mesh.beam_lattice();
                    lattice
                        .clipping()
                        .1
                        .into_iter()
                        .chain(lattice.representation())
                        .collect()
                }
                Object::Components(components) => {
                    components.components().iter().map(|c| c.object_id).collect()
                }
            };
            for dependency in dependencies {
                visit(dependency, by_id, done, in_progress, order)?;
            }

            in_progress.remove(&id);
            done.insert(id);
            order.push(id);
            Ok(())
        }

        for id in ids {
            visit(id, &by_id, &mut done, &mut in_progress, &mut order)?;
        }
        Ok(order)
    }

    /// World-space triangles of every build item
    pub fn flatten_build(&self) -> Result<Vec<[Position; 3]>> {
        let mut triangles = Vec::new();
        for item in &self.build_items {
            let mut path = Vec::new();
            self.flatten_object(item.object_id, &item.transform, &mut path, &mut triangles)?;
        }
        debug!(
            build_items = self.build_items.len(),
            triangles = triangles.len(),
            "flattened build"
        );
        Ok(triangles)
    }

    fn flatten_object(
        &self,
        id: ResourceId,
        transform: &Transform,
        path: &mut Vec<ResourceId>,
        out: &mut Vec<[Position; 3]>,
    ) -> Result<()> {
        if path.contains(&id) {
            return Err(Error::CyclicComponents {
                from: path.last().copied().unwrap_or(id),
                to: id,
            });
        }
        match self.object(id).ok_or(Error::ResourceNotFound(id))? {
            Object::Mesh(mesh) => {
                let matrix = transform.to_matrix4();
                for index in 0..mesh.triangle_count() {
                    if let Some(corners) = mesh.triangle_corners(index) {
                        out.push(corners.map(|p| matrix.transform_point(&p)));
                    }
                }
            }
            Object::Components(components) => {
                path.push(id);
                for component in components.components() {
                    let combined = component.transform.compose(transform);
                    self.flatten_object(component.object_id, &combined, path, out)?;
                }
                path.pop();
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beam::{Beam, CapMode};
    use crate::color::Color;
    use crate::geometry::{position, Triangle};
    use approx::assert_relative_eq;

    fn tetrahedron(model: &mut Model) -> ResourceId {
        let mesh = model.add_mesh_object();
        mesh.set_name("Tetra");
        let vertices = [
            position(0.0, 0.0, 0.0),
            position(10.0, 0.0, 0.0),
            position(0.0, 10.0, 0.0),
            position(0.0, 0.0, 10.0),
        ];
        let triangles = [
            Triangle::new(0, 2, 1),
            Triangle::new(0, 1, 3),
            Triangle::new(1, 2, 3),
            Triangle::new(2, 0, 3),
        ];
        mesh.set_geometry(&vertices, &triangles).unwrap();
        mesh.resource_id()
    }

    #[test]
    fn test_ids_are_sequential() {
        let mut model = Model::new();
        assert_eq!(model.add_mesh_object().resource_id(), 1);
        assert_eq!(model.add_color_group().resource_id(), 2);
        assert_eq!(model.add_components_object().resource_id(), 3);
    }

    #[test]
    fn test_inserted_ids_advance_counter() {
        let mut model = Model::new();
        model.insert_object(Object::Mesh(MeshObject::new(10))).unwrap();
        assert!(model
            .insert_color_group(ColorGroup::new(10))
            .is_err());
        assert_eq!(model.add_mesh_object().resource_id(), 11);
    }

    #[test]
    fn test_component_cycles_rejected() {
        let mut model = Model::new();
        let mesh = tetrahedron(&mut model);
        let outer = model.add_components_object().resource_id();
        let inner = model.add_components_object().resource_id();

        model.add_component(inner, mesh, Transform::identity()).unwrap();
        model.add_component(outer, inner, Transform::identity()).unwrap();

        assert!(matches!(
            model.add_component(inner, outer, Transform::identity()),
            Err(Error::CyclicComponents { .. })
        ));
        assert!(matches!(
            model.add_component(outer, outer, Transform::identity()),
            Err(Error::CyclicComponents { .. })
        ));
        assert!(matches!(
            model.add_component(mesh, inner, Transform::identity()),
            Err(Error::InvalidResourceType { .. })
        ));
        assert!(matches!(
            model.add_component(outer, 99, Transform::identity()),
            Err(Error::ResourceNotFound(99))
        ));
    }

    #[test]
    fn test_build_item_validation() {
        let mut model = Model::new();
        let mesh = tetrahedron(&mut model);
        assert!(model.add_build_item(42, Transform::identity()).is_err());

        model.mesh_object_mut(mesh).unwrap().set_type(ObjectType::Other).unwrap();
        assert!(model.add_build_item(mesh, Transform::identity()).is_err());
    }

    #[test]
    fn test_validate_properties() {
        let mut model = Model::new();
        let mesh = tetrahedron(&mut model);
        let group = model.add_color_group();
        let red = group.add_color(Color::rgb(255, 0, 0));
        let group_id = group.resource_id();

        let mesh_object = model.mesh_object_mut(mesh).unwrap();
        mesh_object
            .set_triangle_properties(0, TriangleProperties::uniform(group_id, red))
            .unwrap();
        assert!(model.validate().is_ok());

        model
            .mesh_object_mut(mesh)
            .unwrap()
            .set_triangle_properties(1, TriangleProperties::new(group_id, 0, 0, 3))
            .unwrap();
        assert!(matches!(
            model.validate(),
            Err(Error::IndexOutOfRange { what: "property", .. })
        ));

        model
            .mesh_object_mut(mesh)
            .unwrap()
            .set_object_level_property(77, 0);
        assert_eq!(model.validation_issues().len(), 2);
    }

    #[test]
    fn test_prune_invalid_references() {
        let mut model = Model::new();
        let mesh = tetrahedron(&mut model);
        model
            .mesh_object_mut(mesh)
            .unwrap()
            .set_triangle_properties(2, TriangleProperties::uniform(50, 0))
            .unwrap();
        model.build_items.push(BuildItem {
            object_id: 60,
            transform: Transform::identity(),
            part_number: None,
        });

        let dropped = model.prune_invalid_references();
        assert_eq!(dropped.len(), 2);
        assert!(model.validate().is_ok());
        assert_eq!(model.build_item_count(), 0);
    }

    #[test]
    fn test_lattice_on_support_mesh_is_invalid() {
        let mut model = Model::new();
        let mesh = tetrahedron(&mut model);
        let mesh_object = model.mesh_object_mut(mesh).unwrap();
        mesh_object.set_type(ObjectType::Support).unwrap();
        mesh_object
            .beam_lattice_mut()
            .add_beam(Beam::new(0, 1, 1.0, 1.0, CapMode::Sphere, CapMode::Sphere))
            .unwrap();
        assert!(matches!(model.validate(), Err(Error::InvalidParam { .. })));

        let dropped = model.prune_invalid_references();
        assert_eq!(dropped.len(), 1);
        assert_eq!(model.mesh_object(mesh).unwrap().object_type(), ObjectType::Model);
        assert_eq!(model.mesh_object(mesh).unwrap().beam_lattice().beam_count(), 1);
        assert!(model.validate().is_ok());
    }

    #[test]
    fn test_write_order_puts_dependencies_first() {
        let mut model = Model::new();
        let assembly = model.add_components_object().resource_id();
        let mesh = tetrahedron(&mut model);
        let colors = model.add_color_group().resource_id();
        model.add_component(assembly, mesh, Transform::identity()).unwrap();

        let order = model.resource_write_order().unwrap();
        assert_eq!(order, vec![colors, mesh, assembly]);
    }

    #[test]
    fn test_flatten_applies_transforms() {
        let mut model = Model::new();
        let mesh = tetrahedron(&mut model);
        let assembly = model.add_components_object().resource_id();
        model
            .add_component(assembly, mesh, Transform::translation(40.0, 60.0, 80.0))
            .unwrap();
        model
            .add_component(assembly, mesh, Transform::identity())
            .unwrap();
        model
            .add_build_item(assembly, Transform::translation(0.0, 0.0, 5.0))
            .unwrap();

        let triangles = model.flatten_build().unwrap();
        assert_eq!(triangles.len(), 8);
        assert_relative_eq!(triangles[0][0], position(40.0, 60.0, 85.0));
        assert_relative_eq!(triangles[4][0], position(0.0, 0.0, 5.0));
    }

    #[test]
    fn test_metadata_group() {
        let mut model = Model::new();
        let group = model.metadata_group_mut();
        group.add_metadata("Title", "Cube").unwrap();
        group.add_metadata("Designer", "someone").unwrap().preserve = true;
        assert!(group.add_metadata("Title", "Again").is_err());
        assert!(group.add_metadata("", "x").is_err());

        assert_eq!(group.metadata_count(), 2);
        assert_eq!(group.by_name("Designer").unwrap().data_type(), "xs:string");
        assert_eq!(group.remove_metadata(0).unwrap().value, "Cube");
        assert!(group.remove_metadata(5).is_err());
    }

    #[test]
    fn test_unit_names() {
        assert_eq!("micron".parse::<Unit>().unwrap(), Unit::MicroMeter);
        assert_eq!(Unit::default().to_string(), "millimeter");
        assert!("furlong".parse::<Unit>().is_err());
    }
}
