/// 3MF reader: package lookup and streaming model XML parser
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::Path;
use std::str::FromStr;

use quick_xml::events::{BytesStart, Event};
use quick_xml::name::QName;
use quick_xml::Reader;
use tracing::{debug, info, warn};
use zip::ZipArchive;

use super::{
    MODEL_PATH, NAMESPACE_BEAM_LATTICE, NAMESPACE_CORE, NAMESPACE_MATERIAL, NAMESPACE_PRODUCTION,
    NAMESPACE_SLICE, RELS_PATH, START_PART_TYPE,
};
use crate::beam::{Beam, BeamSet, CapMode, ClipMode};
use crate::color::{Color, ColorGroup};
use crate::error::{Error, Result};
use crate::geometry::{is_valid_position, position, Position, Triangle, TriangleProperties};
use crate::model::{BuildItem, Metadata, MetadataGroup, Model, SliceStack, Unit};
use crate::object::{Component, ComponentsObject, MeshObject, Object, ObjectType};
use crate::transform::Transform;
use crate::ResourceId;

/// Reads a 3MF package into a model.
///
/// In strict mode (the default) any malformed content fails the read. With
/// strict mode off, the offending element is skipped, a warning is recorded,
/// and invalid references are dropped once parsing is done.
pub struct Reader3mf<'a> {
    model: &'a mut Model,
    strict: bool,
    warnings: Vec<String>,
}

impl<'a> Reader3mf<'a> {
    pub fn new(model: &'a mut Model) -> Self {
        Self {
            model,
            strict: true,
            warnings: Vec::new(),
        }
    }

    pub fn set_strict_mode_active(&mut self, strict: bool) {
        self.strict = strict;
    }

    pub fn strict_mode_active(&self) -> bool {
        self.strict
    }

    /// Warnings of the last read
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn read_from_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| Error::open(path, e))?;
        debug!(path = %path.display(), "reading 3MF file");
        self.read_from(BufReader::new(file))
    }

    pub fn read_from_buffer(&mut self, data: &[u8]) -> Result<()> {
        self.read_from(Cursor::new(data))
    }

    /// Read a package; on failure the target model is left untouched
    pub fn read_from<R: Read + Seek>(&mut self, source: R) -> Result<()> {
        let mut archive = ZipArchive::new(source)
            .map_err(|e| Error::invalid_content(format!("not a 3MF package: {e}")))?;

        let part = start_part(&mut archive)?;
        debug!(part = %part, "found model part");
        let mut content = String::new();
        archive.by_name(&part)?.read_to_string(&mut content)?;

        let mut parser = ModelParser::new(self.strict);
        parser.parse(&content)?;
        let ModelParser {
            mut model,
            mut warnings,
            ..
        } = parser;

        if self.strict {
            model.validate()?;
        } else {
            for dropped in model.prune_invalid_references() {
                warn!(reference = %dropped, "dropped invalid reference");
                warnings.push(dropped);
            }
        }

        info!(
            objects = model.objects().len(),
            build_items = model.build_item_count(),
            warnings = warnings.len(),
            "read 3MF model"
        );
        *self.model = model;
        self.warnings = warnings;
        Ok(())
    }
}

/// Model part named by the package relationships, or a well-known fallback
fn start_part<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<String> {
    let rels = match archive.by_name(RELS_PATH) {
        Ok(mut file) => {
            let mut content = String::new();
            file.read_to_string(&mut content)?;
            Some(content)
        }
        Err(_) => None,
    };
    if let Some(rels) = rels {
        if let Some(target) = start_part_target(&rels)? {
            if archive.file_names().any(|name| name == target) {
                return Ok(target);
            }
            debug!(target = %target, "start part missing from package");
        }
    }

    if archive.file_names().any(|name| name == MODEL_PATH) {
        return Ok(MODEL_PATH.to_string());
    }

    archive
        .file_names()
        .find(|name| {
            Path::new(name)
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("model"))
        })
        .map(str::to_string)
        .ok_or_else(|| Error::invalid_content("3MF package does not contain a model part"))
}

fn start_part_target(rels: &str) -> Result<Option<String>> {
    let mut reader = Reader::from_str(rels);
    reader.config_mut().trim_text(true);

    loop {
        match reader.read_event()? {
            Event::Start(ref e) | Event::Empty(ref e)
                if e.local_name().as_ref() == b"Relationship" =>
            {
                let attrs = Attrs::collect(e)?;
                if attrs.get("Type") == Some(START_PART_TYPE) {
                    return Ok(attrs
                        .get("Target")
                        .map(|t| t.trim_start_matches('/').to_string()));
                }
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
    }
}

/// Attributes of one element, keyed by their qualified name
struct Attrs(Vec<(String, String)>);

impl Attrs {
    fn collect(element: &BytesStart<'_>) -> Result<Self> {
        let mut list = Vec::new();
        for attr in element.attributes() {
            let attr = attr?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|e| Error::invalid_content(format!("attribute {key}: {e}")))?
                .into_owned();
            list.push((key, value));
        }
        Ok(Self(list))
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn parse<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        self.get(key)
            .map(|value| {
                value.trim().parse::<T>().map_err(|e| {
                    Error::invalid_content(format!("invalid {key} value {value:?}: {e}"))
                })
            })
            .transpose()
    }

    fn required<T>(&self, key: &str, element: &str) -> Result<T>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        self.parse(key)?.ok_or_else(|| {
            Error::invalid_content(format!("<{element}> is missing attribute {key}"))
        })
    }

    fn transform(&self) -> Result<Transform> {
        match self.get("transform") {
            Some(text) => Transform::parse_3mf(text),
            None => Ok(Transform::identity()),
        }
    }

    /// `(prefix, uri)` of every namespace declared on the element
    fn namespaces(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().filter_map(|(k, v)| {
            if k == "xmlns" {
                Some(("", v.as_str()))
            } else {
                k.strip_prefix("xmlns:").map(|prefix| (prefix, v.as_str()))
            }
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Space {
    Core,
    Material,
    Production,
    BeamLattice,
    Slice,
    Unknown,
}

impl Space {
    fn from_uri(uri: &str) -> Self {
        match uri {
            NAMESPACE_CORE => Space::Core,
            NAMESPACE_MATERIAL => Space::Material,
            NAMESPACE_PRODUCTION => Space::Production,
            NAMESPACE_BEAM_LATTICE => Space::BeamLattice,
            NAMESPACE_SLICE => Space::Slice,
            _ => Space::Unknown,
        }
    }
}

enum ObjectBody {
    Empty,
    Mesh(MeshObject),
    Components(ComponentsObject),
}

struct PendingObject {
    id: ResourceId,
    name: Option<String>,
    part_number: Option<String>,
    object_type: ObjectType,
    property: Option<(ResourceId, u32)>,
    metadata: MetadataGroup,
    body: ObjectBody,
}

/// Event-driven parser building a fresh model from one model part
struct ModelParser {
    strict: bool,
    model: Model,
    warnings: Vec<String>,
    namespaces: HashMap<String, String>,
    seen_model: bool,
    object: Option<PendingObject>,
    color_group: Option<ColorGroup>,
    beam_set: Option<BeamSet>,
    slice_stack: Option<SliceStack>,
    metadata: Option<Metadata>,
}

impl ModelParser {
    fn new(strict: bool) -> Self {
        Self {
            strict,
            model: Model::new(),
            warnings: Vec::new(),
            namespaces: HashMap::new(),
            seen_model: false,
            object: None,
            color_group: None,
            beam_set: None,
            slice_stack: None,
            metadata: None,
        }
    }

    /// Fail in strict mode, otherwise record a warning and carry on
    fn issue(&mut self, err: Error) -> Result<()> {
        let recoverable = !matches!(
            err,
            Error::Io(_) | Error::Zip(_) | Error::Xml(_) | Error::UnsupportedExtension { .. }
        );
        if self.strict || !recoverable {
            return Err(err);
        }
        warn!(%err, "skipping invalid 3MF content");
        self.warnings.push(err.to_string());
        Ok(())
    }

    fn parse(&mut self, content: &str) -> Result<()> {
        // Whitespace between elements is ignored; metadata text is kept as written
        let mut reader = Reader::from_str(content);
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(ref e) => {
                    if let Err(err) = self.start(e) {
                        self.issue(err)?;
                        let name = e.name().as_ref().to_vec();
                        let mut skipped = Vec::new();
                        reader.read_to_end_into(QName(&name), &mut skipped)?;
                    }
                }
                Event::Empty(ref e) => match self.start(e) {
                    Ok(()) => {
                        if let Err(err) = self.end(e.name().as_ref()) {
                            self.issue(err)?;
                        }
                    }
                    Err(err) => self.issue(err)?,
                },
                Event::End(ref e) => {
                    if let Err(err) = self.end(e.name().as_ref()) {
                        self.issue(err)?;
                    }
                }
                Event::Text(ref text) => {
                    if let Some(metadata) = self.metadata.as_mut() {
                        let value = text
                            .unescape()
                            .map_err(|e| Error::invalid_content(format!("metadata text: {e}")))?;
                        metadata.value.push_str(&value);
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        if !self.seen_model {
            return Err(Error::invalid_content(
                "model part has no <model> element in the core namespace",
            ));
        }
        Ok(())
    }

    fn resolve<'n>(&self, qname: &'n [u8]) -> (Space, &'n [u8]) {
        let (prefix, local) = match qname.iter().position(|b| *b == b':') {
            Some(i) => (&qname[..i], &qname[i + 1..]),
            None => (&qname[..0], qname),
        };
        let space = std::str::from_utf8(prefix)
            .ok()
            .and_then(|p| self.namespaces.get(p))
            .map_or(Space::Unknown, |uri| Space::from_uri(uri));
        (space, local)
    }

    fn start(&mut self, element: &BytesStart<'_>) -> Result<()> {
        let attrs = Attrs::collect(element)?;
        for (prefix, uri) in attrs.namespaces() {
            self.namespaces.insert(prefix.to_string(), uri.to_string());
        }

        let qname = element.name();
        let (space, local) = self.resolve(qname.as_ref());
        match (space, local) {
            (Space::Core, b"model") => self.start_model(&attrs),
            (Space::Core, b"metadata") => self.start_metadata(&attrs),
            (Space::Core, b"object") => self.start_object(&attrs),
            (Space::Core, b"mesh") => {
                self.start_body(|id| ObjectBody::Mesh(MeshObject::new(id)))
            }
            (Space::Core, b"components") => {
                self.start_body(|id| ObjectBody::Components(ComponentsObject::new(id)))
            }
            (Space::Core, b"vertex") => self.vertex(&attrs),
            (Space::Core, b"triangle") => self.triangle(&attrs),
            (Space::Core, b"component") => self.component(&attrs),
            (Space::Core, b"item") => self.build_item(&attrs),
            (Space::Material, b"colorgroup") => {
                let id = attrs.required("id", "colorgroup")?;
                self.color_group = Some(ColorGroup::new(id));
                Ok(())
            }
            (Space::Material, b"color") => self.color(&attrs),
            (Space::BeamLattice, b"beamlattice") => self.start_beam_lattice(&attrs),
            (Space::BeamLattice, b"beam") => self.beam(&attrs),
            (Space::BeamLattice, b"beamset") => {
                self.beam_set = Some(BeamSet {
                    name: attrs.get("name").unwrap_or_default().to_string(),
                    identifier: attrs.get("identifier").unwrap_or_default().to_string(),
                    references: Vec::new(),
                });
                Ok(())
            }
            (Space::BeamLattice, b"ref") => {
                let index = attrs.required("index", "ref")?;
                if let Some(set) = self.beam_set.as_mut() {
                    set.references.push(index);
                }
                Ok(())
            }
            (Space::Slice, b"slicestack") => {
                self.slice_stack = Some(SliceStack {
                    id: attrs.required("id", "slicestack")?,
                    bottom_z: attrs.parse("zbottom")?.unwrap_or(0.0),
                    slice_count: 0,
                    polygon_count: 0,
                });
                Ok(())
            }
            (Space::Slice, b"slice") => {
                if let Some(stack) = self.slice_stack.as_mut() {
                    stack.slice_count += 1;
                }
                Ok(())
            }
            (Space::Slice, b"polygon") => {
                if let Some(stack) = self.slice_stack.as_mut() {
                    stack.polygon_count += 1;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn end(&mut self, qname: &[u8]) -> Result<()> {
        let (space, local) = self.resolve(qname);
        match (space, local) {
            (Space::Core, b"metadata") => match self.metadata.take() {
                Some(metadata) => {
                    let group = match self.object.as_mut() {
                        Some(pending) => &mut pending.metadata,
                        None => self.model.metadata_group_mut(),
                    };
                    let entry = group.add_metadata(metadata.name, metadata.value)?;
                    entry.data_type = metadata.data_type;
                    entry.preserve = metadata.preserve;
                    Ok(())
                }
                None => Ok(()),
            },
            (Space::Core, b"object") => self.end_object(),
            (Space::Material, b"colorgroup") => match self.color_group.take() {
                Some(group) => self.model.insert_color_group(group),
                None => Ok(()),
            },
            (Space::BeamLattice, b"beamset") => {
                let Some(set) = self.beam_set.take() else {
                    return Ok(());
                };
                self.mesh_mut("beamset")?.beam_lattice_mut().add_beam_set(
                    set.name,
                    set.identifier,
                    set.references,
                )?;
                Ok(())
            }
            (Space::Slice, b"slicestack") => match self.slice_stack.take() {
                Some(stack) => self.model.insert_slice_stack(stack),
                None => Ok(()),
            },
            _ => Ok(()),
        }
    }

    fn start_model(&mut self, attrs: &Attrs) -> Result<()> {
        self.seen_model = true;

        if let Some(required) = attrs.get("requiredextensions") {
            for prefix in required.split_whitespace() {
                let uri = self.namespaces.get(prefix).cloned();
                match uri.as_deref().map(Space::from_uri) {
                    Some(Space::Unknown) | None => {
                        return Err(Error::UnsupportedExtension {
                            namespace: uri.unwrap_or_else(|| prefix.to_string()),
                        });
                    }
                    Some(_) => {}
                }
            }
        }

        match attrs.parse::<Unit>("unit") {
            Ok(unit) => self.model.set_unit(unit.unwrap_or_default()),
            Err(err) => self.issue(err)?,
        }
        if let Some(language) = attrs.get("xml:lang") {
            self.model.set_language(language);
        }
        Ok(())
    }

    fn start_metadata(&mut self, attrs: &Attrs) -> Result<()> {
        let name = attrs
            .get("name")
            .filter(|n| !n.is_empty())
            .ok_or_else(|| Error::invalid_content("<metadata> is missing attribute name"))?;
        let preserve = matches!(attrs.get("preserve"), Some("1" | "true"));
        self.metadata = Some(Metadata {
            name: name.to_string(),
            value: String::new(),
            data_type: attrs.get("type").map(str::to_string),
            preserve,
        });
        Ok(())
    }

    fn start_object(&mut self, attrs: &Attrs) -> Result<()> {
        let id: ResourceId = attrs.required("id", "object")?;
        let property = match attrs.parse::<ResourceId>("pid")? {
            Some(pid) => Some((pid, attrs.parse("pindex")?.unwrap_or(0))),
            None => None,
        };
        self.object = Some(PendingObject {
            id,
            name: attrs.get("name").map(str::to_string),
            part_number: attrs.get("partnumber").map(str::to_string),
            object_type: attrs.parse("type")?.unwrap_or_default(),
            property,
            metadata: MetadataGroup::default(),
            body: ObjectBody::Empty,
        });
        Ok(())
    }

    fn start_body(&mut self, body: impl FnOnce(ResourceId) -> ObjectBody) -> Result<()> {
        let pending = self
            .object
            .as_mut()
            .ok_or_else(|| Error::invalid_content("object body outside of <object>"))?;
        if !matches!(pending.body, ObjectBody::Empty) {
            return Err(Error::invalid_content(format!(
                "object {} has more than one body",
                pending.id
            )));
        }
        pending.body = body(pending.id);
        Ok(())
    }

    fn end_object(&mut self) -> Result<()> {
        let Some(pending) = self.object.take() else {
            return Ok(());
        };
        let object = match pending.body {
            ObjectBody::Empty => {
                return Err(Error::invalid_content(format!(
                    "object {} has neither a mesh nor components",
                    pending.id
                )));
            }
            ObjectBody::Mesh(mut mesh) => {
                if let Some(name) = pending.name {
                    mesh.set_name(name);
                }
                if let Some(part_number) = pending.part_number {
                    mesh.set_part_number(part_number);
                }
                if let Err(err) = mesh.set_type(pending.object_type) {
                    // Lenient reads keep the mesh as a model object
                    self.issue(err)?;
                }
                if let Some((resource_id, property_id)) = pending.property {
                    mesh.set_object_level_property(resource_id, property_id);
                }
                *mesh.metadata_group_mut() = pending.metadata;
                Object::Mesh(mesh)
            }
            ObjectBody::Components(mut components) => {
                if let Some(name) = pending.name {
                    components.set_name(name);
                }
                if let Some(part_number) = pending.part_number {
                    components.set_part_number(part_number);
                }
                components.set_type(pending.object_type);
                *components.metadata_group_mut() = pending.metadata;
                Object::Components(components)
            }
        };
        debug!(id = object.resource_id(), "parsed object");
        self.model.insert_object(object)
    }

    fn mesh_mut(&mut self, element: &str) -> Result<&mut MeshObject> {
        match self.object.as_mut().map(|o| &mut o.body) {
            Some(ObjectBody::Mesh(mesh)) => Ok(mesh),
            _ => Err(Error::invalid_content(format!(
                "<{element}> outside of a mesh"
            ))),
        }
    }

    fn vertex_position(attrs: &Attrs) -> Result<Position> {
        Ok(position(
            attrs.required("x", "vertex")?,
            attrs.required("y", "vertex")?,
            attrs.required("z", "vertex")?,
        ))
    }

    /// Unreadable vertices become the origin so later indices stay aligned
    fn vertex(&mut self, attrs: &Attrs) -> Result<()> {
        self.mesh_mut("vertex")?;
        let point = match Self::vertex_position(attrs).and_then(|p| {
            if is_valid_position(&p) {
                Ok(p)
            } else {
                Err(Error::invalid_content(format!(
                    "vertex coordinates out of range: {p}"
                )))
            }
        }) {
            Ok(p) => p,
            Err(err) => {
                self.issue(err)?;
                position(0.0, 0.0, 0.0)
            }
        };
        self.mesh_mut("vertex")?.add_vertex(point)?;
        Ok(())
    }

    fn triangle(&mut self, attrs: &Attrs) -> Result<()> {
        let triangle = Triangle::new(
            attrs.required("v1", "triangle")?,
            attrs.required("v2", "triangle")?,
            attrs.required("v3", "triangle")?,
        );

        let object_property = self.object.as_ref().and_then(|o| o.property);
        let pid = attrs.parse::<ResourceId>("pid")?;
        let p1 = attrs.parse::<u32>("p1")?;
        let props = if pid.is_some() || p1.is_some() {
            let resource_id = pid.or(object_property.map(|(rid, _)| rid));
            let p1 = p1.or(object_property.map(|(_, index)| index));
            match (resource_id, p1) {
                (Some(resource_id), Some(p1)) => Some(TriangleProperties::new(
                    resource_id,
                    p1,
                    attrs.parse("p2")?.unwrap_or(p1),
                    attrs.parse("p3")?.unwrap_or(p1),
                )),
                _ => {
                    return Err(Error::invalid_content(format!(
                        "triangle {:?} has properties without a property resource",
                        triangle.indices
                    )));
                }
            }
        } else {
            None
        };

        let mesh = self.mesh_mut("triangle")?;
        let index = mesh.add_triangle(triangle)?;
        if let Some(props) = props {
            mesh.set_triangle_properties(index, props)?;
        }
        Ok(())
    }

    fn component(&mut self, attrs: &Attrs) -> Result<()> {
        let object_id = attrs.required("objectid", "component")?;
        let transform = attrs.transform()?;
        match self.object.as_mut().map(|o| &mut o.body) {
            Some(ObjectBody::Components(components)) => {
                components.components.push(Component {
                    object_id,
                    transform,
                });
                Ok(())
            }
            _ => Err(Error::invalid_content("<component> outside of <components>")),
        }
    }

    fn build_item(&mut self, attrs: &Attrs) -> Result<()> {
        let item = BuildItem {
            object_id: attrs.required("objectid", "item")?,
            transform: attrs.transform()?,
            part_number: attrs.get("partnumber").map(str::to_string),
        };
        self.model.push_build_item(item);
        Ok(())
    }

    /// Unreadable colors become white so later property ids stay aligned
    fn color(&mut self, attrs: &Attrs) -> Result<()> {
        if self.color_group.is_none() {
            return Err(Error::invalid_content("<color> outside of <colorgroup>"));
        }
        let color = match attrs
            .get("color")
            .ok_or_else(|| Error::invalid_content("<color> is missing attribute color"))
            .and_then(Color::from_hex)
        {
            Ok(color) => color,
            Err(err) => {
                self.issue(err)?;
                Color::rgb(255, 255, 255)
            }
        };
        if let Some(group) = self.color_group.as_mut() {
            group.add_color(color);
        }
        Ok(())
    }

    fn start_beam_lattice(&mut self, attrs: &Attrs) -> Result<()> {
        let min_length: Option<f64> = attrs.parse("minlength")?;
        let radius: Option<f64> = attrs.parse("radius")?;
        let cap: Option<CapMode> = attrs.parse("cap")?;
        let clip_mode: Option<ClipMode> = match attrs.parse("clippingmode")? {
            Some(mode) => Some(mode),
            None => attrs.parse("clipping")?,
        };
        let clipping_mesh: Option<ResourceId> = attrs.parse("clippingmesh")?;
        let representation_mesh: Option<ResourceId> = attrs.parse("representationmesh")?;

        let mut lattice = self.mesh_mut("beamlattice")?.beam_lattice_mut();
        if let Some(min_length) = min_length {
            lattice.set_min_length(min_length)?;
        }
        if let Some(radius) = radius {
            lattice.set_default_radius(radius)?;
        }
        if let Some(cap) = cap {
            lattice.set_default_cap_mode(cap);
        }
        lattice.set_clipping(clip_mode.unwrap_or_default(), clipping_mesh)?;
        lattice.set_representation(representation_mesh);
        Ok(())
    }

    fn beam(&mut self, attrs: &Attrs) -> Result<()> {
        let v1 = attrs.required("v1", "beam")?;
        let v2 = attrs.required("v2", "beam")?;
        let r1: Option<f64> = attrs.parse("r1")?;
        let r2: Option<f64> = attrs.parse("r2")?;
        let cap1: Option<CapMode> = attrs.parse("cap1")?;
        let cap2: Option<CapMode> = attrs.parse("cap2")?;

        let mut lattice = self.mesh_mut("beam")?.beam_lattice_mut();
        let r1 = r1.unwrap_or(lattice.default_radius());
        let cap1 = cap1.unwrap_or(lattice.default_cap_mode());
        let beam = Beam::new(
            v1,
            v2,
            r1,
            r2.unwrap_or(r1),
            cap1,
            cap2.unwrap_or(lattice.default_cap_mode()),
        );
        lattice.add_beam(beam)?;
        Ok(())
    }
}
