/// 3MF writer: package layout and model XML generation
use std::io::{Cursor, Seek, Write};
use std::path::Path;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use tracing::{debug, info, warn};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use super::{
    format_float, CONTENT_TYPES_PATH, CONTENT_TYPES_XML, MODEL_PATH, NAMESPACE_BEAM_LATTICE,
    NAMESPACE_CORE, NAMESPACE_MATERIAL, RELS_PATH, RELS_XML,
};
use crate::beam::{BeamLattice, ClipMode};
use crate::color::ColorGroup;
use crate::error::{Error, Result};
use crate::model::{Metadata, MetadataGroup, Model};
use crate::object::{ComponentsObject, MeshObject, Object};
use crate::transform::Transform;

type XmlWriter = Writer<Cursor<Vec<u8>>>;

/// Writes a model as a 3MF package
pub struct Writer3mf<'a> {
    model: &'a Model,
    decimal_precision: usize,
}

impl<'a> Writer3mf<'a> {
    pub fn new(model: &'a Model) -> Self {
        Self {
            model,
            decimal_precision: 6,
        }
    }

    /// Digits after the decimal point for coordinates, radii and transforms
    pub fn set_decimal_precision(&mut self, precision: usize) {
        self.decimal_precision = precision;
    }

    pub fn decimal_precision(&self) -> usize {
        self.decimal_precision
    }

    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        // An existing file is only replaced once the whole output is built
        let data = self.write_to_buffer()?;
        std::fs::write(path, data)?;
        info!(path = %path.display(), "wrote 3MF file");
        Ok(())
    }

    pub fn write_to_buffer(&self) -> Result<Vec<u8>> {
        let mut buffer = Cursor::new(Vec::new());
        self.write_to(&mut buffer)?;
        Ok(buffer.into_inner())
    }

    pub fn write_to<W: Write + Seek>(&self, sink: W) -> Result<()> {
        self.model.validate()?;
        let model_xml = self.model_xml()?;

        let mut zip = ZipWriter::new(sink);
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

        zip.start_file(CONTENT_TYPES_PATH, options)?;
        zip.write_all(CONTENT_TYPES_XML.as_bytes())?;

        zip.start_file(RELS_PATH, options)?;
        zip.write_all(RELS_XML.as_bytes())?;

        zip.start_file(MODEL_PATH, options)?;
        zip.write_all(&model_xml)?;

        let mut sink = zip.finish()?;
        sink.flush()?;
        debug!(bytes = model_xml.len(), "wrote model part");
        Ok(())
    }

    fn float(&self, value: f64) -> String {
        format_float(value, self.decimal_precision)
    }

    fn transform(&self, transform: &Transform) -> String {
        transform.to_3mf_string(self.decimal_precision)
    }

    /// The `3D/3dmodel.model` document
    fn model_xml(&self) -> Result<Vec<u8>> {
        let model = self.model;
        let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

        let has_colors = !model.color_groups().is_empty();
        let has_lattice = model
            .objects()
            .iter()
            .any(|o| o.as_mesh().is_some_and(MeshObject::has_beam_lattice));
        if !model.slice_stacks().is_empty() {
            warn!(
                count = model.slice_stacks().len(),
                "slice stacks are not written"
            );
        }

        let mut root = BytesStart::new("model");
        root.push_attribute(("unit", model.unit().as_str()));
        root.push_attribute(("xml:lang", model.language()));
        root.push_attribute(("xmlns", NAMESPACE_CORE));
        if has_colors {
            root.push_attribute(("xmlns:m", NAMESPACE_MATERIAL));
        }
        if has_lattice {
            root.push_attribute(("xmlns:b", NAMESPACE_BEAM_LATTICE));
            root.push_attribute(("requiredextensions", "b"));
        }
        writer.write_event(Event::Start(root))?;

        for metadata in model.metadata_group().iter() {
            write_metadata(&mut writer, metadata)?;
        }

        writer.write_event(Event::Start(BytesStart::new("resources")))?;
        for id in model.resource_write_order()? {
            if let Some(group) = model.color_group(id) {
                write_color_group(&mut writer, group)?;
                continue;
            }
            match model.object(id) {
                Some(Object::Mesh(mesh)) => self.write_mesh_object(&mut writer, mesh)?,
                Some(Object::Components(components)) => {
                    self.write_components_object(&mut writer, components)?
                }
                None => return Err(Error::ResourceNotFound(id)),
            }
        }
        writer.write_event(Event::End(BytesEnd::new("resources")))?;

        writer.write_event(Event::Start(BytesStart::new("build")))?;
        for item in model.build_items() {
            let mut element = BytesStart::new("item");
            element.push_attribute(("objectid", item.object_id.to_string().as_str()));
            if item.has_transform() {
                element.push_attribute(("transform", self.transform(&item.transform).as_str()));
            }
            if let Some(part_number) = &item.part_number {
                element.push_attribute(("partnumber", part_number.as_str()));
            }
            writer.write_event(Event::Empty(element))?;
        }
        writer.write_event(Event::End(BytesEnd::new("build")))?;

        writer.write_event(Event::End(BytesEnd::new("model")))?;
        Ok(writer.into_inner().into_inner())
    }

    fn object_start(
        id: u32,
        name: Option<&str>,
        part_number: Option<&str>,
        object_type: &str,
    ) -> BytesStart<'static> {
        let mut element = BytesStart::new("object");
        element.push_attribute(("id", id.to_string().as_str()));
        if let Some(name) = name {
            element.push_attribute(("name", name));
        }
        if let Some(part_number) = part_number {
            element.push_attribute(("partnumber", part_number));
        }
        element.push_attribute(("type", object_type));
        element
    }

    fn write_mesh_object(&self, writer: &mut XmlWriter, mesh: &MeshObject) -> Result<()> {
        let mut element = Self::object_start(
            mesh.resource_id(),
            mesh.name(),
            mesh.part_number(),
            mesh.object_type().as_str(),
        );
        if let Some((resource_id, property_id)) = mesh.object_level_property() {
            element.push_attribute(("pid", resource_id.to_string().as_str()));
            element.push_attribute(("pindex", property_id.to_string().as_str()));
        }
        writer.write_event(Event::Start(element))?;
        write_metadata_group(writer, mesh.metadata_group())?;
        writer.write_event(Event::Start(BytesStart::new("mesh")))?;

        writer.write_event(Event::Start(BytesStart::new("vertices")))?;
        for v in mesh.vertices() {
            let mut vertex = BytesStart::new("vertex");
            vertex.push_attribute(("x", self.float(f64::from(v.x)).as_str()));
            vertex.push_attribute(("y", self.float(f64::from(v.y)).as_str()));
            vertex.push_attribute(("z", self.float(f64::from(v.z)).as_str()));
            writer.write_event(Event::Empty(vertex))?;
        }
        writer.write_event(Event::End(BytesEnd::new("vertices")))?;

        writer.write_event(Event::Start(BytesStart::new("triangles")))?;
        for (index, triangle) in mesh.triangles().iter().enumerate() {
            let mut element = BytesStart::new("triangle");
            let [v1, v2, v3] = triangle.indices;
            element.push_attribute(("v1", v1.to_string().as_str()));
            element.push_attribute(("v2", v2.to_string().as_str()));
            element.push_attribute(("v3", v3.to_string().as_str()));
            if let Some(props) = mesh.triangle_properties(index as u32) {
                let [p1, p2, p3] = props.property_ids;
                element.push_attribute(("pid", props.resource_id.to_string().as_str()));
                element.push_attribute(("p1", p1.to_string().as_str()));
                if !props.is_uniform() {
                    element.push_attribute(("p2", p2.to_string().as_str()));
                    element.push_attribute(("p3", p3.to_string().as_str()));
                }
            }
            writer.write_event(Event::Empty(element))?;
        }
        writer.write_event(Event::End(BytesEnd::new("triangles")))?;

        if mesh.has_beam_lattice() {
            self.write_beam_lattice(writer, mesh.beam_lattice())?;
        }

        writer.write_event(Event::End(BytesEnd::new("mesh")))?;
        writer.write_event(Event::End(BytesEnd::new("object")))?;
        debug!(
            id = mesh.resource_id(),
            vertices = mesh.vertex_count(),
            triangles = mesh.triangle_count(),
            "wrote mesh object"
        );
        Ok(())
    }

    fn write_beam_lattice(&self, writer: &mut XmlWriter, lattice: &BeamLattice) -> Result<()> {
        let mut element = BytesStart::new("b:beamlattice");
        element.push_attribute(("minlength", self.float(lattice.min_length()).as_str()));
        element.push_attribute(("radius", self.float(lattice.default_radius()).as_str()));
        element.push_attribute(("cap", lattice.default_cap_mode().as_str()));
        if let (mode, Some(mesh_id)) = lattice.clipping() {
            if mode != ClipMode::None {
                element.push_attribute(("clippingmode", mode.as_str()));
                element.push_attribute(("clippingmesh", mesh_id.to_string().as_str()));
            }
        }
        if let Some(mesh_id) = lattice.representation() {
            element.push_attribute(("representationmesh", mesh_id.to_string().as_str()));
        }
        writer.write_event(Event::Start(element))?;

        writer.write_event(Event::Start(BytesStart::new("b:beams")))?;
        for beam in lattice.beams() {
            let mut element = BytesStart::new("b:beam");
            element.push_attribute(("v1", beam.indices[0].to_string().as_str()));
            element.push_attribute(("v2", beam.indices[1].to_string().as_str()));
            element.push_attribute(("r1", self.float(beam.radii[0]).as_str()));
            if beam.radii[1] != beam.radii[0] {
                element.push_attribute(("r2", self.float(beam.radii[1]).as_str()));
            }
            for (key, cap) in [("cap1", beam.cap_modes[0]), ("cap2", beam.cap_modes[1])] {
                if cap != lattice.default_cap_mode() {
                    element.push_attribute((key, cap.as_str()));
                }
            }
            writer.write_event(Event::Empty(element))?;
        }
        writer.write_event(Event::End(BytesEnd::new("b:beams")))?;

        if !lattice.beam_sets().is_empty() {
            writer.write_event(Event::Start(BytesStart::new("b:beamsets")))?;
            for set in lattice.beam_sets() {
                let mut element = BytesStart::new("b:beamset");
                element.push_attribute(("name", set.name.as_str()));
                element.push_attribute(("identifier", set.identifier.as_str()));
                writer.write_event(Event::Start(element))?;
                for index in &set.references {
                    let mut reference = BytesStart::new("b:ref");
                    reference.push_attribute(("index", index.to_string().as_str()));
                    writer.write_event(Event::Empty(reference))?;
                }
                writer.write_event(Event::End(BytesEnd::new("b:beamset")))?;
            }
            writer.write_event(Event::End(BytesEnd::new("b:beamsets")))?;
        }

        writer.write_event(Event::End(BytesEnd::new("b:beamlattice")))?;
        Ok(())
    }

    fn write_components_object(
        &self,
        writer: &mut XmlWriter,
        components: &ComponentsObject,
    ) -> Result<()> {
        let element = Self::object_start(
            components.resource_id(),
            components.name(),
            components.part_number(),
            components.object_type().as_str(),
        );
        writer.write_event(Event::Start(element))?;
        write_metadata_group(writer, components.metadata_group())?;
        writer.write_event(Event::Start(BytesStart::new("components")))?;
        for component in components.components() {
            let mut element = BytesStart::new("component");
            element.push_attribute(("objectid", component.object_id.to_string().as_str()));
            if !component.transform.is_identity() {
                element.push_attribute(("transform", self.transform(&component.transform).as_str()));
            }
            writer.write_event(Event::Empty(element))?;
        }
        writer.write_event(Event::End(BytesEnd::new("components")))?;
        writer.write_event(Event::End(BytesEnd::new("object")))?;
        Ok(())
    }
}

fn write_metadata(writer: &mut XmlWriter, metadata: &Metadata) -> Result<()> {
    let mut element = BytesStart::new("metadata");
    element.push_attribute(("name", metadata.name.as_str()));
    if metadata.preserve {
        element.push_attribute(("preserve", "1"));
    }
    if let Some(data_type) = &metadata.data_type {
        element.push_attribute(("type", data_type.as_str()));
    }
    writer.write_event(Event::Start(element))?;
    writer.write_event(Event::Text(BytesText::new(&metadata.value)))?;
    writer.write_event(Event::End(BytesEnd::new("metadata")))?;
    Ok(())
}

/// Object metadata precedes the mesh or components body
fn write_metadata_group(writer: &mut XmlWriter, group: &MetadataGroup) -> Result<()> {
    if group.metadata_count() == 0 {
        return Ok(());
    }
    writer.write_event(Event::Start(BytesStart::new("metadatagroup")))?;
    for metadata in group.iter() {
        write_metadata(writer, metadata)?;
    }
    writer.write_event(Event::End(BytesEnd::new("metadatagroup")))?;
    Ok(())
}

fn write_color_group(writer: &mut XmlWriter, group: &ColorGroup) -> Result<()> {
    let mut element = BytesStart::new("m:colorgroup");
    element.push_attribute(("id", group.resource_id().to_string().as_str()));
    writer.write_event(Event::Start(element))?;
    for color in group.colors() {
        let mut element = BytesStart::new("m:color");
        element.push_attribute(("color", color.to_hex().as_str()));
        writer.write_event(Event::Empty(element))?;
    }
    writer.write_event(Event::End(BytesEnd::new("m:colorgroup")))?;
    Ok(())
}
