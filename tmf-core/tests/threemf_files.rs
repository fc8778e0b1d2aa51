/// File-level 3MF tests through the named-format readers and writers
use std::fs::File;
use std::io::Write;
use std::path::Path;

use approx::assert_relative_eq;
use tmf_core::{
    position, Beam, CapMode, Color, Error, Model, ObjectType, Transform, Triangle,
    TriangleProperties, Unit,
};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

fn tetrahedron(model: &mut Model, name: &str) -> u32 {
    let mesh = model.add_mesh_object();
    mesh.set_name(name);
    mesh.set_geometry(
        &[
            position(0.0, 0.0, 0.0),
            position(10.0, 0.0, 0.0),
            position(0.0, 10.0, 0.0),
            position(0.0, 0.0, 10.0),
        ],
        &[
            Triangle::new(0, 2, 1),
            Triangle::new(0, 1, 3),
            Triangle::new(1, 2, 3),
            Triangle::new(2, 0, 3),
        ],
    )
    .unwrap();
    mesh.resource_id()
}

fn write_package(path: &Path, model_xml: &str) {
    let mut zip = ZipWriter::new(File::create(path).unwrap());
    let options = SimpleFileOptions::default();
    zip.start_file("[Content_Types].xml", options).unwrap();
    zip.write_all(
        br#"<?xml version="1.0" encoding="UTF-8"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="model" ContentType="application/vnd.ms-package.3dmanufacturing-3dmodel+xml"/>
</Types>"#,
    )
    .unwrap();
    zip.start_file("3D/3dmodel.model", options).unwrap();
    zip.write_all(model_xml.as_bytes()).unwrap();
    zip.finish().unwrap();
}

const BAD_TRIANGLE_MODEL: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<model unit="millimeter" xmlns="http://schemas.microsoft.com/3dmanufacturing/core/2015/02">
  <metadata name="Title">Broken</metadata>
  <resources>
    <object id="1" type="model">
      <mesh>
        <vertices>
          <vertex x="0" y="0" z="0"/>
          <vertex x="1" y="0" z="0"/>
          <vertex x="0" y="1" z="0"/>
        </vertices>
        <triangles>
          <triangle v1="0" v2="1" v3="2"/>
          <triangle v1="0" v2="1" v3="7"/>
        </triangles>
      </mesh>
    </object>
  </resources>
  <build>
    <item objectid="1"/>
  </build>
</model>"#;

#[test]
fn test_file_round_trip_keeps_everything() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("full.3mf");

    let mut model = Model::new();
    model.set_unit(Unit::CentiMeter);
    model.set_language("de-DE");
    let title = model
        .metadata_group_mut()
        .add_metadata("Title", "Round trip")
        .unwrap();
    title.preserve = true;

    let group = model.add_color_group();
    let red = group.add_color(Color::rgb(255, 0, 0));
    let translucent = group.add_color(Color::rgba(0, 0, 255, 128));
    let group_id = group.resource_id();

    let part = tetrahedron(&mut model, "Part");
    {
        let mesh = model.mesh_object_mut(part).unwrap();
        mesh.set_part_number("P-100");
        mesh.set_object_level_property(group_id, red);
        mesh.set_triangle_properties(1, TriangleProperties::new(group_id, red, translucent, red))
            .unwrap();
        let mut lattice = mesh.beam_lattice_mut();
        lattice
            .add_beam(Beam::new(0, 3, 0.5, 0.75, CapMode::Butt, CapMode::HemiSphere))
            .unwrap();
        lattice.set_min_length(0.01).unwrap();
        lattice.add_beam_set("edges", "set-1", vec![0]).unwrap();
    }

    let assembly = model.add_components_object().resource_id();
    model
        .add_component(assembly, part, Transform::translation(5.0, 0.0, 0.0))
        .unwrap();
    model
        .add_build_item(assembly, Transform::translation(0.0, 0.0, 12.5))
        .unwrap()
        .part_number = Some("B-1".to_string());

    model.query_writer("3mf").unwrap().write_to_file(&path).unwrap();

    let mut read = Model::new();
    read.query_reader("3mf").unwrap().read_from_file(&path).unwrap();

    assert_eq!(read.unit(), Unit::CentiMeter);
    assert_eq!(read.language(), "de-DE");
    let title = read.metadata_group().by_name("Title").unwrap();
    assert_eq!(title.value, "Round trip");
    assert!(title.preserve);

    assert_eq!(read.objects().len(), 2);
    let mesh = read.mesh_object(part).unwrap();
    assert_eq!(mesh.name(), Some("Part"));
    assert_eq!(mesh.part_number(), Some("P-100"));
    assert_eq!(mesh.vertex_count(), 4);
    assert_eq!(mesh.triangle_count(), 4);
    assert_eq!(mesh.object_level_property(), Some((group_id, red)));
    assert_eq!(
        mesh.triangle_properties(1),
        Some(TriangleProperties::new(group_id, red, translucent, red))
    );

    let lattice = mesh.beam_lattice();
    assert_eq!(lattice.beam_count(), 1);
    let beam = lattice.beam(0).unwrap();
    assert_eq!(beam.indices, [0, 3]);
    assert_relative_eq!(beam.radii[0], 0.5);
    assert_relative_eq!(beam.radii[1], 0.75);
    assert_eq!(beam.cap_modes, [CapMode::Butt, CapMode::HemiSphere]);
    assert_relative_eq!(lattice.min_length(), 0.01);
    assert_eq!(lattice.beam_sets()[0].references, vec![0]);

    let colors = read.color_group(group_id).unwrap();
    assert_eq!(colors.color(translucent), Some(Color::rgba(0, 0, 255, 128)));

    let components = read.components_object(assembly).unwrap();
    assert_eq!(components.component_count(), 1);
    let placed = components.component(0).unwrap();
    assert_eq!(placed.object_id, part);
    let moved = placed.transform.apply(&position(0.0, 0.0, 0.0));
    assert_relative_eq!(moved.x, 5.0, epsilon = 1e-5);

    let item = &read.build_items()[0];
    assert_eq!(item.object_id, assembly);
    assert_eq!(item.part_number.as_deref(), Some("B-1"));
    assert!(item.has_transform());

    assert_eq!(read, model);
}

#[test]
fn test_flattened_build_applies_component_then_item_transform() {
    let mut model = Model::new();
    let part = tetrahedron(&mut model, "Part");
    let assembly = model.add_components_object().resource_id();
    model
        .add_component(assembly, part, Transform::scale(2.0, 2.0, 2.0))
        .unwrap();
    model
        .add_build_item(assembly, Transform::translation(100.0, 0.0, 0.0))
        .unwrap();

    let facets = model.flatten_build().unwrap();
    assert_eq!(facets.len(), 4);
    // Vertex (10, 0, 0) is scaled first, then moved
    let corner = facets[0][2];
    assert_relative_eq!(corner.x, 120.0, epsilon = 1e-4);
    assert_relative_eq!(corner.y, 0.0, epsilon = 1e-4);
}

#[test]
fn test_strict_reading_rejects_bad_triangle() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.3mf");
    write_package(&path, BAD_TRIANGLE_MODEL);

    let mut model = Model::new();
    let mut reader = model.query_reader("3mf").unwrap();
    assert!(reader.strict_mode_active());
    assert!(reader.read_from_file(&path).is_err());
    assert!(model.objects().is_empty());
}

#[test]
fn test_lenient_reading_skips_bad_triangle() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.3mf");
    write_package(&path, BAD_TRIANGLE_MODEL);

    let mut model = Model::new();
    let mut reader = model.query_reader("3mf").unwrap();
    reader.set_strict_mode_active(false);
    reader.read_from_file(&path).unwrap();
    assert!(reader.warning_count() >= 1);

    let mesh = model.mesh_object(1).unwrap();
    assert_eq!(mesh.object_type(), ObjectType::Model);
    assert_eq!(mesh.triangle_count(), 1);
    assert_eq!(model.build_item_count(), 1);
    assert_eq!(model.metadata_group().by_name("Title").unwrap().value, "Broken");
}

#[test]
fn test_missing_file_is_file_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let mut model = Model::new();
    let err = model
        .query_reader("3mf")
        .unwrap()
        .read_from_file(dir.path().join("absent.3mf"))
        .unwrap_err();
    assert!(matches!(err, Error::FileNotFound { .. }));
}

#[test]
fn test_unknown_format_name() {
    let mut model = Model::new();
    assert!(matches!(
        model.query_reader("obj"),
        Err(Error::UnknownFormat(name)) if name == "obj"
    ));
    assert!(matches!(
        model.query_writer("amf"),
        Err(Error::UnknownFormat(_))
    ));
}

#[test]
fn test_lattice_on_support_mesh_is_not_written() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("support.3mf");

    let mut model = Model::new();
    let part = tetrahedron(&mut model, "Support");
    let mesh = model.mesh_object_mut(part).unwrap();
    mesh.set_type(ObjectType::Support).unwrap();
    mesh.beam_lattice_mut()
        .add_beam(Beam::new(0, 1, 1.0, 1.0, CapMode::Sphere, CapMode::Sphere))
        .unwrap();

    assert!(matches!(
        model.validate(),
        Err(Error::InvalidParam { .. })
    ));
    assert!(model.query_writer("3mf").unwrap().write_to_file(&path).is_err());
    assert!(!path.exists());
}
