/// Shared helpers for the tmf-core sample programs
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use tmf_core::{position, Format, Model, Position, ResourceId, Triangle, Wrapper};
use tracing_subscriber::EnvFilter;

/// Corner indices of the twelve outward-facing triangles of a box built
/// from [`box_vertices`]
pub const BOX_TRIANGLES: [[u32; 3]; 12] = [
    [2, 1, 0],
    [0, 3, 2],
    [4, 5, 6],
    [6, 7, 4],
    [0, 1, 5],
    [5, 4, 0],
    [2, 3, 7],
    [7, 6, 2],
    [1, 2, 6],
    [6, 5, 1],
    [3, 0, 4],
    [4, 7, 3],
];

/// Install a stderr subscriber; `RUST_LOG` overrides the `info` default
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // A second install (tests) keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Print the short version line every sample starts with
pub fn print_version(wrapper: &Wrapper) {
    let (major, minor, micro) = wrapper.library_version();
    println!("tmf-core version: {major}.{minor}.{micro}");
}

/// Run a sample body, logging the error chain on failure
pub fn finish(result: Result<()>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

/// Parse command line arguments; help and usage errors become the exit code
pub fn parse_args<T: clap::Parser>() -> std::result::Result<T, ExitCode> {
    parse_args_from(std::env::args_os())
}

pub fn parse_args_from<T, I>(args: I) -> std::result::Result<T, ExitCode>
where
    T: clap::Parser,
    I: IntoIterator,
    I::Item: Into<OsString> + Clone,
{
    T::try_parse_from(args).map_err(|err| {
        let _ = err.print();
        if err.use_stderr() {
            ExitCode::FAILURE
        } else {
            ExitCode::SUCCESS
        }
    })
}

/// Corners of an axis-aligned box with one corner at the origin
pub fn box_vertices(size_x: f32, size_y: f32, size_z: f32) -> [Position; 8] {
    [
        position(0.0, 0.0, 0.0),
        position(size_x, 0.0, 0.0),
        position(size_x, size_y, 0.0),
        position(0.0, size_y, 0.0),
        position(0.0, 0.0, size_z),
        position(size_x, 0.0, size_z),
        position(size_x, size_y, size_z),
        position(0.0, size_y, size_z),
    ]
}

pub fn box_triangles() -> Vec<Triangle> {
    BOX_TRIANGLES
        .iter()
        .map(|&[a, b, c]| Triangle::new(a, b, c))
        .collect()
}

/// Add a named box mesh to `model` and return its resource id
pub fn add_box(
    model: &mut Model,
    name: &str,
    size_x: f32,
    size_y: f32,
    size_z: f32,
) -> Result<ResourceId> {
    let mesh = model.add_mesh_object();
    mesh.set_name(name);
    mesh.set_geometry(&box_vertices(size_x, size_y, size_z), &box_triangles())
        .with_context(|| format!("failed to build box '{name}'"))?;
    Ok(mesh.resource_id())
}

/// Formats of a conversion and the file it writes, chosen from the input
/// extension: `.stl` becomes `.3mf` and `.3mf` becomes `.stl`
pub fn conversion_plan(input: &Path) -> Result<(Format, Format, PathBuf)> {
    let extension = input
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    let source = Format::from_path(input)
        .with_context(|| format!("unknown input file extension: {extension}"))?;
    let target = match source {
        Format::Stl => Format::ThreeMf,
        Format::ThreeMf => Format::Stl,
    };
    Ok((source, target, input.with_extension(target.extension())))
}

/// Read `input` and write it back out in the other format
pub fn convert_file(input: &Path) -> Result<PathBuf> {
    let (source, target, output) = conversion_plan(input)?;
    let mut model = Wrapper::new().create_model();

    println!("Reading {}...", input.display());
    model
        .query_reader(source.name())?
        .read_from_file(input)
        .with_context(|| format!("failed to read {}", input.display()))?;

    println!("Writing {}...", output.display());
    model
        .query_writer(target.name())?
        .write_to_file(&output)
        .with_context(|| format!("failed to write {}", output.display()))?;

    println!("Done");
    Ok(output)
}

/// Lines describing metadata, slice stacks and objects of a model
pub fn model_report(model: &Model) -> Vec<String> {
    let metadata = model
        .metadata_group()
        .iter()
        .map(|m| format!("Metadata: {} = {}", m.name, m.value));
    let slices = model
        .slice_stacks()
        .iter()
        .map(|s| format!("Slice Stack: {}", s.id));
    let objects = model.objects().iter().map(|object| {
        let kind = if object.is_mesh_object() {
            "Mesh Object"
        } else {
            "Components Object"
        };
        format!("{kind}: {}", object.resource_id())
    });
    metadata.chain(slices).chain(objects).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tmf_core::Transform;

    #[derive(Parser, Debug)]
    #[command(name = "sample")]
    struct Cli {
        file: PathBuf,
    }

    fn same_code(actual: ExitCode, expected: ExitCode) -> bool {
        format!("{actual:?}") == format!("{expected:?}")
    }

    #[test]
    fn test_parse_args_exit_codes() {
        let cli: Cli = parse_args_from(["sample", "model.3mf"]).unwrap();
        assert_eq!(cli.file, PathBuf::from("model.3mf"));

        let missing = parse_args_from::<Cli, _>(["sample"]).unwrap_err();
        assert!(same_code(missing, ExitCode::FAILURE));

        let extra = parse_args_from::<Cli, _>(["sample", "a.stl", "b.stl"]).unwrap_err();
        assert!(same_code(extra, ExitCode::FAILURE));

        let help = parse_args_from::<Cli, _>(["sample", "--help"]).unwrap_err();
        assert!(same_code(help, ExitCode::SUCCESS));
    }

    #[test]
    fn test_finish_exit_codes() {
        assert!(same_code(finish(Ok(())), ExitCode::SUCCESS));
        let failed = finish(Err(anyhow::anyhow!("unknown input file extension: obj")));
        assert!(same_code(failed, ExitCode::FAILURE));

        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.stl");
        assert!(same_code(finish(convert_file(&missing).map(|_| ())), ExitCode::FAILURE));
    }

    #[test]
    fn test_box_geometry() {
        let mut model = Model::new();
        let id = add_box(&mut model, "Box", 10.0, 20.0, 30.0).unwrap();
        let mesh = model.mesh_object(id).unwrap();
        assert_eq!(mesh.name(), Some("Box"));
        assert_eq!(mesh.vertex_count(), 8);
        assert_eq!(mesh.triangle_count(), 12);
        assert_eq!(mesh.vertex(6), Some(position(10.0, 20.0, 30.0)));
    }

    #[test]
    fn test_box_normals_point_outward() {
        let mut model = Model::new();
        let id = add_box(&mut model, "Box", 2.0, 2.0, 2.0).unwrap();
        let mesh = model.mesh_object(id).unwrap();
        let center = position(1.0, 1.0, 1.0);
        for index in 0..mesh.triangle_count() {
            let normal = mesh.triangle_normal(index).unwrap();
            let corner = mesh.triangle_corners(index).unwrap()[0];
            assert!(normal.dot(&(corner - center)) > 0.0, "triangle {index}");
        }
    }

    #[test]
    fn test_conversion_plan() {
        let (source, target, output) = conversion_plan(Path::new("dir/part.stl")).unwrap();
        assert_eq!(source, Format::Stl);
        assert_eq!(target, Format::ThreeMf);
        assert_eq!(output, PathBuf::from("dir/part.3mf"));

        let (_, target, output) = conversion_plan(Path::new("part.3MF")).unwrap();
        assert_eq!(target, Format::Stl);
        assert_eq!(output, PathBuf::from("part.stl"));

        let err = conversion_plan(Path::new("part.obj")).unwrap_err();
        assert!(err.to_string().contains("obj"));
    }

    #[test]
    fn test_convert_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("box.3mf");
        let mut model = Model::new();
        let id = add_box(&mut model, "Box", 1.0, 1.0, 1.0).unwrap();
        model.add_build_item(id, Transform::identity()).unwrap();
        model.query_writer("3mf").unwrap().write_to_file(&source).unwrap();

        let stl = convert_file(&source).unwrap();
        assert_eq!(stl, dir.path().join("box.stl"));

        std::fs::remove_file(&source).unwrap();
        let back = convert_file(&stl).unwrap();
        assert_eq!(back, source);

        let mut read = Model::new();
        read.query_reader("3mf").unwrap().read_from_file(&back).unwrap();
        assert_eq!(read.mesh_object(1).unwrap().triangle_count(), 12);
        assert_eq!(read.mesh_object(1).unwrap().vertex_count(), 8);
    }

    #[test]
    fn test_model_report() {
        let mut model = Model::new();
        model
            .metadata_group_mut()
            .add_metadata("Title", "Sample")
            .unwrap();
        let mesh = add_box(&mut model, "Box", 1.0, 1.0, 1.0).unwrap();
        let assembly = model.add_components_object().resource_id();
        model
            .add_component(assembly, mesh, Transform::identity())
            .unwrap();

        assert_eq!(
            model_report(&model),
            vec![
                "Metadata: Title = Sample".to_string(),
                format!("Mesh Object: {mesh}"),
                format!("Components Object: {assembly}"),
            ]
        );
    }
}
