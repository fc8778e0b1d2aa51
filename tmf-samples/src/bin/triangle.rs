/// Sample: a single triangle written to `triangle.3mf`
///
/// Usage: cargo run -p tmf-samples --bin triangle
use std::process::ExitCode;

use anyhow::{Context, Result};
use tmf_core::{position, Triangle, Wrapper};
use tmf_samples::{finish, init_logging, print_version};

fn run() -> Result<()> {
    let wrapper = Wrapper::new();
    print_version(&wrapper);

    let mut model = wrapper.create_model();
    let mesh = model.add_mesh_object();
    mesh.set_name("Triangle");
    for vertex in [
        position(0.0, 0.0, 0.0),
        position(100.0, 0.0, 0.0),
        position(0.0, 100.0, 0.0),
    ] {
        mesh.add_vertex(vertex)?;
    }
    mesh.add_triangle(Triangle::new(0, 1, 2))?;
    let id = mesh.resource_id();

    model.add_build_item(id, wrapper.identity_transform())?;

    model
        .query_writer("3mf")?
        .write_to_file("triangle.3mf")
        .context("failed to write triangle.3mf")?;

    println!("3MF file with a triangle written successfully to 'triangle.3mf'");
    Ok(())
}

fn main() -> ExitCode {
    init_logging();
    finish(run())
}
