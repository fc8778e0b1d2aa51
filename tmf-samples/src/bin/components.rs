/// Sample: three placed copies of one box, written to `components.3mf`
/// and flattened to `components.stl`
///
/// Usage: cargo run -p tmf-samples --bin components
use std::process::ExitCode;

use anyhow::{Context, Result};
use tmf_core::{Transform, Wrapper};
use tmf_samples::{add_box, finish, init_logging, print_version};

fn run() -> Result<()> {
    let wrapper = Wrapper::new();
    print_version(&wrapper);

    let mut model = wrapper.create_model();
    let mesh_id = add_box(&mut model, "Box", 10.0, 20.0, 30.0)?;

    let assembly = model.add_components_object().resource_id();
    for (x, y, z) in [(0.0, 0.0, 0.0), (40.0, 60.0, 80.0), (120.0, 30.0, 70.0)] {
        model.add_component(assembly, mesh_id, Transform::translation(x, y, z))?;
    }
    model.add_build_item(assembly, wrapper.identity_transform())?;

    model
        .query_writer("3mf")?
        .write_to_file("components.3mf")
        .context("failed to write components.3mf")?;
    model
        .query_writer("stl")?
        .write_to_file("components.stl")
        .context("failed to write components.stl")?;

    println!(
        "3MF and STL files with components written successfully to 'components.3mf' and 'components.stl'"
    );
    Ok(())
}

fn main() -> ExitCode {
    init_logging();
    finish(run())
}
