/// Sample: a 100 x 200 x 300 box written to `cube.3mf`
///
/// Usage: cargo run -p tmf-samples --bin cube
use std::process::ExitCode;

use anyhow::{Context, Result};
use tmf_core::Wrapper;
use tmf_samples::{add_box, finish, init_logging, print_version};

fn run() -> Result<()> {
    let wrapper = Wrapper::new();
    print_version(&wrapper);

    let mut model = wrapper.create_model();
    let id = add_box(&mut model, "Box", 100.0, 200.0, 300.0)?;
    model.add_build_item(id, wrapper.identity_transform())?;

    model
        .query_writer("3mf")?
        .write_to_file("cube.3mf")
        .context("failed to write cube.3mf")?;

    println!("3MF file with a cube written successfully to 'cube.3mf'");
    Ok(())
}

fn main() -> ExitCode {
    init_logging();
    finish(run())
}
