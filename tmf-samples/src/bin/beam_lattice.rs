/// Sample: twelve beams along the edges of a box, written to `beamlattice.3mf`
///
/// Usage: cargo run -p tmf-samples --bin beam_lattice
use std::process::ExitCode;

use anyhow::{Context, Result};
use tmf_core::{Beam, CapMode, Wrapper};
use tmf_samples::{box_vertices, finish, init_logging, print_version};

fn run() -> Result<()> {
    let wrapper = Wrapper::new();
    print_version(&wrapper);

    let mut model = wrapper.create_model();
    let mesh = model.add_mesh_object();
    mesh.set_name("Beamlattice");
    for vertex in box_vertices(100.0, 200.0, 300.0) {
        mesh.add_vertex(vertex)?;
    }

    let (r0, r1, r2, r3) = (1.0, 1.5, 2.0, 2.5);
    use CapMode::{Butt, HemiSphere, Sphere};
    let beams = vec![
        Beam::new(2, 1, r0, r0, Butt, Butt),
        Beam::new(0, 3, r0, r1, Sphere, Butt),
        Beam::new(4, 5, r0, r2, Sphere, Butt),
        Beam::new(6, 7, r0, r3, HemiSphere, Butt),
        Beam::new(0, 1, r1, r0, HemiSphere, Butt),
        Beam::new(5, 4, r1, r1, Sphere, HemiSphere),
        Beam::new(2, 3, r1, r2, Sphere, Sphere),
        Beam::new(7, 6, r1, r3, Butt, Butt),
        Beam::new(1, 2, r2, r2, Butt, Butt),
        Beam::new(6, 5, r2, r3, HemiSphere, Butt),
        Beam::new(3, 0, r3, r0, Butt, Sphere),
        Beam::new(4, 7, r3, r1, HemiSphere, HemiSphere),
    ];

    let mut lattice = mesh.beam_lattice_mut();
    for beam in beams {
        lattice.add_beam(beam)?;
    }
    lattice.set_min_length(0.005)?;
    let id = mesh.resource_id();

    model.add_build_item(id, wrapper.identity_transform())?;

    model
        .query_writer("3mf")?
        .write_to_file("beamlattice.3mf")
        .context("failed to write beamlattice.3mf")?;

    println!("3MF file with beam lattice written successfully to 'beamlattice.3mf'");
    Ok(())
}

fn main() -> ExitCode {
    init_logging();
    finish(run())
}
