/// Sample: a box with per-corner colors written to `colorcube.3mf`
///
/// Usage: cargo run -p tmf-samples --bin color_cube
use std::process::ExitCode;

use anyhow::{Context, Result};
use tmf_core::{TriangleProperties, Wrapper};
use tmf_samples::{add_box, finish, init_logging, print_version};

fn run() -> Result<()> {
    let wrapper = Wrapper::new();
    print_version(&wrapper);

    let mut model = wrapper.create_model();
    let mesh_id = add_box(&mut model, "Colored Box", 100.0, 200.0, 300.0)?;

    let group = model.add_color_group();
    let red = group.add_color(wrapper.rgba_to_color(255, 0, 0, 255));
    let green = group.add_color(wrapper.rgba_to_color(0, 255, 0, 255));
    let blue = group.add_color(wrapper.rgba_to_color(0, 0, 255, 255));
    let orange = group.add_color(wrapper.rgba_to_color(255, 128, 0, 255));
    let yellow = group.add_color(wrapper.rgba_to_color(255, 255, 0, 255));
    let group_id = group.resource_id();

    // Bottom and top are solid, the sides blend across each face
    let mut corners = vec![[red; 3], [red; 3], [green; 3], [green; 3], [blue; 3], [blue; 3]];
    for side in 0..6 {
        corners.push(if side % 2 == 0 {
            [orange, red, yellow]
        } else {
            [yellow, green, orange]
        });
    }

    let mesh = model.mesh_object_mut(mesh_id)?;
    for (index, [p1, p2, p3]) in corners.into_iter().enumerate() {
        mesh.set_triangle_properties(
            index as u32,
            TriangleProperties::new(group_id, p1, p2, p3),
        )?;
    }
    mesh.set_object_level_property(group_id, red);

    model.add_build_item(mesh_id, wrapper.identity_transform())?;

    model
        .query_writer("3mf")?
        .write_to_file("colorcube.3mf")
        .context("failed to write colorcube.3mf")?;

    println!("3MF file with a colored cube written successfully to 'colorcube.3mf'");
    Ok(())
}

fn main() -> ExitCode {
    init_logging();
    finish(run())
}
