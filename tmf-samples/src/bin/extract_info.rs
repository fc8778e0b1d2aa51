/// Sample: print the metadata, slice stacks and objects of a 3MF file
///
/// Usage: cargo run -p tmf-samples --bin extract_info -- model.3mf
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tmf_core::Wrapper;
use tmf_samples::{finish, init_logging, model_report, parse_args};

#[derive(Parser)]
#[command(name = "extract_info")]
#[command(about = "Show what a 3MF file contains")]
struct Cli {
    /// The 3MF file to inspect
    file: PathBuf,
}

fn run(cli: Cli) -> Result<()> {
    let wrapper = Wrapper::new();
    let mut model = wrapper.create_model();

    let mut reader = model.query_reader("3mf")?;
    reader.set_strict_mode_active(false);
    reader
        .read_from_file(&cli.file)
        .with_context(|| format!("failed to read {}", cli.file.display()))?;
    let warnings = reader.warning_count();
    if warnings > 0 {
        tracing::info!(warnings, "read with warnings");
    }

    println!("tmf-core version: {}", wrapper.version_string());
    for line in model_report(&model) {
        println!("{line}");
    }
    Ok(())
}

fn main() -> ExitCode {
    init_logging();
    match parse_args::<Cli>() {
        Ok(cli) => finish(run(cli)),
        Err(code) => code,
    }
}
