/// Sample: convert between 3MF and STL, keeping the file stem
///
/// Usage: cargo run -p tmf-samples --bin convert -- model.stl
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tmf_core::Wrapper;
use tmf_samples::{convert_file, finish, init_logging, parse_args, print_version};

#[derive(Parser)]
#[command(name = "convert")]
#[command(about = "Convert STL to 3MF or 3MF to STL")]
struct Cli {
    /// A `.stl` or `.3mf` file
    file: PathBuf,
}

fn run(cli: Cli) -> Result<()> {
    print_version(&Wrapper::new());
    convert_file(&cli.file)?;
    Ok(())
}

fn main() -> ExitCode {
    init_logging();
    match parse_args::<Cli>() {
        Ok(cli) => finish(run(cli)),
        Err(code) => code,
    }
}
