use std::process::ExitCode;

use clap::Parser;
use wipe::{cli, logger};

fn main() -> ExitCode {
    // Initialize session log (overwrites previous session log)
    logger::init();

    let args = cli::CliArgs::parse();
    wipe::log_info!("Batch run over {} input pattern(s)", args.input.len());
    cli::run(args)
}
