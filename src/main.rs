use std::process::ExitCode;

use clap::Parser;

use pixelforge::cli::{self, CliArgs};
use pixelforge::logger;

fn main() -> ExitCode {
    logger::init();
    pixelforge::log_info!("pixelforge {} starting", env!("CARGO_PKG_VERSION"));
    cli::run(CliArgs::parse())
}
