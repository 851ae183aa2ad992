use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use coverage_gate::app::{self, Args, GateConfig};

fn main() -> Result<ExitCode> {
    let args = Args::parse_from(app::normalize_args(std::env::args()));
    app::init_tracing(args.verbose);
    let config = GateConfig::from(args);
    app::run(config)
}
