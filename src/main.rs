//! treescope CLI entry point.

use clap::Parser;
use treescope::cli::{self, Cli};

fn main() {
    let cli = Cli::parse();
    std::process::exit(cli::run(cli));
}
