//! Keyward - leased, audited, encrypted credentials for machine agents.

use clap::Parser;
use colored::Colorize;

use keyward::cli::{self, Cli};

fn main() {
    let cli = Cli::parse();

    if let Err(e) = cli::execute(cli) {
        eprintln!("{} {}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}
