// src/bin/toolmesh.rs

use clap::Parser;
use colored::*;
use toolmesh::cli::{self, Cli, Outcome};

/// Exit status of a run in which some command failed.
const EXIT_FAILURES: i32 = 2;

fn main() {
    env_logger::init();

    match cli::dispatch(Cli::parse()) {
        Ok(Outcome::Success) => {}
        Ok(Outcome::Failures) => std::process::exit(EXIT_FAILURES),
        Err(e) => {
            eprintln!("\n{}: {:#}", "Error".red().bold(), e);
            std::process::exit(1);
        }
    }
}
