//! `tbxc`: standalone binary entry point.
//!
//! All command logic lives in the library crate so it stays testable
//! without spawning a subprocess; this file only parses arguments and
//! hands off.

use std::process::ExitCode;

use clap::Parser;
use threebx_cli::{run, Cli};

fn main() -> ExitCode {
    run(Cli::parse())
}
