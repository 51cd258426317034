// SPDX-License-Identifier: Apache-2.0

//! `vepc`: probe for, configure and acquire guest EPC from the command line.

#![deny(clippy::all)]
#![warn(rust_2018_idioms)]

mod cli;

use std::process::ExitCode;

use clap::Parser;

fn main() -> anyhow::Result<ExitCode> {
    let app = cli::Options::parse();
    app.execute()
}
