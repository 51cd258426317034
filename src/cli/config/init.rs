// SPDX-License-Identifier: Apache-2.0

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context};
use clap::Args;
use vepc::config::CONFIG_TEMPLATE;

/// Generate a `Vepc.toml` template
#[derive(Args, Debug)]
pub struct Options {
    /// Where to write the template
    #[clap(default_value = "Vepc.toml")]
    path: PathBuf,
}

impl Options {
    pub fn execute(self) -> anyhow::Result<ExitCode> {
        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
        {
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                bail!("{:?} does already exist.", self.path)
            }
            file => file.with_context(|| format!("Failed to create {:?}", self.path))?,
        };

        file.write_all(CONFIG_TEMPLATE.as_bytes())?;
        Ok(ExitCode::SUCCESS)
    }
}
