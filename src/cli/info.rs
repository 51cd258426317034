// SPDX-License-Identifier: Apache-2.0

use std::fmt::{self, Formatter};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Args;
use serde::Serialize;
use vepc::backend::probe::{data, Datum};
use vepc::backend::Property;
use vepc::host::linux::Linux;
use vepc::RECLAIM_PROPERTY;

/// Show details about guest EPC support on this system
#[derive(Args, Debug)]
pub struct Options {
    /// Emit JSON rather than human-readable output
    #[clap(short, long)]
    json: bool,

    /// The virtual EPC device
    #[clap(long, env = "VEPC_DEVICE", default_value = Linux::DEVICE)]
    device: PathBuf,
}

impl Options {
    pub fn execute(self) -> anyhow::Result<ExitCode> {
        let available = vepc::probe(Linux::new(&self.device)).is_some();

        let info = Info {
            version: env!("CARGO_PKG_VERSION"),
            available,
            data: data(&self.device),
            properties: &[RECLAIM_PROPERTY],
        };

        if self.json {
            println!("{}", serde_json::to_string_pretty(&info)?);
        } else {
            print!("{}", info);
        }

        Ok(match available {
            true => ExitCode::SUCCESS,
            false => ExitCode::FAILURE,
        })
    }
}

#[derive(Serialize)]
struct Info {
    version: &'static str,
    available: bool,
    data: Vec<Datum>,
    properties: &'static [Property],
}

impl fmt::Display for Info {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        use colorful::*;

        let is_atty = atty::is(atty::Stream::Stdout);
        let icon = |pass: bool| match (is_atty, pass) {
            (true, true) => "✔".green().to_string(),
            (true, false) => "✗".red().to_string(),
            (false, true) => "✔".into(),
            (false, false) => "✗".into(),
        };

        writeln!(f, "vepc version {}", self.version)?;
        writeln!(f, "{} Backend: memory-backend-epc", icon(self.available))?;

        for datum in &self.data {
            write!(f, "  {} {}", icon(datum.pass), datum.name)?;
            if let Some(info) = &datum.info {
                write!(f, ": {}", info)?;
            }
            writeln!(f)?;
        }

        for datum in &self.data {
            if let Some(mesg) = &datum.mesg {
                writeln!(f, "\n  {}\n", mesg)?;
            }
        }

        if self.available {
            writeln!(f, "Properties:")?;
            for property in self.properties {
                writeln!(f, "  {}: {}", property.name, property.description)?;
            }
        }

        Ok(())
    }
}
