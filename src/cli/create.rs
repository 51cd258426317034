// SPDX-License-Identifier: Apache-2.0

use std::fs;
use std::io::{stdin, Read};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{anyhow, Context};
use clap::Args;
use log::info;
use serde::Serialize;
use vepc::config::{Config, Size};
use vepc::host::linux::{Linux, Reclaim};
use vepc::host::{set_prealloc, Mapping};

/// Acquire guest EPC for a backend and report the bound region
#[derive(Args, Debug)]
pub struct Options {
    /// Path to a backend configuration file (`Vepc.toml`)
    #[clap(short, long)]
    config: Option<PathBuf>,

    /// Unique identifier of the backend
    #[clap(long)]
    id: Option<String>,

    /// Size of the guest EPC (bytes, or with a K, M, G or T suffix)
    #[clap(long)]
    size: Option<Size>,

    /// Enable reclaim of guest EPC
    #[clap(long)]
    reclaim: bool,

    /// KVM capability number used to enable reclaim
    #[clap(long)]
    reclaim_cap: Option<u32>,

    /// Populate every page when the backend is acquired
    #[clap(long)]
    prealloc: bool,

    /// The virtual EPC device
    #[clap(long, env = "VEPC_DEVICE")]
    device: Option<PathBuf>,

    /// Keep the region bound until standard input is closed
    #[clap(long)]
    hold: bool,

    /// Emit JSON rather than human-readable output
    #[clap(short, long)]
    json: bool,
}

impl Options {
    /// Merges the configuration file with the command line.
    fn config(&self) -> anyhow::Result<Config> {
        let mut config = match &self.config {
            Some(path) => {
                let text = fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {:?}", path))?;
                toml::from_str(&text).with_context(|| format!("Failed to parse {:?}", path))?
            }
            None => Config::default(),
        };

        if let Some(id) = &self.id {
            config.id = id.clone();
        }
        if let Some(size) = self.size {
            config.size = size;
        }
        if let Some(device) = &self.device {
            config.device = device.clone();
        }
        if self.reclaim_cap.is_some() {
            config.reclaim_cap = self.reclaim_cap;
        }
        config.reclaim |= self.reclaim;
        config.prealloc |= self.prealloc;

        Ok(config)
    }

    pub fn execute(self) -> anyhow::Result<ExitCode> {
        let config = self.config()?;
        info!("backend config: {:?}", config);

        set_prealloc(config.prealloc);

        let unsupported = || {
            anyhow!(
                "Guest EPC is not supported via {:?}. Please check your machine with `$ vepc info`.",
                config.device
            )
        };

        // KVM is only consulted on hosts which have the device.
        vepc::probe(Linux::new(&config.device)).ok_or_else(unsupported)?;

        let mut host = Linux::new(&config.device);
        if config.reclaim {
            let cap = config
                .reclaim_cap
                .ok_or_else(|| anyhow!("Reclaim of guest EPC needs `--reclaim-cap`"))?;
            let reclaim =
                Reclaim::new(cap).context("Failed to create a KVM virtual machine for reclaim")?;
            host = host.with_reclaim(reclaim);
        }

        let factory = vepc::probe(host).ok_or_else(unsupported)?;

        let mut backend = factory.create(&config.id, config.size.bytes())?;
        backend.set_reclaim(config.reclaim)?;
        backend.validate()?;
        backend
            .acquire()
            .with_context(|| format!("Failed to acquire guest EPC for {}", backend.name()))?;

        let region = backend
            .region()
            .ok_or_else(|| anyhow!("{} has no bound region", backend.name()))?;

        let report = Report {
            name: region.name(),
            device: &config.device,
            addr: region.addr(),
            size: region.size(),
            shared: region.shared(),
            merge: backend.policy().merge,
            dump: backend.policy().dump,
            reclaim: backend.reclaim(),
            prealloc: backend.force_prealloc(),
        };

        if self.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            println!("{}", report);
        }

        if self.hold {
            info!("holding {} until stdin is closed", backend.name());
            stdin().read_to_end(&mut Vec::new())?;
        }

        Ok(ExitCode::SUCCESS)
    }
}

#[derive(Serialize)]
struct Report<'a> {
    name: &'a str,
    device: &'a PathBuf,
    addr: usize,
    size: usize,
    shared: bool,
    merge: bool,
    dump: bool,
    reclaim: bool,
    prealloc: bool,
}

impl std::fmt::Display for Report<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}: {}", self.name, self.device.display())?;
        writeln!(
            f,
            "  {:016x}-{:016x} ({})",
            self.addr,
            self.addr + self.size,
            Size::new(self.size)
        )?;
        write!(
            f,
            "  share: {}, merge: {}, dump: {}, reclaim: {}, prealloc: {}",
            self.shared, self.merge, self.dump, self.reclaim, self.prealloc
        )
    }
}
