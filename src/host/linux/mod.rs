// SPDX-License-Identifier: Apache-2.0

//! The Linux host: `/dev/sgx_vepc`, KVM and `mmap()`

mod reclaim;
mod region;

pub use reclaim::Reclaim;
pub use region::Region;

use super::{Host, MapRequest};

use std::fs::{File, OpenOptions};
use std::io::{Error, ErrorKind, Result};
use std::path::{Path, PathBuf};

/// Guest EPC on a Linux host
#[derive(Debug)]
pub struct Linux {
    path: PathBuf,
    reclaim: Option<Reclaim>,
}

impl Default for Linux {
    fn default() -> Self {
        Self::new(Self::DEVICE)
    }
}

impl Linux {
    /// The default vEPC device node
    pub const DEVICE: &'static str = super::DEVICE;

    /// Uses the vEPC device at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            reclaim: None,
        }
    }

    /// Enables reclaim escalation through the given KVM virtual machine.
    ///
    /// Without this, backends requesting reclaim fail to acquire.
    pub fn with_reclaim(mut self, reclaim: Reclaim) -> Self {
        self.reclaim = Some(reclaim);
        self
    }
}

impl Host for Linux {
    type Handle = File;
    type Region = Region;

    fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> Result<File> {
        // Never create the node: it belongs to the kernel.
        OpenOptions::new().read(true).write(true).open(&self.path)
    }

    fn enable_reclaim(&self, handle: &mut File) -> Result<()> {
        match &self.reclaim {
            Some(reclaim) => reclaim.enable(handle),
            None => Err(Error::new(
                ErrorKind::Unsupported,
                "no KVM virtual machine configured for EPC reclaim",
            )),
        }
    }

    fn map(&self, request: MapRequest<'_>, handle: File) -> Result<Region> {
        Region::new(request, handle)
    }
}
