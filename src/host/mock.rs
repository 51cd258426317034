// SPDX-License-Identifier: Apache-2.0

use super::{Host, MapRequest, Mapping, DEVICE};

use std::io::{Error, ErrorKind, Result};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Records every collaborator call made against a `Mock`
#[derive(Debug, Default)]
pub struct Calls(Mutex<Vec<&'static str>>);

impl Calls {
    fn push(&self, call: &'static str) {
        self.0.lock().unwrap().push(call);
    }

    pub fn log(&self) -> Vec<&'static str> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.0.lock().unwrap().iter().filter(|c| **c == call).count()
    }
}

pub struct Handle(Arc<Calls>);

impl Drop for Handle {
    fn drop(&mut self) {
        self.0.push("close");
    }
}

pub struct Region {
    name: String,
    size: usize,
    shared: bool,
    _handle: Handle,
}

impl Mapping for Region {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> usize {
        self.size
    }

    fn shared(&self) -> bool {
        self.shared
    }
}

pub struct Mock {
    pub present: bool,
    pub reclaim: bool,
    pub mappable: bool,
    pub prealloc: bool,
    pub calls: Arc<Calls>,
    pub path: PathBuf,
}

impl Default for Mock {
    fn default() -> Self {
        Self {
            present: true,
            reclaim: true,
            mappable: true,
            prealloc: false,
            calls: Arc::default(),
            path: DEVICE.into(),
        }
    }
}

impl Host for Mock {
    type Handle = Handle;
    type Region = Region;

    fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> Result<Handle> {
        self.calls.push("open");
        match self.present {
            true => Ok(Handle(self.calls.clone())),
            false => Err(Error::from_raw_os_error(libc::ENOENT)),
        }
    }

    fn enable_reclaim(&self, _handle: &mut Handle) -> Result<()> {
        self.calls.push("reclaim");
        match self.reclaim {
            true => Ok(()),
            false => Err(Error::from_raw_os_error(libc::EPERM)),
        }
    }

    fn prealloc(&self) -> bool {
        self.prealloc
    }

    fn map(&self, request: MapRequest<'_>, handle: Handle) -> Result<Region> {
        self.calls.push("map");
        if !self.mappable {
            return Err(Error::new(ErrorKind::OutOfMemory, "EPC exhausted"));
        }

        Ok(Region {
            name: request.name.into(),
            size: request.size.get(),
            shared: request.policy.share,
            _handle: handle,
        })
    }
}
