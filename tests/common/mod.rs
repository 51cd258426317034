// SPDX-License-Identifier: Apache-2.0

#![allow(dead_code)]

use std::io::{Error, Result};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use vepc::host::{Host, MapRequest, Mapping};

pub const MIB: usize = 1 << 20;
pub const VEPC_BIN: &str = env!("CARGO_BIN_EXE_vepc");

/// Collaborator call counters shared between a `FakeHost` and the test
#[derive(Debug, Default)]
pub struct Counters {
    pub opens: AtomicUsize,
    pub closes: AtomicUsize,
    pub escalations: AtomicUsize,
    pub maps: AtomicUsize,
}

impl Counters {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    /// Handles which were opened and are not owned by anything anymore
    pub fn open_handles(&self) -> usize {
        Self::get(&self.opens) - Self::get(&self.closes)
    }
}

pub struct FakeHandle {
    counters: Arc<Counters>,
    reclaim: bool,
}

impl Drop for FakeHandle {
    fn drop(&mut self) {
        self.counters.closes.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct FakeRegion {
    pub name: String,
    pub size: usize,
    pub shared: bool,
    pub merge: bool,
    pub dump: bool,
    pub prealloc: bool,
    pub reclaim: bool,
    _handle: FakeHandle,
}

impl Mapping for FakeRegion {
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

/// A host whose device, escalation and mapping behaviour is scripted
pub struct FakeHost {
    pub device: bool,
    pub vanish_after_probe: bool,
    pub escalation: std::result::Result<(), i32>,
    pub capacity: usize,
    pub prealloc: bool,
    pub counters: Arc<Counters>,
    pub path: PathBuf,
}

impl Default for FakeHost {
    fn default() -> Self {
        Self {
            device: true,
            vanish_after_probe: false,
            escalation: Ok(()),
            capacity: 128 * MIB,
            prealloc: false,
            counters: Arc::default(),
            path: "/dev/sgx_vepc".into(),
        }
    }
}

impl Host for FakeHost {
    type Handle = FakeHandle;
    type Region = FakeRegion;

    fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> Result<FakeHandle> {
        let probed = self.counters.opens.load(Ordering::SeqCst) > 0;
        if !self.device || (self.vanish_after_probe && probed) {
            return Err(Error::from_raw_os_error(libc::ENOENT));
        }

        self.counters.opens.fetch_add(1, Ordering::SeqCst);
        Ok(FakeHandle {
            counters: self.counters.clone(),
            reclaim: false,
        })
    }

    fn enable_reclaim(&self, handle: &mut FakeHandle) -> Result<()> {
        self.counters.escalations.fetch_add(1, Ordering::SeqCst);
        self.escalation.map_err(Error::from_raw_os_error)?;
        handle.reclaim = true;
        Ok(())
    }

    fn prealloc(&self) -> bool {
        self.prealloc
    }

    fn map(&self, request: MapRequest<'_>, handle: FakeHandle) -> Result<FakeRegion> {
        self.counters.maps.fetch_add(1, Ordering::SeqCst);
        if request.size.get() > self.capacity {
            return Err(Error::from_raw_os_error(libc::ENOMEM));
        }

        Ok(FakeRegion {
            name: request.name.into(),
            size: request.size.get(),
            shared: request.policy.share,
            merge: request.policy.merge,
            dump: request.policy.dump,
            prealloc: request.prealloc,
            reclaim: handle.reclaim,
            _handle: handle,
        })
    }
}
