// SPDX-License-Identifier: Apache-2.0

//! The host collaborators a guest EPC backend relies on.
//!
//! A backend never touches the operating system directly. Opening the
//! device, escalating the handle, mapping it and reading the preallocation
//! policy all go through the [`Host`] trait so that the acquisition protocol
//! can be driven against the real kernel or a mock.

#[cfg(target_os = "linux")]
pub mod linux;

use crate::backend::Policy;

use std::io::Result;
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

/// The virtual EPC device exposed by the kernel's SGX driver
pub const DEVICE: &str = "/dev/sgx_vepc";

static PREALLOC: AtomicBool = AtomicBool::new(false);

/// Sets the process-wide memory preallocation policy.
///
/// Backends snapshot this value when they are acquired; changing it
/// afterwards has no effect on already bound regions.
pub fn set_prealloc(enabled: bool) {
    PREALLOC.store(enabled, Ordering::SeqCst);
}

/// Reads the process-wide memory preallocation policy.
pub fn prealloc() -> bool {
    PREALLOC.load(Ordering::SeqCst)
}

/// Everything the mapping primitive needs besides the device handle
#[derive(Copy, Clone, Debug)]
pub struct MapRequest<'a> {
    /// The unique identity label of the region
    pub name: &'a str,

    /// The size of the region in bytes
    pub size: NonZeroUsize,

    /// The sharing, merging and dumping policy of the backend
    pub policy: Policy,

    /// Whether every page should be populated up front
    pub prealloc: bool,
}

/// A memory region produced by the mapping primitive
pub trait Mapping {
    /// The identity label the region was created with
    fn name(&self) -> &str;

    /// The size of the region in bytes
    fn size(&self) -> usize;

    /// Whether the region is a shared mapping
    fn shared(&self) -> bool;
}

/// The host operations used to acquire a guest EPC region
pub trait Host {
    /// An open device handle
    ///
    /// Handles are move-only: the acquirer either drops one (closing it) or
    /// moves it into [`Host::map`], never both.
    type Handle;

    /// The region produced by [`Host::map`]
    type Region: Mapping;

    /// The device node this host opens
    fn path(&self) -> &Path;

    /// Opens the device read-write.
    fn open(&self) -> Result<Self::Handle>;

    /// Enables reclaim of the EPC pages behind `handle`.
    fn enable_reclaim(&self, handle: &mut Self::Handle) -> Result<()>;

    /// Returns the process-wide preallocation policy.
    fn prealloc(&self) -> bool {
        prealloc()
    }

    /// Creates a memory region from the device handle.
    ///
    /// The region takes ownership of `handle` on success. On failure the
    /// handle is released before returning.
    fn map(&self, request: MapRequest<'_>, handle: Self::Handle) -> Result<Self::Region>;
}

#[cfg(test)]
pub(crate) mod mock;
