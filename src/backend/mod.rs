// SPDX-License-Identifier: Apache-2.0

//! The guest EPC memory backend
//!
//! A [`Backend`] owns exactly one vEPC device handle and the memory region
//! created from it. It is created through a [`probe::Factory`], configured
//! while [`State::Configurable`] and acquired exactly once.

pub mod probe;

use crate::host::{Host, MapRequest, Mapping};
use crate::Error;

use std::num::NonZeroUsize;
use std::sync::Arc;

use log::{debug, error, info};
use serde::Serialize;

/// A property exposed to the configuration surface
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Property {
    /// The property name
    pub name: &'static str,

    /// Human-readable description of the property
    pub description: &'static str,
}

/// The `reclaim` toggle of a guest EPC backend
pub const RECLAIM_PROPERTY: Property = Property {
    name: "reclaim",
    description: "Enable reclaim of guest EPC",
};

const RECLAIM_AFTER_INIT: &str = "reclaim must be enabled before EPC init";
const ALREADY_ACQUIRED: &str = "guest EPC has already been acquired";

/// Sharing, merging and dumping policy of a backend's region
///
/// For guest EPC this is fixed at construction: the mapping must be shared
/// by all of its consumers, must never be merged by the host and must never
/// be written into core dumps.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Policy {
    /// Create a shared mapping
    pub share: bool,

    /// Allow the host to merge identical pages
    pub merge: bool,

    /// Include the region in core dumps
    pub dump: bool,
}

impl Policy {
    /// The only policy valid for guest EPC
    pub const EPC: Policy = Policy {
        share: true,
        merge: false,
        dump: false,
    };
}

/// Lifecycle state of a backend
#[derive(Debug)]
pub enum State<R> {
    /// No region exists yet; `reclaim` may still change.
    Configurable {
        /// Whether reclaim will be enabled on acquisition
        reclaim: bool,
    },

    /// The region has been created and is owned by the backend.
    Bound {
        /// The reclaim setting captured when the region was bound
        reclaim: bool,

        /// The bound region
        region: R,
    },

    /// Acquisition was attempted and failed.
    Failed {
        /// The reclaim setting at the time of the attempt
        reclaim: bool,
    },
}

/// A guest EPC memory backend
pub struct Backend<H: Host> {
    host: Arc<H>,
    name: String,
    size: usize,
    policy: Policy,
    force_prealloc: bool,
    state: State<H::Region>,
}

impl<H: Host> Backend<H> {
    pub(crate) fn new(host: Arc<H>, id: &str, size: usize) -> Self {
        Self {
            host,
            name: format!("/objects/{}", id),
            size,
            policy: Policy::EPC,
            force_prealloc: false,
            state: State::Configurable { reclaim: false },
        }
    }

    /// The unique, stable identity label of this backend
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The requested size of the region in bytes
    pub fn size(&self) -> usize {
        self.size
    }

    /// The fixed sharing, merging and dumping policy
    pub fn policy(&self) -> Policy {
        self.policy
    }

    /// Whether the region was preallocated
    ///
    /// This mirrors the process-wide preallocation policy as it was when
    /// the backend was acquired.
    pub fn force_prealloc(&self) -> bool {
        self.force_prealloc
    }

    /// The current lifecycle state
    pub fn state(&self) -> &State<H::Region> {
        &self.state
    }

    /// The bound region, if any
    pub fn region(&self) -> Option<&H::Region> {
        match &self.state {
            State::Bound { region, .. } => Some(region),
            _ => None,
        }
    }

    /// Gets the `reclaim` property.
    pub fn reclaim(&self) -> bool {
        match self.state {
            State::Configurable { reclaim }
            | State::Bound { reclaim, .. }
            | State::Failed { reclaim } => reclaim,
        }
    }

    /// Sets the `reclaim` property.
    ///
    /// Fails with [`Error::InvalidState`] once acquisition has been
    /// attempted, leaving the property unchanged.
    pub fn set_reclaim(&mut self, value: bool) -> Result<(), Error> {
        match &mut self.state {
            State::Configurable { reclaim } => {
                debug!("{}: reclaim = {}", self.name, value);
                *reclaim = value;
                Ok(())
            }
            _ => Err(Error::InvalidState(RECLAIM_AFTER_INIT)),
        }
    }

    /// Checks the backend parameters without touching the device.
    pub fn validate(&self) -> Result<NonZeroUsize, Error> {
        NonZeroUsize::new(self.size)
            .ok_or_else(|| Error::InvalidConfig("can't create backend with size 0".into()))
    }

    /// Acquires the guest EPC and binds it to this backend.
    ///
    /// This can only be attempted once. Any failure leaves the backend in
    /// [`State::Failed`] with no region and no open device handle.
    pub fn acquire(&mut self) -> Result<(), Error> {
        let reclaim = match self.state {
            State::Configurable { reclaim } => reclaim,
            _ => return Err(Error::InvalidState(ALREADY_ACQUIRED)),
        };

        match self.bind(reclaim) {
            Ok(region) => {
                info!(
                    "{}: bound {} bytes of guest EPC (reclaim: {}, prealloc: {})",
                    self.name,
                    region.size(),
                    reclaim,
                    self.force_prealloc
                );
                self.state = State::Bound { reclaim, region };
                Ok(())
            }

            Err(e) => {
                error!("{}: {}", self.name, e);
                self.state = State::Failed { reclaim };
                Err(e)
            }
        }
    }

    fn bind(&mut self, reclaim: bool) -> Result<H::Region, Error> {
        let size = self.validate()?;
        self.force_prealloc = self.host.prealloc();

        let path = self.host.path();
        debug!("{}: opening {}", self.name, path.display());
        let mut handle = self
            .host
            .open()
            .map_err(|source| Error::ResourceUnavailable {
                path: path.into(),
                source,
            })?;

        // The handle is dropped, and so closed, if this fails.
        if reclaim {
            debug!("{}: enabling reclaim", self.name);
            self.host
                .enable_reclaim(&mut handle)
                .map_err(Error::ReclaimEnableFailed)?;
        }

        let request = MapRequest {
            name: &self.name,
            size,
            policy: self.policy,
            prealloc: self.force_prealloc,
        };

        debug!("{}: mapping {} bytes", self.name, size);
        self.host
            .map(request, handle)
            .map_err(Error::MappingFailed)
    }
}
