// SPDX-License-Identifier: Apache-2.0

use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::{error, io};

/// Error conditions raised while configuring or acquiring a guest EPC
/// backend.
///
/// None of these are retried internally. A failed acquisition leaves the
/// backend in a terminal state; retrying means creating a new backend.
#[derive(Debug)]
pub enum Error {
    /// The backend configuration was rejected before touching the device.
    InvalidConfig(String),

    /// The vEPC device could not be opened.
    ///
    /// This covers both a host without the device and a device which
    /// disappeared (or became inaccessible) since it was probed.
    ResourceUnavailable {
        /// The device node which failed to open.
        path: PathBuf,

        /// The error reported by the operating system.
        source: io::Error,
    },

    /// The host refused to enable reclaim on the device handle.
    ReclaimEnableFailed(io::Error),

    /// The mapping primitive could not create the memory region.
    MappingFailed(io::Error),

    /// The operation is not valid in the backend's current lifecycle state.
    InvalidState(&'static str),
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidConfig(msg) => write!(f, "{}", msg),
            Error::ResourceUnavailable { path, source } => {
                let path = path.display();
                write!(f, "failed to open {} to alloc SGX EPC: {}", path, source)
            }
            Error::ReclaimEnableFailed(e) => {
                write!(f, "failed to enable reclaim of guest EPC: {}", e)
            }
            Error::MappingFailed(e) => write!(f, "failed to map guest EPC: {}", e),
            Error::InvalidState(msg) => write!(f, "{}", msg),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::ResourceUnavailable { source, .. } => Some(source),
            Error::ReclaimEnableFailed(e) | Error::MappingFailed(e) => Some(e),
            Error::InvalidConfig(_) | Error::InvalidState(_) => None,
        }
    }
}
