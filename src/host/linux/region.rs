// SPDX-License-Identifier: Apache-2.0

use crate::host::{MapRequest, Mapping};

use std::fs::File;
use std::io::{Error, ErrorKind, Result};

use log::{trace, warn};
use mmarinus::{perms, Kind, Map};

/// EPC is always managed in 4 KiB pages.
const EPC_PAGE_SIZE: usize = 4096;

/// A guest EPC region backed by the vEPC device
///
/// Dropping the region unmaps it and then closes the device.
pub struct Region {
    name: String,
    shared: bool,
    map: Map<perms::ReadWrite>,
    _file: File,
}

impl std::fmt::Debug for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Region")
            .field("name", &self.name)
            .field("addr", &format_args!("{:#x}", self.map.addr()))
            .field("size", &self.map.size())
            .field("shared", &self.shared)
            .finish()
    }
}

impl Region {
    pub(super) fn new(request: MapRequest<'_>, mut file: File) -> Result<Self> {
        let size = request.size.get();
        if size % EPC_PAGE_SIZE != 0 {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                format!("{} is not a multiple of the EPC page size", size),
            ));
        }

        let kind = match request.policy.share {
            true => Kind::Shared,
            false => Kind::Private,
        };

        let mut map = Map::map(size)
            .anywhere()
            .from(&mut file, 0)
            .known::<perms::ReadWrite>(kind)
            .map_err(Error::from)?;

        trace!(
            "{}: mapped {:016x}-{:016x}",
            request.name,
            map.addr(),
            map.addr() + map.size()
        );

        if !request.policy.merge {
            advise(&map, libc::MADV_UNMERGEABLE, request.name);
        }

        if !request.policy.dump {
            advise(&map, libc::MADV_DONTDUMP, request.name);
        }

        if request.prealloc {
            touch(&mut map);
        }

        Ok(Self {
            name: request.name.into(),
            shared: request.policy.share,
            map,
            _file: file,
        })
    }

    /// The address the region is mapped at
    pub fn addr(&self) -> usize {
        self.map.addr()
    }
}

impl Mapping for Region {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> usize {
        self.map.size()
    }

    fn shared(&self) -> bool {
        self.shared
    }
}

// Advice is best effort: a region which could not be advised is still usable.
fn advise(map: &Map<perms::ReadWrite>, advice: libc::c_int, name: &str) {
    let ret = unsafe { libc::madvise(map.addr() as *mut libc::c_void, map.size(), advice) };
    if ret != 0 {
        warn!(
            "{}: madvise({}) failed: {}",
            name,
            advice,
            Error::last_os_error()
        );
    }
}

// Fault in every page up front.
fn touch(map: &mut Map<perms::ReadWrite>) {
    for page in map.chunks_mut(EPC_PAGE_SIZE) {
        let byte = page.as_mut_ptr();
        unsafe { byte.write_volatile(byte.read_volatile()) };
    }
}
