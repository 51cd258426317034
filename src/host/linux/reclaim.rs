// SPDX-License-Identifier: Apache-2.0

use std::fmt::{Debug, Formatter};
use std::io::{Error, Result};
use std::os::unix::io::AsRawFd;

use kvm_bindings::kvm_enable_cap;
use kvm_ioctls::{Kvm, VmFd};
use log::trace;

fn errno(e: kvm_ioctls::Error) -> Error {
    Error::from_raw_os_error(e.errno())
}

/// Enables EPC reclaim through a KVM virtual machine
///
/// Reclaim is requested with `KVM_ENABLE_CAP` on the virtual machine,
/// passing the vEPC descriptor as the first argument. The capability number
/// is host kernel specific and must be supplied by the caller.
pub struct Reclaim {
    vm: VmFd,
    cap: u32,
}

impl Debug for Reclaim {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reclaim")
            .field("vm", &self.vm.as_raw_fd())
            .field("cap", &self.cap)
            .finish()
    }
}

impl Reclaim {
    /// Creates a dedicated KVM virtual machine for reclaim requests.
    pub fn new(cap: u32) -> Result<Self> {
        let kvm = Kvm::new().map_err(errno)?;
        let vm = kvm.create_vm().map_err(errno)?;
        Ok(Self::with_vm(vm, cap))
    }

    /// Issues reclaim requests against an existing virtual machine.
    pub fn with_vm(vm: VmFd, cap: u32) -> Self {
        Self { vm, cap }
    }

    /// Enables reclaim on an open vEPC descriptor.
    pub fn enable(&self, vepc: &impl AsRawFd) -> Result<()> {
        let mut cap = kvm_enable_cap {
            cap: self.cap,
            ..Default::default()
        };
        cap.args[0] = vepc.as_raw_fd() as u64;

        trace!("KVM_ENABLE_CAP {} on vEPC fd {}", self.cap, cap.args[0]);
        self.vm.enable_cap(&cap).map_err(errno)
    }
}
