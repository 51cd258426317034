// SPDX-License-Identifier: Apache-2.0

//! Host capability probing
//!
//! [`probe()`] decides once, at startup, whether guest EPC backends can
//! exist at all on this host. [`data()`] gathers the details shown to
//! users by `vepc info`.

#[cfg(target_arch = "x86_64")]
mod x86_64;

use super::Backend;
use crate::host::Host;
use crate::Error;

use std::collections::HashSet;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use log::{debug, info};
use serde::Serialize;

/// Probes the host for the vEPC device.
///
/// The device is opened read-write and closed again immediately. If that
/// fails the host cannot provide guest EPC and no [`Factory`] is returned;
/// this is not an error.
pub fn probe<H: Host>(host: H) -> Option<Factory<H>> {
    match host.open() {
        Ok(handle) => {
            drop(handle);
            info!("guest EPC available via {}", host.path().display());
            Some(Factory {
                host: Arc::new(host),
                ids: Mutex::default(),
            })
        }

        Err(e) => {
            debug!("guest EPC unavailable via {}: {}", host.path().display(), e);
            None
        }
    }
}

/// Creates guest EPC backends on a host known to support them
///
/// The only way to obtain a `Factory` is a successful [`probe()`].
pub struct Factory<H: Host> {
    host: Arc<H>,
    ids: Mutex<HashSet<String>>,
}

impl<H: Host> Factory<H> {
    /// The host backends will be acquired from
    pub fn host(&self) -> &H {
        &self.host
    }

    /// Creates a new, unacquired backend.
    ///
    /// The `id` names the backend and must be unique among all backends
    /// created by this factory.
    pub fn create(&self, id: &str, size: usize) -> Result<Backend<H>, Error> {
        if id.is_empty() || id.contains('/') {
            return Err(Error::InvalidConfig(format!(
                "invalid backend id {:?}",
                id
            )));
        }

        let mut ids = self.ids.lock().unwrap_or_else(PoisonError::into_inner);
        if !ids.insert(id.into()) {
            return Err(Error::InvalidConfig(format!(
                "backend id {:?} is already in use",
                id
            )));
        }

        Ok(Backend::new(self.host.clone(), id, size))
    }
}

/// One fact about the host's guest EPC support
#[derive(Clone, Debug, Serialize)]
pub struct Datum {
    /// The name of this datum.
    pub name: String,

    /// Whether the datum indicates support for guest EPC or not.
    pub pass: bool,

    /// Short additional information to display to the user.
    pub info: Option<String>,

    /// Longer explanatory message on how to resolve problems.
    pub mesg: Option<String>,
}

/// Reports everything known about guest EPC support on this host.
pub fn data(device: &Path) -> Vec<Datum> {
    let mut data = vec![dev_sgx_vepc(device)];

    #[cfg(target_os = "linux")]
    data.push(dev_kvm());

    #[cfg(target_arch = "x86_64")]
    data.extend(x86_64::data());

    data
}

fn dev_sgx_vepc(path: &Path) -> Datum {
    let open = OpenOptions::new().read(true).write(true).open(path);

    Datum {
        name: "Driver".into(),
        pass: open.is_ok(),
        info: Some(path.display().to_string()),
        mesg: open.err().map(|e| {
            format!(
                "{}: a kernel built with CONFIG_X86_SGX_KVM and read-write access are required",
                e
            )
        }),
    }
}

#[cfg(target_os = "linux")]
fn dev_kvm() -> Datum {
    let kvm = kvm_ioctls::Kvm::new();

    Datum {
        name: "KVM".into(),
        pass: kvm.is_ok(),
        info: Some("/dev/kvm".into()),
        mesg: kvm
            .err()
            .map(|e| format!("{}: reclaim of guest EPC needs a KVM virtual machine", e)),
    }
}

/// Formats a byte count with a binary unit suffix.
pub(crate) fn humanize(mut size: f64) -> (f64, &'static str) {
    const SUFFIXES: [&str; 7] = ["", "KiB", "MiB", "GiB", "TiB", "PiB", "EiB"];

    let mut iter = 0;
    while size > 512.0 && iter < SUFFIXES.len() - 1 {
        size /= 1024.0;
        iter += 1;
    }

    (size, SUFFIXES[iter])
}
