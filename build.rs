// SPDX-License-Identifier: Apache-2.0

use std::fs;
use std::os::unix::fs::FileTypeExt;

const VEPC_DEVICE: &str = "/dev/sgx_vepc";

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rustc-check-cfg=cfg(host_can_test_vepc)");

    // Only claim the device is testable if we can actually open it; the
    // node exists on hosts where the current user lacks access.
    let is_char_device = fs::metadata(VEPC_DEVICE)
        .map(|m| m.file_type().is_char_device())
        .unwrap_or(false);

    if is_char_device
        && fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(VEPC_DEVICE)
            .is_ok()
    {
        println!("cargo:rustc-cfg=host_can_test_vepc");
    }
}
