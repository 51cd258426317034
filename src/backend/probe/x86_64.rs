// SPDX-License-Identifier: Apache-2.0

use super::{humanize, Datum};

use std::arch::x86_64::{CpuidResult, __cpuid_count};

const SGX_LEAF: u32 = 0x00000012;

/// `ATTRIBUTES.PROVISIONKEY`, which KVM only grants guests on request
const PROVISION_KEY: u64 = 1 << 4;

/// The SECS attribute bits enclaves may set, from leaf 0x12 subleaf 1
fn attributes(res: CpuidResult) -> u64 {
    ((res.ebx as u64) << 32) | res.eax as u64
}

struct CpuId {
    name: &'static str,
    leaf: u32,
    subl: u32,
    func: fn(CpuidResult) -> (bool, Option<String>),
}

impl CpuId {
    fn datum(&self, max: u32) -> Datum {
        let (pass, info) = if self.leaf <= max {
            (self.func)(unsafe { __cpuid_count(self.leaf, self.subl) })
        } else {
            (false, None)
        };

        Datum {
            name: self.name.into(),
            pass,
            info,
            mesg: None,
        }
    }
}

const CPUIDS: &[CpuId] = &[
    CpuId {
        name: "CPU",
        leaf: 0x00000000,
        subl: 0x00000000,
        func: |res| {
            let mut vendor = Vec::with_capacity(12);
            for reg in [res.ebx, res.edx, res.ecx] {
                vendor.extend_from_slice(&reg.to_le_bytes());
            }

            let vendor = String::from_utf8_lossy(&vendor).into_owned();
            (vendor == "GenuineIntel", Some(vendor))
        },
    },
    CpuId {
        name: " SGX Support",
        leaf: 0x00000007,
        subl: 0x00000000,
        func: |res| (res.ebx & (1 << 2) != 0, None),
    },
    CpuId {
        name: "  Version 1",
        leaf: SGX_LEAF,
        subl: 0x00000000,
        func: |res| (res.eax & (1 << 0) != 0, None),
    },
    CpuId {
        name: "  Version 2",
        leaf: SGX_LEAF,
        subl: 0x00000000,
        func: |res| (res.eax & (1 << 1) != 0, None),
    },
    CpuId {
        name: "  FLC Support",
        leaf: 0x00000007,
        subl: 0x00000000,
        func: |res| (res.ecx & (1 << 30) != 0, None),
    },
    CpuId {
        name: "  Attributes",
        leaf: SGX_LEAF,
        subl: 0x00000001,
        func: |res| {
            let attributes = attributes(res);
            (attributes != 0, Some(format!("{:#018x}", attributes)))
        },
    },
    CpuId {
        name: "   Provision Key",
        leaf: SGX_LEAF,
        subl: 0x00000001,
        func: |res| (attributes(res) & PROVISION_KEY != 0, None),
    },
];

/// Sums the sizes of all EPC sections enumerated by CPUID.
fn epc_size(max: u32) -> Datum {
    let mut pass = false;
    let mut info = None;

    if max >= SGX_LEAF {
        let mut size = 0u64;

        // Sub-leaves from 2 describe EPC sections until one reports type 0.
        for i in 2.. {
            let res = unsafe { __cpuid_count(SGX_LEAF, i) };
            if res.eax & 0xf != 1 {
                break;
            }

            let low = res.ecx as u64 & 0xfffff000;
            let high = res.edx as u64 & 0x000fffff;
            size += (high << 32) | low;
        }

        let (n, s) = humanize(size as f64);
        info = Some(format!("{:.0} {}", n, s));
        pass = size > 0;
    }

    Datum {
        name: "  EPC Size".into(),
        pass,
        info,
        mesg: None,
    }
}

pub fn data() -> Vec<Datum> {
    let max = unsafe { __cpuid_count(0x00000000, 0x00000000) }.eax;

    let mut data: Vec<_> = CPUIDS.iter().map(|c| c.datum(max)).collect();
    data.push(epc_size(max));
    data
}
