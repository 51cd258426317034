// SPDX-License-Identifier: Apache-2.0

mod common;

use common::{Counters, FakeHost, MIB};

use std::path::Path;
use std::sync::Arc;

use vepc::host::Mapping;
use vepc::{probe, Error, State};

fn factory(host: FakeHost) -> (vepc::Factory<FakeHost>, Arc<Counters>) {
    let counters = host.counters.clone();
    let factory = probe(host).expect("device should be present");
    (factory, counters)
}

#[test]
fn plain_region() {
    let (factory, counters) = factory(FakeHost::default());
    let mut backend = factory.create("epc0", 64 * MIB).unwrap();

    backend.acquire().unwrap();

    let region = backend.region().unwrap();
    assert_eq!(region.size(), 64 * MIB);
    assert!(region.shared());
    assert!(!region.merge);
    assert!(!region.dump);
    assert!(!region.reclaim);
    assert_eq!(region.name(), "/objects/epc0");

    assert_eq!(Counters::get(&counters.escalations), 0);
    assert_eq!(Counters::get(&counters.maps), 1);

    // One handle from the probe (closed) and one owned by the region.
    assert_eq!(Counters::get(&counters.opens), 2);
    assert_eq!(counters.open_handles(), 1);
}

#[test]
fn reclaimable_region() {
    let (factory, counters) = factory(FakeHost::default());
    let mut backend = factory.create("epc0", 64 * MIB).unwrap();
    backend.set_reclaim(true).unwrap();

    backend.acquire().unwrap();

    assert_eq!(Counters::get(&counters.escalations), 1);
    assert_eq!(Counters::get(&counters.maps), 1);
    assert!(backend.region().unwrap().reclaim);
    assert!(matches!(backend.state(), State::Bound { reclaim: true, .. }));
}

#[test]
fn zero_size() {
    let (factory, counters) = factory(FakeHost::default());
    let opens = Counters::get(&counters.opens);
    let mut backend = factory.create("epc0", 0).unwrap();

    assert!(matches!(backend.acquire(), Err(Error::InvalidConfig(_))));
    assert_eq!(Counters::get(&counters.opens), opens);
    assert!(backend.region().is_none());
}

#[test]
fn absent_device() {
    let host = FakeHost {
        device: false,
        ..Default::default()
    };

    assert!(probe(host).is_none());
}

#[test]
fn device_vanished_after_probe() {
    let host = FakeHost {
        vanish_after_probe: true,
        path: "/dev/sgx/virt_epc".into(),
        ..Default::default()
    };
    let (factory, counters) = factory(host);
    let mut backend = factory.create("epc0", MIB).unwrap();
    backend.set_reclaim(true).unwrap();

    match backend.acquire() {
        Err(Error::ResourceUnavailable { path, source }) => {
            assert_eq!(path, Path::new("/dev/sgx/virt_epc"));
            assert_eq!(source.raw_os_error(), Some(libc::ENOENT));
        }
        r => panic!("unexpected result: {:?}", r.err()),
    }
    assert!(backend.region().is_none());
    assert_eq!(Counters::get(&counters.escalations), 0);
    assert_eq!(Counters::get(&counters.maps), 0);
    assert_eq!(counters.open_handles(), 0);
}

#[test]
fn escalation_refused() {
    let host = FakeHost {
        escalation: Err(libc::EPERM),
        ..Default::default()
    };
    let (factory, counters) = factory(host);
    let mut backend = factory.create("epc0", MIB).unwrap();
    backend.set_reclaim(true).unwrap();

    match backend.acquire() {
        Err(Error::ReclaimEnableFailed(e)) => assert_eq!(e.raw_os_error(), Some(libc::EPERM)),
        r => panic!("unexpected result: {:?}", r.err()),
    }

    assert!(backend.region().is_none());
    assert_eq!(Counters::get(&counters.maps), 0);
    assert_eq!(counters.open_handles(), 0);
}

#[test]
fn mapping_refused() {
    let (factory, counters) = factory(FakeHost::default());
    let mut backend = factory.create("epc0", 256 * MIB).unwrap();

    match backend.acquire() {
        Err(Error::MappingFailed(e)) => assert_eq!(e.raw_os_error(), Some(libc::ENOMEM)),
        r => panic!("unexpected result: {:?}", r.err()),
    }

    assert!(matches!(backend.state(), State::Failed { reclaim: false }));
    assert_eq!(counters.open_handles(), 0);
}

#[test]
fn reclaim_frozen_after_bind() {
    let (factory, _) = factory(FakeHost::default());
    let mut backend = factory.create("epc0", MIB).unwrap();

    backend.set_reclaim(true).unwrap();
    backend.set_reclaim(false).unwrap();
    assert!(!backend.reclaim());

    backend.acquire().unwrap();

    match backend.set_reclaim(true) {
        Err(e @ Error::InvalidState(_)) => {
            assert_eq!(e.to_string(), "reclaim must be enabled before EPC init")
        }
        r => panic!("unexpected result: {:?}", r),
    }
    assert!(!backend.reclaim());
}

#[test]
fn prealloc_policy_is_forwarded() {
    let host = FakeHost {
        prealloc: true,
        ..Default::default()
    };
    let (factory, _) = factory(host);
    let mut backend = factory.create("epc0", MIB).unwrap();

    backend.acquire().unwrap();

    assert!(backend.force_prealloc());
    assert!(backend.region().unwrap().prealloc);
}

#[test]
fn backends_are_independent() {
    let (factory, counters) = factory(FakeHost::default());
    let mut first = factory.create("epc0", MIB).unwrap();
    let mut second = factory.create("epc1", 2 * MIB).unwrap();

    second.set_reclaim(true).unwrap();
    first.acquire().unwrap();
    second.acquire().unwrap();

    assert!(!first.reclaim());
    assert!(second.reclaim());
    assert_eq!(counters.open_handles(), 2);

    drop(first);
    assert_eq!(counters.open_handles(), 1);
    drop(second);
    assert_eq!(counters.open_handles(), 0);
}
