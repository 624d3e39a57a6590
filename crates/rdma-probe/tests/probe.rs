//! Behavioral tests against a fake verbs layer.
//!
//! The fake counts every enumerate/release/open/close call, so the
//! exactly-once lifecycle guarantees are checked directly.

use rdma_probe::device::{
    list_devices, DeviceAttr, DeviceList, Guid, LinkLayer, Mtu, NodeType, PortAttr, PortCapFlags,
    PortState, SYSFS_NAME_MAX,
};
use rdma_probe::verbs::{DeviceIdentity, VerbsApi};
use rdma_probe::Error;

use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

#[derive(Clone, Default)]
struct FakeVerbs {
    state: Arc<FakeState>,
}

#[derive(Default)]
struct FakeState {
    devices: Mutex<Vec<FakeDevice>>,
    enumerations: AtomicUsize,
    releases: AtomicUsize,
    opens: AtomicUsize,
    closes: AtomicUsize,
    fail_enumerate: AtomicBool,
    fail_open: AtomicBool,
}

#[derive(Clone)]
struct FakeDevice {
    identity: DeviceIdentity,
    guid: Guid,
    stable_index: Option<i32>,
    device_attr: DeviceAttr,
    ports: Vec<PortAttr>,
    fail_query_device: bool,
    fail_query_port: Option<u8>,
}

impl FakeVerbs {
    fn enumerations(&self) -> usize {
        self.state.enumerations.load(Ordering::SeqCst)
    }

    fn releases(&self) -> usize {
        self.state.releases.load(Ordering::SeqCst)
    }

    fn opens(&self) -> usize {
        self.state.opens.load(Ordering::SeqCst)
    }

    fn closes(&self) -> usize {
        self.state.closes.load(Ordering::SeqCst)
    }
}

impl VerbsApi for FakeVerbs {
    type DeviceHandle = usize;
    type DeviceArray = Vec<usize>;
    type DeviceResource = usize;

    fn enumerate_devices(&self) -> io::Result<Vec<usize>> {
        if self.state.fail_enumerate.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::Other, "enumeration failed"));
        }
        self.state.enumerations.fetch_add(1, Ordering::SeqCst);
        Ok((0..self.state.devices.lock().len()).collect())
    }

    fn release_devices(&self, _devices: Vec<usize>) {
        self.state.releases.fetch_add(1, Ordering::SeqCst);
    }

    fn device_identity(&self, dev: usize) -> DeviceIdentity {
        self.state.devices.lock()[dev].identity.clone()
    }

    fn device_guid(&self, dev: usize) -> Guid {
        self.state.devices.lock()[dev].guid
    }

    fn device_index(&self, dev: usize) -> Option<i32> {
        self.state.devices.lock()[dev].stable_index
    }

    fn open_device(&self, dev: usize) -> io::Result<usize> {
        if self.state.fail_open.load(Ordering::SeqCst) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "open failed",
            ));
        }
        self.state.opens.fetch_add(1, Ordering::SeqCst);
        Ok(dev)
    }

    fn close_device(&self, _res: &mut usize) {
        self.state.closes.fetch_add(1, Ordering::SeqCst);
    }

    fn query_device(&self, res: &usize) -> io::Result<DeviceAttr> {
        let dev = self.state.devices.lock()[*res].clone();
        if dev.fail_query_device {
            return Err(io::Error::new(io::ErrorKind::Other, "query_device failed"));
        }
        Ok(dev.device_attr)
    }

    fn query_port(&self, res: &usize, port_num: u8) -> io::Result<PortAttr> {
        let dev = self.state.devices.lock()[*res].clone();
        if dev.fail_query_port == Some(port_num) {
            return Err(io::Error::new(io::ErrorKind::Other, "query_port failed"));
        }
        dev.ports
            .get(usize::from(port_num) - 1)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "no such port"))
    }
}

fn fake_device(name: &str, stable_index: i32, guid: u64, ports: Vec<PortAttr>) -> FakeDevice {
    FakeDevice {
        identity: DeviceIdentity {
            name: name.to_owned(),
            internal_device_name: format!("uverbs{stable_index}"),
            device_path: format!("/dev/infiniband/uverbs{stable_index}"),
            ib_device_path: format!("/sys/class/infiniband/{name}"),
            node_type: NodeType::ChannelAdapter,
        },
        guid: Guid::from_u64(guid),
        stable_index: Some(stable_index),
        device_attr: DeviceAttr {
            fw_ver: "20.36.1010".to_owned(),
            node_guid: Guid::from_u64(guid),
            vendor_id: 0x02c9,
            max_qp: 131_072,
            phys_port_cnt: u8::try_from(ports.len()).unwrap(),
            ..DeviceAttr::default()
        },
        ports,
        fail_query_device: false,
        fail_query_port: None,
    }
}

fn port(link_layer: LinkLayer, lid: u16) -> PortAttr {
    PortAttr {
        state: PortState::Active,
        max_mtu: Mtu::Mtu4096,
        active_mtu: Mtu::Mtu1024,
        gid_tbl_len: 256,
        port_cap_flags: PortCapFlags::IP_BASED_GIDS,
        max_msg_sz: 1 << 30,
        lid,
        sm_lid: 1,
        link_layer,
    }
}

/// Two adapters: `mlx5_0` (index 0, guid 0xAA, one IB port) and
/// `mlx5_1` (index 1, guid 0xBB, one IB port and one Ethernet port).
fn two_device_fixture() -> FakeVerbs {
    let verbs = FakeVerbs::default();
    verbs.state.devices.lock().extend([
        fake_device("mlx5_0", 0, 0xAA, vec![port(LinkLayer::Infiniband, 7)]),
        fake_device(
            "mlx5_1",
            1,
            0xBB,
            vec![port(LinkLayer::Infiniband, 9), port(LinkLayer::Ethernet, 0)],
        ),
    ]);
    verbs
}

#[test]
fn round_trip_identity() {
    let verbs = two_device_fixture();
    let descriptors = list_devices(&verbs).unwrap();
    let devices = DeviceList::available(verbs.clone()).unwrap();

    for desc in &descriptors {
        let by_name = devices.lookup_by_name(desc.name()).unwrap();
        assert_eq!(by_name.descriptor(), *desc);

        let by_guid = devices.lookup_by_guid(desc.guid()).unwrap();
        assert_eq!(by_guid.descriptor(), *desc);
    }
}

#[test]
fn lookup_miss_is_not_an_error() {
    let verbs = two_device_fixture();
    let devices = DeviceList::available(verbs).unwrap();

    assert!(devices.lookup_by_name("nonexistent-device-zzz").is_none());
    assert!(devices.lookup_by_stable_index(99_999).is_none());
    assert!(devices.lookup_by_guid(Guid::from_u64(u64::MAX)).is_none());
}

#[test]
fn count_matches_iteration() {
    let verbs = two_device_fixture();
    let devices = DeviceList::available(verbs.clone()).unwrap();
    assert_eq!(devices.len(), 2);
    assert_eq!(devices.iter().count(), devices.len());
    // The sequence is restartable.
    assert_eq!(devices.iter().count(), devices.len());

    let empty = FakeVerbs::default();
    let devices = DeviceList::available(empty).unwrap();
    assert!(devices.is_empty());
    assert_eq!(devices.iter().count(), 0);
}

#[test]
fn indexed_access() {
    let verbs = two_device_fixture();
    let devices = DeviceList::available(verbs).unwrap();

    assert_eq!(devices.at(0).unwrap().name(), "mlx5_0");
    assert_eq!(devices.at(1).unwrap().name(), "mlx5_1");
    assert!(devices.get(2).is_none());
    assert!(matches!(
        devices.at(5),
        Err(Error::IndexOutOfRange { index: 5, len: 2 })
    ));
}

#[test]
fn name_lookup_is_length_bounded() {
    let verbs = FakeVerbs::default();
    let long_name = "x".repeat(SYSFS_NAME_MAX + 8);
    verbs
        .state
        .devices
        .lock()
        .push(fake_device(&long_name, 0, 0x1, vec![]));

    // Any probe agreeing on the first SYSFS_NAME_MAX bytes matches.
    let probe = format!("{}different-tail", "x".repeat(SYSFS_NAME_MAX));
    let devices = DeviceList::available(verbs).unwrap();
    assert!(devices.lookup_by_name(&probe).is_some());
    assert!(devices.lookup_by_name("x").is_none());
}

#[test]
fn port_count_agreement() {
    let verbs = two_device_fixture();
    let devices = DeviceList::available(verbs).unwrap();
    let ctx = devices.lookup_by_name("mlx5_1").unwrap().open().unwrap();

    let attr = ctx.query_device().unwrap();
    let ports = ctx.query_ports().unwrap();
    assert_eq!(ports.len(), usize::from(attr.phys_port_cnt));
    assert_eq!(ports[0].lid, 9);
    assert_eq!(ports[1].link_layer, LinkLayer::Ethernet);
}

#[test]
fn filter_is_an_order_preserving_subset() {
    let verbs = two_device_fixture();
    let devices = DeviceList::available(verbs).unwrap();
    let ctx = devices.lookup_by_name("mlx5_1").unwrap().open().unwrap();

    let all = ctx.query_ports().unwrap();
    let filtered = ctx
        .query_ports_filtered(|p| p.link_layer == LinkLayer::Infiniband)
        .unwrap();

    let expected: Vec<PortAttr> = all
        .iter()
        .filter(|p| p.link_layer == LinkLayer::Infiniband)
        .cloned()
        .collect();
    assert_eq!(filtered, expected);

    // A predicate matching everything changes nothing.
    let everything = ctx.query_ports_filtered(|_| true).unwrap();
    assert_eq!(everything, all);
}

#[test]
fn release_exactly_once_per_directory() {
    let verbs = two_device_fixture();
    for n in 1..=4 {
        let devices = DeviceList::available(verbs.clone()).unwrap();
        let _ = devices.lookup_by_name("mlx5_0");
        drop(devices);
        assert_eq!(verbs.enumerations(), n);
        assert_eq!(verbs.releases(), n);
    }
}

#[test]
fn failed_enumeration_releases_nothing() {
    let verbs = two_device_fixture();
    verbs.state.fail_enumerate.store(true, Ordering::SeqCst);

    let err = DeviceList::available(verbs.clone()).unwrap_err();
    assert!(matches!(err, Error::Enumerate(_)));
    assert_eq!(verbs.enumerations(), 0);
    assert_eq!(verbs.releases(), 0);

    // The caller may retry by constructing a new directory.
    verbs.state.fail_enumerate.store(false, Ordering::SeqCst);
    assert_eq!(DeviceList::available(verbs).unwrap().len(), 2);
}

#[test]
fn close_exactly_once_across_clones() {
    let verbs = two_device_fixture();
    let devices = DeviceList::available(verbs.clone()).unwrap();
    let ctx = devices.at(0).unwrap().open().unwrap();

    let clone_a = ctx.clone();
    let clone_b = clone_a.clone();
    drop(ctx);
    assert_eq!(verbs.closes(), 0);

    // Clones stay queryable after the original is gone.
    assert!(clone_a.query_device().is_ok());
    assert!(clone_b.query_ports().is_ok());

    drop(clone_b);
    drop(clone_a);
    assert_eq!(verbs.opens(), 1);
    assert_eq!(verbs.closes(), 1);
}

#[test]
fn context_open_result_is_debuggable() {
    let verbs = two_device_fixture();
    let devices = DeviceList::available(verbs.clone()).unwrap();

    // `Result<Context<_>, _>` combinators need `Debug` on both sides.
    let ctx = devices.at(0).unwrap().open().unwrap();
    assert_eq!(format!("{ctx:?}"), "Context { .. }");

    verbs.state.fail_open.store(true, Ordering::SeqCst);
    let err = devices.at(1).unwrap().open().unwrap_err();
    assert!(matches!(err, Error::Open(_)));
}

#[test]
fn open_failure_is_surfaced() {
    let verbs = two_device_fixture();
    let devices = DeviceList::available(verbs.clone()).unwrap();
    verbs.state.fail_open.store(true, Ordering::SeqCst);

    let err = devices.at(0).unwrap().open().unwrap_err();
    assert!(matches!(err, Error::Open(_)));
    assert_eq!(verbs.opens(), 0);
    assert_eq!(verbs.closes(), 0);
}

#[test]
fn port_query_is_all_or_nothing() {
    let verbs = two_device_fixture();
    verbs.state.devices.lock()[1].fail_query_port = Some(2);

    let devices = DeviceList::available(verbs.clone()).unwrap();
    let ctx = devices.lookup_by_name("mlx5_1").unwrap().open().unwrap();

    let err = ctx.query_ports().unwrap_err();
    assert!(matches!(
        err,
        Error::Query {
            port_num: Some(2),
            ..
        }
    ));

    // The filtered form shares the failure contract.
    assert!(ctx.query_ports_filtered(|_| true).is_err());

    drop(devices);
    drop(ctx);
    assert_eq!(verbs.closes(), 1);
}

#[test]
fn device_query_failure_is_surfaced() {
    let verbs = two_device_fixture();
    verbs.state.devices.lock()[0].fail_query_device = true;

    let devices = DeviceList::available(verbs).unwrap();
    let ctx = devices.at(0).unwrap().open().unwrap();

    let err = ctx.query_device().unwrap_err();
    assert!(matches!(err, Error::Query { port_num: None, .. }));
    // query_ports needs the port count, so it fails the same way.
    assert!(ctx.query_ports().is_err());
}

#[test]
fn reresolution_after_churn() {
    let verbs = two_device_fixture();
    let desc = {
        let devices = DeviceList::available(verbs.clone()).unwrap();
        devices.lookup_by_name("mlx5_1").unwrap().descriptor()
    };
    assert_eq!(desc.stable_index(), Some(1));

    // Simulated adapter removal: a later directory no longer carries
    // stable index 1.
    let removed = verbs.state.devices.lock().pop().unwrap();
    let err = desc.open(&verbs).unwrap_err();
    assert!(matches!(err, Error::NotFound));

    // Plugged back in: the same descriptor resolves again.
    verbs.state.devices.lock().push(removed);
    let ctx = desc.open(&verbs).unwrap();
    let attr = ctx.query_device().unwrap();
    assert_eq!(attr.node_guid, desc.guid());

    // Every re-resolution built (and released) a fresh directory.
    assert_eq!(verbs.releases(), verbs.enumerations());
}

#[test]
fn unsupported_stable_index_never_matches() {
    let verbs = two_device_fixture();
    verbs.state.devices.lock()[0].stable_index = None;

    let devices = DeviceList::available(verbs.clone()).unwrap();
    assert!(devices.lookup_by_stable_index(0).is_none());
    drop(devices);

    // A descriptor captured on such a host cannot be re-resolved, and
    // says so without enumerating.
    let desc = {
        let devices = DeviceList::available(verbs.clone()).unwrap();
        devices.at(0).unwrap().descriptor()
    };
    let enumerations = verbs.enumerations();
    assert!(matches!(desc.open(&verbs), Err(Error::NotFound)));
    assert_eq!(verbs.enumerations(), enumerations);
}

#[test]
fn two_adapter_scenario() {
    let verbs = two_device_fixture();

    let descriptors = list_devices(&verbs).unwrap();
    assert_eq!(descriptors.len(), 2);
    assert_eq!(descriptors[0].name(), "mlx5_0");
    assert_eq!(descriptors[0].guid(), Guid::from_u64(0xAA));
    assert_eq!(descriptors[1].name(), "mlx5_1");
    assert_eq!(descriptors[1].guid(), Guid::from_u64(0xBB));

    let devices = DeviceList::available(verbs.clone()).unwrap();
    let first = devices.lookup_by_name("mlx5_0").unwrap();
    assert_eq!(first.guid(), Guid::from_u64(0xAA));
    assert!(devices.lookup_by_name("mlx5_2").is_none());

    let ctx = devices.lookup_by_name("mlx5_1").unwrap().open().unwrap();
    assert_eq!(ctx.query_device().unwrap().phys_port_cnt, 2);
    assert_eq!(ctx.query_ports().unwrap().len(), 2);

    let infiniband = ctx
        .query_ports_filtered(|p| p.link_layer == LinkLayer::Infiniband)
        .unwrap();
    assert_eq!(infiniband.len(), 1);
    assert_eq!(infiniband[0].lid, 9);
}
