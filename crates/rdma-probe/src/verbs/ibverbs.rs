//! The libibverbs-backed primitive layer.
//!
//! Only the enumeration/open/query subset of the verbs API is declared
//! here; data-plane verbs are out of scope for this crate.

use super::{DeviceIdentity, VerbsApi};

use crate::device::{DeviceAttr, Guid, LinkLayer, Mtu, NodeType, PortAttr, PortCapFlags, PortState};

use std::ffi::CStr;
use std::io;
use std::mem::MaybeUninit;
use std::os::raw::c_int;
use std::ptr::NonNull;

use numeric_cast::NumericCast;
use scopeguard::guard_on_unwind;

mod sys {
    #![allow(non_camel_case_types, dead_code)]

    use libc::{c_char, c_int, c_uint};

    pub const IBV_SYSFS_NAME_MAX: usize = 64;
    pub const IBV_SYSFS_PATH_MAX: usize = 256;

    #[repr(C)]
    pub struct ibv_device_ops {
        pub _alloc_context: *mut libc::c_void,
        pub _free_context: *mut libc::c_void,
    }

    #[repr(C)]
    pub struct ibv_device {
        pub _ops: ibv_device_ops,
        pub node_type: c_int,
        pub transport_type: c_int,
        pub name: [c_char; IBV_SYSFS_NAME_MAX],
        pub dev_name: [c_char; IBV_SYSFS_NAME_MAX],
        pub dev_path: [c_char; IBV_SYSFS_PATH_MAX],
        pub ibdev_path: [c_char; IBV_SYSFS_PATH_MAX],
    }

    #[repr(C)]
    pub struct ibv_context {
        _unused: [u8; 0],
    }

    #[repr(C)]
    pub struct ibv_device_attr {
        pub fw_ver: [c_char; 64],
        pub node_guid: u64,
        pub sys_image_guid: u64,
        pub max_mr_size: u64,
        pub page_size_cap: u64,
        pub vendor_id: u32,
        pub vendor_part_id: u32,
        pub hw_ver: u32,
        pub max_qp: c_int,
        pub max_qp_wr: c_int,
        pub device_cap_flags: c_uint,
        pub max_sge: c_int,
        pub max_sge_rd: c_int,
        pub max_cq: c_int,
        pub max_cqe: c_int,
        pub max_mr: c_int,
        pub max_pd: c_int,
        pub max_qp_rd_atom: c_int,
        pub max_ee_rd_atom: c_int,
        pub max_res_rd_atom: c_int,
        pub max_qp_init_rd_atom: c_int,
        pub max_ee_init_rd_atom: c_int,
        pub atomic_cap: c_uint,
        pub max_ee: c_int,
        pub max_rdd: c_int,
        pub max_mw: c_int,
        pub max_raw_ipv6_qp: c_int,
        pub max_raw_ethy_qp: c_int,
        pub max_mcast_grp: c_int,
        pub max_mcast_qp_attach: c_int,
        pub max_total_mcast_qp_attach: c_int,
        pub max_ah: c_int,
        pub max_fmr: c_int,
        pub max_map_per_fmr: c_int,
        pub max_srq: c_int,
        pub max_srq_wr: c_int,
        pub max_srq_sge: c_int,
        pub max_pkeys: u16,
        pub local_ca_ack_delay: u8,
        pub phys_port_cnt: u8,
    }

    // The exported (compat) symbol fills fields through `link_layer`;
    // the trailing extended fields stay as initialized by the caller.
    #[repr(C)]
    pub struct ibv_port_attr {
        pub state: c_uint,
        pub max_mtu: c_uint,
        pub active_mtu: c_uint,
        pub gid_tbl_len: c_int,
        pub port_cap_flags: u32,
        pub max_msg_sz: u32,
        pub bad_pkey_cntr: u32,
        pub qkey_viol_cntr: u32,
        pub pkey_tbl_len: u16,
        pub lid: u16,
        pub sm_lid: u16,
        pub lmc: u8,
        pub max_vl_num: u8,
        pub sm_sl: u8,
        pub subnet_timeout: u8,
        pub init_type_reply: u8,
        pub active_width: u8,
        pub active_speed: u8,
        pub phys_state: u8,
        pub link_layer: u8,
        pub flags: u8,
        pub port_cap_flags2: u16,
        pub active_speed_ex: u32,
    }

    #[link(name = "ibverbs")]
    extern "C" {
        pub fn ibv_get_device_list(num_devices: *mut c_int) -> *mut *mut ibv_device;
        pub fn ibv_free_device_list(list: *mut *mut ibv_device);
        pub fn ibv_get_device_name(device: *mut ibv_device) -> *const c_char;
        pub fn ibv_get_device_guid(device: *mut ibv_device) -> u64;
        pub fn ibv_get_device_index(device: *mut ibv_device) -> c_int;
        pub fn ibv_open_device(device: *mut ibv_device) -> *mut ibv_context;
        pub fn ibv_close_device(context: *mut ibv_context) -> c_int;
        pub fn ibv_query_device(
            context: *mut ibv_context,
            device_attr: *mut ibv_device_attr,
        ) -> c_int;
        pub fn ibv_query_port(
            context: *mut ibv_context,
            port_num: u8,
            port_attr: *mut ibv_port_attr,
        ) -> c_int;
    }
}

/// The libibverbs primitive layer.
#[derive(Clone, Copy, Debug, Default)]
pub struct Ibverbs;

/// A raw `ibv_device` entry.
#[derive(Clone, Copy)]
#[repr(transparent)]
pub struct RawDevice(NonNull<sys::ibv_device>);

/// SAFETY: owned type
unsafe impl Send for RawDevice {}
/// SAFETY: owned type
unsafe impl Sync for RawDevice {}

/// An owned `ibv_get_device_list` array.
pub struct RawDeviceList {
    arr: NonNull<RawDevice>,
    len: usize,
}

/// SAFETY: owned array
unsafe impl Send for RawDeviceList {}
/// SAFETY: owned array
unsafe impl Sync for RawDeviceList {}

impl AsRef<[RawDevice]> for RawDeviceList {
    #[inline]
    fn as_ref(&self) -> &[RawDevice] {
        // SAFETY: guaranteed by `Ibverbs::enumerate_devices`
        unsafe { std::slice::from_raw_parts(self.arr.as_ptr(), self.len) }
    }
}

/// An open `ibv_context`.
pub struct RawContext(NonNull<sys::ibv_context>);

/// SAFETY: owned type
unsafe impl Send for RawContext {}
/// SAFETY: owned type
unsafe impl Sync for RawContext {}

impl VerbsApi for Ibverbs {
    type DeviceHandle = RawDevice;
    type DeviceArray = RawDeviceList;
    type DeviceResource = RawContext;

    fn enumerate_devices(&self) -> io::Result<RawDeviceList> {
        // SAFETY: ffi
        unsafe {
            let mut num_devices: c_int = 0;
            let arr = sys::ibv_get_device_list(&mut num_devices);
            if arr.is_null() {
                return Err(io::Error::last_os_error());
            }

            // SAFETY: repr(transparent)
            let arr: NonNull<RawDevice> = NonNull::new_unchecked(arr.cast());

            let _guard = guard_on_unwind((), |()| sys::ibv_free_device_list(arr.as_ptr().cast()));

            let len: usize = num_devices.numeric_cast();
            Ok(RawDeviceList { arr, len })
        }
    }

    fn release_devices(&self, devices: RawDeviceList) {
        // SAFETY: ffi
        unsafe { sys::ibv_free_device_list(devices.arr.as_ptr().cast()) }
    }

    fn device_identity(&self, dev: RawDevice) -> DeviceIdentity {
        // SAFETY: the entry is valid while its array is alive
        unsafe {
            let ptr = dev.0.as_ptr();
            let name = CStr::from_ptr(sys::ibv_get_device_name(ptr));
            DeviceIdentity {
                name: to_string(name),
                internal_device_name: c_string_field(&(*ptr).dev_name),
                device_path: c_string_field(&(*ptr).dev_path),
                ib_device_path: c_string_field(&(*ptr).ibdev_path),
                node_type: NodeType::from_raw((*ptr).node_type),
            }
        }
    }

    fn device_guid(&self, dev: RawDevice) -> Guid {
        // SAFETY: ffi
        unsafe {
            let guid = sys::ibv_get_device_guid(dev.0.as_ptr());
            Guid::from_bytes(guid.to_ne_bytes())
        }
    }

    fn device_index(&self, dev: RawDevice) -> Option<i32> {
        // SAFETY: ffi
        let ret = unsafe { sys::ibv_get_device_index(dev.0.as_ptr()) };
        (ret >= 0).then_some(ret)
    }

    fn open_device(&self, dev: RawDevice) -> io::Result<RawContext> {
        // SAFETY: ffi
        unsafe {
            let ctx = sys::ibv_open_device(dev.0.as_ptr());
            if ctx.is_null() {
                return Err(io::Error::last_os_error());
            }
            Ok(RawContext(NonNull::new_unchecked(ctx)))
        }
    }

    fn close_device(&self, res: &mut RawContext) {
        // SAFETY: ffi
        let ret = unsafe { sys::ibv_close_device(res.0.as_ptr()) };
        assert_eq!(ret, 0);
    }

    fn query_device(&self, res: &RawContext) -> io::Result<DeviceAttr> {
        // SAFETY: ffi
        unsafe {
            let mut device_attr = MaybeUninit::<sys::ibv_device_attr>::zeroed();
            let ret = sys::ibv_query_device(res.0.as_ptr(), device_attr.as_mut_ptr());
            if ret != 0 {
                return Err(io::Error::from_raw_os_error(ret));
            }
            let attr = device_attr.assume_init();
            Ok(DeviceAttr {
                fw_ver: c_string_field(&attr.fw_ver),
                node_guid: Guid::from_bytes(attr.node_guid.to_ne_bytes()),
                vendor_id: attr.vendor_id,
                vendor_part_id: attr.vendor_part_id,
                hw_ver: attr.hw_ver,
                max_mr_size: attr.max_mr_size,
                max_qp: attr.max_qp.numeric_cast(),
                max_qp_wr: attr.max_qp_wr.numeric_cast(),
                max_sge: attr.max_sge.numeric_cast(),
                max_cq: attr.max_cq.numeric_cast(),
                max_cqe: attr.max_cqe.numeric_cast(),
                max_mr: attr.max_mr.numeric_cast(),
                max_pd: attr.max_pd.numeric_cast(),
                phys_port_cnt: attr.phys_port_cnt,
            })
        }
    }

    fn query_port(&self, res: &RawContext, port_num: u8) -> io::Result<PortAttr> {
        // SAFETY: ffi
        unsafe {
            let mut port_attr = MaybeUninit::<sys::ibv_port_attr>::zeroed();
            let ret = sys::ibv_query_port(res.0.as_ptr(), port_num, port_attr.as_mut_ptr());
            if ret != 0 {
                return Err(io::Error::from_raw_os_error(ret));
            }
            let attr = port_attr.assume_init();
            Ok(PortAttr {
                state: PortState::from_raw(attr.state),
                max_mtu: Mtu::from_raw(attr.max_mtu),
                active_mtu: Mtu::from_raw(attr.active_mtu),
                gid_tbl_len: attr.gid_tbl_len.numeric_cast(),
                port_cap_flags: PortCapFlags::from_bits_truncate(attr.port_cap_flags),
                max_msg_sz: attr.max_msg_sz,
                lid: attr.lid,
                sm_lid: attr.sm_lid,
                link_layer: LinkLayer::from_raw(u32::from(attr.link_layer)),
            })
        }
    }
}

fn to_string(s: &CStr) -> String {
    s.to_str().expect("non-utf8 device string").to_owned()
}

/// # Safety
/// `field` must hold a NUL-terminated string.
unsafe fn c_string_field(field: &[libc::c_char]) -> String {
    to_string(CStr::from_ptr(field.as_ptr()))
}
