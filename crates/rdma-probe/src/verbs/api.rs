use crate::device::{DeviceAttr, Guid, NodeType, PortAttr};

use std::io;

/// Identity fields copied out of a raw enumeration entry.
///
/// All strings are bounded by the driver (`SYSFS_NAME_MAX` for names);
/// the copy is owner-independent and safe to retain.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceIdentity {
    /// Kernel device name, e.g. `mlx5_0`.
    pub name: String,
    /// Uverbs device name, e.g. `uverbs0`.
    pub internal_device_name: String,
    /// Path to the uverbs device node in sysfs.
    pub device_path: String,
    /// Path to the infiniband class device in sysfs.
    pub ib_device_path: String,
    pub node_type: NodeType,
}

/// The device-verbs primitive layer.
///
/// The core is generic over this trait so that the same lifecycle and
/// query logic runs against libibverbs (the `ibverbs` feature) and
/// against a fake layer in tests. Implementations are cheap handles:
/// cloning must not duplicate any driver resource.
///
/// Contract:
/// + `release_devices` is called exactly once per successful
///   `enumerate_devices`, with the array that call returned.
/// + `close_device` is called exactly once per successful `open_device`.
/// + device handles are valid only until their array is released.
pub trait VerbsApi: Clone + Send + Sync + 'static {
    /// A raw adapter handle inside an enumeration array.
    type DeviceHandle: Copy + Send + Sync + 'static;

    /// The owned enumeration array.
    type DeviceArray: AsRef<[Self::DeviceHandle]> + Send + Sync + 'static;

    /// An open device resource.
    type DeviceResource: Send + Sync + 'static;

    /// Enumerates the adapters currently visible to the host.
    fn enumerate_devices(&self) -> io::Result<Self::DeviceArray>;

    /// Releases an enumeration array.
    fn release_devices(&self, devices: Self::DeviceArray);

    /// Copies the identity fields of one entry.
    fn device_identity(&self, dev: Self::DeviceHandle) -> DeviceIdentity;

    /// Returns the node GUID of one entry.
    fn device_guid(&self, dev: Self::DeviceHandle) -> Guid;

    /// Resolves the kernel-assigned stable index of one entry, or
    /// `None` where the kernel lacks index-resolution support.
    fn device_index(&self, dev: Self::DeviceHandle) -> Option<i32>;

    /// Opens a device resource on one entry.
    fn open_device(&self, dev: Self::DeviceHandle) -> io::Result<Self::DeviceResource>;

    /// Closes an open device resource.
    fn close_device(&self, res: &mut Self::DeviceResource);

    /// Queries device-wide capability attributes.
    fn query_device(&self, res: &Self::DeviceResource) -> io::Result<DeviceAttr>;

    /// Queries the attributes of one port. Port numbers are 1-based.
    fn query_port(&self, res: &Self::DeviceResource, port_num: u8) -> io::Result<PortAttr>;
}
