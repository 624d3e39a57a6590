use super::{DeviceList, Guid};

use crate::ctx::Context;
use crate::error::{Error, Result};
use crate::verbs::{DeviceIdentity, VerbsApi};

/// An immutable snapshot of one adapter's identity.
///
/// Unlike a [`Device`](super::Device) entry, a descriptor carries no
/// reference back to the enumeration array and may be retained
/// indefinitely. Use [`DeviceDescriptor::open`] to re-resolve it into a
/// fresh context later.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceDescriptor {
    stable_index: Option<i32>,
    guid: Guid,
    identity: DeviceIdentity,
}

impl DeviceDescriptor {
    pub(crate) fn new(identity: DeviceIdentity, guid: Guid, stable_index: Option<i32>) -> Self {
        Self {
            stable_index,
            guid,
            identity,
        }
    }

    /// The kernel-assigned stable index, if the host supports index
    /// resolution. Stable across separate enumeration calls.
    #[inline]
    #[must_use]
    pub fn stable_index(&self) -> Option<i32> {
        self.stable_index
    }

    #[inline]
    #[must_use]
    pub fn guid(&self) -> Guid {
        self.guid
    }

    #[inline]
    #[must_use]
    pub fn node_type(&self) -> NodeType {
        self.identity.node_type
    }

    /// Kernel device name, e.g. `mlx5_0`.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.identity.name
    }

    /// Uverbs device name, e.g. `uverbs0`.
    #[inline]
    #[must_use]
    pub fn internal_device_name(&self) -> &str {
        &self.identity.internal_device_name
    }

    #[inline]
    #[must_use]
    pub fn device_path(&self) -> &str {
        &self.identity.device_path
    }

    #[inline]
    #[must_use]
    pub fn ib_device_path(&self) -> &str {
        &self.identity.ib_device_path
    }

    /// Re-resolves this descriptor through a fresh enumeration and
    /// opens the matching adapter.
    ///
    /// Raw handles never outlive their directory, so the stable index
    /// is the only identity guaranteed to remain resolvable. Fails with
    /// [`Error::NotFound`] when no current entry carries this
    /// descriptor's stable index (adapter removed or renumbered), or
    /// when the host never supported index resolution.
    #[inline]
    pub fn open<V: VerbsApi>(&self, verbs: &V) -> Result<Context<V>> {
        let stable_index = self.stable_index.ok_or(Error::NotFound)?;
        let devices = DeviceList::available(verbs.clone())?;
        let dev = devices
            .lookup_by_stable_index(stable_index)
            .ok_or(Error::NotFound)?;
        dev.open()
    }
}

/// The node type reported by the enumeration entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(i32)]
pub enum NodeType {
    Unknown = -1,
    ChannelAdapter = 1,
    Switch = 2,
    Router = 3,
    RdmaNic = 4,
    UsNic = 5,
    UsNicUdp = 6,
}

impl NodeType {
    /// Maps a raw `ibv_node_type` value; unrecognized values fold into
    /// `Unknown`.
    #[inline]
    #[must_use]
    pub fn from_raw(val: i32) -> Self {
        match val {
            1 => NodeType::ChannelAdapter,
            2 => NodeType::Switch,
            3 => NodeType::Router,
            4 => NodeType::RdmaNic,
            5 => NodeType::UsNic,
            6 => NodeType::UsNicUdp,
            _ => NodeType::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::utils::require_send_sync;

    #[test]
    fn node_type_from_raw() {
        assert_eq!(NodeType::from_raw(1), NodeType::ChannelAdapter);
        assert_eq!(NodeType::from_raw(4), NodeType::RdmaNic);
        assert_eq!(NodeType::from_raw(-1), NodeType::Unknown);
        assert_eq!(NodeType::from_raw(42), NodeType::Unknown);
    }

    #[test]
    fn marker() {
        require_send_sync::<DeviceDescriptor>();
        require_send_sync::<NodeType>();
    }
}
