use crate::ctx::Context;
use crate::error::{Error, Result};
use crate::verbs::VerbsApi;

use bitflags::bitflags;

/// Per-port attributes.
///
/// A plain snapshot constructed by the verbs provider for one 1-based
/// port number.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PortAttr {
    pub state: PortState,
    pub max_mtu: Mtu,
    pub active_mtu: Mtu,
    pub gid_tbl_len: u32,
    pub port_cap_flags: PortCapFlags,
    pub max_msg_sz: u32,
    pub lid: u16,
    pub sm_lid: u16,
    pub link_layer: LinkLayer,
}

impl PortAttr {
    /// Queries the attributes of one port of an open context.
    #[inline]
    pub fn query<V: VerbsApi>(ctx: &Context<V>, port_num: u8) -> Result<Self> {
        ctx.verbs()
            .query_port(ctx.resource(), port_num)
            .map_err(|source| Error::Query {
                port_num: Some(port_num),
                source,
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u32)]
pub enum PortState {
    Nop = 0,
    Down = 1,
    Init = 2,
    Armed = 3,
    Active = 4,
    ActiveDefer = 5,
}

#[cfg(feature = "ibverbs")]
impl PortState {
    pub(crate) fn from_raw(val: u32) -> PortState {
        match val {
            0 => PortState::Nop,
            1 => PortState::Down,
            2 => PortState::Init,
            3 => PortState::Armed,
            4 => PortState::Active,
            5 => PortState::ActiveDefer,
            _ => panic!("unknown port state"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u32)]
pub enum LinkLayer {
    Unspecified = 0,
    Infiniband = 1,
    Ethernet = 2,
}

#[cfg(feature = "ibverbs")]
impl LinkLayer {
    pub(crate) fn from_raw(val: u32) -> LinkLayer {
        match val {
            1 => LinkLayer::Infiniband,
            2 => LinkLayer::Ethernet,
            _ => LinkLayer::Unspecified,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u32)]
pub enum Mtu {
    Mtu256 = 1,
    Mtu512 = 2,
    Mtu1024 = 3,
    Mtu2048 = 4,
    Mtu4096 = 5,
}

impl Mtu {
    #[cfg(feature = "ibverbs")]
    pub(crate) fn from_raw(val: u32) -> Mtu {
        match val {
            1 => Mtu::Mtu256,
            2 => Mtu::Mtu512,
            3 => Mtu::Mtu1024,
            4 => Mtu::Mtu2048,
            5 => Mtu::Mtu4096,
            _ => panic!("unexpected MTU value"),
        }
    }

    #[allow(clippy::as_conversions)]
    fn to_u32(self) -> u32 {
        self as u32
    }

    /// MTU in bytes.
    #[inline]
    #[must_use]
    pub fn size(self) -> usize {
        let level = self.to_u32();
        1usize.wrapping_shl(level.wrapping_add(7))
    }
}

bitflags! {
    /// Port capability flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PortCapFlags: u32 {
        const SM = 1 << 1;
        const NOTICE_SUP = 1 << 2;
        const TRAP_SUP = 1 << 3;
        const OPT_IPD_SUP = 1 << 4;
        const AUTO_MIGR_SUP = 1 << 5;
        const SL_MAP_SUP = 1 << 6;
        const SYS_IMAGE_GUID_SUP = 1 << 11;
        const CM_SUP = 1 << 16;
        const SNMP_TUNNEL_SUP = 1 << 17;
        const REINIT_SUP = 1 << 18;
        const DEVICE_MGMT_SUP = 1 << 19;
        const VENDOR_CLASS_SUP = 1 << 20;
        const CLIENT_REG_SUP = 1 << 25;
        const IP_BASED_GIDS = 1 << 26;
    }
}
