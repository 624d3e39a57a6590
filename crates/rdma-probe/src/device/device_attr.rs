use super::Guid;

use crate::ctx::Context;
use crate::error::{Error, Result};
use crate::verbs::VerbsApi;

/// Device-wide capability attributes.
///
/// A plain snapshot constructed by the verbs provider; it carries no
/// reference back to the context that produced it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceAttr {
    /// Firmware version string.
    pub fw_ver: String,
    /// Node GUID, equal to the enumeration-time GUID of the adapter.
    pub node_guid: Guid,
    pub vendor_id: u32,
    pub vendor_part_id: u32,
    pub hw_ver: u32,
    /// Largest contiguous block that can be registered.
    pub max_mr_size: u64,
    pub max_qp: u32,
    pub max_qp_wr: u32,
    pub max_sge: u32,
    pub max_cq: u32,
    pub max_cqe: u32,
    pub max_mr: u32,
    pub max_pd: u32,
    /// Number of physical ports; bounds the valid 1-based port range.
    pub phys_port_cnt: u8,
}

impl DeviceAttr {
    /// Queries the device attributes of an open context.
    #[inline]
    pub fn query<V: VerbsApi>(ctx: &Context<V>) -> Result<Self> {
        ctx.verbs()
            .query_device(ctx.resource())
            .map_err(|source| Error::Query {
                port_num: None,
                source,
            })
    }

    /// Number of physical ports on the adapter.
    #[inline]
    #[must_use]
    pub fn physical_port_count(&self) -> u8 {
        self.phys_port_cnt
    }
}
