//! Open device contexts and attribute queries.

use crate::device::{Device, DeviceAttr, PortAttr};
use crate::error::{Error, Result};
use crate::verbs::VerbsApi;

use std::fmt;
use std::sync::Arc;

use tracing::debug;

/// An open resource handle bound to one adapter.
///
/// Clones are read-only aliases of the same resource, never independent
/// resources; the underlying device is closed exactly once, when the
/// last clone is dropped. Queries take `&self` and may be issued
/// concurrently from multiple clones.
///
/// A dropped context cannot be reopened; construct a new one from a
/// live [`Device`] entry or a retained
/// [`DeviceDescriptor`](crate::device::DeviceDescriptor).
pub struct Context<V: VerbsApi>(Arc<Owner<V>>);

impl<V: VerbsApi> Context<V> {
    /// Opens a context on a device entry of a live list.
    #[inline]
    pub fn open(device: &Device<'_, V>) -> Result<Self> {
        let verbs = device.verbs();
        let res = verbs.open_device(device.handle()).map_err(Error::Open)?;
        debug!("opened device context");
        let owner = Arc::new(Owner {
            verbs: verbs.clone(),
            res,
        });
        Ok(Self(owner))
    }

    pub(crate) fn verbs(&self) -> &V {
        &self.0.verbs
    }

    pub(crate) fn resource(&self) -> &V::DeviceResource {
        &self.0.res
    }

    /// Queries device-wide capability attributes.
    #[inline]
    pub fn query_device(&self) -> Result<DeviceAttr> {
        DeviceAttr::query(self)
    }

    /// Queries every port of the adapter, in ascending port-number
    /// order (ports are numbered `1..=phys_port_cnt`).
    ///
    /// All-or-nothing: the first per-port failure aborts the whole
    /// query and no partial list is returned.
    #[inline]
    pub fn query_ports(&self) -> Result<Vec<PortAttr>> {
        let device_attr = self.query_device()?;
        let port_count = device_attr.physical_port_count();
        let mut ports = Vec::with_capacity(usize::from(port_count));
        for port_num in 1..=port_count {
            ports.push(PortAttr::query(self, port_num)?);
        }
        Ok(ports)
    }

    /// Like [`query_ports`](Self::query_ports), retaining only ports
    /// satisfying `predicate`. Port-number order is preserved;
    /// filtering itself never fails.
    #[inline]
    pub fn query_ports_filtered<F>(&self, mut predicate: F) -> Result<Vec<PortAttr>>
    where
        F: FnMut(&PortAttr) -> bool,
    {
        let mut ports = self.query_ports()?;
        ports.retain(|port| predicate(port));
        Ok(ports)
    }
}

impl<V: VerbsApi> Clone for Context<V> {
    #[inline]
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<V: VerbsApi> fmt::Debug for Context<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context").finish_non_exhaustive()
    }
}

struct Owner<V: VerbsApi> {
    verbs: V,
    res: V::DeviceResource,
}

impl<V: VerbsApi> Drop for Owner<V> {
    fn drop(&mut self) {
        debug!("closing device context");
        self.verbs.close_device(&mut self.res);
    }
}
