use super::{DeviceDescriptor, Guid, NodeType};

use crate::ctx::Context;
use crate::error::{Error, Result};
use crate::verbs::{DeviceIdentity, VerbsApi};

use std::fmt;
use std::slice;

use tracing::trace;

/// Names are compared over at most this many bytes, matching the
/// driver's own truncation behavior (`IBV_SYSFS_NAME_MAX`).
pub const SYSFS_NAME_MAX: usize = 64;

/// The set of adapters visible at one point in time.
///
/// Owns the enumeration array for its lifetime and releases it exactly
/// once on drop. Entry views borrow from the list; anything a caller
/// needs to retain past the list must be copied out as a
/// [`DeviceDescriptor`].
pub struct DeviceList<V: VerbsApi> {
    verbs: V,
    // `Some` until drop takes the array back to `release_devices`.
    devices: Option<V::DeviceArray>,
}

/// A read-only view of one enumeration entry.
///
/// Valid only while its [`DeviceList`] is alive.
pub struct Device<'list, V: VerbsApi> {
    verbs: &'list V,
    handle: V::DeviceHandle,
}

impl<V: VerbsApi> DeviceList<V> {
    /// Returns the currently available devices.
    ///
    /// Enumeration order is whatever the primitive returns; entries are
    /// not resorted and nothing is cached across separate lists.
    #[inline]
    pub fn available(verbs: V) -> Result<Self> {
        let devices = verbs.enumerate_devices().map_err(Error::Enumerate)?;
        trace!(num_devices = devices.as_ref().len(), "enumerated devices");
        Ok(Self {
            verbs,
            devices: Some(devices),
        })
    }

    fn handles(&self) -> &[V::DeviceHandle] {
        match self.devices {
            Some(ref devices) => devices.as_ref(),
            None => &[],
        }
    }

    /// Number of entries.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.handles().len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles().is_empty()
    }

    /// Returns entry `index`, or `None` when out of bounds.
    #[inline]
    #[must_use]
    pub fn get(&self, index: usize) -> Option<Device<'_, V>> {
        let &handle = self.handles().get(index)?;
        Some(Device {
            verbs: &self.verbs,
            handle,
        })
    }

    /// Returns entry `index`, or [`Error::IndexOutOfRange`].
    #[inline]
    pub fn at(&self, index: usize) -> Result<Device<'_, V>> {
        self.get(index).ok_or(Error::IndexOutOfRange {
            index,
            len: self.len(),
        })
    }

    /// Iterates over the entries in enumeration order. Restartable.
    #[inline]
    pub fn iter(&self) -> Iter<'_, V> {
        Iter {
            verbs: &self.verbs,
            inner: self.handles().iter(),
        }
    }

    /// Returns the first entry satisfying `predicate`, or `None`.
    ///
    /// The adapter count is small (single digits to low tens), so every
    /// lookup is a linear scan.
    #[inline]
    pub fn lookup_by_predicate<F>(&self, mut predicate: F) -> Option<Device<'_, V>>
    where
        F: FnMut(&Device<'_, V>) -> bool,
    {
        self.iter().find(|dev| predicate(dev))
    }

    /// Returns the first entry whose name matches `name` over at most
    /// [`SYSFS_NAME_MAX`] bytes, or `None`. A miss is an expected
    /// outcome, not an error.
    #[inline]
    #[must_use]
    pub fn lookup_by_name(&self, name: &str) -> Option<Device<'_, V>> {
        self.lookup_by_predicate(|dev| bounded_name_eq(&dev.name(), name))
    }

    /// Returns the first entry whose kernel stable index resolves to
    /// `stable_index`, or `None`.
    ///
    /// The index is resolved through the primitive layer per entry, not
    /// read from a cached field; entries on hosts without index
    /// resolution never match.
    #[inline]
    #[must_use]
    pub fn lookup_by_stable_index(&self, stable_index: i32) -> Option<Device<'_, V>> {
        self.lookup_by_predicate(|dev| dev.stable_index() == Some(stable_index))
    }

    /// Returns the first entry with the given node GUID, or `None`.
    #[inline]
    #[must_use]
    pub fn lookup_by_guid(&self, guid: Guid) -> Option<Device<'_, V>> {
        self.lookup_by_predicate(|dev| dev.guid() == guid)
    }
}

impl<V: VerbsApi> Drop for DeviceList<V> {
    #[inline]
    fn drop(&mut self) {
        if let Some(devices) = self.devices.take() {
            trace!("releasing device list");
            self.verbs.release_devices(devices);
        }
    }
}

impl<'list, V: VerbsApi> IntoIterator for &'list DeviceList<V> {
    type Item = Device<'list, V>;
    type IntoIter = Iter<'list, V>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<V: VerbsApi> fmt::Debug for DeviceList<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// Iterator over the entries of a [`DeviceList`].
pub struct Iter<'list, V: VerbsApi> {
    verbs: &'list V,
    inner: slice::Iter<'list, V::DeviceHandle>,
}

impl<'list, V: VerbsApi> Iterator for Iter<'list, V> {
    type Item = Device<'list, V>;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let &handle = self.inner.next()?;
        Some(Device {
            verbs: self.verbs,
            handle,
        })
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<V: VerbsApi> ExactSizeIterator for Iter<'_, V> {}

impl<'list, V: VerbsApi> Device<'list, V> {
    pub(crate) fn verbs(&self) -> &'list V {
        self.verbs
    }

    pub(crate) fn handle(&self) -> V::DeviceHandle {
        self.handle
    }

    /// Copies the identity fields of this entry.
    #[inline]
    #[must_use]
    pub fn identity(&self) -> DeviceIdentity {
        self.verbs.device_identity(self.handle)
    }

    /// Returns kernel device name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> String {
        self.identity().name
    }

    /// Returns device's node GUID.
    #[inline]
    #[must_use]
    pub fn guid(&self) -> Guid {
        self.verbs.device_guid(self.handle)
    }

    /// Resolves the kernel stable index, or `None` where unsupported.
    #[inline]
    #[must_use]
    pub fn stable_index(&self) -> Option<i32> {
        self.verbs.device_index(self.handle)
    }

    #[inline]
    #[must_use]
    pub fn node_type(&self) -> NodeType {
        self.identity().node_type
    }

    /// Copies this entry into an owner-independent snapshot.
    #[inline]
    #[must_use]
    pub fn descriptor(&self) -> DeviceDescriptor {
        DeviceDescriptor::new(self.identity(), self.guid(), self.stable_index())
    }

    /// Opens a context on this adapter.
    #[inline]
    pub fn open(&self) -> Result<Context<V>> {
        Context::open(self)
    }
}

impl<V: VerbsApi> Clone for Device<'_, V> {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}

impl<V: VerbsApi> Copy for Device<'_, V> {}

impl<V: VerbsApi> fmt::Debug for Device<'_, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("name", &self.name())
            .field("guid", &self.guid())
            .finish()
    }
}

/// `strncmp(lhs, rhs, SYSFS_NAME_MAX) == 0` semantics.
fn bounded_name_eq(lhs: &str, rhs: &str) -> bool {
    let lhs = lhs.as_bytes();
    let rhs = rhs.as_bytes();
    let l = &lhs[..lhs.len().min(SYSFS_NAME_MAX)];
    let r = &rhs[..rhs.len().min(SYSFS_NAME_MAX)];
    l == r
}

/// Snapshots every currently visible adapter, in enumeration order.
///
/// Equivalent to enumerating a [`DeviceList`] and copying each entry's
/// [`DeviceDescriptor`]; the list is released before returning.
#[inline]
pub fn list_devices<V: VerbsApi>(verbs: &V) -> Result<Vec<DeviceDescriptor>> {
    let devices = DeviceList::available(verbs.clone())?;
    Ok(devices.iter().map(|dev| dev.descriptor()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounded_name_comparison() {
        assert!(bounded_name_eq("mlx5_0", "mlx5_0"));
        assert!(!bounded_name_eq("mlx5_0", "mlx5_1"));
        assert!(!bounded_name_eq("mlx5_0", "mlx5_01"));

        // Equality is decided by the first SYSFS_NAME_MAX bytes only.
        let long_a = format!("{}{}", "a".repeat(SYSFS_NAME_MAX), "tail-one");
        let long_b = format!("{}{}", "a".repeat(SYSFS_NAME_MAX), "tail-two");
        assert!(bounded_name_eq(&long_a, &long_b));
        assert!(!bounded_name_eq(&long_a[..SYSFS_NAME_MAX - 1], &long_b));
    }
}
