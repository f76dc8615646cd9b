use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use vat_slots::{RemoteSlot, SlotKind, VatSlot};

use crate::error::CommsError;

/// First object index this side hands out on its own. Indices below it are
/// left free for connections bootstrapped with `add_egress`.
pub const FIRST_ALLOCATED_INDEX: u64 = 20;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteId(String);

impl RemoteId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RemoteId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// The capability list kept for one remote machine.
///
/// `from_remote` is keyed by slots as they arrive from the peer, `to_remote`
/// holds the slot to put on the wire when sending a local reference. For every
/// pair installed through [`Remote::install`] the two maps are inverse up to a
/// [`RemoteSlot::flip`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Remote {
    remote_id: RemoteId,
    from_remote: BTreeMap<RemoteSlot, VatSlot>,
    to_remote: BTreeMap<VatSlot, RemoteSlot>,
    next_object_index: u64,
}

impl Remote {
    pub fn new(remote_id: RemoteId) -> Self {
        Self {
            remote_id,
            from_remote: BTreeMap::new(),
            to_remote: BTreeMap::new(),
            next_object_index: FIRST_ALLOCATED_INDEX,
        }
    }

    pub fn remote_id(&self) -> &RemoteId {
        &self.remote_id
    }

    pub fn local_for(&self, inbound: &RemoteSlot) -> Option<VatSlot> {
        self.from_remote.get(inbound).copied()
    }

    pub fn remote_for(&self, local: &VatSlot) -> Option<RemoteSlot> {
        self.to_remote.get(local).copied()
    }

    pub fn next_object_index(&self) -> u64 {
        self.next_object_index
    }

    pub fn len(&self) -> usize {
        self.from_remote.len()
    }

    pub fn is_empty(&self) -> bool {
        self.from_remote.is_empty()
    }

    /// Records that `inbound` (as received from the peer) denotes `local`, and
    /// that `local` is sent as `inbound.flip()`. Both directions are checked
    /// before either map is touched.
    pub fn install(&mut self, inbound: RemoteSlot, local: VatSlot) -> Result<RemoteSlot, CommsError> {
        if let Some(existing) = self.to_remote.get(&local) {
            return Err(CommsError::LocalAlreadyMapped {
                remote: self.remote_id.clone(),
                local,
                existing: *existing,
            });
        }
        if let Some(existing) = self.from_remote.get(&inbound) {
            return Err(CommsError::RemoteAlreadyMapped {
                remote: self.remote_id.clone(),
                slot: inbound,
                existing: *existing,
            });
        }
        let outbound = inbound.flip();
        self.from_remote.insert(inbound, local);
        self.to_remote.insert(local, outbound);
        Ok(outbound)
    }

    /// Moves the allocation counter past `index` so a later
    /// [`Remote::allocate_object_index`] cannot hand it out again.
    pub(crate) fn reserve_object_index(&mut self, index: u64) -> Result<(), CommsError> {
        if self.next_object_index <= index {
            self.next_object_index = index
                .checked_add(1)
                .ok_or_else(|| CommsError::IndexExhausted(self.remote_id.clone()))?;
        }
        Ok(())
    }

    pub(crate) fn allocate_object_index(&mut self) -> Result<u64, CommsError> {
        let index = self.next_object_index;
        self.reserve_object_index(index)?;
        Ok(index)
    }

    pub(crate) fn inbound_object(&self, index: u64, allocated_by_recipient: bool) -> RemoteSlot {
        RemoteSlot::new(SlotKind::Object, allocated_by_recipient, index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object(text: &str) -> VatSlot {
        text.parse().unwrap()
    }

    #[test]
    fn install_keeps_maps_inverse() {
        let mut remote = Remote::new("m2".into());
        let inbound: RemoteSlot = "ro+3".parse().unwrap();
        let outbound = remote.install(inbound, object("o-1")).unwrap();

        assert_eq!(outbound.to_string(), "ro-3");
        assert_eq!(remote.local_for(&inbound), Some(object("o-1")));
        assert_eq!(remote.remote_for(&object("o-1")), Some(outbound));
        assert_eq!(remote.len(), 1);
    }

    #[test]
    fn failed_install_leaves_tables_untouched() {
        let mut remote = Remote::new("m2".into());
        let inbound: RemoteSlot = "ro+3".parse().unwrap();
        remote.install(inbound, object("o-1")).unwrap();
        let before = remote.clone();

        let err = remote.install(inbound, object("o-2")).unwrap_err();
        assert!(matches!(err, CommsError::RemoteAlreadyMapped { .. }));
        assert_eq!(remote, before);
        assert_eq!(remote.remote_for(&object("o-2")), None);
    }

    #[test]
    fn counter_only_moves_forward() {
        let mut remote = Remote::new("m2".into());
        remote.reserve_object_index(3).unwrap();
        assert_eq!(remote.next_object_index(), FIRST_ALLOCATED_INDEX);
        remote.reserve_object_index(40).unwrap();
        assert_eq!(remote.next_object_index(), 41);
        assert_eq!(remote.allocate_object_index().unwrap(), 41);
        assert_eq!(remote.next_object_index(), 42);
    }

    #[test]
    fn counter_refuses_to_wrap() {
        let mut remote = Remote::new("m2".into());
        let err = remote.reserve_object_index(u64::MAX).unwrap_err();
        assert_eq!(err, CommsError::IndexExhausted("m2".into()));
    }
}
