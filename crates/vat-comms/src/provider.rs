use vat_slots::{RemoteSlot, SlotKind, VatSlot};

use crate::error::CommsError;
use crate::remote::{Remote, RemoteId};

/// Supplies the local slot that stands for a reference received from a peer.
///
/// Implementations return the existing mapping when `inbound` has been seen
/// before, and otherwise mint a local slot and record it with
/// [`Remote::install`].
pub trait LocalForRemote {
    fn provide_local_for_remote(
        &mut self,
        remote: &mut Remote,
        inbound: RemoteSlot,
    ) -> Result<VatSlot, CommsError>;

    /// Called when `local` reaches `remote_id` by a route other than this
    /// provider, e.g. a bootstrapped egress. A provider that mints locals
    /// must never hand out `local` afterwards.
    fn reserve_local(&mut self, remote_id: &RemoteId, local: VatSlot) -> Result<(), CommsError> {
        let _ = (remote_id, local);
        Ok(())
    }
}

/// Mints `o+N` local objects from a counter shared by all peers.
#[derive(Debug, Clone)]
pub struct LocalObjectAllocator {
    next_index: u64,
}

impl Default for LocalObjectAllocator {
    fn default() -> Self {
        // o+0 is the root object of the comms vat itself.
        Self { next_index: 1 }
    }
}

impl LocalObjectAllocator {
    pub fn starting_at(next_index: u64) -> Self {
        Self { next_index }
    }

    pub fn next_index(&self) -> u64 {
        self.next_index
    }
}

impl LocalForRemote for LocalObjectAllocator {
    fn provide_local_for_remote(
        &mut self,
        remote: &mut Remote,
        inbound: RemoteSlot,
    ) -> Result<VatSlot, CommsError> {
        if let Some(local) = remote.local_for(&inbound) {
            return Ok(local);
        }
        if inbound.allocated_by_recipient {
            // We would have minted it, so it must already be in the table.
            return Err(CommsError::UnknownInbound {
                remote: remote.remote_id().clone(),
                slot: inbound,
            });
        }
        let mut local = VatSlot::new(inbound.kind, true, self.next_index);
        while remote.remote_for(&local).is_some() {
            local.index = bump(remote.remote_id(), local.index)?;
        }
        let next_index = bump(remote.remote_id(), local.index)?;
        remote.install(inbound, local)?;
        self.next_index = next_index;
        Ok(local)
    }

    fn reserve_local(&mut self, remote_id: &RemoteId, local: VatSlot) -> Result<(), CommsError> {
        if local.kind == SlotKind::Object && local.allocated_by_vat && local.index >= self.next_index
        {
            self.next_index = bump(remote_id, local.index)?;
        }
        Ok(())
    }
}

fn bump(remote_id: &RemoteId, index: u64) -> Result<u64, CommsError> {
    index
        .checked_add(1)
        .ok_or_else(|| CommsError::IndexExhausted(remote_id.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mints_once_per_inbound_slot() {
        let mut remote = Remote::new("m1".into());
        let mut allocator = LocalObjectAllocator::default();
        let inbound: RemoteSlot = "ro-12".parse().unwrap();

        let first = allocator
            .provide_local_for_remote(&mut remote, inbound)
            .unwrap();
        let second = allocator
            .provide_local_for_remote(&mut remote, inbound)
            .unwrap();

        assert_eq!(first.to_string(), "o+1");
        assert_eq!(first, second);
        assert_eq!(allocator.next_index(), 2);
    }

    #[test]
    fn refuses_to_mint_for_our_own_allocation() {
        let mut remote = Remote::new("m1".into());
        let mut allocator = LocalObjectAllocator::default();
        let inbound: RemoteSlot = "ro+7".parse().unwrap();

        let err = allocator
            .provide_local_for_remote(&mut remote, inbound)
            .unwrap_err();
        assert!(matches!(err, CommsError::UnknownInbound { .. }));
        assert!(remote.is_empty());
    }

    #[test]
    fn skips_locals_already_in_the_table() {
        let mut remote = Remote::new("m1".into());
        let mut allocator = LocalObjectAllocator::default();
        remote
            .install("ro+3".parse().unwrap(), "o+1".parse().unwrap())
            .unwrap();

        let local = allocator
            .provide_local_for_remote(&mut remote, "ro-9".parse().unwrap())
            .unwrap();
        assert_eq!(local.to_string(), "o+2");
        assert_eq!(allocator.next_index(), 3);
    }

    #[test]
    fn reserved_locals_are_not_minted() {
        let mut allocator = LocalObjectAllocator::default();
        let m1 = RemoteId::from("m1");
        allocator.reserve_local(&m1, "o+4".parse().unwrap()).unwrap();
        assert_eq!(allocator.next_index(), 5);

        // Imports and other kinds live in other namespaces.
        allocator.reserve_local(&m1, "o-9".parse().unwrap()).unwrap();
        allocator.reserve_local(&m1, "p+9".parse().unwrap()).unwrap();
        assert_eq!(allocator.next_index(), 5);
    }

    #[test]
    fn counter_refuses_to_wrap() {
        let mut remote = Remote::new("m1".into());
        let mut allocator = LocalObjectAllocator::starting_at(u64::MAX);
        let err = allocator
            .provide_local_for_remote(&mut remote, "ro-1".parse().unwrap())
            .unwrap_err();
        assert_eq!(err, CommsError::IndexExhausted("m1".into()));
        assert!(remote.is_empty());
        assert_eq!(allocator.next_index(), u64::MAX);

        let err = LocalObjectAllocator::default()
            .reserve_local(&"m1".into(), VatSlot::new(SlotKind::Object, true, u64::MAX))
            .unwrap_err();
        assert_eq!(err, CommsError::IndexExhausted("m1".into()));
    }
}
