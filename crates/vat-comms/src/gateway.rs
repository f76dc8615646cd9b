use indexmap::IndexMap;
use vat_slots::{RemoteSlot, SlotKind, VatSlot};

use crate::error::CommsError;
use crate::provider::{LocalForRemote, LocalObjectAllocator};
use crate::remote::{Remote, RemoteId};

/// Owns the capability list of every known peer. All mutation of a
/// [`Remote`] goes through here, one call at a time.
///
/// To let machine 2 reach `o-5` on machine 1 under the agreed index 12:
///
/// * machine 1 runs `add_egress("m2", 12, o-5)`: `from_remote[ro+12] = o-5`,
///   `to_remote[o-5] = ro-12`
/// * machine 2 runs `add_ingress("m1", 12)` and gets, say, `o+8`:
///   `from_remote[ro-12] = o+8`, `to_remote[o+8] = ro+12`
///
/// A message sent by machine 2 to `o+8` goes out as `ro+12`, which machine 1
/// resolves to `o-5`; machine 1 sending `o-5` writes `ro-12`, which machine 2
/// resolves back to `o+8`.
#[derive(Debug)]
pub struct CommsGateway<P = LocalObjectAllocator> {
    remotes: IndexMap<RemoteId, Remote>,
    provider: P,
}

impl Default for CommsGateway<LocalObjectAllocator> {
    fn default() -> Self {
        Self::with_provider(LocalObjectAllocator::default())
    }
}

impl CommsGateway<LocalObjectAllocator> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<P: LocalForRemote> CommsGateway<P> {
    pub fn with_provider(provider: P) -> Self {
        Self {
            remotes: IndexMap::new(),
            provider,
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn add_remote(&mut self, remote_id: RemoteId) -> Result<&Remote, CommsError> {
        if self.remotes.contains_key(&remote_id) {
            return Err(CommsError::DuplicateRemote(remote_id));
        }
        let remote = Remote::new(remote_id.clone());
        Ok(self.remotes.entry(remote_id).or_insert(remote))
    }

    pub fn remote(&self, remote_id: &RemoteId) -> Result<&Remote, CommsError> {
        self.remotes
            .get(remote_id)
            .ok_or_else(|| CommsError::UnknownRemote(remote_id.clone()))
    }

    pub fn remotes(&self) -> impl Iterator<Item = &Remote> {
        self.remotes.values()
    }

    /// Makes `local` reachable by `remote_id` under a caller-chosen index.
    /// Only for bootstrapping, where both sides agree on the index out of band.
    pub fn add_egress(
        &mut self,
        remote_id: &RemoteId,
        remote_ref_id: u64,
        local: VatSlot,
    ) -> Result<(), CommsError> {
        local.insist_kind(SlotKind::Object)?;
        let remote = self
            .remotes
            .get_mut(remote_id)
            .ok_or_else(|| CommsError::UnknownRemote(remote_id.clone()))?;
        if remote_ref_id == u64::MAX {
            return Err(CommsError::IndexExhausted(remote_id.clone()));
        }

        let inbound = remote.inbound_object(remote_ref_id, true);
        self.provider.reserve_local(remote_id, local)?;
        let outbound = remote.install(inbound, local)?;
        remote.reserve_object_index(remote_ref_id)?;
        log::debug!(
            target: "comms",
            "comms add egress {local} to {remote_id} in {inbound} out {outbound}"
        );
        Ok(())
    }

    /// Returns the local object standing for the peer's object `remote_ref_id`,
    /// minting one on first use. Repeated calls return the same slot.
    pub fn add_ingress(
        &mut self,
        remote_id: &RemoteId,
        remote_ref_id: u64,
    ) -> Result<VatSlot, CommsError> {
        let remotes = &mut self.remotes;
        let remote = remotes
            .get_mut(remote_id)
            .ok_or_else(|| CommsError::UnknownRemote(remote_id.clone()))?;
        let inbound = remote.inbound_object(remote_ref_id, false);
        let local = self.provider.provide_local_for_remote(remote, inbound)?;
        log::debug!(
            target: "comms",
            "comms add ingress {local} to {remote_id} in {inbound}"
        );
        Ok(local)
    }

    /// Returns the slot to send when passing `local` to `remote_id`, allocating
    /// a fresh index from the peer's counter on first use.
    pub fn provide_remote_for_local(
        &mut self,
        remote_id: &RemoteId,
        local: VatSlot,
    ) -> Result<RemoteSlot, CommsError> {
        let remote = self
            .remotes
            .get_mut(remote_id)
            .ok_or_else(|| CommsError::UnknownRemote(remote_id.clone()))?;
        if let Some(outbound) = remote.remote_for(&local) {
            return Ok(outbound);
        }
        local.insist_kind(SlotKind::Object)?;
        self.provider.reserve_local(remote_id, local)?;
        let index = remote.allocate_object_index()?;
        let inbound = remote.inbound_object(index, true);
        let outbound = remote.install(inbound, local)?;
        log::debug!(
            target: "comms",
            "comms export {local} to {remote_id} as {outbound}"
        );
        Ok(outbound)
    }
}
