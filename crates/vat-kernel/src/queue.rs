use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use vat_slots::{CapData, KernelSlot, SlotKind, VatSlot};

use crate::error::KernelError;
use crate::vat::VatId;

/// What the kernel does with the result promise of a queued send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResolutionPolicy {
    Ignore,
    LogFailure,
    Panic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedMessage {
    pub target: KernelSlot,
    pub method: String,
    pub args: CapData,
    pub policy: ResolutionPolicy,
}

/// The kernel's object table and run-queue, as far as vat creation needs them.
pub trait KernelQueue: Send + Sync {
    /// Makes `slot`, exported by `vat_id`, addressable in the kernel and
    /// returns its kernel slot. Exporting the same slot twice yields the same
    /// kernel slot.
    fn add_export(&self, vat_id: &VatId, slot: VatSlot) -> Result<KernelSlot, KernelError>;

    /// Queues `method(args)` to the object `vat_id` exports as `slot`.
    fn queue_to_export(
        &self,
        vat_id: &VatId,
        slot: VatSlot,
        method: &str,
        args: CapData,
        policy: ResolutionPolicy,
    ) -> Result<(), KernelError>;
}

#[derive(Debug, Default)]
struct RunQueueState {
    exports: BTreeMap<(VatId, VatSlot), KernelSlot>,
    next_object: u64,
    messages: Vec<QueuedMessage>,
}

/// In-memory object table and run-queue.
#[derive(Debug, Default)]
pub struct MemRunQueue {
    state: Mutex<RunQueueState>,
}

impl MemRunQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, RunQueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn messages(&self) -> Vec<QueuedMessage> {
        self.state().messages.clone()
    }

    pub fn drain(&self) -> Vec<QueuedMessage> {
        std::mem::take(&mut self.state().messages)
    }

    pub fn export_of(&self, vat_id: &VatId, slot: VatSlot) -> Option<KernelSlot> {
        self.state().exports.get(&(vat_id.clone(), slot)).copied()
    }
}

impl KernelQueue for MemRunQueue {
    fn add_export(&self, vat_id: &VatId, slot: VatSlot) -> Result<KernelSlot, KernelError> {
        if !slot.allocated_by_vat {
            return Err(KernelError::Queue(format!(
                "vat {vat_id} cannot export {slot}: not allocated by the vat"
            )));
        }
        let mut state = self.state();
        if let Some(existing) = state.exports.get(&(vat_id.clone(), slot)) {
            return Ok(*existing);
        }
        state.next_object += 1;
        let kernel_slot = KernelSlot::new(slot.kind, state.next_object);
        state.exports.insert((vat_id.clone(), slot), kernel_slot);
        Ok(kernel_slot)
    }

    fn queue_to_export(
        &self,
        vat_id: &VatId,
        slot: VatSlot,
        method: &str,
        args: CapData,
        policy: ResolutionPolicy,
    ) -> Result<(), KernelError> {
        slot.insist_kind(SlotKind::Object)?;
        args.insist()?;
        let target = self.add_export(vat_id, slot)?;
        self.state().messages.push(QueuedMessage {
            target,
            method: method.to_string(),
            args,
            policy,
        });
        Ok(())
    }
}
