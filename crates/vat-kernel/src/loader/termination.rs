use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use vat_slots::CapData;

use crate::admin::AdminNotifier;
use crate::error::KernelError;
use crate::slog::KernelSlog;
use crate::vat::VatId;

/// Handed to a vat's manager so it can report that the vat has died. Only the
/// first report reaches the admin vat; later ones are absorbed.
pub struct TerminationNotifier {
    vat_id: VatId,
    terminated: AtomicBool,
    admin: AdminNotifier,
    slog: Arc<dyn KernelSlog>,
}

impl TerminationNotifier {
    pub(crate) fn new(vat_id: VatId, admin: AdminNotifier, slog: Arc<dyn KernelSlog>) -> Self {
        Self {
            vat_id,
            terminated: AtomicBool::new(false),
            admin,
            slog,
        }
    }

    pub fn vat_id(&self) -> &VatId {
        &self.vat_id
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::Acquire)
    }

    /// `info` must be well-formed capdata even when the call is a no-op.
    pub fn notify(&self, should_reject: bool, info: &CapData) -> Result<(), KernelError> {
        info.insist()?;
        if self.terminated.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.slog.terminate_vat(&self.vat_id, should_reject, info);
        let args = self
            .admin
            .termination_args(&self.vat_id, should_reject, info)?;
        self.admin.vat_terminated(args);
        Ok(())
    }
}
