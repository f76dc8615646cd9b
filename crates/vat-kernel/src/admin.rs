use std::sync::Arc;

use serde_json::json;
use vat_slots::{CapData, VatSlot, slot_ref};

use crate::error::KernelError;
use crate::keeper::KernelKeeper;
use crate::queue::{KernelQueue, ResolutionPolicy};
use crate::vat::VatId;

pub const NEW_VAT_CALLBACK: &str = "newVatCallback";
pub const VAT_TERMINATED: &str = "vatTerminated";

/// Shapes lifecycle messages for the admin vat and queues them to its root
/// object. Delivery is best-effort: a failure to queue is logged, never
/// returned into the vat lifecycle.
#[derive(Clone)]
pub struct AdminNotifier {
    keeper: Arc<dyn KernelKeeper>,
    queue: Arc<dyn KernelQueue>,
    admin_vat_name: String,
}

impl AdminNotifier {
    pub fn new(
        keeper: Arc<dyn KernelKeeper>,
        queue: Arc<dyn KernelQueue>,
        admin_vat_name: impl Into<String>,
    ) -> Self {
        Self {
            keeper,
            queue,
            admin_vat_name: admin_vat_name.into(),
        }
    }

    /// `[vatID, {rootObject}]`, exporting the new vat's root object to the
    /// kernel so the admin vat can be handed a reference to it.
    pub fn success_response(&self, vat_id: &VatId) -> Result<CapData, KernelError> {
        let root = self.queue.add_export(vat_id, VatSlot::root_object())?;
        Ok(CapData::new(
            &json!([vat_id, { "rootObject": slot_ref(0) }]),
            vec![root.to_string()],
        ))
    }

    /// `[vatID, {error}]`
    pub fn error_response(&self, vat_id: &VatId, error: &str) -> CapData {
        CapData::plain(&json!([vat_id, { "error": error }]))
    }

    /// `[vatID, shouldReject, info]`. Neither the vat id nor the flag carry
    /// slots, so `info`'s slot table is reused as is.
    pub fn termination_args(
        &self,
        vat_id: &VatId,
        should_reject: bool,
        info: &CapData,
    ) -> Result<CapData, KernelError> {
        let info_body = info.parse_body()?;
        Ok(CapData::new(
            &json!([vat_id, should_reject, info_body]),
            info.slots.clone(),
        ))
    }

    pub fn new_vat_callback(&self, args: CapData) {
        self.deliver(NEW_VAT_CALLBACK, args);
    }

    pub fn vat_terminated(&self, args: CapData) {
        self.deliver(VAT_TERMINATED, args);
    }

    fn deliver(&self, method: &str, args: CapData) {
        if let Err(err) = self.try_deliver(method, args) {
            log::error!("error delivering {method} to {}: {err}", self.admin_vat_name);
        }
    }

    fn try_deliver(&self, method: &str, args: CapData) -> Result<(), KernelError> {
        let admin = self
            .keeper
            .vat_name_to_id(&self.admin_vat_name)
            .ok_or_else(|| KernelError::UnknownVatName(self.admin_vat_name.clone()))?;
        self.queue.queue_to_export(
            &admin,
            VatSlot::root_object(),
            method,
            args,
            ResolutionPolicy::LogFailure,
        )
    }
}
