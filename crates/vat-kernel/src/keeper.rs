use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::Value;

use crate::error::KernelError;
use crate::options::VatOptions;
use crate::source::VatSource;
use crate::vat::VatId;

/// The slice of the kernel's durable state the vat loader reads and writes.
pub trait KernelKeeper: Send + Sync {
    fn allocate_unused_vat_id(&self) -> Result<VatId, KernelError>;
    fn add_dynamic_vat_id(&self, vat_id: &VatId) -> Result<(), KernelError>;
    fn dynamic_vat_ids(&self) -> Vec<VatId>;
    fn set_source_and_options(
        &self,
        vat_id: &VatId,
        source: &VatSource,
        options: &VatOptions,
    ) -> Result<(), KernelError>;
    fn source_and_options(&self, vat_id: &VatId) -> Option<(VatSource, VatOptions)>;
    fn get_bundle(&self, name: &str) -> Option<Value>;
    fn vat_name_to_id(&self, name: &str) -> Option<VatId>;
}

#[derive(Debug, Clone)]
struct VatRecord {
    source: VatSource,
    options: VatOptions,
}

#[derive(Debug)]
struct KeeperState {
    next_vat_id: u64,
    dynamic_ids: Vec<VatId>,
    records: BTreeMap<VatId, VatRecord>,
    bundles: HashMap<String, Value>,
    names: HashMap<String, VatId>,
}

/// In-memory keeper for tests and embedded kernels.
#[derive(Debug)]
pub struct MemKernelKeeper {
    state: Mutex<KeeperState>,
}

impl Default for MemKernelKeeper {
    fn default() -> Self {
        Self::new()
    }
}

impl MemKernelKeeper {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(KeeperState {
                next_vat_id: 1,
                dynamic_ids: Vec::new(),
                records: BTreeMap::new(),
                bundles: HashMap::new(),
                names: HashMap::new(),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, KeeperState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_bundle(&self, name: impl Into<String>, bundle: Value) {
        self.state().bundles.insert(name.into(), bundle);
    }

    /// Registers a named vat (typically a static one) and returns its id.
    pub fn add_named_vat(&self, name: impl Into<String>) -> VatId {
        let mut state = self.state();
        let vat_id = VatId::numbered(state.next_vat_id);
        state.next_vat_id += 1;
        state.names.insert(name.into(), vat_id.clone());
        vat_id
    }
}

impl KernelKeeper for MemKernelKeeper {
    fn allocate_unused_vat_id(&self) -> Result<VatId, KernelError> {
        let mut state = self.state();
        let vat_id = VatId::numbered(state.next_vat_id);
        state.next_vat_id = state
            .next_vat_id
            .checked_add(1)
            .ok_or_else(|| KernelError::Keeper("vat ids exhausted".into()))?;
        Ok(vat_id)
    }

    fn add_dynamic_vat_id(&self, vat_id: &VatId) -> Result<(), KernelError> {
        let mut state = self.state();
        if state.dynamic_ids.contains(vat_id) {
            return Err(KernelError::Keeper(format!(
                "vat {vat_id} already recorded as dynamic"
            )));
        }
        state.dynamic_ids.push(vat_id.clone());
        Ok(())
    }

    fn dynamic_vat_ids(&self) -> Vec<VatId> {
        self.state().dynamic_ids.clone()
    }

    fn set_source_and_options(
        &self,
        vat_id: &VatId,
        source: &VatSource,
        options: &VatOptions,
    ) -> Result<(), KernelError> {
        self.state().records.insert(
            vat_id.clone(),
            VatRecord {
                source: source.clone(),
                options: options.clone(),
            },
        );
        Ok(())
    }

    fn source_and_options(&self, vat_id: &VatId) -> Option<(VatSource, VatOptions)> {
        self.state()
            .records
            .get(vat_id)
            .map(|record| (record.source.clone(), record.options.clone()))
    }

    fn get_bundle(&self, name: &str) -> Option<Value> {
        self.state().bundles.get(name).cloned()
    }

    fn vat_name_to_id(&self, name: &str) -> Option<VatId> {
        self.state().names.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vat_ids_are_never_reused() {
        let keeper = MemKernelKeeper::new();
        let admin = keeper.add_named_vat("vatAdmin");
        let first = keeper.allocate_unused_vat_id().unwrap();
        let second = keeper.allocate_unused_vat_id().unwrap();
        assert_eq!(admin.as_str(), "v1");
        assert_eq!(first.as_str(), "v2");
        assert_eq!(second.as_str(), "v3");
        assert_eq!(keeper.vat_name_to_id("vatAdmin"), Some(admin));
    }

    #[test]
    fn dynamic_ids_are_recorded_once() {
        let keeper = MemKernelKeeper::new();
        let vat_id = keeper.allocate_unused_vat_id().unwrap();
        keeper.add_dynamic_vat_id(&vat_id).unwrap();
        assert!(keeper.add_dynamic_vat_id(&vat_id).is_err());
        assert_eq!(keeper.dynamic_vat_ids(), vec![vat_id]);
    }
}
