use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::KernelError;
use crate::loader::TerminationNotifier;
use crate::options::ManagerType;
use crate::slog::VatConsole;
use crate::vat::VatId;

/// Builds a vat's dispatch directly, bypassing bundle evaluation. Receives
/// the vat id and its parameters.
pub type VatSetupFn = Arc<dyn Fn(&VatId, &Value) -> anyhow::Result<()> + Send + Sync>;

/// A running execution sandbox for one vat.
pub trait VatManager: Send + Sync {
    fn vat_id(&self) -> &VatId;
}

/// Everything a vat-manager factory needs to start a vat.
#[derive(Clone)]
pub struct ManagerOptions {
    pub manager_type: Option<ManagerType>,
    pub bundle: Option<Value>,
    pub metered: bool,
    pub enable_disavow: bool,
    pub enable_setup: bool,
    pub enable_pipelining: bool,
    pub enable_internal_metering: bool,
    pub notify_termination: Option<Arc<TerminationNotifier>>,
    pub vat_console: Option<VatConsole>,
    pub liveslots_console: Option<VatConsole>,
    pub vat_parameters: Value,
    pub virtual_object_cache_size: Option<u64>,
    pub setup: Option<VatSetupFn>,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            manager_type: None,
            bundle: None,
            metered: false,
            enable_disavow: false,
            enable_setup: false,
            enable_pipelining: false,
            enable_internal_metering: false,
            notify_termination: None,
            vat_console: None,
            liveslots_console: None,
            vat_parameters: Value::Object(Map::new()),
            virtual_object_cache_size: None,
            setup: None,
        }
    }
}

impl fmt::Debug for ManagerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagerOptions")
            .field("manager_type", &self.manager_type)
            .field("bundle", &self.bundle.as_ref().map(|_| "<bundle>"))
            .field("metered", &self.metered)
            .field("enable_disavow", &self.enable_disavow)
            .field("enable_setup", &self.enable_setup)
            .field("enable_pipelining", &self.enable_pipelining)
            .field("enable_internal_metering", &self.enable_internal_metering)
            .field(
                "notify_termination",
                &self.notify_termination.as_ref().map(|_| "<notifier>"),
            )
            .field("vat_parameters", &self.vat_parameters)
            .field("virtual_object_cache_size", &self.virtual_object_cache_size)
            .field("setup", &self.setup.as_ref().map(|_| "<setup>"))
            .finish()
    }
}

/// Turns manager options into a running vat. May take arbitrarily long.
#[async_trait]
pub trait VatManagerFactory: Send + Sync {
    async fn create(
        &self,
        vat_id: &VatId,
        options: ManagerOptions,
    ) -> anyhow::Result<Box<dyn VatManager>>;
}

/// Where finished managers are handed to the kernel.
pub trait ManagerRegistry: Send + Sync {
    fn add_vat_manager(
        &self,
        vat_id: &VatId,
        manager: Box<dyn VatManager>,
        options: &ManagerOptions,
    ) -> Result<(), KernelError>;
}

struct RegisteredManager {
    _manager: Box<dyn VatManager>,
    options: ManagerOptions,
}

#[derive(Default)]
pub struct MemManagerRegistry {
    managers: Mutex<BTreeMap<VatId, RegisteredManager>>,
}

impl MemManagerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn managers(&self) -> MutexGuard<'_, BTreeMap<VatId, RegisteredManager>> {
        self.managers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn contains(&self, vat_id: &VatId) -> bool {
        self.managers().contains_key(vat_id)
    }

    pub fn vat_ids(&self) -> Vec<VatId> {
        self.managers().keys().cloned().collect()
    }

    pub fn options(&self, vat_id: &VatId) -> Option<ManagerOptions> {
        self.managers().get(vat_id).map(|entry| entry.options.clone())
    }
}

impl ManagerRegistry for MemManagerRegistry {
    fn add_vat_manager(
        &self,
        vat_id: &VatId,
        manager: Box<dyn VatManager>,
        options: &ManagerOptions,
    ) -> Result<(), KernelError> {
        let mut managers = self.managers();
        if managers.contains_key(vat_id) {
            return Err(KernelError::ManagerAlreadyRegistered(vat_id.clone()));
        }
        managers.insert(
            vat_id.clone(),
            RegisteredManager {
                _manager: manager,
                options: options.clone(),
            },
        );
        Ok(())
    }
}
