//! Shared fixtures for vat-kernel integration tests.
//!
//! Each integration test compiles this module separately, so some helpers may
//! look unused from a given test file.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Value, json};
use vat_kernel::{
    LoaderConfig, LoaderContext, LogSlog, ManagerOptions, MemKernelKeeper, MemManagerRegistry,
    MemRunQueue, QueuedMessage, VatId, VatLoader, VatManager, VatManagerFactory,
};
use vat_slots::{KernelSlot, VatSlot};

pub struct MockManager {
    vat_id: VatId,
}

impl VatManager for MockManager {
    fn vat_id(&self) -> &VatId {
        &self.vat_id
    }
}

/// Factory that records every call and succeeds unless told to fail.
#[derive(Default)]
pub struct RecordingFactory {
    calls: Mutex<Vec<(VatId, ManagerOptions)>>,
    failure: Mutex<Option<String>>,
}

impl RecordingFactory {
    pub fn calls(&self) -> Vec<(VatId, ManagerOptions)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn options_for(&self, vat_id: &VatId) -> ManagerOptions {
        self.calls()
            .into_iter()
            .find(|(id, _)| id == vat_id)
            .map(|(_, options)| options)
            .expect("factory was never called for vat")
    }

    pub fn fail_with(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_string());
    }

    pub fn succeed(&self) {
        *self.failure.lock().unwrap() = None;
    }
}

#[async_trait]
impl VatManagerFactory for RecordingFactory {
    async fn create(
        &self,
        vat_id: &VatId,
        options: ManagerOptions,
    ) -> anyhow::Result<Box<dyn VatManager>> {
        self.calls
            .lock()
            .unwrap()
            .push((vat_id.clone(), options.clone()));
        if let Some(message) = self.failure.lock().unwrap().clone() {
            anyhow::bail!(message);
        }
        if let Some(setup) = &options.setup {
            setup(vat_id, &options.vat_parameters)?;
        }
        Ok(Box::new(MockManager {
            vat_id: vat_id.clone(),
        }))
    }
}

pub struct TestKernel {
    pub loader: VatLoader,
    pub keeper: Arc<MemKernelKeeper>,
    pub queue: Arc<MemRunQueue>,
    pub managers: Arc<MemManagerRegistry>,
    pub factory: Arc<RecordingFactory>,
    pub admin_vat: VatId,
}

impl TestKernel {
    pub fn new() -> Self {
        Self::with_config(LoaderConfig::default())
    }

    pub fn with_config(config: LoaderConfig) -> Self {
        let keeper = Arc::new(MemKernelKeeper::new());
        let admin_vat = keeper.add_named_vat(config.admin_vat_name.clone());
        keeper.add_bundle("bank", bundle("bank"));
        let queue = Arc::new(MemRunQueue::new());
        let managers = Arc::new(MemManagerRegistry::new());
        let factory = Arc::new(RecordingFactory::default());
        let ctx = LoaderContext {
            keeper: keeper.clone(),
            queue: queue.clone(),
            managers: managers.clone(),
            factory: factory.clone(),
            slog: Arc::new(LogSlog),
        };
        Self {
            loader: VatLoader::new(ctx, config),
            keeper,
            queue,
            managers,
            factory,
            admin_vat,
        }
    }

    pub fn admin_root(&self) -> Option<KernelSlot> {
        self.queue.export_of(&self.admin_vat, VatSlot::root_object())
    }

    /// Messages queued to the admin vat's root, with their bodies parsed.
    pub fn admin_messages(&self) -> Vec<(QueuedMessage, Value)> {
        let root = self.admin_root();
        self.queue
            .messages()
            .into_iter()
            .filter(|message| Some(message.target) == root)
            .map(|message| {
                let body = message.args.parse_body().unwrap();
                (message, body)
            })
            .collect()
    }
}

pub fn bundle(label: &str) -> Value {
    json!({ "moduleFormat": "endoZipBase64", "endoZipBase64": label })
}
