use serde_json::Value;
use tokio::sync::oneshot;

use crate::error::KernelError;
use crate::manager::ManagerOptions;
use crate::vat::{VatId, VatKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildOutcome {
    Succeeded,
    Failed,
}

/// Progress of one vat-creation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    /// Source and options are being checked; nothing is queued yet.
    Validating,
    /// Waiting in the build queue for the next `run_builds`.
    Queued,
    /// The manager factory has been called and not yet answered.
    Building,
    /// Reporting the outcome to the admin vat.
    Notifying,
    Done(BuildOutcome),
}

pub(crate) struct BuildTask {
    pub vat_id: VatId,
    pub kind: VatKind,
    pub notify: bool,
    pub description: String,
    pub name: Option<String>,
    pub bundle: Value,
    pub options: ManagerOptions,
    done: Option<oneshot::Sender<Result<(), KernelError>>>,
}

impl BuildTask {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        vat_id: VatId,
        kind: VatKind,
        notify: bool,
        description: String,
        name: Option<String>,
        bundle: Value,
        options: ManagerOptions,
    ) -> (Self, BuildHandle) {
        let (tx, rx) = oneshot::channel();
        let handle = BuildHandle {
            vat_id: vat_id.clone(),
            rx,
        };
        let task = Self {
            vat_id,
            kind,
            notify,
            description,
            name,
            bundle,
            options,
            done: Some(tx),
        };
        (task, handle)
    }

    pub fn complete(&mut self, result: Result<(), KernelError>) {
        if let Some(tx) = self.done.take() {
            // Nobody listening is fine: dynamic creation drops its handle.
            let _ = tx.send(result);
        }
    }
}

/// Resolves once the vat's manager is registered, or with the build error.
#[derive(Debug)]
pub struct BuildHandle {
    vat_id: VatId,
    rx: oneshot::Receiver<Result<(), KernelError>>,
}

impl BuildHandle {
    pub fn vat_id(&self) -> &VatId {
        &self.vat_id
    }

    pub async fn wait(self) -> Result<(), KernelError> {
        match self.rx.await {
            Ok(result) => result,
            Err(_) => Err(KernelError::BuildAbandoned(self.vat_id)),
        }
    }
}
