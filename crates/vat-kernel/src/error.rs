use thiserror::Error;
use vat_slots::SlotError;

use crate::vat::{VatId, VatKind};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KernelError {
    #[error("broken source for vat {0}: needs a bundle or a bundleName")]
    MissingBundle(VatId),
    #[error("bundle '{name}' for vat {vat_id} not found")]
    BundleNotFound { vat_id: VatId, name: String },
    #[error("vat {vat_id} creation requires a bundle object, not a plain {found}")]
    MalformedBundle { vat_id: VatId, found: &'static str },
    #[error("unknown options for {kind} vat: {}", keys.join(", "))]
    UnknownOptions { kind: VatKind, keys: Vec<String> },
    #[error("invalid vat options: {0}")]
    InvalidOptions(String),
    #[error("no vat named '{0}'")]
    UnknownVatName(String),
    #[error("build of vat {vat_id} failed: {reason}")]
    VatBuildFailed { vat_id: VatId, reason: String },
    #[error("unable to re-create vat {vat_id}: {reason}")]
    VatRecreateFailed { vat_id: VatId, reason: String },
    #[error("vat {0} already has a manager")]
    ManagerAlreadyRegistered(VatId),
    #[error("build of vat {0} was dropped before it completed")]
    BuildAbandoned(VatId),
    #[error("vat builds must be driven between cranks")]
    CrankInProgress,
    #[error("keeper error: {0}")]
    Keeper(String),
    #[error("run queue error: {0}")]
    Queue(String),
    #[error(transparent)]
    Slot(#[from] SlotError),
}
