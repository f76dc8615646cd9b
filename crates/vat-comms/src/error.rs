use thiserror::Error;
use vat_slots::{RemoteSlot, SlotError, VatSlot};

use crate::remote::RemoteId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommsError {
    #[error("unknown remote '{0}'")]
    UnknownRemote(RemoteId),
    #[error("remote '{0}' already registered")]
    DuplicateRemote(RemoteId),
    #[error("{local} already exported to '{remote}' as {existing}")]
    LocalAlreadyMapped {
        remote: RemoteId,
        local: VatSlot,
        existing: RemoteSlot,
    },
    #[error("{slot} from '{remote}' already mapped to {existing}")]
    RemoteAlreadyMapped {
        remote: RemoteId,
        slot: RemoteSlot,
        existing: VatSlot,
    },
    #[error("'{remote}' referenced {slot}, which this side never allocated")]
    UnknownInbound { remote: RemoteId, slot: RemoteSlot },
    #[error("object index space for '{0}' exhausted")]
    IndexExhausted(RemoteId),
    #[error(transparent)]
    Slot(#[from] SlotError),
}
