//! Capability slot codec: typed kernel, vat, and remote slot identifiers plus capdata.

pub mod capdata;
pub mod error;
pub mod slot;

pub use capdata::{CapData, slot_ref};
pub use error::SlotError;
pub use slot::{KernelSlot, RemoteSlot, SlotKind, VatSlot};
