//! Vat lifecycle core: validate vat options, drive vat-manager builds, and
//! report creation and termination to the admin vat.

pub mod admin;
pub mod config;
pub mod error;
pub mod keeper;
pub mod loader;
pub mod manager;
pub mod options;
pub mod queue;
pub mod slog;
pub mod source;
pub mod vat;

pub use admin::AdminNotifier;
pub use config::LoaderConfig;
pub use error::KernelError;
pub use keeper::{KernelKeeper, MemKernelKeeper};
pub use loader::{BuildHandle, BuildOutcome, BuildState, LoaderContext, TerminationNotifier, VatLoader};
pub use manager::{
    ManagerOptions, ManagerRegistry, MemManagerRegistry, VatManager, VatManagerFactory, VatSetupFn,
};
pub use options::{ManagerType, ResolvedVatOptions, VatOptions};
pub use queue::{KernelQueue, MemRunQueue, QueuedMessage, ResolutionPolicy};
pub use slog::{KernelSlog, LogSlog, StartupSpan, VatConsole};
pub use source::VatSource;
pub use vat::{VatId, VatKind};
