//! Per-peer capability lists translating local slots to the numbering shared
//! with each remote machine.

pub mod error;
pub mod gateway;
pub mod provider;
pub mod remote;

pub use error::CommsError;
pub use gateway::CommsGateway;
pub use provider::{LocalForRemote, LocalObjectAllocator};
pub use remote::{FIRST_ALLOCATED_INDEX, Remote, RemoteId};
