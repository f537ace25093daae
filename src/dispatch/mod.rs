//! Dispatch engine
//!
//! Per-sender submission loop, bounded confirmation queue, confirmation
//! resolver and the coordinator that runs several senders at once.

pub mod coordinator;
pub mod errors;
pub mod queue;
pub mod resolver;
pub mod sender;

pub use coordinator::{RunCoordinator, SenderSpec, Workload};
pub use errors::DispatchError;
pub use queue::{ConfirmationQueue, Pressure};
pub use resolver::{ConfirmationResolver, ResolverConfig};
pub use sender::{DispatchConfig, Sender, SenderDispatcher};
