//! MOTD Operator — keeps the MOTD service layer declared in the workload
//! container's supervisor and reports the operator's health.
//!
//! The [`Dispatcher`] turns host events into calls on the [`Reconciler`],
//! one at a time; the reconciler builds the layer from [`declaration`],
//! hands it to the supervisor and records the outcome through a
//! [`StatusReporter`].

pub mod declaration;
pub mod dispatcher;
pub mod events;
pub mod reconciler;
pub mod status;

pub use dispatcher::Dispatcher;
pub use events::HookEvent;
pub use reconciler::Reconciler;
pub use status::{FileReporter, HookToolReporter, MemoryReporter, StatusReporter};
