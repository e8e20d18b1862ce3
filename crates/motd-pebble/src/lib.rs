//! MOTD Pebble — the process supervisor side of the operator.
//!
//! Provides the [`Supervisor`] trait the reconciler talks to, the layer and
//! plan model with Pebble's combine rules, and two implementations:
//! - [`PebbleClient`]: the Pebble HTTP API over its unix socket
//! - [`MemorySupervisor`]: an in-process plan with failure injection, used by
//!   tests and dry runs

pub mod client;
pub mod layer;
pub mod memory;
pub mod plan;
pub mod supervisor;

pub use client::{Change, PebbleClient};
pub use layer::{Layer, Override, Service, Startup};
pub use memory::{MemorySupervisor, MemorySupervisorConfig};
pub use plan::{LabeledLayer, Plan, ServicePlan};
pub use supervisor::Supervisor;
