//! Supervisor trait: the only API surface the reconciler consumes.

use async_trait::async_trait;
use motd_core::Result;

use crate::layer::Layer;
use crate::plan::ServicePlan;

/// A workload container's process supervisor.
#[async_trait]
pub trait Supervisor: Send + Sync {
    /// Whether the supervisor currently answers requests.
    async fn can_connect(&self) -> bool;

    /// Add a labelled layer to the plan.
    ///
    /// With `combine` set, a layer already registered under `label` absorbs
    /// the new one; otherwise an existing label is an error. Fails with
    /// `SupervisorUnavailable` if the supervisor is unreachable or rejects
    /// the layer.
    async fn add_layer(&self, label: &str, layer: &Layer, combine: bool) -> Result<()>;

    /// Converge running processes to the combined plan.
    ///
    /// Fails with `ReconciliationFailed` if a service cannot be started.
    async fn replan(&self) -> Result<()>;

    /// The flattened plan as the supervisor currently sees it.
    async fn plan(&self) -> Result<ServicePlan>;
}
