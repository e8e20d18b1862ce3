//! Reconciler — turns "supervisor ready" into a declared, running MOTD service.

use std::sync::Arc;

use motd_core::{CharmConfig, Error, Result, UnitStatus};
use motd_pebble::Supervisor;
use tracing::{error, info, instrument, warn};

use crate::declaration::{motd_layer, LAYER_LABEL};
use crate::status::StatusReporter;

/// Applies the MOTD layer and tracks the operator's health.
///
/// Holds no state about the supervisor between calls; the only thing it
/// remembers is the last status it reported.
pub struct Reconciler {
    charm_config: CharmConfig,
    reporter: Arc<dyn StatusReporter>,
    status: UnitStatus,
}

impl Reconciler {
    pub fn new(charm_config: CharmConfig, reporter: Arc<dyn StatusReporter>) -> Self {
        Self {
            charm_config,
            reporter,
            status: UnitStatus::unknown(),
        }
    }

    /// Last status reported.
    pub fn status(&self) -> &UnitStatus {
        &self.status
    }

    pub fn set_charm_config(&mut self, charm_config: CharmConfig) {
        self.charm_config = charm_config;
    }

    /// Declare the MOTD layer on `workload`, replan, and report health.
    ///
    /// Health is updated on every path: `Active` on success, otherwise the
    /// health implied by the error (`Blocked` for configuration problems,
    /// `Error` for supervisor failures). The error is still returned so the
    /// caller can decide whether the host should retry.
    #[instrument(skip_all)]
    pub async fn on_supervisor_ready(&mut self, workload: &dyn Supervisor) -> Result<()> {
        let outcome = self.apply(workload).await;

        let status = match &outcome {
            Ok(()) => {
                info!(label = LAYER_LABEL, "MOTD layer applied");
                UnitStatus::active()
            }
            Err(e @ Error::InvalidConfig(_)) => {
                warn!(error = %e, "Configuration rejected");
                UnitStatus::from_error(e)
            }
            Err(e) => {
                error!(error = %e, "Reconciliation failed");
                UnitStatus::from_error(e)
            }
        };
        self.report(status).await;

        outcome
    }

    async fn apply(&self, workload: &dyn Supervisor) -> Result<()> {
        self.charm_config.validate()?;

        // Built whole before submission so the supervisor never sees a partial layer.
        let layer = motd_layer();

        workload
            .add_layer(LAYER_LABEL, &layer, true)
            .await
            .map_err(|e| match e {
                Error::SupervisorUnavailable(_) => e,
                other => Error::SupervisorUnavailable(other.to_string()),
            })?;

        workload.replan().await
    }

    /// Record `status` and push it to the reporter.
    ///
    /// A reporter failure is logged, not returned: the in-process status
    /// still reflects the outcome.
    pub async fn report(&mut self, status: UnitStatus) {
        if let Err(e) = self.reporter.set_status(&status).await {
            warn!(error = %e, status = %status, "Failed to report status");
        }
        self.status = status;
    }
}
