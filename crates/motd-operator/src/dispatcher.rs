//! Dispatcher — routes host events to the reconciler, one at a time.

use std::sync::Arc;

use motd_core::{CharmConfig, OperatorHealth, Result, UnitStatus};
use motd_pebble::Supervisor;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::events::HookEvent;
use crate::reconciler::Reconciler;

/// Opens a handle to the named container's supervisor.
pub type Connect = Box<dyn Fn(&str) -> Arc<dyn Supervisor> + Send + Sync>;

pub struct Dispatcher {
    container: String,
    connect: Connect,
    /// Single execution slot: build-then-submit is not transactional across
    /// concurrent calls.
    reconciler: Mutex<Reconciler>,
}

impl Dispatcher {
    /// Bind the reconciler to pebble-ready events of `container`.
    pub fn new(
        container: impl Into<String>,
        reconciler: Reconciler,
        connect: impl Fn(&str) -> Arc<dyn Supervisor> + Send + Sync + 'static,
    ) -> Self {
        Self {
            container: container.into(),
            connect: Box::new(connect),
            reconciler: Mutex::new(reconciler),
        }
    }

    pub async fn status(&self) -> UnitStatus {
        self.reconciler.lock().await.status().clone()
    }

    pub async fn set_charm_config(&self, charm_config: CharmConfig) {
        self.reconciler.lock().await.set_charm_config(charm_config);
    }

    /// Handle one event.
    ///
    /// Returns the resulting status, or `None` if the event is not ours.
    /// Errors that leave the operator in `Error` are returned so the host
    /// retries the event; a `Blocked` outcome is a settled state and is
    /// returned as a status.
    pub async fn dispatch(&self, event: &HookEvent) -> Result<Option<UnitStatus>> {
        match event {
            HookEvent::PebbleReady { container } if *container == self.container => {
                let workload = (self.connect)(container.as_str());
                self.reconcile(workload.as_ref()).await.map(Some)
            }
            HookEvent::ConfigChanged => {
                let workload = (self.connect)(self.container.as_str());
                if !workload.can_connect().await {
                    let mut reconciler = self.reconciler.lock().await;
                    reconciler
                        .report(UnitStatus::waiting("waiting for Pebble in workload container"))
                        .await;
                    return Ok(Some(reconciler.status().clone()));
                }
                self.reconcile(workload.as_ref()).await.map(Some)
            }
            other => {
                debug!(event = %other, "Event ignored");
                Ok(None)
            }
        }
    }

    async fn reconcile(&self, workload: &dyn Supervisor) -> Result<UnitStatus> {
        let mut reconciler = self.reconciler.lock().await;
        info!(container = %self.container, "Reconciling");
        match reconciler.on_supervisor_ready(workload).await {
            Ok(()) => Ok(reconciler.status().clone()),
            Err(_) if reconciler.status().health == OperatorHealth::Blocked => {
                Ok(reconciler.status().clone())
            }
            Err(e) => Err(e),
        }
    }
}
