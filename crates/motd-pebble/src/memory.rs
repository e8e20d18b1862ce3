//! In-memory supervisor.
//!
//! Holds a [`Plan`] and the set of running services in process, applying the
//! same combine and replan rules as Pebble. Failures can be injected through
//! [`MemorySupervisorConfig`], and every call is counted so tests can assert
//! on the sequence of operations.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use motd_core::{Error, Result};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::layer::{Layer, Service};
use crate::plan::{Plan, ServicePlan};
use crate::supervisor::Supervisor;

/// Controls which operations fail. All default to success.
#[derive(Debug, Clone, Default)]
pub struct MemorySupervisorConfig {
    /// Every call fails as if the socket were gone.
    pub unreachable: bool,
    /// If set, `add_layer` rejects the layer with this message.
    pub add_layer_error: Option<String>,
    /// If set, `replan` fails with this message.
    pub replan_error: Option<String>,
    /// Services running one of these commands fail to start.
    pub failing_commands: Vec<String>,
}

#[derive(Default)]
struct State {
    plan: Plan,
    /// Definition each running service was started with.
    running: BTreeMap<String, Service>,
}

#[derive(Default)]
pub struct MemorySupervisor {
    state: Mutex<State>,
    config: Mutex<MemorySupervisorConfig>,
    add_layer_calls: AtomicUsize,
    replan_calls: AtomicUsize,
    starts: AtomicUsize,
    stops: AtomicUsize,
}

impl MemorySupervisor {
    /// Create an empty, all-success supervisor.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: MemorySupervisorConfig) -> Self {
        Self {
            config: Mutex::new(config),
            ..Self::default()
        }
    }

    /// Start from an existing plan, e.g. one left behind by a prior run.
    pub fn with_plan(plan: Plan) -> Self {
        let supervisor = Self::new();
        supervisor.state.lock().plan = plan;
        supervisor
    }

    /// Swap the failure configuration, e.g. to let a retry succeed.
    pub fn set_config(&self, config: MemorySupervisorConfig) {
        *self.config.lock() = config;
    }

    pub fn layered_plan(&self) -> Plan {
        self.state.lock().plan.clone()
    }

    pub fn running(&self) -> BTreeMap<String, Service> {
        self.state.lock().running.clone()
    }

    pub fn add_layer_calls(&self) -> usize {
        self.add_layer_calls.load(Ordering::Relaxed)
    }

    pub fn replan_calls(&self) -> usize {
        self.replan_calls.load(Ordering::Relaxed)
    }

    pub fn start_count(&self) -> usize {
        self.starts.load(Ordering::Relaxed)
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::Relaxed)
    }

    fn check_reachable(&self) -> Result<()> {
        if self.config.lock().unreachable {
            return Err(Error::SupervisorUnavailable(
                "cannot connect to supervisor: connection refused".into(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Supervisor for MemorySupervisor {
    async fn can_connect(&self) -> bool {
        self.check_reachable().is_ok()
    }

    async fn add_layer(&self, label: &str, layer: &Layer, combine: bool) -> Result<()> {
        self.add_layer_calls.fetch_add(1, Ordering::Relaxed);
        self.check_reachable()?;

        if let Some(message) = self.config.lock().add_layer_error.clone() {
            return Err(Error::SupervisorUnavailable(message));
        }

        // Stage on a copy so a rejected layer never shows up half-applied.
        let mut state = self.state.lock();
        let mut staged = state.plan.clone();
        staged
            .add_layer(label, layer.clone(), combine)
            .map_err(|e| Error::SupervisorUnavailable(e.to_string()))?;
        state.plan = staged;

        debug!(label, combine, services = layer.services.len(), "Layer added");
        Ok(())
    }

    async fn replan(&self) -> Result<()> {
        self.replan_calls.fetch_add(1, Ordering::Relaxed);
        self.check_reachable()?;

        let config = self.config.lock().clone();
        if let Some(message) = config.replan_error {
            return Err(Error::ReconciliationFailed(message));
        }

        let mut state = self.state.lock();
        let desired = state.plan.flatten().services;

        // Stop anything whose definition changed or that is no longer declared.
        let stale: Vec<String> = state
            .running
            .iter()
            .filter(|(name, started)| desired.get(*name) != Some(*started))
            .map(|(name, _)| name.clone())
            .collect();
        for name in stale {
            state.running.remove(&name);
            self.stops.fetch_add(1, Ordering::Relaxed);
            info!(service = %name, "Service stopped");
        }

        let mut failed = Vec::new();
        for (name, service) in desired.iter().filter(|(_, s)| s.is_enabled()) {
            if state.running.contains_key(name) {
                continue;
            }
            if service.command.is_empty() || config.failing_commands.contains(&service.command) {
                failed.push(name.clone());
                continue;
            }
            state.running.insert(name.clone(), service.clone());
            self.starts.fetch_add(1, Ordering::Relaxed);
            info!(service = %name, "Service started");
        }

        if !failed.is_empty() {
            return Err(Error::ReconciliationFailed(format!(
                "cannot start service(s): {}",
                failed.join(", ")
            )));
        }
        Ok(())
    }

    async fn plan(&self) -> Result<ServicePlan> {
        self.check_reachable()?;
        Ok(self.state.lock().plan.flatten())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::{Override, Startup};

    fn layer(command: &str) -> Layer {
        Layer::new("test", "").with_service(
            "svc",
            Service::new(command)
                .with_override(Override::Replace)
                .with_startup(Startup::Enabled),
        )
    }

    #[tokio::test]
    async fn test_replan_starts_enabled_services() {
        let supervisor = MemorySupervisor::new();
        supervisor.add_layer("base", &layer("/bin/a"), true).await.unwrap();
        supervisor
            .add_layer(
                "idle",
                &Layer::default().with_service(
                    "idle",
                    Service::new("/bin/idle")
                        .with_override(Override::Replace)
                        .with_startup(Startup::Disabled),
                ),
                true,
            )
            .await
            .unwrap();
        supervisor.replan().await.unwrap();

        let running = supervisor.running();
        assert_eq!(running.len(), 1);
        assert!(running.contains_key("svc"));
        assert_eq!(supervisor.start_count(), 1);
    }

    #[tokio::test]
    async fn test_replan_is_idempotent() {
        let supervisor = MemorySupervisor::new();
        supervisor.add_layer("base", &layer("/bin/a"), true).await.unwrap();
        supervisor.replan().await.unwrap();
        supervisor.replan().await.unwrap();
        assert_eq!(supervisor.start_count(), 1);
        assert_eq!(supervisor.stop_count(), 0);
    }

    #[tokio::test]
    async fn test_replan_restarts_changed_service() {
        let supervisor = MemorySupervisor::new();
        supervisor.add_layer("base", &layer("/bin/a"), true).await.unwrap();
        supervisor.replan().await.unwrap();
        supervisor.add_layer("base", &layer("/bin/b"), true).await.unwrap();
        supervisor.replan().await.unwrap();

        assert_eq!(supervisor.running()["svc"].command, "/bin/b");
        assert_eq!(supervisor.stop_count(), 1);
        assert_eq!(supervisor.start_count(), 2);
    }

    #[tokio::test]
    async fn test_failing_command() {
        let supervisor = MemorySupervisor::with_config(MemorySupervisorConfig {
            failing_commands: vec!["/bin/missing".into()],
            ..Default::default()
        });
        supervisor.add_layer("base", &layer("/bin/missing"), true).await.unwrap();
        let err = supervisor.replan().await.unwrap_err();
        assert!(matches!(err, Error::ReconciliationFailed(_)));
        assert!(supervisor.running().is_empty());
    }

    #[tokio::test]
    async fn test_unreachable() {
        let supervisor = MemorySupervisor::with_config(MemorySupervisorConfig {
            unreachable: true,
            ..Default::default()
        });
        assert!(!supervisor.can_connect().await);
        let err = supervisor.add_layer("base", &layer("/bin/a"), true).await.unwrap_err();
        assert!(matches!(err, Error::SupervisorUnavailable(_)));
        assert!(supervisor.layered_plan().layers().is_empty());
        assert_eq!(supervisor.add_layer_calls(), 1);
    }

    #[tokio::test]
    async fn test_rejected_layer_maps_to_unavailable() {
        let supervisor = MemorySupervisor::new();
        supervisor.add_layer("base", &layer("/bin/a"), false).await.unwrap();
        let err = supervisor.add_layer("base", &layer("/bin/b"), false).await.unwrap_err();
        assert!(matches!(err, Error::SupervisorUnavailable(_)));
        assert_eq!(supervisor.plan().await.unwrap().services["svc"].command, "/bin/a");
    }
}
