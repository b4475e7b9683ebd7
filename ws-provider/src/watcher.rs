//! Long-running-operation watcher.
//!
//! Turns a one-shot status call into a bounded recurring poll with a single
//! completion notification. Each watch is a spawned task that sleeps for
//! the action's interval between checks, so a check can never overlap
//! itself. The registry guarantees at most one active watch per identifier;
//! a duplicate registration fails fast instead of silently replacing the
//! existing watch.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use ws_client::{ManagementClient, WorkstationState};
use ws_core::{OperationStatus, Result, WorkstationAction, WsError};

use crate::timing::{ActionTiming, ActionTimings};

/// Final outcome of a watched operation, delivered to the completion
/// callback exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchOutcome {
    /// The server reported a terminal status.
    Completed(OperationStatus),
    /// The deadline elapsed without a terminal answer. Deliberately a
    /// distinct outcome rather than a fabricated status.
    TimedOut,
}

impl WatchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, WatchOutcome::Completed(OperationStatus::Succeeded))
    }
}

/// Outcome of a provisioning watch on a machine created outside the
/// extension.
#[derive(Debug, Clone)]
pub enum ProvisioningOutcome {
    /// Provisioning left the in-progress range; carries the final snapshot.
    Completed(WorkstationState),
    TimedOut,
}

struct TrackedOperation {
    action: WorkstationAction,
    started_at: Instant,
    task: JoinHandle<()>,
}

/// Registry of in-flight operation watches.
///
/// The registry mutex is held only to mutate the map, never across a
/// network call or any other await point.
pub struct OperationWatcher {
    client: Arc<dyn ManagementClient>,
    timings: ActionTimings,
    operations: Arc<Mutex<HashMap<String, TrackedOperation>>>,
}

impl OperationWatcher {
    pub fn new(client: Arc<dyn ManagementClient>, timings: ActionTimings) -> Self {
        Self {
            client,
            timings,
            operations: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Begin watching the operation behind `tracking_uri`, polling at the
    /// cadence configured for `action`. Returns immediately; the completion
    /// callback fires exactly once from a background task.
    ///
    /// Fails with [`WsError::AlreadyWatching`] if a watch is already active
    /// for `id`.
    pub fn watch<F, Fut>(
        &self,
        id: &str,
        tracking_uri: &str,
        action: WorkstationAction,
        on_complete: F,
    ) -> Result<()>
    where
        F: FnOnce(WatchOutcome) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let timing = self.timings.for_action(action);
        let mut operations = lock(&self.operations);
        if operations.contains_key(id) {
            return Err(WsError::AlreadyWatching(id.to_string()));
        }

        let task = tokio::spawn(Self::poll_operation(
            Arc::clone(&self.client),
            Arc::clone(&self.operations),
            id.to_string(),
            tracking_uri.to_string(),
            timing,
            on_complete,
        ));
        operations.insert(
            id.to_string(),
            TrackedOperation {
                action,
                started_at: Instant::now(),
                task,
            },
        );
        info!(id, %action, interval = ?timing.interval, "operation watch registered");
        Ok(())
    }

    /// Begin watching the provisioning state of a machine by polling its
    /// snapshot rather than an operation record. Used for machines that
    /// show up in listings while still being created elsewhere.
    pub fn watch_provisioning<F, Fut>(
        &self,
        id: &str,
        workstation_uri: &str,
        on_complete: F,
    ) -> Result<()>
    where
        F: FnOnce(ProvisioningOutcome) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let action = WorkstationAction::ProvisioningWatch;
        let timing = self.timings.for_action(action);
        let mut operations = lock(&self.operations);
        if operations.contains_key(id) {
            return Err(WsError::AlreadyWatching(id.to_string()));
        }

        let task = tokio::spawn(Self::poll_provisioning(
            Arc::clone(&self.client),
            Arc::clone(&self.operations),
            id.to_string(),
            workstation_uri.to_string(),
            timing,
            on_complete,
        ));
        operations.insert(
            id.to_string(),
            TrackedOperation {
                action,
                started_at: Instant::now(),
                task,
            },
        );
        info!(id, "provisioning watch registered");
        Ok(())
    }

    /// Cancel the watch for `id`, if any. The polling task is aborted, so
    /// no completion callback fires afterward even if a check was already
    /// network-pending. Unknown ids are a no-op.
    pub fn stop_watching(&self, id: &str) {
        if let Some(operation) = lock(&self.operations).remove(id) {
            operation.task.abort();
            info!(
                id,
                %operation.action,
                ran_for = ?operation.started_at.elapsed(),
                "operation watch cancelled"
            );
        }
    }

    pub fn is_watching(&self, id: &str) -> bool {
        lock(&self.operations).contains_key(id)
    }

    /// Action of the active watch for `id`, if any.
    pub fn watched_action(&self, id: &str) -> Option<WorkstationAction> {
        lock(&self.operations).get(id).map(|op| op.action)
    }

    pub fn active_count(&self) -> usize {
        lock(&self.operations).len()
    }

    /// Cancel every active watch. Called on extension shutdown so no timer
    /// outlives the process's useful life.
    pub fn shutdown(&self) {
        let drained: Vec<(String, TrackedOperation)> =
            lock(&self.operations).drain().collect();
        for (id, operation) in drained {
            operation.task.abort();
            debug!(id, "operation watch stopped at shutdown");
        }
    }

    async fn poll_operation<F, Fut>(
        client: Arc<dyn ManagementClient>,
        operations: Arc<Mutex<HashMap<String, TrackedOperation>>>,
        id: String,
        tracking_uri: String,
        timing: ActionTiming,
        on_complete: F,
    ) where
        F: FnOnce(WatchOutcome) -> Fut + Send,
        Fut: Future<Output = ()> + Send,
    {
        let started = Instant::now();
        let mut failures = 0u32;

        let outcome = loop {
            tokio::time::sleep(timing.interval).await;

            match client.get_operation(&tracking_uri).await {
                Ok(record) if record.status.is_terminal() => {
                    break WatchOutcome::Completed(record.status);
                }
                Ok(record) => {
                    debug!(id, status = %record.status, "operation still in progress");
                }
                Err(err) => {
                    // Transient failures don't abort the watch; the
                    // deadline bounds how long we keep trying.
                    failures += 1;
                    warn!(id, %err, failures, "status check failed, continuing to poll");
                }
            }

            if started.elapsed() >= timing.deadline {
                break WatchOutcome::TimedOut;
            }
        };

        lock(&operations).remove(&id);
        info!(id, ?outcome, "operation watch finished");
        on_complete(outcome).await;
    }

    async fn poll_provisioning<F, Fut>(
        client: Arc<dyn ManagementClient>,
        operations: Arc<Mutex<HashMap<String, TrackedOperation>>>,
        id: String,
        workstation_uri: String,
        timing: ActionTiming,
        on_complete: F,
    ) where
        F: FnOnce(ProvisioningOutcome) -> Fut + Send,
        Fut: Future<Output = ()> + Send,
    {
        let started = Instant::now();
        let mut failures = 0u32;

        let outcome = loop {
            tokio::time::sleep(timing.interval).await;

            match client.get_workstation(&workstation_uri).await {
                Ok(state) if !state.provisioning_state.is_in_progress() => {
                    break ProvisioningOutcome::Completed(state);
                }
                Ok(state) => {
                    debug!(id, provisioning = ?state.provisioning_state, "still provisioning");
                }
                Err(err) => {
                    failures += 1;
                    warn!(id, %err, failures, "snapshot check failed, continuing to poll");
                }
            }

            if started.elapsed() >= timing.deadline {
                break ProvisioningOutcome::TimedOut;
            }
        };

        lock(&operations).remove(&id);
        info!(id, "provisioning watch finished");
        on_complete(outcome).await;
    }
}

impl Drop for OperationWatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
