//! Workstation state machine.
//!
//! Wraps one remote workstation's last-known snapshot and exposes the
//! host-facing actions. Every mutating action routes through the operation
//! watcher; completion is observed asynchronously through the state-changed
//! channel. The snapshot is replaced wholesale on every successful poll.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;
use tracing::{info, warn};
use ws_client::{ManagementClient, RemoteConnection, WorkstationState};
use ws_core::{CompositeState, OperationStatus, Result, WorkstationAction, WsError};

use crate::watcher::{OperationWatcher, WatchOutcome};

pub struct WorkstationInstance {
    client: Arc<dyn ManagementClient>,
    watcher: Arc<OperationWatcher>,
    snapshot: Mutex<WorkstationState>,
    state_tx: watch::Sender<CompositeState>,
    last_error: Mutex<Option<String>>,
}

impl WorkstationInstance {
    pub fn new(
        client: Arc<dyn ManagementClient>,
        watcher: Arc<OperationWatcher>,
        snapshot: WorkstationState,
    ) -> Arc<Self> {
        let initial = CompositeState::from_axes(
            snapshot.provisioning_state,
            snapshot.power_state,
            snapshot.action_state,
        );
        let (state_tx, _) = watch::channel(initial);
        Arc::new(Self {
            client,
            watcher,
            snapshot: Mutex::new(snapshot),
            state_tx,
            last_error: Mutex::new(None),
        })
    }

    pub fn id(&self) -> String {
        self.lock_snapshot().unique_id.clone()
    }

    pub fn name(&self) -> String {
        self.lock_snapshot().name.clone()
    }

    pub fn project_name(&self) -> String {
        self.lock_snapshot().project_name.clone()
    }

    pub fn pool_name(&self) -> String {
        self.lock_snapshot().pool_name.clone()
    }

    pub fn uri(&self) -> String {
        self.lock_snapshot().uri.clone()
    }

    /// Copy of the last-known snapshot.
    pub fn snapshot(&self) -> WorkstationState {
        self.lock_snapshot().clone()
    }

    /// Current host-visible lifecycle state.
    pub fn state(&self) -> CompositeState {
        *self.state_tx.borrow()
    }

    /// Subscribe to state-changed notifications.
    pub fn subscribe(&self) -> watch::Receiver<CompositeState> {
        self.state_tx.subscribe()
    }

    /// Message of the most recent failed action, if any. Cleared by the
    /// next successful snapshot refresh.
    pub fn last_error(&self) -> Option<String> {
        lock(&self.last_error).clone()
    }

    pub async fn start(self: &Arc<Self>) -> Result<()> {
        self.perform(WorkstationAction::Start).await
    }

    pub async fn stop(self: &Arc<Self>) -> Result<()> {
        self.perform(WorkstationAction::Stop).await
    }

    pub async fn restart(self: &Arc<Self>) -> Result<()> {
        self.perform(WorkstationAction::Restart).await
    }

    pub async fn delete(self: &Arc<Self>) -> Result<()> {
        self.perform(WorkstationAction::Delete).await
    }

    /// Connection descriptor for the machine. Single delegated call, no
    /// polling.
    pub async fn remote_connection(&self) -> Result<RemoteConnection> {
        let uri = self.uri();
        self.client.get_remote_connection(&uri).await
    }

    /// Re-fetch the snapshot outside of any action-triggered poll. Safe to
    /// call regardless of current state.
    pub async fn refresh_state(&self) -> Result<CompositeState> {
        let uri = self.uri();
        let state = self.client.get_workstation(&uri).await?;
        Ok(self.apply_snapshot(state))
    }

    /// Issue a long-running action and register a watch for it, keyed by
    /// the workstation id. Returns as soon as the server accepts the call;
    /// the completion callback refreshes the snapshot and publishes one
    /// state-changed notification.
    async fn perform(self: &Arc<Self>, action: WorkstationAction) -> Result<()> {
        let (id, uri) = {
            let snapshot = self.lock_snapshot();
            (snapshot.unique_id.clone(), snapshot.uri.clone())
        };

        let state = self.state();
        if !state.allows(action) {
            return Err(WsError::InvalidState {
                action: action.to_string(),
                state: state.to_string(),
            });
        }

        // Reject before touching the network: an active watch (including a
        // provisioning watch from creation) means another transition owns
        // this identifier right now.
        if self.watcher.is_watching(&id) {
            return Err(WsError::AlreadyWatching(id));
        }

        let headers = self.client.perform_action(&uri, action).await?;
        let tracking_uri = headers
            .tracking_uri()
            .ok_or_else(|| {
                WsError::Validation(format!(
                    "{action} call for '{id}' returned no tracking headers"
                ))
            })?
            .to_string();

        let this = Arc::clone(self);
        self.watcher.watch(&id, &tracking_uri, action, move |outcome| async move {
            this.finish_action(action, outcome).await;
        })?;

        info!(id, %action, "action accepted, awaiting completion");
        Ok(())
    }

    async fn finish_action(&self, action: WorkstationAction, outcome: WatchOutcome) {
        match outcome {
            WatchOutcome::Completed(OperationStatus::Succeeded) => {
                if let Err(err) = self.refresh_state().await {
                    self.mark_error(format!(
                        "{action} completed but the snapshot refresh failed: {err}"
                    ));
                }
            }
            WatchOutcome::Completed(status) => {
                self.mark_error(format!("{action} operation ended with status {status}"));
            }
            WatchOutcome::TimedOut => {
                self.mark_error(format!("{action} operation timed out"));
            }
        }
    }

    /// Replace the snapshot wholesale, recompute the composite state, and
    /// notify subscribers.
    pub(crate) fn apply_snapshot(&self, state: WorkstationState) -> CompositeState {
        let composite = CompositeState::from_axes(
            state.provisioning_state,
            state.power_state,
            state.action_state,
        );
        *self.lock_snapshot() = state;
        *lock(&self.last_error) = None;
        self.state_tx.send_replace(composite);
        composite
    }

    /// Mark the provisioning axis as settled without a fresh snapshot.
    /// Used when the creation operation succeeded but the final snapshot
    /// fetch did not.
    pub(crate) fn mark_provisioned(&self) {
        let composite = {
            let mut snapshot = self.lock_snapshot();
            snapshot.provisioning_state = ws_core::ProvisioningState::Succeeded;
            CompositeState::from_axes(
                snapshot.provisioning_state,
                snapshot.power_state,
                snapshot.action_state,
            )
        };
        *lock(&self.last_error) = None;
        self.state_tx.send_replace(composite);
    }

    /// Surface an action failure. The instance stays usable; the error
    /// clears on the next successful refresh.
    pub(crate) fn mark_error(&self, message: String) {
        warn!(id = %self.id(), %message, "workstation action failed");
        *lock(&self.last_error) = Some(message);
        self.state_tx.send_replace(CompositeState::Error);
    }

    fn lock_snapshot(&self) -> MutexGuard<'_, WorkstationState> {
        lock(&self.snapshot)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
