//! Creation orchestrator.
//!
//! Sequences the full creation workflow: validate the requested name, issue
//! the create call, hand the tracking URI to the watcher, and resolve the
//! handle once the server reports a terminal status. Also reconciles
//! machines created outside the extension by attaching an independent
//! provisioning watch so listings eventually reflect completion.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info, warn};
use ws_client::{CreateRequest, ManagementClient};
use ws_core::{OperationStatus, Result, WorkstationAction, WsError};

use crate::instance::WorkstationInstance;
use crate::operation::CreateWorkstationOperation;
use crate::watcher::{OperationWatcher, ProvisioningOutcome, WatchOutcome};

pub struct CreationManager {
    client: Arc<dyn ManagementClient>,
    watcher: Arc<OperationWatcher>,
    /// Workstations currently mid-creation, keyed by identifier. Lets the
    /// listing path reuse an instance before its creation settles.
    in_flight: Mutex<HashMap<String, Arc<WorkstationInstance>>>,
}

impl CreationManager {
    pub fn new(client: Arc<dyn ManagementClient>, watcher: Arc<OperationWatcher>) -> Arc<Self> {
        Arc::new(Self {
            client,
            watcher,
            in_flight: Mutex::new(HashMap::new()),
        })
    }

    /// Validate the request and hand back a not-yet-started operation
    /// handle. A name collision (case-insensitive, within the target
    /// project) fails here, before any network call.
    pub fn start_create(
        self: &Arc<Self>,
        request: CreateRequest,
        existing_names: &[String],
    ) -> Result<Arc<CreateWorkstationOperation>> {
        let wanted = request.name.to_lowercase();
        if existing_names.iter().any(|name| name.to_lowercase() == wanted) {
            return Err(WsError::Validation(format!(
                "a workstation named '{}' already exists in project '{}'",
                request.name, request.project_name
            )));
        }
        debug!(%request, "creation request validated");
        Ok(CreateWorkstationOperation::new(Arc::clone(self), request))
    }

    /// Drive one creation attempt on behalf of its handle. Every exit path
    /// resolves the handle.
    pub(crate) async fn run_create(self: &Arc<Self>, operation: &Arc<CreateWorkstationOperation>) {
        let request = operation.request().clone();
        operation.update_progress("sending creation request", 10);

        let (state, headers) = match self.client.create_workstation(&request).await {
            Ok(created) => created,
            Err(err) => {
                warn!(%request, %err, "creation call failed");
                operation.complete_with_failure(
                    format!("unable to create workstation '{}'", request.name),
                    err.to_string(),
                );
                return;
            }
        };
        operation.update_progress("creation request accepted", 35);

        let Some(tracking_uri) = headers.tracking_uri().map(str::to_string) else {
            operation.complete_with_failure(
                format!("unable to create workstation '{}'", request.name),
                "creation response carried no tracking headers",
            );
            return;
        };

        // The machine now exists server-side with an in-progress
        // provisioning state; listings will already include it.
        let instance = WorkstationInstance::new(
            Arc::clone(&self.client),
            Arc::clone(&self.watcher),
            state,
        );
        let id = instance.id();
        lock(&self.in_flight).insert(id.clone(), Arc::clone(&instance));

        let manager = Arc::clone(self);
        let handle = Arc::clone(operation);
        let created = Arc::clone(&instance);
        let watch = self.watcher.watch(
            &id,
            &tracking_uri,
            WorkstationAction::Create,
            move |outcome| async move {
                manager.finish_create(handle, created, outcome).await;
            },
        );

        if let Err(err) = watch {
            lock(&self.in_flight).remove(&id);
            operation.complete_with_failure(
                format!("unable to track creation of '{}'", request.name),
                err.to_string(),
            );
            return;
        }

        info!(id, name = %request.name, "provisioning started");
        operation.update_progress("provisioning started", 50);
    }

    async fn finish_create(
        &self,
        operation: Arc<CreateWorkstationOperation>,
        instance: Arc<WorkstationInstance>,
        outcome: WatchOutcome,
    ) {
        let id = instance.id();
        lock(&self.in_flight).remove(&id);

        match outcome {
            WatchOutcome::Completed(OperationStatus::Succeeded) => {
                if let Err(err) = instance.refresh_state().await {
                    // The operation did succeed; fall back to patching the
                    // provisioning axis so the host sees a settled machine.
                    warn!(id, %err, "final snapshot fetch failed after creation");
                    instance.mark_provisioned();
                }
                operation.update_progress("workstation ready", 100);
                operation.complete_with_success(instance);
            }
            WatchOutcome::Completed(status) => {
                instance.mark_error(format!("creation ended with status {status}"));
                operation.complete_with_failure(
                    format!("creation of '{}' failed", operation.request().name),
                    format!("final operation status: {status}"),
                );
            }
            WatchOutcome::TimedOut => {
                instance.mark_error("creation timed out".to_string());
                operation.complete_with_failure(
                    format!("creation of '{}' failed", operation.request().name),
                    "deadline exceeded without a terminal status",
                );
            }
        }
    }

    /// Attach a provisioning watch to a machine created outside the
    /// extension (for example from a web portal) so its state eventually
    /// settles without a creation handle being involved. No-op when the
    /// identifier is already tracked.
    pub fn watch_externally_created(self: &Arc<Self>, instance: &Arc<WorkstationInstance>) {
        let id = instance.id();
        {
            let mut in_flight = lock(&self.in_flight);
            if in_flight.contains_key(&id) {
                return;
            }
            in_flight.insert(id.clone(), Arc::clone(instance));
        }

        let manager = Arc::clone(self);
        let watched = Arc::clone(instance);
        let result = self.watcher.watch_provisioning(
            &id,
            &instance.uri(),
            move |outcome| async move {
                lock(&manager.in_flight).remove(&watched.id());
                match outcome {
                    ProvisioningOutcome::Completed(state) => {
                        info!(id = %watched.id(), "externally created workstation settled");
                        watched.apply_snapshot(state);
                    }
                    ProvisioningOutcome::TimedOut => {
                        watched.mark_error(
                            "provisioning did not finish before the deadline".to_string(),
                        );
                    }
                }
            },
        );

        if let Err(err) = result {
            debug!(id, %err, "provisioning watch not attached");
            lock(&self.in_flight).remove(&id);
        }
    }

    /// Workstation currently mid-creation, if any. Lets callers discover a
    /// machine before its creation operation settles.
    pub fn try_get_in_flight(&self, id: &str) -> Option<Arc<WorkstationInstance>> {
        lock(&self.in_flight).get(id).cloned()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
