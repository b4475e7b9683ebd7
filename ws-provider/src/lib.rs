//! Workstation lifecycle core.
//!
//! This crate turns the one-shot calls of [`ws_client`] into the concurrent,
//! retryable, time-bounded workflow the host consumes:
//!
//! - [`OperationWatcher`] polls server-side long-running operations at a
//!   per-action cadence and delivers exactly one completion per identifier.
//! - [`WorkstationInstance`] wraps one machine's last-known snapshot and
//!   exposes start/stop/restart/delete, all routed through the watcher.
//! - [`CreationManager`] sequences the creation workflow and reconciles
//!   machines created outside the extension.
//! - [`CreateWorkstationOperation`] is the handle the host holds while a
//!   creation is in flight.
//! - [`WorkstationProvider`] is the host SDK boundary tying it together.

pub mod creation;
pub mod instance;
pub mod operation;
pub mod timing;
pub mod watcher;

pub use creation::CreationManager;
pub use instance::WorkstationInstance;
pub use operation::{CreateResult, CreateWorkstationOperation, CreationPhase, CreationProgress};
pub use timing::{ActionTiming, ActionTimings};
pub use watcher::{OperationWatcher, ProvisioningOutcome, WatchOutcome};

use std::sync::Arc;

use ws_client::{CreateRequest, ManagementClient, Pool, Project};
use ws_core::Result;

/// Host-facing entry point for listing, creating, and managing
/// workstations. All collaborators are explicitly constructed and injected;
/// there is no global state.
pub struct WorkstationProvider {
    client: Arc<dyn ManagementClient>,
    watcher: Arc<OperationWatcher>,
    creation: Arc<CreationManager>,
}

impl WorkstationProvider {
    pub fn new(client: Arc<dyn ManagementClient>, timings: ActionTimings) -> Self {
        let watcher = Arc::new(OperationWatcher::new(Arc::clone(&client), timings));
        let creation = CreationManager::new(Arc::clone(&client), Arc::clone(&watcher));
        Self {
            client,
            watcher,
            creation,
        }
    }

    pub fn watcher(&self) -> &Arc<OperationWatcher> {
        &self.watcher
    }

    pub fn creation_manager(&self) -> &Arc<CreationManager> {
        &self.creation
    }

    /// Projects the signed-in account can provision into.
    pub async fn list_projects(&self) -> Result<Vec<Project>> {
        self.client.list_projects().await
    }

    /// Pools available within a project.
    pub async fn list_pools(&self, project: &Project) -> Result<Vec<Pool>> {
        self.client.list_pools(project).await
    }

    /// All workstations across the account's projects.
    ///
    /// Instances mid-creation through this extension are reused rather than
    /// rebuilt from the listing. Machines still provisioning that we are
    /// not already tracking were created elsewhere; they get a provisioning
    /// watch so their state eventually settles.
    pub async fn list_workstations(&self) -> Result<Vec<Arc<WorkstationInstance>>> {
        let mut workstations = Vec::new();
        for project in self.client.list_projects().await? {
            for state in self.client.list_workstations(&project).await? {
                if let Some(in_flight) = self.creation.try_get_in_flight(&state.unique_id) {
                    workstations.push(in_flight);
                    continue;
                }

                let still_provisioning = state.provisioning_state.is_in_progress();
                let instance = WorkstationInstance::new(
                    Arc::clone(&self.client),
                    Arc::clone(&self.watcher),
                    state,
                );
                if still_provisioning {
                    self.creation.watch_externally_created(&instance);
                }
                workstations.push(instance);
            }
        }
        Ok(workstations)
    }

    /// Validate and hand back a creation handle. See
    /// [`CreationManager::start_create`].
    pub fn create_workstation(
        &self,
        request: CreateRequest,
        existing_names: &[String],
    ) -> Result<Arc<CreateWorkstationOperation>> {
        self.creation.start_create(request, existing_names)
    }

    /// Stop every active watch. Must run before extension shutdown so no
    /// poller outlives the host.
    pub fn shutdown(&self) {
        self.watcher.shutdown();
    }
}
