//! The `ManagementClient` trait seam.
//!
//! The lifecycle layer drives everything through this trait so the watcher,
//! the state machine, and the creation orchestrator can be exercised
//! against scripted doubles.

use async_trait::async_trait;
use ws_core::{Result, WorkstationAction};

use crate::models::{
    CreateRequest, OperationRecord, Pool, Project, RemoteConnection, TrackingHeaders,
    WorkstationState,
};

#[async_trait]
pub trait ManagementClient: Send + Sync {
    /// Issue a creation call. Returns the partially provisioned snapshot
    /// from the response body together with the tracking headers of the
    /// long-running operation.
    async fn create_workstation(
        &self,
        request: &CreateRequest,
    ) -> Result<(WorkstationState, TrackingHeaders)>;

    /// Fetch the current snapshot of a workstation by its management URI.
    async fn get_workstation(&self, uri: &str) -> Result<WorkstationState>;

    /// Poll the status of a long-running operation by its tracking URI.
    async fn get_operation(&self, uri: &str) -> Result<OperationRecord>;

    /// Issue a start/stop/restart/delete call against a workstation.
    /// Returns the tracking headers of the resulting operation.
    async fn perform_action(
        &self,
        workstation_uri: &str,
        action: WorkstationAction,
    ) -> Result<TrackingHeaders>;

    /// Fetch the connection descriptor of a workstation. Single call, no
    /// polling involved.
    async fn get_remote_connection(&self, workstation_uri: &str) -> Result<RemoteConnection>;

    /// Projects the signed-in account has access to.
    async fn list_projects(&self) -> Result<Vec<Project>>;

    /// Pools available for provisioning within a project.
    async fn list_pools(&self, project: &Project) -> Result<Vec<Pool>>;

    /// Workstations the user owns within a project.
    async fn list_workstations(&self, project: &Project) -> Result<Vec<WorkstationState>>;
}
