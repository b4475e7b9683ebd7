#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use ws_client::{
    CreateRequest, ManagementClient, OperationRecord, Pool, Project, RemoteConnection,
    TrackingHeaders, WorkstationState,
};
use ws_core::{
    ActionState, OperationStatus, PowerState, ProvisioningState, Result, WorkstationAction,
    WsError,
};
use ws_provider::ActionTimings;

/// Scripted management client. Each method pops the next canned response
/// from its queue; an empty queue falls back to a sensible steady-state
/// answer so long polls don't need endless scripting.
pub struct MockManagementClient {
    pub create_responses: Mutex<VecDeque<Result<(WorkstationState, TrackingHeaders)>>>,
    pub workstation_responses: Mutex<VecDeque<Result<WorkstationState>>>,
    pub operation_responses: Mutex<VecDeque<Result<OperationRecord>>>,
    pub action_responses: Mutex<VecDeque<Result<TrackingHeaders>>>,
    pub projects: Mutex<Vec<Project>>,
    pub workstation_listings: Mutex<VecDeque<Vec<WorkstationState>>>,
    pub fallback_snapshot: Mutex<Option<WorkstationState>>,
    pub calls: Mutex<Vec<String>>,
}

impl MockManagementClient {
    pub fn new() -> Self {
        Self {
            create_responses: Mutex::new(VecDeque::new()),
            workstation_responses: Mutex::new(VecDeque::new()),
            operation_responses: Mutex::new(VecDeque::new()),
            action_responses: Mutex::new(VecDeque::new()),
            projects: Mutex::new(Vec::new()),
            workstation_listings: Mutex::new(VecDeque::new()),
            fallback_snapshot: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn queue_create(&self, response: Result<(WorkstationState, TrackingHeaders)>) {
        self.create_responses.lock().unwrap().push_back(response);
    }

    pub fn queue_workstation(&self, response: Result<WorkstationState>) {
        self.workstation_responses.lock().unwrap().push_back(response);
    }

    pub fn queue_operation(&self, response: Result<OperationRecord>) {
        self.operation_responses.lock().unwrap().push_back(response);
    }

    pub fn queue_action(&self, response: Result<TrackingHeaders>) {
        self.action_responses.lock().unwrap().push_back(response);
    }

    pub fn set_fallback_snapshot(&self, state: WorkstationState) {
        *self.fallback_snapshot.lock().unwrap() = Some(state);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, name: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.as_str() == name)
            .count()
    }

    fn record(&self, name: &str) {
        self.calls.lock().unwrap().push(name.to_string());
    }
}

#[async_trait]
impl ManagementClient for MockManagementClient {
    async fn create_workstation(
        &self,
        _request: &CreateRequest,
    ) -> Result<(WorkstationState, TrackingHeaders)> {
        self.record("create_workstation");
        self.create_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(WsError::Validation("no scripted create response".into())))
    }

    async fn get_workstation(&self, _uri: &str) -> Result<WorkstationState> {
        self.record("get_workstation");
        if let Some(response) = self.workstation_responses.lock().unwrap().pop_front() {
            return response;
        }
        self.fallback_snapshot
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| WsError::Validation("no scripted workstation response".into()))
    }

    async fn get_operation(&self, _tracking_uri: &str) -> Result<OperationRecord> {
        self.record("get_operation");
        // Steady state: still running, keep polling.
        self.operation_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(record(OperationStatus::Running)))
    }

    async fn perform_action(
        &self,
        _uri: &str,
        _action: WorkstationAction,
    ) -> Result<TrackingHeaders> {
        self.record("perform_action");
        self.action_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(headers()))
    }

    async fn get_remote_connection(&self, _uri: &str) -> Result<RemoteConnection> {
        self.record("get_remote_connection");
        Ok(RemoteConnection::default())
    }

    async fn list_projects(&self) -> Result<Vec<Project>> {
        self.record("list_projects");
        Ok(self.projects.lock().unwrap().clone())
    }

    async fn list_pools(&self, _project: &Project) -> Result<Vec<Pool>> {
        self.record("list_pools");
        Ok(Vec::new())
    }

    async fn list_workstations(&self, _project: &Project) -> Result<Vec<WorkstationState>> {
        self.record("list_workstations");
        Ok(self
            .workstation_listings
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default())
    }
}

pub fn snapshot(id: &str, name: &str) -> WorkstationState {
    WorkstationState {
        unique_id: id.to_string(),
        name: name.to_string(),
        project_name: "dev-project".to_string(),
        pool_name: "standard-pool".to_string(),
        uri: format!("https://fabric.example.com/projects/dev-project/workstations/{name}"),
        provisioning_state: ProvisioningState::Succeeded,
        power_state: PowerState::Deallocated,
        action_state: ActionState::Stopped,
        ..WorkstationState::default()
    }
}

pub fn provisioning_snapshot(id: &str, name: &str) -> WorkstationState {
    let mut state = snapshot(id, name);
    state.provisioning_state = ProvisioningState::Provisioning;
    state.power_state = PowerState::Unknown;
    state.action_state = ActionState::Unknown;
    state
}

pub fn record(status: OperationStatus) -> OperationRecord {
    OperationRecord {
        status,
        ..OperationRecord::default()
    }
}

pub fn headers() -> TrackingHeaders {
    TrackingHeaders::new(
        None,
        Some("https://fabric.example.com/operations/5b9d3f1e-8c4a-4f2e-9d6b-1a2b3c4d5e6f".to_string()),
    )
}

pub fn fast_timings() -> ActionTimings {
    ActionTimings::uniform(Duration::from_millis(5), Duration::from_secs(5))
}

pub fn short_deadline_timings() -> ActionTimings {
    ActionTimings::uniform(Duration::from_millis(5), Duration::from_millis(20))
}

/// Poll `predicate` until it holds or the budget elapses.
pub async fn wait_until<F>(mut predicate: F)
where
    F: FnMut() -> bool,
{
    for _ in 0..500 {
        if predicate() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!("condition not reached within the wait budget");
}
