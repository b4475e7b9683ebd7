mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{
    fast_timings, headers, provisioning_snapshot, record, short_deadline_timings, snapshot,
    MockManagementClient,
};
use ws_client::{CreateRequest, TrackingHeaders};
use ws_core::{OperationStatus, ProvisioningState, WsError};
use ws_provider::{CreationManager, OperationWatcher};

fn request(name: &str) -> CreateRequest {
    CreateRequest {
        project_name: "dev-project".to_string(),
        pool_name: "standard-pool".to_string(),
        name: name.to_string(),
        base_uri: "https://fabric.example.com".to_string(),
    }
}

fn manager(client: &Arc<MockManagementClient>) -> Arc<CreationManager> {
    let watcher = Arc::new(OperationWatcher::new(client.clone(), fast_timings()));
    CreationManager::new(client.clone(), watcher)
}

#[tokio::test]
async fn create_resolves_with_a_ready_instance() {
    let client = Arc::new(MockManagementClient::new());
    client.queue_create(Ok((provisioning_snapshot("ws-1", "dev1"), headers())));
    client.queue_operation(Ok(record(OperationStatus::Running)));
    client.queue_operation(Ok(record(OperationStatus::Succeeded)));
    let mut ready = snapshot("ws-1", "dev1");
    ready.provisioning_state = ProvisioningState::Succeeded;
    client.queue_workstation(Ok(ready));

    let manager = manager(&client);
    let operation = manager.start_create(request("dev1"), &[]).unwrap();

    let result = operation.start().await;
    assert!(result.is_success());
    let instance = result.instance().unwrap();
    assert_eq!(instance.name(), "dev1");
    assert_eq!(instance.snapshot().provisioning_state, ProvisioningState::Succeeded);
    // The machine is no longer mid-creation once the handle resolves.
    assert!(manager.try_get_in_flight("ws-1").is_none());
}

#[tokio::test]
async fn name_collision_fails_before_any_network_call() {
    let client = Arc::new(MockManagementClient::new());
    let manager = manager(&client);

    let existing = vec!["DEV1".to_string()];
    let err = manager.start_create(request("dev1"), &existing).unwrap_err();

    assert!(matches!(err, WsError::Validation(_)));
    assert!(client.calls().is_empty());
}

#[tokio::test]
async fn failed_create_call_resolves_the_handle_without_a_watch() {
    let client = Arc::new(MockManagementClient::new());
    client.queue_create(Err(WsError::Remote {
        status: 403,
        body: "quota exceeded".into(),
    }));

    let manager = manager(&client);
    let operation = manager.start_create(request("dev1"), &[]).unwrap();

    let result = operation.start().await;
    assert!(!result.is_success());
    assert_eq!(client.call_count("get_operation"), 0);
}

#[tokio::test]
async fn missing_tracking_headers_fail_the_creation() {
    let client = Arc::new(MockManagementClient::new());
    client.queue_create(Ok((
        provisioning_snapshot("ws-1", "dev1"),
        TrackingHeaders::new(None, None),
    )));

    let manager = manager(&client);
    let operation = manager.start_create(request("dev1"), &[]).unwrap();

    let result = operation.start().await;
    assert!(!result.is_success());
    assert!(manager.try_get_in_flight("ws-1").is_none());
}

#[tokio::test]
async fn concurrent_starts_admit_exactly_one_driver() {
    let client = Arc::new(MockManagementClient::new());
    client.queue_create(Ok((provisioning_snapshot("ws-1", "dev1"), headers())));
    client.queue_operation(Ok(record(OperationStatus::Succeeded)));
    client.set_fallback_snapshot(snapshot("ws-1", "dev1"));

    let manager = manager(&client);
    let operation = manager.start_create(request("dev1"), &[]).unwrap();

    let mut tasks = Vec::new();
    for _ in 0..5 {
        let op = operation.clone();
        tasks.push(tokio::spawn(async move { op.start().await }));
    }

    let mut successes = 0;
    let mut rejections = 0;
    for task in tasks {
        let result = task.await.unwrap();
        if result.is_success() {
            successes += 1;
        } else {
            rejections += 1;
        }
    }

    // One task drives the work; the rest are either rejected mid-flight or
    // observe the cached result if they arrive after completion. Either
    // way the remote create call happens once.
    assert!(successes >= 1);
    assert_eq!(successes + rejections, 5);
    assert_eq!(client.call_count("create_workstation"), 1);
}

#[tokio::test]
async fn completed_handle_returns_the_cached_result() {
    let client = Arc::new(MockManagementClient::new());
    client.queue_create(Ok((provisioning_snapshot("ws-1", "dev1"), headers())));
    client.queue_operation(Ok(record(OperationStatus::Succeeded)));
    client.set_fallback_snapshot(snapshot("ws-1", "dev1"));

    let manager = manager(&client);
    let operation = manager.start_create(request("dev1"), &[]).unwrap();

    let first = operation.start().await;
    assert!(first.is_success());
    let calls_after_first = client.calls().len();

    let second = operation.start().await;
    assert!(second.is_success());
    assert_eq!(client.calls().len(), calls_after_first);
}

#[tokio::test]
async fn timed_out_creation_resolves_as_failure() {
    let client = Arc::new(MockManagementClient::new());
    client.queue_create(Ok((provisioning_snapshot("ws-1", "dev1"), headers())));
    // Empty operation queue: every poll answers Running until the deadline.

    let watcher = Arc::new(OperationWatcher::new(client.clone(), short_deadline_timings()));
    let manager = CreationManager::new(client.clone(), watcher);
    let operation = manager.start_create(request("dev1"), &[]).unwrap();

    let result = operation.start().await;
    assert!(!result.is_success());
    assert!(manager.try_get_in_flight("ws-1").is_none());
}

#[tokio::test]
async fn progress_reaches_completion_on_success() {
    let client = Arc::new(MockManagementClient::new());
    client.queue_create(Ok((provisioning_snapshot("ws-1", "dev1"), headers())));
    client.queue_operation(Ok(record(OperationStatus::Succeeded)));
    client.set_fallback_snapshot(snapshot("ws-1", "dev1"));

    let manager = manager(&client);
    let operation = manager.start_create(request("dev1"), &[]).unwrap();
    let progress = operation.subscribe_progress();

    let result = operation.start().await;
    assert!(result.is_success());

    tokio::time::sleep(Duration::from_millis(5)).await;
    assert_eq!(progress.borrow().percent, 100);
}
