//! Wire models for the management and data planes.
//!
//! These mirror the JSON bodies the remote service returns and should be
//! kept in sync with its API definition. Fields the extension does not use
//! are omitted; unknown enum values fold into `Unknown` so a newer server
//! cannot break deserialization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;
use uuid::Uuid;
use ws_core::{ActionState, OperationStatus, PowerState, ProvisioningState};

/// Snapshot of a single workstation as returned by the data plane.
///
/// Owned exclusively by one workstation instance and replaced wholesale on
/// every successful poll, never partially mutated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkstationState {
    /// Management URI used for all subsequent calls about this machine.
    pub uri: String,
    pub name: String,
    pub project_name: String,
    pub pool_name: String,
    pub unique_id: String,
    pub provisioning_state: ProvisioningState,
    pub action_state: ActionState,
    pub power_state: PowerState,
    pub hibernate_support: String,
    pub os_type: String,
    pub location: String,
    pub user: String,
    pub hardware_profile: HardwareProfile,
    pub storage_profile: StorageProfile,
    pub created_time: Option<DateTime<Utc>>,
}

impl WorkstationState {
    pub fn hibernate_enabled(&self) -> bool {
        self.hibernate_support.eq_ignore_ascii_case("Enabled")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HardwareProfile {
    #[serde(rename = "vCPUs")]
    pub vcpus: u32,
    pub sku_name: String,
    #[serde(rename = "memoryGB")]
    pub memory_gb: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StorageProfile {
    pub os_disk: OsDisk,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OsDisk {
    #[serde(rename = "diskSizeGB")]
    pub disk_size_gb: u32,
}

/// Status body of a server-side long-running operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OperationRecord {
    pub id: String,
    pub name: String,
    pub status: OperationStatus,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

/// Connection descriptor for an up-and-running workstation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RemoteConnection {
    pub web_url: String,
    pub rdp_connection_url: String,
}

/// A project discovered through the management-plane resource query.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub properties: ProjectProperties,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectProperties {
    /// Base URI of the data plane serving this project.
    pub dev_center_uri: String,
}

/// A pool a new workstation can be provisioned from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Pool {
    pub name: String,
    pub os_type: String,
    pub hardware_profile: HardwareProfile,
    pub storage_profile: StorageProfile,
}

/// Parameters for creating a new workstation. Constructed once from host
/// input and never mutated afterward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRequest {
    pub project_name: String,
    pub pool_name: String,
    pub name: String,
    /// Data-plane base URI of the target project.
    pub base_uri: String,
}

impl fmt::Display for CreateRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "project: {}, pool: {}, name: {}",
            self.project_name, self.pool_name, self.name
        )
    }
}

/// Operation-tracking headers of a long-running call.
///
/// The service answers creation and action calls with a `Location` and/or
/// `Operation-Location` header; either can be polled for status. The
/// operation id is the last segment of the tracking URI when the server
/// issued one, otherwise a locally generated UUID.
#[derive(Debug, Clone)]
pub struct TrackingHeaders {
    pub location: Option<String>,
    pub operation_location: Option<String>,
    pub operation_id: String,
}

impl TrackingHeaders {
    pub fn new(location: Option<String>, operation_location: Option<String>) -> Self {
        let operation_id = operation_location
            .as_deref()
            .or(location.as_deref())
            .and_then(parse_operation_id)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        Self {
            location,
            operation_location,
            operation_id,
        }
    }

    pub fn from_headers(headers: &reqwest::header::HeaderMap) -> Self {
        let location = headers
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let operation_location = headers
            .get("Operation-Location")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        Self::new(location, operation_location)
    }

    /// URI to poll for operation status, preferring `Operation-Location`.
    pub fn tracking_uri(&self) -> Option<&str> {
        self.operation_location.as_deref().or(self.location.as_deref())
    }
}

fn parse_operation_id(uri: &str) -> Option<String> {
    let parsed = Url::parse(uri).ok()?;
    let segment = parsed.path_segments()?.filter(|s| !s.is_empty()).next_back()?;
    Uuid::parse_str(segment).ok().map(|id| id.to_string())
}
