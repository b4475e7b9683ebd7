//! Remote management client for the cloud workstation extension.
//!
//! This crate owns everything that crosses the wire: the JSON models the
//! management and data planes return, the operation-tracking response
//! headers of long-running calls, the credential broker seam that produces
//! bearer tokens, and the `ManagementClient` trait with its `reqwest`-backed
//! implementation.
//!
//! No retry logic lives here. A non-2xx response surfaces as a typed
//! failure carrying the HTTP status and body; a transport failure surfaces
//! as a distinct unreachable error. Bounded retries are the operation
//! watcher's responsibility.

pub mod auth;
pub mod client;
pub mod models;
pub mod rest;

pub use auth::{Account, CredentialBroker, TokenScope};
pub use client::ManagementClient;
pub use models::{
    CreateRequest, HardwareProfile, OperationRecord, Pool, Project, RemoteConnection,
    StorageProfile, TrackingHeaders, WorkstationState,
};
pub use rest::{RestClientConfig, RestManagementClient};
