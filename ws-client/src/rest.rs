//! `reqwest`-backed implementation of [`ManagementClient`].
//!
//! Every call fetches a fresh bearer token from the credential broker for
//! the plane it targets. Responses are classified into typed failures: a
//! transport error becomes `WsError::Unreachable`, a non-2xx status becomes
//! `WsError::Remote` carrying the status code and body.

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;
use ws_core::{Result, WorkstationAction, WsError};

use crate::auth::{CredentialBroker, TokenScope};
use crate::client::ManagementClient;
use crate::models::{
    CreateRequest, OperationRecord, Pool, Project, RemoteConnection, TrackingHeaders,
    WorkstationState,
};

/// Data-plane API version appended to every workstation call.
pub const API_VERSION: &str = "2023-04-01";

/// API version of the management-plane resource query.
pub const RESOURCE_QUERY_API_VERSION: &str = "2021-03-01";

/// Resource query returning all provisioned workstation projects the
/// account can see.
const PROJECT_QUERY: &str = "Resources \
    | where type in~ ('microsoft.devcenter/projects') \
    | where properties['provisioningState'] =~ 'Succeeded' \
    | project id, location, tenantId, name, properties, type";

#[derive(Debug, Clone)]
pub struct RestClientConfig {
    /// Base URI of the management plane used for project discovery.
    pub management_endpoint: String,
    /// Account the client acts on behalf of.
    pub account_id: String,
}

pub struct RestManagementClient {
    http: reqwest::Client,
    broker: Arc<dyn CredentialBroker>,
    config: RestClientConfig,
}

impl RestManagementClient {
    pub fn new(broker: Arc<dyn CredentialBroker>, config: RestClientConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            broker,
            config,
        }
    }

    /// Attach a freshly obtained bearer token and send, classifying
    /// transport failures and non-2xx statuses into typed errors.
    async fn send(&self, scope: TokenScope, builder: RequestBuilder) -> Result<reqwest::Response> {
        let token = self
            .broker
            .get_token(scope, &self.config.account_id)
            .await?;
        let response = builder
            .bearer_auth(token)
            .send()
            .await
            .map_err(|err| WsError::Unreachable(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(WsError::Remote {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn read_json<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let text = response
            .text()
            .await
            .map_err(|err| WsError::Unreachable(err.to_string()))?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[derive(Deserialize)]
struct ValueEnvelope<T> {
    #[serde(default = "Vec::new")]
    value: Vec<T>,
}

#[derive(Deserialize)]
struct DataEnvelope<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

#[async_trait]
impl ManagementClient for RestManagementClient {
    async fn create_workstation(
        &self,
        request: &CreateRequest,
    ) -> Result<(WorkstationState, TrackingHeaders)> {
        let url = join_url(
            &request.base_uri,
            &format!(
                "projects/{}/users/me/workstations/{}?api-version={API_VERSION}",
                request.project_name, request.name
            ),
        );
        debug!(%request, "issuing creation call");

        let response = self
            .send(
                TokenScope::DataPlane,
                self.http
                    .request(Method::PUT, &url)
                    .json(&json!({ "poolName": request.pool_name })),
            )
            .await?;

        let headers = TrackingHeaders::from_headers(response.headers());
        let state: WorkstationState = Self::read_json(response).await?;
        Ok((state, headers))
    }

    async fn get_workstation(&self, uri: &str) -> Result<WorkstationState> {
        let url = format!("{uri}?api-version={API_VERSION}");
        let response = self.send(TokenScope::DataPlane, self.http.get(&url)).await?;
        Self::read_json(response).await
    }

    async fn get_operation(&self, uri: &str) -> Result<OperationRecord> {
        // Tracking URIs arrive complete from the response headers.
        let response = self.send(TokenScope::DataPlane, self.http.get(uri)).await?;
        Self::read_json(response).await
    }

    async fn perform_action(
        &self,
        workstation_uri: &str,
        action: WorkstationAction,
    ) -> Result<TrackingHeaders> {
        let builder = match action {
            WorkstationAction::Start | WorkstationAction::Stop | WorkstationAction::Restart => {
                let verb = match action {
                    WorkstationAction::Start => "start",
                    WorkstationAction::Stop => "stop",
                    _ => "restart",
                };
                self.http
                    .post(format!("{workstation_uri}:{verb}?api-version={API_VERSION}"))
            }
            WorkstationAction::Delete => self
                .http
                .delete(format!("{workstation_uri}?api-version={API_VERSION}")),
            WorkstationAction::Create | WorkstationAction::ProvisioningWatch => {
                return Err(WsError::Validation(format!(
                    "'{action}' is not an action that can be issued against an existing workstation"
                )));
            }
        };

        debug!(uri = workstation_uri, %action, "issuing action call");
        let response = self.send(TokenScope::DataPlane, builder).await?;
        Ok(TrackingHeaders::from_headers(response.headers()))
    }

    async fn get_remote_connection(&self, workstation_uri: &str) -> Result<RemoteConnection> {
        let url = format!("{workstation_uri}/remoteConnection?api-version={API_VERSION}");
        let response = self.send(TokenScope::DataPlane, self.http.get(&url)).await?;
        Self::read_json(response).await
    }

    async fn list_projects(&self) -> Result<Vec<Project>> {
        let url = join_url(
            &self.config.management_endpoint,
            &format!("providers/resources/query?api-version={RESOURCE_QUERY_API_VERSION}"),
        );
        let body = json!({
            "query": PROJECT_QUERY,
            "options": { "allowPartialScopes": true },
        });

        let response = self
            .send(TokenScope::Management, self.http.post(&url).json(&body))
            .await?;
        let envelope: DataEnvelope<Project> = Self::read_json(response).await?;
        Ok(envelope.data)
    }

    async fn list_pools(&self, project: &Project) -> Result<Vec<Pool>> {
        let url = join_url(
            &project.properties.dev_center_uri,
            &format!("projects/{}/pools?api-version={API_VERSION}", project.name),
        );
        let response = self.send(TokenScope::DataPlane, self.http.get(&url)).await?;
        let envelope: ValueEnvelope<Pool> = Self::read_json(response).await?;
        Ok(envelope.value)
    }

    async fn list_workstations(&self, project: &Project) -> Result<Vec<WorkstationState>> {
        let url = join_url(
            &project.properties.dev_center_uri,
            &format!(
                "projects/{}/users/me/workstations?api-version={API_VERSION}",
                project.name
            ),
        );
        let response = self.send(TokenScope::DataPlane, self.http.get(&url)).await?;
        let envelope: ValueEnvelope<WorkstationState> = Self::read_json(response).await?;
        Ok(envelope.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_url_handles_trailing_and_leading_slashes() {
        assert_eq!(
            join_url("https://plane.example.com/", "/projects/eng"),
            "https://plane.example.com/projects/eng"
        );
        assert_eq!(
            join_url("https://plane.example.com", "projects/eng"),
            "https://plane.example.com/projects/eng"
        );
    }
}
