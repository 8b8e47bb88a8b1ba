/// HTTP implementation of the workflow store contract
///
/// Thin reqwest wrapper: every call sends `Content-Type: application/json`, maps
/// non-2xx statuses to `StoreError::Status` with the status text, and decodes the
/// body with serde_json.

use crate::client::WorkflowStore;
use crate::config::ApiConfig;
use crate::error::StoreError;
use crate::workflow::types::{
    AddEdgeRequest, AddNodeRequest, CreateWorkflowRequest, Edge, Node, NodeDefinition, Resource,
    SetNodeDataRequest, Workflow, WorkflowDetails,
};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;

/// reqwest-backed workflow service client
#[derive(Debug, Clone)]
pub struct HttpWorkflowClient {
    client: reqwest::Client,
    /// Base URL without trailing slash
    base_url: String,
}

impl HttpWorkflowClient {
    /// Create a client for the configured service
    pub fn new(config: &ApiConfig) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self::with_client(client, &config.base_url))
    }

    /// Wrap an existing reqwest client (shared connection pool)
    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Start a JSON request against `path` (relative to the base URL)
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
            .header(CONTENT_TYPE, "application/json")
    }

    /// Send a request and reject non-2xx responses
    async fn send(&self, request: RequestBuilder) -> Result<Response, StoreError> {
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let status_text = status
                .canonical_reason()
                .unwrap_or("Unknown Status")
                .to_string();
            tracing::debug!("❌ {} -> {}", response.url(), status);
            return Err(StoreError::Status {
                status: status.as_u16(),
                status_text,
            });
        }

        Ok(response)
    }

    /// Send a request and decode the JSON body
    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, StoreError> {
        let response = self.send(request).await?;
        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| StoreError::MalformedResponse(e.to_string()))
    }

    /// Send a request whose response body is only an acknowledgement
    async fn send_ack(&self, request: RequestBuilder) -> Result<(), StoreError> {
        self.send(request).await?;
        Ok(())
    }
}

#[async_trait]
impl WorkflowStore for HttpWorkflowClient {
    async fn list_workflows(&self) -> Result<Vec<Workflow>, StoreError> {
        self.send_json(self.request(Method::GET, "/workflows/")).await
    }

    async fn get_workflow(&self, workflow_id: &str) -> Result<Workflow, StoreError> {
        let path = format!("/workflows/{}/", workflow_id);
        self.send_json(self.request(Method::GET, &path)).await
    }

    async fn create_workflow(&self, body: &CreateWorkflowRequest) -> Result<Workflow, StoreError> {
        let request = self.request(Method::POST, "/workflows/").json(body);
        self.send_json(request).await
    }

    async fn delete_workflow(&self, workflow_id: &str, dry_run: bool) -> Result<Vec<Resource>, StoreError> {
        let request = self
            .request(Method::DELETE, &format!("/workflows/{}", workflow_id))
            .query(&[("dryRun", dry_run.to_string())]);
        self.send_json(request).await
    }

    async fn get_workflow_details(&self, workflow_id: &str) -> Result<WorkflowDetails, StoreError> {
        let path = format!("/workflows/{}/all", workflow_id);
        let resources: Vec<Resource> = self.send_json(self.request(Method::GET, &path)).await?;

        WorkflowDetails::from_resources(resources).ok_or_else(|| {
            StoreError::MalformedResponse(format!(
                "detail response for {} has no workflow record",
                workflow_id
            ))
        })
    }

    async fn list_node_definitions(&self) -> Result<Vec<NodeDefinition>, StoreError> {
        self.send_json(self.request(Method::GET, "/nodes/")).await
    }

    async fn add_node(&self, workflow_id: &str, body: &AddNodeRequest) -> Result<Node, StoreError> {
        let path = format!("/workflows/{}/nodes/", workflow_id);
        self.send_json(self.request(Method::POST, &path).json(body)).await
    }

    async fn delete_node(&self, workflow_id: &str, node_id: &str) -> Result<Vec<Resource>, StoreError> {
        let path = format!("/workflows/{}/nodes/{}", workflow_id, node_id);
        self.send_json(self.request(Method::DELETE, &path)).await
    }

    async fn add_edge(&self, workflow_id: &str, body: &AddEdgeRequest) -> Result<Edge, StoreError> {
        let path = format!("/workflows/{}/edges", workflow_id);
        self.send_json(self.request(Method::POST, &path).json(body)).await
    }

    async fn delete_edge(&self, workflow_id: &str, edge_id: &str) -> Result<Vec<Resource>, StoreError> {
        let path = format!("/workflows/{}/edges/{}", workflow_id, edge_id);
        self.send_json(self.request(Method::DELETE, &path)).await
    }

    async fn put_nodes(&self, workflow_id: &str, nodes: &[Node]) -> Result<(), StoreError> {
        let path = format!("/workflows/{}/nodes/", workflow_id);
        self.send_ack(self.request(Method::PUT, &path).json(nodes)).await
    }

    async fn put_edges(&self, workflow_id: &str, edges: &[Edge]) -> Result<(), StoreError> {
        let path = format!("/workflows/{}/edges/", workflow_id);
        self.send_ack(self.request(Method::PUT, &path).json(edges)).await
    }

    async fn set_node_data(
        &self,
        workflow_id: &str,
        node_id: &str,
        body: &SetNodeDataRequest,
    ) -> Result<(), StoreError> {
        let path = format!("/workflows/{}/nodes/{}/data", workflow_id, node_id);
        self.send_ack(self.request(Method::POST, &path).json(body)).await
    }
}
