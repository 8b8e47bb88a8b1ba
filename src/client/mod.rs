/// Workflow Store Client
///
/// Typed request/response contract to the remote workflow service. The sync
/// controller only talks to the service through `WorkflowStore`, so tests and
/// embedders can swap the HTTP implementation for their own.

// reqwest-backed implementation of the store contract
pub mod http;

pub use http::HttpWorkflowClient;

use crate::error::StoreError;
use crate::workflow::types::{
    AddEdgeRequest, AddNodeRequest, CreateWorkflowRequest, Edge, Node, NodeDefinition, Resource,
    SetNodeDataRequest, Workflow, WorkflowDetails,
};
use async_trait::async_trait;

/// Remote workflow service contract
///
/// Every call either returns the decoded body or a `StoreError`; non-2xx statuses
/// are errors carrying the status text.
#[async_trait]
pub trait WorkflowStore: Send + Sync + 'static {
    /// GET /workflows/
    async fn list_workflows(&self) -> Result<Vec<Workflow>, StoreError>;

    /// GET /workflows/{id}/
    async fn get_workflow(&self, workflow_id: &str) -> Result<Workflow, StoreError>;

    /// POST /workflows/
    async fn create_workflow(&self, body: &CreateWorkflowRequest) -> Result<Workflow, StoreError>;

    /// DELETE /workflows/{id}?dryRun=bool
    ///
    /// Dry runs return the cascade preview; live runs the deleted entities.
    async fn delete_workflow(&self, workflow_id: &str, dry_run: bool) -> Result<Vec<Resource>, StoreError>;

    /// GET /workflows/{id}/all, partitioned into workflow, nodes and edges
    async fn get_workflow_details(&self, workflow_id: &str) -> Result<WorkflowDetails, StoreError>;

    /// GET /nodes/
    async fn list_node_definitions(&self) -> Result<Vec<NodeDefinition>, StoreError>;

    /// POST /workflows/{id}/nodes/
    async fn add_node(&self, workflow_id: &str, body: &AddNodeRequest) -> Result<Node, StoreError>;

    /// DELETE /workflows/{id}/nodes/{nodeId}
    async fn delete_node(&self, workflow_id: &str, node_id: &str) -> Result<Vec<Resource>, StoreError>;

    /// POST /workflows/{id}/edges
    async fn add_edge(&self, workflow_id: &str, body: &AddEdgeRequest) -> Result<Edge, StoreError>;

    /// DELETE /workflows/{id}/edges/{edgeId}
    async fn delete_edge(&self, workflow_id: &str, edge_id: &str) -> Result<Vec<Resource>, StoreError>;

    /// PUT /workflows/{id}/nodes/ (idempotent whole-array replacement)
    async fn put_nodes(&self, workflow_id: &str, nodes: &[Node]) -> Result<(), StoreError>;

    /// PUT /workflows/{id}/edges/ (idempotent whole-array replacement)
    async fn put_edges(&self, workflow_id: &str, edges: &[Edge]) -> Result<(), StoreError>;

    /// POST /workflows/{id}/nodes/{nodeId}/data
    async fn set_node_data(
        &self,
        workflow_id: &str,
        node_id: &str,
        body: &SetNodeDataRequest,
    ) -> Result<(), StoreError>;
}
