/// Error taxonomy for the editor core
///
/// Transport failures come out of the store client as `StoreError`; the sync
/// controller wraps them in `SyncError` together with the state-machine failures
/// it owns. Schema mismatches between connected slots are not errors: they arrive
/// as data (`Edge::is_subset == Some(false)`).

use thiserror::Error;

/// Failure talking to the workflow service
#[derive(Debug, Error)]
pub enum StoreError {
    /// Non-2xx response; carries the status text for user-visible messaging
    #[error("{status_text} (HTTP {status})")]
    Status { status: u16, status_text: String },

    /// Connection, timeout or body-decoding failure
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// 2xx response whose body did not have the expected shape
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl StoreError {
    /// Status text to show the user
    pub fn user_message(&self) -> String {
        match self {
            StoreError::Status { status_text, .. } => status_text.clone(),
            other => other.to_string(),
        }
    }
}

/// Failure surfaced by the synchronization controller
#[derive(Debug, Error)]
pub enum SyncError {
    /// The detail fetch failed; no graph was installed
    #[error("failed to load workflow {workflow_id}: {source}")]
    Load {
        workflow_id: String,
        #[source]
        source: StoreError,
    },

    /// Operation requires a loaded graph
    #[error("workflow {0} is not loaded")]
    NotReady(String),

    /// Batch save failed; local edits are kept and the graph stays dirty
    #[error("failed to save workflow {workflow_id}: {source}")]
    Save {
        workflow_id: String,
        #[source]
        source: StoreError,
    },

    /// A direct single-entity mutation failed
    #[error("{operation} failed: {source}")]
    Mutation {
        operation: &'static str,
        #[source]
        source: StoreError,
    },

    /// The node is not part of the current graph or selection
    #[error("node {0} not found")]
    UnknownNode(String),

    /// Only option slots are edited directly
    #[error("slot '{key}' on node {node_id} is not an editable option")]
    NotEditable { node_id: String, key: String },
}
