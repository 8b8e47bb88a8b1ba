/// Node detail surface
///
/// Side panel model: one editor block per selected node, with one editor per
/// option slot. Submitting a value goes straight to the service; the panel never
/// writes local state and waits for the re-fetch to show the result.

use crate::client::WorkflowStore;
use crate::error::SyncError;
use crate::selection::Selection;
use crate::sync::SyncController;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::watch;

/// Editor for a single option slot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptionEditor {
    pub key: String,
    /// JSON schema driving the form
    pub schema: Value,
    /// Current value, `Null` when unset
    pub value: Value,
}

/// Editor block for one selected node
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeEditorBlock {
    /// Canvas id of the node
    pub node_id: String,
    pub label: String,
    pub address: String,
    pub version: u32,
    pub editors: Vec<OptionEditor>,
}

/// Blocks for every selected node, in selection order
pub fn editor_blocks(selection: &Selection) -> Vec<NodeEditorBlock> {
    selection
        .nodes
        .iter()
        .map(|node| NodeEditorBlock {
            node_id: node.id.clone(),
            label: node.data.label.clone(),
            address: node.data.address.clone(),
            version: node.data.version,
            editors: node
                .data
                .options()
                .map(|(key, slot)| OptionEditor {
                    key: key.clone(),
                    schema: slot.schema.clone(),
                    value: slot.value.clone(),
                })
                .collect(),
        })
        .collect()
}

/// Detail panel bound to one editing session
pub struct DetailSurface<S: WorkflowStore> {
    controller: Arc<SyncController<S>>,
}

impl<S: WorkflowStore> DetailSurface<S> {
    pub fn new(controller: Arc<SyncController<S>>) -> Self {
        Self { controller }
    }

    /// Blocks for the current selection
    pub fn blocks(&self) -> Vec<NodeEditorBlock> {
        editor_blocks(&self.controller.selection().snapshot())
    }

    /// Selection updates; re-render with `editor_blocks` on every change
    pub fn subscribe(&self) -> watch::Receiver<Arc<Selection>> {
        self.controller.selection().subscribe()
    }

    /// Submit a new value for an option slot of a selected node
    pub async fn submit(&self, node_id: &str, key: &str, value: Value) -> Result<(), SyncError> {
        let selection = self.controller.selection().snapshot();
        let node = selection
            .nodes
            .iter()
            .find(|n| n.id == node_id)
            .ok_or_else(|| SyncError::UnknownNode(node_id.to_string()))?;

        if !node.data.options().any(|(k, _)| k == key) {
            tracing::warn!("⚠️ Slot '{}' on node {} is not an editable option", key, node_id);
            return Err(SyncError::NotEditable {
                node_id: node_id.to_string(),
                key: key.to_string(),
            });
        }

        self.controller.set_node_data(node_id, key, value).await
    }
}
