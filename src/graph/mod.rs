/// Canvas graph layer
///
/// Renderer-facing node and edge shapes. These are always derived from the
/// persisted model through `mapper` and never persisted directly; positions are
/// projected back into `Node::display` before a save.

// Persisted model <-> canvas conversions
pub mod mapper;

// Change batches reported by the canvas and their pure application
pub mod changes;

pub use changes::{apply_edge_changes, apply_node_changes, EdgeChange, NodeChange};
pub use mapper::{to_graph_edges, to_graph_nodes, to_persisted_edge, to_persisted_node};

use crate::workflow::types::{Edge, Node, Position};
use serde::{Deserialize, Serialize};

/// Rendering kind for nodes. There is a single registered node renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NodeKind {
    #[default]
    #[serde(rename = "workflow")]
    Workflow,
}

/// Rendering kind for edges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EdgeKind {
    /// Regular, user-editable connection
    #[default]
    #[serde(rename = "editableEdge")]
    Editable,
    /// Connected but schema-incompatible; drawn in error style
    #[serde(rename = "errorEdge")]
    Error,
}

/// A node as the canvas renders it
///
/// `data` carries the full model node so the renderer can draw one port per
/// input/output slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub position: Position,
    pub data: Node,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<NodeKind>,
    #[serde(default)]
    pub selected: bool,
}

/// An edge as the canvas renders it
///
/// Handles name the slot keys on the source/target nodes. `data` is `None` for
/// edges that only exist locally (never accepted by the service).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(rename = "sourceHandle", default)]
    pub source_handle: Option<String>,
    #[serde(rename = "targetHandle", default)]
    pub target_handle: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<EdgeKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Edge>,
    #[serde(default)]
    pub selected: bool,
}

/// A connection gesture as reported by the canvas; any endpoint may be missing
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Connection {
    pub source: Option<String>,
    pub target: Option<String>,
    #[serde(rename = "sourceHandle")]
    pub source_handle: Option<String>,
    #[serde(rename = "targetHandle")]
    pub target_handle: Option<String>,
}

impl Connection {
    /// Canvas-local edge for this gesture; id follows the canvas convention
    pub fn to_local_edge(&self) -> GraphEdge {
        let source = self.source.clone().unwrap_or_default();
        let target = self.target.clone().unwrap_or_default();
        let id = format!(
            "edge-{}{}-{}{}",
            source,
            self.source_handle.as_deref().unwrap_or_default(),
            target,
            self.target_handle.as_deref().unwrap_or_default()
        );

        GraphEdge {
            id,
            source,
            target,
            source_handle: self.source_handle.clone(),
            target_handle: self.target_handle.clone(),
            kind: Some(EdgeKind::Editable),
            data: None,
            selected: false,
        }
    }
}

/// The in-memory graph of one editing session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EditorGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl EditorGraph {
    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn edge(&self, id: &str) -> Option<&GraphEdge> {
        self.edges.iter().find(|e| e.id == id)
    }

    /// Project every node and persisted edge back to model form
    ///
    /// Local-only edges have nothing to persist and are skipped.
    pub fn to_persisted(&self) -> (Vec<Node>, Vec<Edge>) {
        let nodes = self.nodes.iter().map(to_persisted_node).collect();
        let edges = self.edges.iter().filter_map(to_persisted_edge).collect();
        (nodes, edges)
    }
}
