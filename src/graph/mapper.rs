/// Pure conversions between the persisted workflow model and canvas graph
///
/// No I/O happens here. Projection back to the model always works on a copy so a
/// save never mutates objects still held by the canvas or the selection store.

use crate::graph::{EdgeKind, GraphEdge, GraphNode, NodeKind};
use crate::workflow::types::{Edge, Node, Position};

/// Column used for nodes that have never been positioned
pub const FALLBACK_X: f64 = 0.0;
/// Vertical step between never-positioned nodes
pub const FALLBACK_ROW_STEP: f64 = 200.0;

/// Stable placement for node `index` before any layout pass
pub fn fallback_position(index: usize) -> Position {
    Position::new(FALLBACK_X, FALLBACK_ROW_STEP * index as f64)
}

/// Convert persisted nodes into canvas nodes
///
/// Nodes without a recorded display position are stacked vertically by index.
pub fn to_graph_nodes(nodes: &[Node]) -> Vec<GraphNode> {
    nodes
        .iter()
        .enumerate()
        .map(|(index, node)| GraphNode {
            id: node.id.clone(),
            position: node.display.unwrap_or_else(|| fallback_position(index)),
            data: node.clone(),
            kind: Some(NodeKind::Workflow),
            selected: false,
        })
        .collect()
}

/// Edge render kind: only an explicit `IsSubset = false` is an error edge
pub fn edge_kind(edge: &Edge) -> EdgeKind {
    match edge.is_subset {
        Some(false) => EdgeKind::Error,
        Some(true) | None => EdgeKind::Editable,
    }
}

/// Convert persisted edges into canvas edges
///
/// Edges pointing at nodes outside the current node set are still emitted; the
/// renderer decides how to draw a dangling endpoint.
pub fn to_graph_edges(edges: &[Edge]) -> Vec<GraphEdge> {
    edges
        .iter()
        .map(|edge| GraphEdge {
            id: edge.id.clone(),
            source: edge.from.node_id.clone(),
            target: edge.to.node_id.clone(),
            source_handle: Some(edge.from.key.clone()),
            target_handle: Some(edge.to.key.clone()),
            kind: Some(edge_kind(edge)),
            data: Some(edge.clone()),
            selected: false,
        })
        .collect()
}

/// Project a canvas node back to its persisted form with `display` set to the
/// canvas position
pub fn to_persisted_node(graph_node: &GraphNode) -> Node {
    let mut node = graph_node.data.clone();
    node.display = Some(graph_node.position);
    node
}

/// Persisted form of a canvas edge; `None` for local-only edges
pub fn to_persisted_edge(graph_edge: &GraphEdge) -> Option<Edge> {
    graph_edge.data.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::types::{DataSlotItem, DataSlotMap, SlotHandle, SlotType};
    use serde_json::json;

    fn node(id: &str, display: Option<Position>) -> Node {
        let mut data = DataSlotMap::new();
        data.insert(
            "threshold".into(),
            DataSlotItem {
                slot_type: SlotType::Option,
                schema: json!({"type": "number"}),
                value: json!(0.5),
            },
        );
        Node {
            id: id.into(),
            node_id: format!("node-{}", id),
            workflow_id: "W1".into(),
            label: id.to_uppercase(),
            address: "builtins.filter".into(),
            version: 2,
            group: Some("transforms".into()),
            sub_group: None,
            data,
            display,
        }
    }

    fn edge(id: &str, from: &str, to: &str, is_subset: Option<bool>) -> Edge {
        Edge {
            id: id.into(),
            edge_id: id.into(),
            workflow_id: "W1".into(),
            from: SlotHandle::new(from, "out"),
            to: SlotHandle::new(to, "in"),
            is_subset,
        }
    }

    #[test]
    fn unpositioned_nodes_get_stacked_fallback() {
        let nodes = vec![
            node("a", None),
            node("b", Some(Position::new(40.0, 40.0))),
            node("c", None),
        ];
        let graph = to_graph_nodes(&nodes);

        assert_eq!(graph[0].position, Position::new(0.0, 0.0));
        assert_eq!(graph[1].position, Position::new(40.0, 40.0));
        assert_eq!(graph[2].position, Position::new(0.0, 400.0));
        assert!(graph.iter().all(|n| n.kind == Some(NodeKind::Workflow)));
        assert_eq!(graph[1].data, nodes[1]);
    }

    #[test]
    fn persisted_node_round_trip_only_replaces_display() {
        let nodes = vec![node("a", None), node("b", Some(Position::new(7.0, 9.0)))];
        let graph = to_graph_nodes(&nodes);

        for (original, graph_node) in nodes.iter().zip(&graph) {
            let back = to_persisted_node(graph_node);
            let mut expected = original.clone();
            expected.display = Some(graph_node.position);
            assert_eq!(back, expected);
        }
    }

    #[test]
    fn projection_does_not_touch_the_canvas_node() {
        let graph = to_graph_nodes(&[node("a", None)]);
        let mut moved = graph[0].clone();
        moved.position = Position::new(5.0, 6.0);

        let persisted = to_persisted_node(&moved);

        assert_eq!(persisted.display, Some(Position::new(5.0, 6.0)));
        assert_eq!(moved.data.display, None);
    }

    #[test]
    fn edge_kind_follows_is_subset() {
        let edges = vec![
            edge("e1", "a", "b", Some(true)),
            edge("e2", "a", "b", None),
            edge("e3", "a", "b", Some(false)),
        ];
        let graph = to_graph_edges(&edges);

        assert_eq!(graph[0].kind, Some(EdgeKind::Editable));
        assert_eq!(graph[1].kind, Some(EdgeKind::Editable));
        assert_eq!(graph[2].kind, Some(EdgeKind::Error));
        assert_eq!(graph[2].source_handle.as_deref(), Some("out"));
        assert_eq!(to_persisted_edge(&graph[2]), Some(edges[2].clone()));
    }

    #[test]
    fn dangling_edges_are_kept() {
        let graph = to_graph_edges(&[edge("e1", "a", "missing", None)]);
        assert_eq!(graph.len(), 1);
        assert_eq!(graph[0].target, "missing");
    }
}
