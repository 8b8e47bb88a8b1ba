/// Change batches reported by the canvas and their application
///
/// Application is pure: previous array + batch in, new array out. Nodes and edges
/// are patched independently with the same rules:
/// - a batch containing any `Reset` replaces the array with the reset items
/// - `Remove` drops the entry, `Select` flips its flag, `Position` moves it
/// - `Add` appends, unless an entry with that id already exists

use crate::graph::{GraphEdge, GraphNode};
use crate::workflow::types::Position;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NodeChange {
    /// Drag update; `position` is absent for pure drag-state notifications
    Position {
        id: String,
        #[serde(default)]
        position: Option<Position>,
        #[serde(default)]
        dragging: bool,
    },
    Select { id: String, selected: bool },
    Remove { id: String },
    Add { item: GraphNode },
    Reset { item: GraphNode },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EdgeChange {
    Select { id: String, selected: bool },
    Remove { id: String },
    Add { item: GraphEdge },
    Reset { item: GraphEdge },
}

impl NodeChange {
    pub fn id(&self) -> &str {
        match self {
            NodeChange::Position { id, .. }
            | NodeChange::Select { id, .. }
            | NodeChange::Remove { id } => id,
            NodeChange::Add { item } | NodeChange::Reset { item } => &item.id,
        }
    }

    /// Whether the change alters what gets persisted (structure or position)
    pub fn alters_model(&self) -> bool {
        match self {
            NodeChange::Position { position, .. } => position.is_some(),
            NodeChange::Select { .. } => false,
            NodeChange::Remove { .. } | NodeChange::Add { .. } | NodeChange::Reset { .. } => true,
        }
    }
}

impl EdgeChange {
    pub fn id(&self) -> &str {
        match self {
            EdgeChange::Select { id, .. } | EdgeChange::Remove { id } => id,
            EdgeChange::Add { item } | EdgeChange::Reset { item } => &item.id,
        }
    }

    pub fn alters_model(&self) -> bool {
        !matches!(self, EdgeChange::Select { .. })
    }
}

/// Apply a node change batch to the previous node array
pub fn apply_node_changes(changes: &[NodeChange], nodes: Vec<GraphNode>) -> Vec<GraphNode> {
    let resets: Vec<GraphNode> = changes
        .iter()
        .filter_map(|c| match c {
            NodeChange::Reset { item } => Some(item.clone()),
            _ => None,
        })
        .collect();
    if !resets.is_empty() {
        return resets;
    }

    let mut next: Vec<GraphNode> = nodes
        .into_iter()
        .filter_map(|mut node| {
            for change in changes.iter().filter(|c| c.id() == node.id) {
                match change {
                    NodeChange::Remove { .. } => return None,
                    NodeChange::Select { selected, .. } => node.selected = *selected,
                    NodeChange::Position { position: Some(p), .. } => node.position = *p,
                    NodeChange::Position { position: None, .. }
                    | NodeChange::Add { .. }
                    | NodeChange::Reset { .. } => {}
                }
            }
            Some(node)
        })
        .collect();

    let mut seen: HashSet<String> = next.iter().map(|n| n.id.clone()).collect();
    for change in changes {
        if let NodeChange::Add { item } = change {
            if seen.insert(item.id.clone()) {
                next.push(item.clone());
            }
        }
    }

    next
}

/// Apply an edge change batch to the previous edge array
pub fn apply_edge_changes(changes: &[EdgeChange], edges: Vec<GraphEdge>) -> Vec<GraphEdge> {
    let resets: Vec<GraphEdge> = changes
        .iter()
        .filter_map(|c| match c {
            EdgeChange::Reset { item } => Some(item.clone()),
            _ => None,
        })
        .collect();
    if !resets.is_empty() {
        return resets;
    }

    let mut next: Vec<GraphEdge> = edges
        .into_iter()
        .filter_map(|mut edge| {
            for change in changes.iter().filter(|c| c.id() == edge.id) {
                match change {
                    EdgeChange::Remove { .. } => return None,
                    EdgeChange::Select { selected, .. } => edge.selected = *selected,
                    EdgeChange::Add { .. } | EdgeChange::Reset { .. } => {}
                }
            }
            Some(edge)
        })
        .collect();

    let mut seen: HashSet<String> = next.iter().map(|e| e.id.clone()).collect();
    for change in changes {
        if let EdgeChange::Add { item } = change {
            if seen.insert(item.id.clone()) {
                next.push(item.clone());
            }
        }
    }

    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::mapper::{to_graph_edges, to_graph_nodes};
    use crate::graph::Connection;
    use crate::workflow::types::{Edge, Node, SlotHandle};

    fn nodes(ids: &[&str]) -> Vec<GraphNode> {
        let model: Vec<Node> = ids
            .iter()
            .map(|id| Node {
                id: id.to_string(),
                node_id: id.to_string(),
                workflow_id: "W1".into(),
                label: id.to_string(),
                address: "a".into(),
                version: 1,
                group: None,
                sub_group: None,
                data: Default::default(),
                display: None,
            })
            .collect();
        to_graph_nodes(&model)
    }

    fn edges(pairs: &[(&str, &str, &str)]) -> Vec<GraphEdge> {
        let model: Vec<Edge> = pairs
            .iter()
            .map(|(id, from, to)| Edge {
                id: id.to_string(),
                edge_id: id.to_string(),
                workflow_id: "W1".into(),
                from: SlotHandle::new(*from, "out"),
                to: SlotHandle::new(*to, "in"),
                is_subset: None,
            })
            .collect();
        to_graph_edges(&model)
    }

    #[test]
    fn position_select_and_remove() {
        let changes = vec![
            NodeChange::Position {
                id: "a".into(),
                position: Some(Position::new(10.0, 20.0)),
                dragging: true,
            },
            NodeChange::Select { id: "b".into(), selected: true },
            NodeChange::Remove { id: "c".into() },
        ];

        let next = apply_node_changes(&changes, nodes(&["a", "b", "c"]));

        assert_eq!(next.len(), 2);
        assert_eq!(next[0].position, Position::new(10.0, 20.0));
        assert!(next[1].selected);
        assert!(!next[0].selected);
    }

    #[test]
    fn drag_state_without_position_keeps_node_in_place() {
        let before = nodes(&["a"]);
        let change = NodeChange::Position { id: "a".into(), position: None, dragging: false };
        assert!(!change.alters_model());

        let next = apply_node_changes(&[change], before.clone());
        assert_eq!(next, before);
    }

    #[test]
    fn add_skips_existing_ids_and_reset_replaces() {
        let existing = nodes(&["a", "b"]);
        let extra = nodes(&["b", "z"]);

        let added = apply_node_changes(
            &[
                NodeChange::Add { item: extra[0].clone() },
                NodeChange::Add { item: extra[1].clone() },
            ],
            existing.clone(),
        );
        assert_eq!(
            added.iter().map(|n| n.id.as_str()).collect::<Vec<_>>(),
            vec!["a", "b", "z"]
        );

        let reset = apply_node_changes(
            &[
                NodeChange::Remove { id: "a".into() },
                NodeChange::Reset { item: extra[1].clone() },
            ],
            existing,
        );
        assert_eq!(reset.len(), 1);
        assert_eq!(reset[0].id, "z");
    }

    #[test]
    fn edge_changes_follow_the_same_rules() {
        let local = Connection {
            source: Some("a".into()),
            target: Some("b".into()),
            source_handle: None,
            target_handle: Some("in".into()),
        }
        .to_local_edge();

        let next = apply_edge_changes(
            &[
                EdgeChange::Remove { id: "e1".into() },
                EdgeChange::Select { id: "e2".into(), selected: true },
                EdgeChange::Add { item: local.clone() },
            ],
            edges(&[("e1", "a", "b"), ("e2", "b", "c")]),
        );

        assert_eq!(next.len(), 2);
        assert_eq!(next[0].id, "e2");
        assert!(next[0].selected);
        assert_eq!(next[1], local);
        assert!(next[1].data.is_none());
    }

    #[test]
    fn canvas_change_events_deserialize() {
        let raw = serde_json::json!([
            {"type": "position", "id": "a", "position": {"x": 1.0, "y": 2.0}, "dragging": true},
            {"type": "select", "id": "a", "selected": true},
            {"type": "remove", "id": "b"}
        ]);
        let changes: Vec<NodeChange> = serde_json::from_value(raw).unwrap();
        assert_eq!(changes.len(), 3);
        assert!(changes[0].alters_model());
        assert!(!changes[1].alters_model());
    }
}
