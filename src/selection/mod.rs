/// Selection store for one editing session
///
/// Holds the current canvas selection (nodes and edges) and publishes every change
/// to subscribers. Built per session and passed around explicitly, so two editors
/// never share a selection by accident. The watch channel is the single source
/// of truth: every update is computed and published under its lock, so the last
/// value a subscriber sees is always the current selection.

use crate::graph::{GraphEdge, GraphNode};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::watch;

/// Snapshot of the selected nodes and edges; ids are unique within each list
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl Selection {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.nodes.iter().any(|n| n.id == id)
    }

    pub fn contains_edge(&self, id: &str) -> bool {
        self.edges.iter().any(|e| e.id == id)
    }

    /// Drop later duplicates, keeping the first entry for every id
    fn dedup(mut self) -> Self {
        let mut seen = HashSet::new();
        self.nodes.retain(|n| seen.insert(n.id.clone()));
        let mut seen = HashSet::new();
        self.edges.retain(|e| seen.insert(e.id.clone()));
        self
    }
}

/// Reactive selection container
#[derive(Debug)]
pub struct SelectionStore {
    changes: watch::Sender<Arc<Selection>>,
}

impl Default for SelectionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionStore {
    pub fn new() -> Self {
        let (changes, _) = watch::channel(Arc::new(Selection::default()));
        Self { changes }
    }

    /// Current selection
    pub fn snapshot(&self) -> Arc<Selection> {
        self.changes.borrow().clone()
    }

    /// Receiver that always yields the latest selection
    pub fn subscribe(&self) -> watch::Receiver<Arc<Selection>> {
        self.changes.subscribe()
    }

    /// Replace the whole selection
    pub fn set_selected(&self, selection: Selection) {
        self.changes.send_replace(Arc::new(selection.dedup()));
    }

    /// Add a node unless one with the same id is already selected
    pub fn add_node_to_selection(&self, node: GraphNode) {
        self.update(|current| {
            if current.contains_node(&node.id) {
                return None;
            }
            let mut next = current.clone();
            next.nodes.push(node.clone());
            Some(next)
        });
    }

    /// Remove a node by id; no-op when it is not selected
    pub fn remove_node_from_selection(&self, node_id: &str) {
        self.update(|current| {
            if !current.contains_node(node_id) {
                return None;
            }
            let mut next = current.clone();
            next.nodes.retain(|n| n.id != node_id);
            Some(next)
        });
    }

    /// Add an edge unless one with the same id is already selected
    pub fn add_edge_to_selection(&self, edge: GraphEdge) {
        self.update(|current| {
            if current.contains_edge(&edge.id) {
                return None;
            }
            let mut next = current.clone();
            next.edges.push(edge.clone());
            Some(next)
        });
    }

    /// Remove an edge by id; no-op when it is not selected
    pub fn remove_edge_from_selection(&self, edge_id: &str) {
        self.update(|current| {
            if !current.contains_edge(edge_id) {
                return None;
            }
            let mut next = current.clone();
            next.edges.retain(|e| e.id != edge_id);
            Some(next)
        });
    }

    /// Swap every selected entry for its counterpart in a freshly installed graph
    ///
    /// Entries whose id no longer exists are dropped.
    pub fn reconcile(&self, nodes: &[GraphNode], edges: &[GraphEdge]) {
        self.update(|current| {
            if current.is_empty() {
                return None;
            }
            let next = Selection {
                nodes: current
                    .nodes
                    .iter()
                    .filter_map(|sel| nodes.iter().find(|n| n.id == sel.id))
                    .map(|n| GraphNode { selected: true, ..n.clone() })
                    .collect(),
                edges: current
                    .edges
                    .iter()
                    .filter_map(|sel| edges.iter().find(|e| e.id == sel.id))
                    .map(|e| GraphEdge { selected: true, ..e.clone() })
                    .collect(),
            };
            (next != *current).then_some(next)
        });
    }

    pub fn clear(&self) {
        self.set_selected(Selection::default());
    }

    /// Compute and publish under the channel lock; `f` returns `None` when
    /// nothing changes, and subscribers are not woken then
    fn update<F>(&self, f: F)
    where
        F: FnOnce(&Selection) -> Option<Selection>,
    {
        self.changes.send_if_modified(|current| match f(&**current) {
            Some(next) => {
                *current = Arc::new(next);
                true
            }
            None => false,
        });
    }
}
