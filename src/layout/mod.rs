/// Layered layout engine
///
/// Assigns canvas positions to nodes with a rank-based (hierarchical) layout:
/// nodes are ranked by longest path from the sources, ranks are separated by a
/// fixed gap, and nodes inside a rank are ordered by the barycenter of their
/// predecessors. A fresh petgraph graph is built on every call, so no state
/// survives between workflows.

use crate::config::LayoutConfig;
use crate::graph::{EdgeKind, GraphEdge, GraphNode, NodeKind};
use crate::workflow::types::Position;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction as EdgeDirection;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

/// Flow direction of the layered layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Ranks stacked top to bottom
    #[serde(rename = "TB")]
    TopBottom,
    /// Ranks laid out left to right
    #[serde(rename = "LR")]
    LeftRight,
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "TB" => Ok(Direction::TopBottom),
            "LR" => Ok(Direction::LeftRight),
            other => Err(format!("unknown layout direction: {}", other)),
        }
    }
}

/// Output of a layout pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayoutResult {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

/// Lay out `nodes` along `direction`
///
/// Returned nodes keep their input order with `position` replaced; edges come back
/// unchanged apart from a default render kind when they have none. Edges whose
/// endpoints are not in `nodes`, and self-loops, do not influence ranking.
pub fn layout(
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
    direction: Direction,
    config: &LayoutConfig,
) -> LayoutResult {
    if nodes.is_empty() {
        return LayoutResult::default();
    }

    let graph = build_graph(&nodes, &edges);
    let ranks = rank_nodes(&graph);
    let slots = order_within_ranks(&graph, &ranks);

    let mut rank_sizes: HashMap<usize, usize> = HashMap::new();
    for rank in &ranks {
        *rank_sizes.entry(*rank).or_default() += 1;
    }

    tracing::debug!(
        "📐 Laid out {} nodes in {} ranks ({:?})",
        nodes.len(),
        rank_sizes.len(),
        direction
    );

    let nodes = nodes
        .into_iter()
        .enumerate()
        .map(|(i, mut node)| {
            let rank = ranks[i];
            let count = rank_sizes.get(&rank).copied().unwrap_or(1);
            node.position = place(rank, slots[i], count, direction, config);
            node.kind.get_or_insert(NodeKind::default());
            node
        })
        .collect();

    let edges = edges
        .into_iter()
        .map(|mut edge| {
            edge.kind.get_or_insert(EdgeKind::default());
            edge
        })
        .collect();

    LayoutResult { nodes, edges }
}

/// Build the scratch graph; node index `i` corresponds to `nodes[i]`
fn build_graph(nodes: &[GraphNode], edges: &[GraphEdge]) -> DiGraph<(), ()> {
    let mut graph = DiGraph::with_capacity(nodes.len(), edges.len());
    let mut index_of: HashMap<&str, NodeIndex> = HashMap::new();

    for node in nodes {
        let idx = graph.add_node(());
        // First occurrence wins on duplicate ids
        index_of.entry(node.id.as_str()).or_insert(idx);
    }

    for edge in edges {
        let (Some(&from), Some(&to)) = (
            index_of.get(edge.source.as_str()),
            index_of.get(edge.target.as_str()),
        ) else {
            continue;
        };
        if from != to {
            graph.add_edge(from, to, ());
        }
    }

    graph
}

/// Longest-path rank of every node
///
/// Strongly connected components are collapsed first, so cycles share a rank
/// instead of making ranking impossible.
fn rank_nodes(graph: &DiGraph<(), ()>) -> Vec<usize> {
    // tarjan_scc yields components in reverse topological order
    let mut components = tarjan_scc(graph);
    components.reverse();

    let mut component_of = vec![0usize; graph.node_count()];
    for (c, members) in components.iter().enumerate() {
        for idx in members {
            component_of[idx.index()] = c;
        }
    }

    let mut component_rank = vec![0usize; components.len()];
    for (c, members) in components.iter().enumerate() {
        let mut rank = 0;
        for &idx in members {
            for pred in graph.neighbors_directed(idx, EdgeDirection::Incoming) {
                let pc = component_of[pred.index()];
                if pc != c {
                    rank = rank.max(component_rank[pc] + 1);
                }
            }
        }
        component_rank[c] = rank;
    }

    (0..graph.node_count())
        .map(|i| component_rank[component_of[i]])
        .collect()
}

/// Position of every node inside its rank
///
/// Rank 0 keeps input order; later ranks sort by the mean slot of their
/// predecessors in earlier ranks, ties broken by input order.
fn order_within_ranks(graph: &DiGraph<(), ()>, ranks: &[usize]) -> Vec<usize> {
    let max_rank = ranks.iter().copied().max().unwrap_or(0);
    let mut slots = vec![0usize; ranks.len()];

    for rank in 0..=max_rank {
        let mut members: Vec<(f64, usize)> = (0..ranks.len())
            .filter(|&i| ranks[i] == rank)
            .map(|i| {
                let preds: Vec<usize> = graph
                    .neighbors_directed(NodeIndex::new(i), EdgeDirection::Incoming)
                    .map(|p| p.index())
                    .filter(|&p| ranks[p] < rank)
                    .collect();
                let key = if preds.is_empty() {
                    i as f64
                } else {
                    preds.iter().map(|&p| slots[p] as f64).sum::<f64>() / preds.len() as f64
                };
                (key, i)
            })
            .collect();

        members.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        for (slot, (_, i)) in members.into_iter().enumerate() {
            slots[i] = slot;
        }
    }

    slots
}

/// Center-aligned coordinates for `slot` of `count` nodes in `rank`
fn place(rank: usize, slot: usize, count: usize, direction: Direction, config: &LayoutConfig) -> Position {
    let offset = slot as f64 - (count as f64 - 1.0) / 2.0;
    match direction {
        Direction::TopBottom => Position::new(
            offset * (config.node_width + config.node_sep),
            rank as f64 * (config.node_height + config.rank_sep),
        ),
        Direction::LeftRight => Position::new(
            rank as f64 * (config.node_width + config.rank_sep),
            offset * (config.node_height + config.node_sep),
        ),
    }
}
