/// Flowsync: synchronization core for a visual workflow editor
///
/// This library keeps an in-memory node/edge graph consistent with a remote
/// workflow service: optimistic local edits, debounced batch saves, direct
/// single-entity mutations with invalidation-driven re-fetch, and a layered
/// automatic layout for workflows that have never been positioned.

// Core configuration and setup
pub mod config;

// Error taxonomy for transport and synchronization failures
pub mod error;

// Workflow model layer - persisted types and the shared detail cache
pub mod workflow;

// Workflow service client - store contract and its HTTP implementation
pub mod client;

// Canvas graph layer - renderer-facing nodes/edges, mapping and change batches
pub mod graph;

// Layered automatic layout over petgraph
pub mod layout;

// Per-session selection store
pub mod selection;

// Synchronization controller and autosave debounce
pub mod sync;

// Node detail side panel
pub mod detail;

// Re-export commonly used types for external consumers
pub use client::{HttpWorkflowClient, WorkflowStore};
pub use config::Config;
pub use error::{StoreError, SyncError};
pub use graph::{Connection, EditorGraph, GraphEdge, GraphNode};
pub use layout::Direction;
pub use selection::{Selection, SelectionStore};
pub use sync::{SyncController, SyncEvent, SyncPhase};
pub use workflow::{Edge, Node, Workflow, WorkflowCache, WorkflowDetails};
