/// Synchronization layer
///
/// Binds the remote workflow service to the in-memory editing graph:
/// - Initial load with the all-or-nothing automatic layout decision
/// - Optimistic local edits and explicit connects
/// - Debounced whole-graph batch saves
/// - Invalidation-driven re-fetch after every direct mutation

// Cancel/reset debounce timer used for autosave
pub mod debounce;

// Per-workflow state machine and operations
pub mod controller;

pub use controller::{ConnectOutcome, ReadyState, SaveOutcome, SyncController, SyncEvent, SyncPhase};
pub use debounce::Debouncer;

use crate::workflow::types::Node;

/// Auto-layout runs only when every node lacks a recorded display position
///
/// One manually placed node is enough to keep the whole graph as the user left it.
pub fn needs_auto_layout(nodes: &[Node]) -> bool {
    !nodes.is_empty() && nodes.iter().all(|node| node.display.is_none())
}
