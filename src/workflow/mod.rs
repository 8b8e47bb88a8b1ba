/// Workflow model layer
///
/// This module holds the persisted workflow model and its shared cache:
/// - Type definitions (Workflow, Node, Edge, data slots, request bodies)
/// - Detail cache with invalidation broadcast using ArcSwap

// Core workflow type definitions
pub mod types;

// Shared detail cache and invalidation fan-out
pub mod cache;

// Re-export commonly used types
pub use cache::{Invalidation, WorkflowCache};
pub use types::{
    DataSlotItem, DataSlotMap, Edge, Node, NodeDefinition, Position, Resource, SlotHandle,
    SlotType, Workflow, WorkflowDetails,
};
