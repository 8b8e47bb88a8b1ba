/// Core workflow type definitions
///
/// Defines the persisted shapes served by the workflow service: workflows, node
/// instances with their typed data slots, and edges between slots. Field names on
/// the wire are PascalCase; the Rust side uses snake_case.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A named, owned workflow (the root aggregate)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    /// Unique workflow identifier
    #[serde(rename = "ID")]
    pub id: String,
    /// Human-readable workflow name
    #[serde(rename = "Name")]
    pub name: String,
    /// Owning user
    #[serde(rename = "Owner")]
    pub owner: String,
}

/// Canvas coordinates of a node
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Role of a data slot on a node
///
/// Inputs and outputs are edge-bound; options are edited directly by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotType {
    Input,
    Option,
    Output,
}

/// A single typed value holder on a node
///
/// The schema is an embedded JSON Schema document; validating `value` against it is
/// the form renderer's job, so both stay untyped here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSlotItem {
    #[serde(rename = "Type")]
    pub slot_type: SlotType,
    #[serde(rename = "Schema", default)]
    pub schema: Value,
    #[serde(rename = "Value", default)]
    pub value: Value,
}

/// Slot key -> slot, unique per node. Ordered for stable iteration.
pub type DataSlotMap = BTreeMap<String, DataSlotItem>;

/// A workflow-scoped instance of a node definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Record identifier, also used as the canvas node id
    #[serde(rename = "ID")]
    pub id: String,
    /// Node identifier used in node-scoped endpoint paths
    #[serde(rename = "NodeID")]
    pub node_id: String,
    #[serde(rename = "WorkflowID")]
    pub workflow_id: String,
    #[serde(rename = "Label")]
    pub label: String,
    /// Definition address; together with `version` identifies the definition
    #[serde(rename = "Address")]
    pub address: String,
    #[serde(rename = "Version")]
    pub version: u32,
    #[serde(rename = "Group", default)]
    pub group: Option<String>,
    #[serde(rename = "SubGroup", default)]
    pub sub_group: Option<String>,
    #[serde(rename = "Data", default)]
    pub data: DataSlotMap,
    /// Last known canvas position; absent until a layout pass or a manual move
    #[serde(rename = "Display", default, skip_serializing_if = "Option::is_none")]
    pub display: Option<Position>,
}

impl Node {
    /// Slots of a single role, in key order
    pub fn slots(&self, slot_type: SlotType) -> impl Iterator<Item = (&String, &DataSlotItem)> {
        self.data
            .iter()
            .filter(move |(_, item)| item.slot_type == slot_type)
    }

    pub fn inputs(&self) -> impl Iterator<Item = (&String, &DataSlotItem)> {
        self.slots(SlotType::Input)
    }

    pub fn options(&self) -> impl Iterator<Item = (&String, &DataSlotItem)> {
        self.slots(SlotType::Option)
    }

    pub fn outputs(&self) -> impl Iterator<Item = (&String, &DataSlotItem)> {
        self.slots(SlotType::Output)
    }

    /// Role of the slot under `key`, if the node has one
    pub fn slot_type(&self, key: &str) -> Option<SlotType> {
        self.data.get(key).map(|item| item.slot_type)
    }
}

/// One endpoint of an edge: a slot on a node
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotHandle {
    #[serde(rename = "NodeID")]
    pub node_id: String,
    #[serde(rename = "Key")]
    pub key: String,
}

impl SlotHandle {
    pub fn new(node_id: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            key: key.into(),
        }
    }
}

/// Directed data connection from an output slot to an input slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "EdgeID")]
    pub edge_id: String,
    #[serde(rename = "WorkflowID")]
    pub workflow_id: String,
    #[serde(rename = "From")]
    pub from: SlotHandle,
    #[serde(rename = "To")]
    pub to: SlotHandle,
    /// Server-computed schema compatibility of the two slots.
    /// `Some(false)` marks a connected but type-invalid edge.
    #[serde(rename = "IsSubset", default, skip_serializing_if = "Option::is_none")]
    pub is_subset: Option<bool>,
}

/// Why an edge endpoint cannot legally attach to a slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointProblem {
    UnknownNode(String),
    UnknownSlot(SlotHandle),
    WrongRole { handle: SlotHandle, found: SlotType, expected: SlotType },
}

impl std::fmt::Display for EndpointProblem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EndpointProblem::UnknownNode(id) => write!(f, "unknown node '{}'", id),
            EndpointProblem::UnknownSlot(h) => write!(f, "unknown slot '{}.{}'", h.node_id, h.key),
            EndpointProblem::WrongRole { handle, found, expected } => write!(
                f,
                "slot '{}.{}' is {:?}, expected {:?}",
                handle.node_id, handle.key, found, expected
            ),
        }
    }
}

/// Check that `from` names an output slot and `to` an input slot
///
/// Nodes are looked up by their record id (`Node::id`), which is what the canvas
/// reports as edge source/target.
pub fn check_endpoints(nodes: &[Node], from: &SlotHandle, to: &SlotHandle) -> Vec<EndpointProblem> {
    let mut problems = Vec::new();
    for (handle, expected) in [(from, SlotType::Output), (to, SlotType::Input)] {
        match nodes.iter().find(|n| n.id == handle.node_id) {
            None => problems.push(EndpointProblem::UnknownNode(handle.node_id.clone())),
            Some(node) => match node.slot_type(&handle.key) {
                None => problems.push(EndpointProblem::UnknownSlot(handle.clone())),
                Some(found) if found != expected => problems.push(EndpointProblem::WrongRole {
                    handle: handle.clone(),
                    found,
                    expected,
                }),
                Some(_) => {}
            },
        }
    }
    problems
}

/// Catalog entry describing a reusable processing step (read-only here)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDefinition {
    #[serde(rename = "Label")]
    pub label: String,
    #[serde(rename = "Address")]
    pub address: String,
    #[serde(rename = "Version")]
    pub version: u32,
    #[serde(rename = "Group", default)]
    pub group: Option<String>,
    #[serde(rename = "SubGroup", default)]
    pub sub_group: Option<String>,
    #[serde(rename = "Data", default)]
    pub data: DataSlotMap,
    #[serde(rename = "Description", default)]
    pub description: String,
}

/// One element of a flat, `Resource`-discriminated service response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "Resource")]
pub enum Resource {
    Workflow(Workflow),
    Node(Node),
    Edge(Edge),
    /// Per-slot data records and anything else the service may add
    #[serde(other)]
    Other,
}

/// Composite returned by the detail fetch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDetails {
    pub workflow: Workflow,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl WorkflowDetails {
    /// Partition a flat resource list into workflow, nodes and edges
    ///
    /// Returns `None` when the list carries no workflow record.
    pub fn from_resources(resources: Vec<Resource>) -> Option<Self> {
        let mut workflow = None;
        let mut nodes = Vec::new();
        let mut edges = Vec::new();

        for resource in resources {
            match resource {
                Resource::Workflow(w) => {
                    if workflow.is_none() {
                        workflow = Some(w);
                    }
                }
                Resource::Node(n) => nodes.push(n),
                Resource::Edge(e) => edges.push(e),
                Resource::Other => {}
            }
        }

        workflow.map(|workflow| Self {
            workflow,
            nodes,
            edges,
        })
    }
}

/// Request body for workflow creation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateWorkflowRequest {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Owner")]
    pub owner: String,
}

/// Request body for placing a node definition into a workflow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddNodeRequest {
    #[serde(rename = "Address")]
    pub address: String,
    #[serde(rename = "Version")]
    pub version: u32,
}

/// Request body for connecting two slots
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddEdgeRequest {
    #[serde(rename = "From")]
    pub from: SlotHandle,
    #[serde(rename = "To")]
    pub to: SlotHandle,
}

/// Request body for setting a single data slot value
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetNodeDataRequest {
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "Type")]
    pub slot_type: SlotType,
    #[serde(rename = "Data")]
    pub data: Value,
}
