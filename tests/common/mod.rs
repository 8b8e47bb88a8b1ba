#![allow(dead_code)]

use async_trait::async_trait;
use flowsync::client::WorkflowStore;
use flowsync::config::{ApiConfig, Config, LayoutConfig, SyncConfig};
use flowsync::error::StoreError;
use flowsync::layout::Direction;
use flowsync::workflow::types::{
    AddEdgeRequest, AddNodeRequest, CreateWorkflowRequest, DataSlotItem, DataSlotMap, Edge, Node,
    NodeDefinition, Position, Resource, SetNodeDataRequest, SlotHandle, SlotType, Workflow,
    WorkflowDetails,
};
use flowsync::{SelectionStore, SyncController, WorkflowCache};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const WORKFLOW_ID: &str = "W1";

/// Store calls as observed by the in-memory service
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Details,
    AddNode { address: String, version: u32 },
    DeleteNode(String),
    AddEdge { from: SlotHandle, to: SlotHandle },
    DeleteEdge(String),
    PutNodes(Vec<Node>),
    PutEdges(Vec<Edge>),
    SetNodeData { node_id: String, key: String, slot_type: SlotType, data: Value },
    Other(&'static str),
}

/// In-memory workflow service with a call log and failure switches
pub struct MemoryStore {
    state: Mutex<WorkflowDetails>,
    calls: Mutex<Vec<Call>>,
    fail_details: AtomicBool,
    fail_saves: AtomicBool,
    fail_mutations: AtomicBool,
    put_delay: Mutex<Option<Duration>>,
    next_id: AtomicUsize,
}

impl MemoryStore {
    pub fn new(details: WorkflowDetails) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(details),
            calls: Mutex::new(Vec::new()),
            fail_details: AtomicBool::new(false),
            fail_saves: AtomicBool::new(false),
            fail_mutations: AtomicBool::new(false),
            put_delay: Mutex::new(None),
            next_id: AtomicUsize::new(100),
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    pub fn state(&self) -> WorkflowDetails {
        self.state.lock().unwrap().clone()
    }

    /// Replace the server-side workflow without going through any session
    pub fn set_state(&self, details: WorkflowDetails) {
        *self.state.lock().unwrap() = details;
    }

    pub fn fail_details(&self, fail: bool) {
        self.fail_details.store(fail, Ordering::SeqCst);
    }

    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Make every direct mutation answer 422
    pub fn fail_mutations(&self, fail: bool) {
        self.fail_mutations.store(fail, Ordering::SeqCst);
    }

    pub fn delay_puts(&self, delay: Duration) {
        *self.put_delay.lock().unwrap() = Some(delay);
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn fresh_id(&self, prefix: &str) -> String {
        format!("{}{}", prefix, self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    fn check_mutation(&self) -> Result<(), StoreError> {
        if self.fail_mutations.load(Ordering::SeqCst) {
            return Err(StoreError::Status {
                status: 422,
                status_text: "Unprocessable Entity".into(),
            });
        }
        Ok(())
    }

    async fn maybe_delay(&self) {
        let delay = *self.put_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

fn unavailable() -> StoreError {
    StoreError::Status {
        status: 503,
        status_text: "Service Unavailable".into(),
    }
}

#[async_trait]
impl WorkflowStore for MemoryStore {
    async fn list_workflows(&self) -> Result<Vec<Workflow>, StoreError> {
        self.record(Call::Other("list_workflows"));
        Ok(vec![self.state().workflow])
    }

    async fn get_workflow(&self, _workflow_id: &str) -> Result<Workflow, StoreError> {
        self.record(Call::Other("get_workflow"));
        Ok(self.state().workflow)
    }

    async fn create_workflow(&self, body: &CreateWorkflowRequest) -> Result<Workflow, StoreError> {
        self.record(Call::Other("create_workflow"));
        Ok(Workflow {
            id: self.fresh_id("W"),
            name: body.name.clone(),
            owner: body.owner.clone(),
        })
    }

    async fn delete_workflow(&self, _workflow_id: &str, _dry_run: bool) -> Result<Vec<Resource>, StoreError> {
        self.record(Call::Other("delete_workflow"));
        Ok(Vec::new())
    }

    async fn get_workflow_details(&self, _workflow_id: &str) -> Result<WorkflowDetails, StoreError> {
        self.record(Call::Details);
        if self.fail_details.load(Ordering::SeqCst) {
            return Err(StoreError::Status {
                status: 500,
                status_text: "Internal Server Error".into(),
            });
        }
        Ok(self.state())
    }

    async fn list_node_definitions(&self) -> Result<Vec<NodeDefinition>, StoreError> {
        self.record(Call::Other("list_node_definitions"));
        Ok(Vec::new())
    }

    async fn add_node(&self, workflow_id: &str, body: &AddNodeRequest) -> Result<Node, StoreError> {
        self.record(Call::AddNode {
            address: body.address.clone(),
            version: body.version,
        });
        self.check_mutation()?;
        let id = self.fresh_id("n");
        let mut created = node(&id, &[("in", SlotType::Input), ("out", SlotType::Output)], None);
        created.workflow_id = workflow_id.to_string();
        created.address = body.address.clone();
        created.version = body.version;
        self.state.lock().unwrap().nodes.push(created.clone());
        Ok(created)
    }

    async fn delete_node(&self, _workflow_id: &str, node_id: &str) -> Result<Vec<Resource>, StoreError> {
        self.record(Call::DeleteNode(node_id.to_string()));
        self.check_mutation()?;
        let mut state = self.state.lock().unwrap();
        let removed: Vec<Resource> = state
            .nodes
            .iter()
            .filter(|n| n.node_id == node_id)
            .cloned()
            .map(Resource::Node)
            .collect();
        state.nodes.retain(|n| n.node_id != node_id);
        state
            .edges
            .retain(|e| e.from.node_id != node_id && e.to.node_id != node_id);
        Ok(removed)
    }

    async fn add_edge(&self, workflow_id: &str, body: &AddEdgeRequest) -> Result<Edge, StoreError> {
        self.record(Call::AddEdge {
            from: body.from.clone(),
            to: body.to.clone(),
        });
        self.check_mutation()?;
        let id = self.fresh_id("e");
        let created = Edge {
            id: id.clone(),
            edge_id: id,
            workflow_id: workflow_id.to_string(),
            from: body.from.clone(),
            to: body.to.clone(),
            is_subset: Some(true),
        };
        self.state.lock().unwrap().edges.push(created.clone());
        Ok(created)
    }

    async fn delete_edge(&self, _workflow_id: &str, edge_id: &str) -> Result<Vec<Resource>, StoreError> {
        self.record(Call::DeleteEdge(edge_id.to_string()));
        self.check_mutation()?;
        let mut state = self.state.lock().unwrap();
        let removed: Vec<Resource> = state
            .edges
            .iter()
            .filter(|e| e.edge_id == edge_id)
            .cloned()
            .map(Resource::Edge)
            .collect();
        state.edges.retain(|e| e.edge_id != edge_id);
        Ok(removed)
    }

    async fn put_nodes(&self, _workflow_id: &str, nodes: &[Node]) -> Result<(), StoreError> {
        self.record(Call::PutNodes(nodes.to_vec()));
        self.maybe_delay().await;
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        self.state.lock().unwrap().nodes = nodes.to_vec();
        Ok(())
    }

    async fn put_edges(&self, _workflow_id: &str, edges: &[Edge]) -> Result<(), StoreError> {
        self.record(Call::PutEdges(edges.to_vec()));
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        self.state.lock().unwrap().edges = edges.to_vec();
        Ok(())
    }

    async fn set_node_data(
        &self,
        _workflow_id: &str,
        node_id: &str,
        body: &SetNodeDataRequest,
    ) -> Result<(), StoreError> {
        self.record(Call::SetNodeData {
            node_id: node_id.to_string(),
            key: body.key.clone(),
            slot_type: body.slot_type,
            data: body.data.clone(),
        });
        self.check_mutation()?;
        let mut state = self.state.lock().unwrap();
        if let Some(slot) = state
            .nodes
            .iter_mut()
            .find(|n| n.node_id == node_id)
            .and_then(|n| n.data.get_mut(&body.key))
        {
            slot.value = body.data.clone();
        }
        Ok(())
    }
}

pub fn node(id: &str, slots: &[(&str, SlotType)], display: Option<Position>) -> Node {
    let data: DataSlotMap = slots
        .iter()
        .map(|(key, slot_type)| {
            (
                key.to_string(),
                DataSlotItem {
                    slot_type: *slot_type,
                    schema: json!({"type": "number"}),
                    value: Value::Null,
                },
            )
        })
        .collect();

    Node {
        id: id.to_string(),
        node_id: id.to_string(),
        workflow_id: WORKFLOW_ID.to_string(),
        label: id.to_uppercase(),
        address: format!("builtins.{}", id),
        version: 1,
        group: None,
        sub_group: None,
        data,
        display,
    }
}

/// Node with one input, one `factor` option and one output
pub fn step(id: &str, display: Option<Position>) -> Node {
    node(
        id,
        &[
            ("in", SlotType::Input),
            ("factor", SlotType::Option),
            ("out", SlotType::Output),
        ],
        display,
    )
}

pub fn edge(id: &str, from: &str, to: &str) -> Edge {
    Edge {
        id: id.to_string(),
        edge_id: id.to_string(),
        workflow_id: WORKFLOW_ID.to_string(),
        from: SlotHandle::new(from, "out"),
        to: SlotHandle::new(to, "in"),
        is_subset: Some(true),
    }
}

pub fn details(nodes: Vec<Node>, edges: Vec<Edge>) -> WorkflowDetails {
    WorkflowDetails {
        workflow: Workflow {
            id: WORKFLOW_ID.to_string(),
            name: "pipeline".to_string(),
            owner: "tester".to_string(),
        },
        nodes,
        edges,
    }
}

/// Three-step chain a -> b -> c
pub fn chain(display: [Option<Position>; 3]) -> WorkflowDetails {
    let [da, db, dc] = display;
    details(
        vec![step("a", da), step("b", db), step("c", dc)],
        vec![edge("e1", "a", "b"), edge("e2", "b", "c")],
    )
}

/// Config independent of the environment
pub fn test_config() -> Config {
    Config {
        api: ApiConfig {
            base_url: "http://localhost:0".to_string(),
            request_timeout_ms: 1000,
        },
        sync: SyncConfig {
            save_interval_ms: 2000,
            default_direction: Direction::TopBottom,
        },
        layout: LayoutConfig::default(),
    }
}

pub fn open_with(store: Arc<MemoryStore>, cache: Arc<WorkflowCache>) -> Arc<SyncController<MemoryStore>> {
    SyncController::new(
        WORKFLOW_ID,
        store,
        cache,
        Arc::new(SelectionStore::new()),
        &test_config(),
    )
}

pub fn open(store: Arc<MemoryStore>) -> Arc<SyncController<MemoryStore>> {
    open_with(store, Arc::new(WorkflowCache::new()))
}
