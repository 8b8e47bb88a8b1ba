/// Synchronization controller for one open workflow
///
/// Owns the in-memory graph of an editing session and the state machine
/// `Loading -> Ready(Clean <-> Dirty <-> Saving)` (or `Failed` when the initial
/// load fails). Local edits apply optimistically and never wait on the network;
/// the full graph is batch-saved after a quiet period; every direct mutation
/// invalidates the cached workflow and re-fetches it.
///
/// There is no optimistic concurrency control: direct mutations and a batch save
/// may be in flight at the same time and the service applies last-write-wins.

use crate::client::WorkflowStore;
use crate::config::{Config, LayoutConfig, SyncConfig};
use crate::error::{StoreError, SyncError};
use crate::graph::{
    apply_edge_changes, apply_node_changes, to_graph_edges, to_graph_nodes, Connection, EdgeChange,
    EditorGraph, NodeChange,
};
use crate::layout::{layout, Direction};
use crate::selection::SelectionStore;
use crate::sync::debounce::Debouncer;
use crate::sync::needs_auto_layout;
use crate::workflow::cache::WorkflowCache;
use crate::workflow::types::{
    check_endpoints, AddEdgeRequest, AddNodeRequest, Edge, Node, Resource, SetNodeDataRequest,
    SlotHandle, SlotType, WorkflowDetails,
};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch, RwLock};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Sub-state of a loaded workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    /// Graph matches the last persisted (or just loaded) state
    Clean,
    /// Local changes since the last save; a save is scheduled
    Dirty,
    /// A batch save is in flight
    Saving,
}

/// Synchronization phase of the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncPhase {
    /// Initial detail fetch in flight; nothing to render yet
    Loading,
    /// Initial detail fetch failed; carries the user-facing message
    Failed(String),
    Ready(ReadyState),
}

impl SyncPhase {
    pub fn is_ready(&self) -> bool {
        matches!(self, SyncPhase::Ready(_))
    }

    pub fn is_saving(&self) -> bool {
        matches!(self, SyncPhase::Ready(ReadyState::Saving))
    }
}

/// Non-blocking notifications for the editor shell
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    Loaded { nodes: usize, edges: usize, auto_layout: bool },
    Refreshed,
    RefreshFailed { message: String },
    Saved { at: DateTime<Utc> },
    SaveFailed { message: String },
    MutationFailed { operation: &'static str, message: String },
    /// An incomplete connection was kept locally and will not be persisted
    LocalOnlyEdge { edge_id: String },
    /// The node arrays were replaced by a layout pass; re-fit the viewport
    FitViewRequested,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    /// Another save is still in flight; nothing was sent
    AlreadySaving,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectOutcome {
    /// The service accepted the edge
    Persisted(Edge),
    /// Endpoints were incomplete; the edge only exists in the local graph
    LocalOnly(String),
}

/// Ids added or removed locally and not yet covered by a successful save, each
/// with the revision that introduced it
#[derive(Debug, Default)]
struct Membership {
    added: HashMap<String, u64>,
    removed: HashMap<String, u64>,
}

impl Membership {
    fn record(&mut self, before: HashSet<&str>, after: HashSet<&str>, revision: u64) {
        for id in before.difference(&after) {
            self.added.remove(*id);
            self.removed.insert(id.to_string(), revision);
        }
        for id in after.difference(&before) {
            self.removed.remove(*id);
            self.added.insert(id.to_string(), revision);
        }
    }

    /// Forget edits the service now has
    fn settle(&mut self, saved: u64) {
        self.added.retain(|_, revision| *revision > saved);
        self.removed.retain(|_, revision| *revision > saved);
    }

    /// Fetched items minus local removals, plus local additions the service lacks
    fn merge<T: Clone>(&self, fetched: Vec<T>, local: &[T], id: impl Fn(&T) -> &str) -> Vec<T> {
        let mut merged: Vec<T> = fetched
            .into_iter()
            .filter(|item| !self.removed.contains_key(id(item)))
            .collect();
        for item in local {
            let item_id = id(item);
            if self.added.contains_key(item_id) && !merged.iter().any(|m| id(m) == item_id) {
                merged.push(item.clone());
            }
        }
        merged
    }
}

#[derive(Debug, Default)]
struct PendingEdits {
    nodes: Membership,
    edges: Membership,
}

/// Result of trying to enter `Saving`
enum SaveGate {
    Started,
    AlreadySaving,
    NotReady,
}

pub struct SyncController<S: WorkflowStore> {
    session_id: Uuid,
    workflow_id: String,
    store: Arc<S>,
    cache: Arc<WorkflowCache>,
    selection: Arc<SelectionStore>,
    sync_config: SyncConfig,
    layout_config: LayoutConfig,
    /// Canvas graph of this session
    graph: RwLock<EditorGraph>,
    /// Bumped on every model-altering local change (under the graph write lock)
    revision: AtomicU64,
    /// Revision captured by the last successful load or save
    persisted_revision: AtomicU64,
    /// Unsaved node/edge membership edits, replayed over re-fetched snapshots
    pending: Mutex<PendingEdits>,
    phase: watch::Sender<SyncPhase>,
    events: broadcast::Sender<SyncEvent>,
    autosave: Mutex<Option<Debouncer>>,
    invalidation_listener: Mutex<Option<JoinHandle<()>>>,
}

impl<S: WorkflowStore> SyncController<S> {
    /// Open a session on `workflow_id`
    ///
    /// Must be called inside a Tokio runtime: the autosave timer and the
    /// invalidation listener run as background tasks. Call `load` next.
    pub fn new(
        workflow_id: impl Into<String>,
        store: Arc<S>,
        cache: Arc<WorkflowCache>,
        selection: Arc<SelectionStore>,
        config: &Config,
    ) -> Arc<Self> {
        let workflow_id = workflow_id.into();
        let session_id = Uuid::new_v4();
        let (phase, _) = watch::channel(SyncPhase::Loading);
        let (events, _) = broadcast::channel(64);

        Arc::new_cyclic(|weak: &Weak<Self>| {
            let autosave = {
                let weak = weak.clone();
                Debouncer::spawn(config.sync.save_interval(), move || {
                    let weak = weak.clone();
                    async move {
                        if let Some(controller) = weak.upgrade() {
                            controller.autosave().await;
                        }
                    }
                })
            };

            let listener = spawn_invalidation_listener(
                weak.clone(),
                cache.subscribe(),
                workflow_id.clone(),
                session_id,
            );

            tracing::info!("🆕 Opened editing session {} for workflow {}", session_id, workflow_id);

            Self {
                session_id,
                workflow_id,
                store,
                cache,
                selection,
                sync_config: config.sync.clone(),
                layout_config: config.layout.clone(),
                graph: RwLock::new(EditorGraph::default()),
                revision: AtomicU64::new(0),
                persisted_revision: AtomicU64::new(0),
                pending: Mutex::new(PendingEdits::default()),
                phase,
                events,
                autosave: Mutex::new(Some(autosave)),
                invalidation_listener: Mutex::new(Some(listener)),
            }
        })
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn workflow_id(&self) -> &str {
        &self.workflow_id
    }

    pub fn selection(&self) -> &Arc<SelectionStore> {
        &self.selection
    }

    pub fn phase(&self) -> SyncPhase {
        self.phase.borrow().clone()
    }

    /// Phase updates, e.g. for a saving indicator
    pub fn subscribe_phase(&self) -> watch::Receiver<SyncPhase> {
        self.phase.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// Snapshot of the current canvas graph
    pub async fn graph(&self) -> EditorGraph {
        self.graph.read().await.clone()
    }

    /// Stop scheduling saves and listening for invalidations
    ///
    /// A pending autosave period is discarded; a save or re-fetch that is already
    /// running is left to finish.
    pub fn close(&self) {
        if let Ok(mut autosave) = self.autosave.lock() {
            autosave.take();
        }
        if let Ok(mut listener) = self.invalidation_listener.lock() {
            if let Some(handle) = listener.take() {
                handle.abort();
            }
        }
        tracing::info!("👋 Closed editing session {} for workflow {}", self.session_id, self.workflow_id);
    }

    /// Install the workflow as the current graph
    ///
    /// Served from the shared cache when another session already holds a valid
    /// snapshot, fetched otherwise. On failure the phase becomes `Failed` and no
    /// graph is installed.
    #[tracing::instrument(skip_all, fields(workflow = %self.workflow_id, session = %self.session_id))]
    pub async fn load(&self) -> Result<(), SyncError> {
        self.phase.send_replace(SyncPhase::Loading);

        let fetched = match self.cache.get(&self.workflow_id) {
            Some(details) => {
                tracing::info!("📦 Loading workflow details from cache");
                Ok(details)
            }
            None => {
                tracing::info!("📥 Loading workflow details");
                self.store
                    .get_workflow_details(&self.workflow_id)
                    .await
                    .map(|details| self.cache.store(details))
            }
        };

        match fetched {
            Ok(details) => {
                if let Ok(mut pending) = self.pending.lock() {
                    *pending = PendingEdits::default();
                }
                let auto_layout = self.install(&details, false).await;

                self.persisted_revision
                    .store(self.revision.load(Ordering::SeqCst), Ordering::SeqCst);
                self.phase.send_replace(SyncPhase::Ready(ReadyState::Clean));

                tracing::info!(
                    "✅ Loaded {} nodes and {} edges (auto layout: {})",
                    details.nodes.len(),
                    details.edges.len(),
                    auto_layout
                );
                self.emit(SyncEvent::Loaded {
                    nodes: details.nodes.len(),
                    edges: details.edges.len(),
                    auto_layout,
                });
                Ok(())
            }
            Err(source) => {
                tracing::error!("❌ Failed to load workflow: {}", source);
                *self.graph.write().await = EditorGraph::default();
                self.phase.send_replace(SyncPhase::Failed(source.user_message()));
                Err(SyncError::Load {
                    workflow_id: self.workflow_id.clone(),
                    source,
                })
            }
        }
    }

    /// Re-fetch after an invalidation; failures are logged and reported, never
    /// propagated, leaving the current graph visible
    #[tracing::instrument(skip_all, fields(workflow = %self.workflow_id, session = %self.session_id))]
    pub async fn refresh(&self) {
        if !self.phase.borrow().is_ready() {
            tracing::debug!("⏭️ Skipping refresh, workflow not loaded");
            return;
        }

        match self.store.get_workflow_details(&self.workflow_id).await {
            Ok(details) => {
                let details = self.cache.store(details);
                self.install(&details, true).await;
                tracing::debug!("🔄 Refreshed workflow graph");
                self.emit(SyncEvent::Refreshed);
            }
            Err(e) => {
                tracing::warn!("⚠️ Background refresh failed, keeping current graph: {}", e);
                self.emit(SyncEvent::RefreshFailed {
                    message: e.user_message(),
                });
            }
        }
    }

    /// Recompute the layout of the in-memory graph (no re-fetch, no save)
    pub async fn relayout(&self, direction: Direction) -> Result<(), SyncError> {
        self.ensure_ready()?;
        {
            let mut graph = self.graph.write().await;
            let nodes = std::mem::take(&mut graph.nodes);
            let edges = std::mem::take(&mut graph.edges);
            let result = layout(nodes, edges, direction, &self.layout_config);
            graph.nodes = result.nodes;
            graph.edges = result.edges;
        }
        tracing::info!("📐 Re-laid out workflow {} ({:?})", self.workflow_id, direction);
        self.emit(SyncEvent::FitViewRequested);
        Ok(())
    }

    /// Apply a node change batch reported by the canvas
    ///
    /// Selection changes update the selection store; moves, adds and removes mark
    /// the graph dirty and (re)start the autosave period.
    pub async fn apply_node_changes(&self, changes: Vec<NodeChange>) -> Result<(), SyncError> {
        self.ensure_ready()?;
        let mut graph = self.graph.write().await;
        let before: Vec<String> = graph.nodes.iter().map(|n| n.id.clone()).collect();
        let previous = std::mem::take(&mut graph.nodes);
        graph.nodes = apply_node_changes(&changes, previous);

        for change in &changes {
            match change {
                NodeChange::Select { id, selected: true } => {
                    if let Some(node) = graph.node(id) {
                        self.selection.add_node_to_selection(node.clone());
                    }
                }
                NodeChange::Select { id, selected: false } | NodeChange::Remove { id } => {
                    self.selection.remove_node_from_selection(id);
                }
                _ => {}
            }
        }

        if changes.iter().any(NodeChange::alters_model) {
            let revision = self.mark_dirty();
            if let Ok(mut pending) = self.pending.lock() {
                pending.nodes.record(
                    before.iter().map(String::as_str).collect(),
                    graph.nodes.iter().map(|n| n.id.as_str()).collect(),
                    revision,
                );
            }
        }
        Ok(())
    }

    /// Apply an edge change batch reported by the canvas
    pub async fn apply_edge_changes(&self, changes: Vec<EdgeChange>) -> Result<(), SyncError> {
        self.ensure_ready()?;
        let mut graph = self.graph.write().await;
        let before: Vec<String> = graph.edges.iter().map(|e| e.id.clone()).collect();
        let previous = std::mem::take(&mut graph.edges);
        graph.edges = apply_edge_changes(&changes, previous);

        for change in &changes {
            match change {
                EdgeChange::Select { id, selected: true } => {
                    if let Some(edge) = graph.edge(id) {
                        self.selection.add_edge_to_selection(edge.clone());
                    }
                }
                EdgeChange::Select { id, selected: false } | EdgeChange::Remove { id } => {
                    self.selection.remove_edge_from_selection(id);
                }
                _ => {}
            }
        }

        if changes.iter().any(EdgeChange::alters_model) {
            let revision = self.mark_dirty();
            if let Ok(mut pending) = self.pending.lock() {
                pending.edges.record(
                    before.iter().map(String::as_str).collect(),
                    graph.edges.iter().map(|e| e.id.as_str()).collect(),
                    revision,
                );
            }
        }
        Ok(())
    }

    /// Handle a user-drawn connection
    ///
    /// Incomplete endpoints fall back to a local-only edge. Complete ones are sent
    /// to the service right away and picked up again by the re-fetch.
    pub async fn connect(&self, connection: Connection) -> Result<ConnectOutcome, SyncError> {
        self.ensure_ready()?;

        let (Some(source), Some(target), Some(source_handle), Some(target_handle)) = (
            connection.source.as_deref(),
            connection.target.as_deref(),
            connection.source_handle.as_deref(),
            connection.target_handle.as_deref(),
        ) else {
            let edge = connection.to_local_edge();
            let edge_id = edge.id.clone();
            tracing::warn!("⚠️ Unprocessable connection, keeping it local only: {:?}", connection);
            {
                let mut graph = self.graph.write().await;
                let previous = std::mem::take(&mut graph.edges);
                graph.edges = apply_edge_changes(&[EdgeChange::Add { item: edge }], previous);
            }
            self.emit(SyncEvent::LocalOnlyEdge { edge_id: edge_id.clone() });
            return Ok(ConnectOutcome::LocalOnly(edge_id));
        };

        let body = AddEdgeRequest {
            from: SlotHandle::new(source, source_handle),
            to: SlotHandle::new(target, target_handle),
        };

        {
            let graph = self.graph.read().await;
            let nodes: Vec<Node> = graph.nodes.iter().map(|n| n.data.clone()).collect();
            for problem in check_endpoints(&nodes, &body.from, &body.to) {
                tracing::warn!("⚠️ Connection endpoint looks wrong ({}); sending anyway", problem);
            }
        }

        tracing::info!(
            "🔗 Adding edge {}.{} → {}.{}",
            source,
            source_handle,
            target,
            target_handle
        );
        let edge = self
            .mutate("add edge", self.store.add_edge(&self.workflow_id, &body))
            .await?;
        Ok(ConnectOutcome::Persisted(edge))
    }

    /// Place a node definition into the workflow
    pub async fn add_node(&self, address: &str, version: u32) -> Result<Node, SyncError> {
        self.ensure_ready()?;
        let body = AddNodeRequest {
            address: address.to_string(),
            version,
        };
        tracing::info!("➕ Adding node {} v{}", address, version);
        self.mutate("add node", self.store.add_node(&self.workflow_id, &body))
            .await
    }

    /// Delete a node (by canvas id) from the workflow
    ///
    /// The returned entity list is advisory and only logged.
    pub async fn delete_node(&self, id: &str) -> Result<Vec<Resource>, SyncError> {
        self.ensure_ready()?;
        let node_id = self
            .graph
            .read()
            .await
            .node(id)
            .map(|n| n.data.node_id.clone())
            .ok_or_else(|| SyncError::UnknownNode(id.to_string()))?;

        tracing::info!("🗑️ Deleting node {}", node_id);
        let affected = self
            .mutate("delete node", self.store.delete_node(&self.workflow_id, &node_id))
            .await?;
        tracing::debug!("🗑️ Delete node {} affected {} entities", node_id, affected.len());
        Ok(affected)
    }

    /// Delete an edge (by canvas id)
    ///
    /// Local-only edges are simply dropped from the local graph.
    pub async fn delete_edge(&self, id: &str) -> Result<Vec<Resource>, SyncError> {
        self.ensure_ready()?;
        let persisted = {
            let mut graph = self.graph.write().await;
            let found = graph
                .edge(id)
                .map(|edge| edge.data.as_ref().map(|data| data.edge_id.clone()));
            match found {
                None => return Ok(Vec::new()),
                Some(Some(edge_id)) => edge_id,
                Some(None) => {
                    let previous = std::mem::take(&mut graph.edges);
                    graph.edges =
                        apply_edge_changes(&[EdgeChange::Remove { id: id.to_string() }], previous);
                    self.selection.remove_edge_from_selection(id);
                    tracing::debug!("🗑️ Dropped local-only edge {}", id);
                    return Ok(Vec::new());
                }
            }
        };

        tracing::info!("🗑️ Deleting edge {}", persisted);
        let affected = self
            .mutate("delete edge", self.store.delete_edge(&self.workflow_id, &persisted))
            .await?;
        tracing::debug!("🗑️ Delete edge {} affected {} entities", persisted, affected.len());
        Ok(affected)
    }

    /// Set the value of an option slot on a node (by canvas id)
    ///
    /// Local state is not touched; the re-fetch brings the new value back.
    pub async fn set_node_data(&self, id: &str, key: &str, value: Value) -> Result<(), SyncError> {
        self.ensure_ready()?;
        let node_id = {
            let graph = self.graph.read().await;
            let node = graph
                .node(id)
                .ok_or_else(|| SyncError::UnknownNode(id.to_string()))?;
            if node.data.slot_type(key) != Some(SlotType::Option) {
                return Err(SyncError::NotEditable {
                    node_id: id.to_string(),
                    key: key.to_string(),
                });
            }
            node.data.node_id.clone()
        };

        let body = SetNodeDataRequest {
            key: key.to_string(),
            slot_type: SlotType::Option,
            data: value,
        };
        tracing::info!("✏️ Setting option '{}' on node {}", key, node_id);
        self.mutate(
            "set node data",
            self.store.set_node_data(&self.workflow_id, &node_id, &body),
        )
        .await
    }

    /// Persist the whole graph now
    ///
    /// Returns `AlreadySaving` without sending anything while another save is in
    /// flight. A failed save keeps local edits and leaves the graph dirty.
    #[tracing::instrument(skip_all, fields(workflow = %self.workflow_id, session = %self.session_id))]
    pub async fn save(&self) -> Result<SaveOutcome, SyncError> {
        match self.enter_saving() {
            SaveGate::NotReady => return Err(SyncError::NotReady(self.workflow_id.clone())),
            SaveGate::AlreadySaving => {
                tracing::debug!("⏳ Save already in flight, skipping");
                return Ok(SaveOutcome::AlreadySaving);
            }
            SaveGate::Started => self.cancel_autosave(),
        }

        let (nodes, edges, snapshot) = {
            let graph = self.graph.read().await;
            let (nodes, edges) = graph.to_persisted();
            (nodes, edges, self.revision.load(Ordering::SeqCst))
        };

        tracing::info!("💾 Saving {} nodes and {} edges", nodes.len(), edges.len());
        let result = self.put_all(&nodes, &edges).await;
        let newer_changes = self.revision.load(Ordering::SeqCst) != snapshot;

        match result {
            Ok(()) => {
                self.persisted_revision.store(snapshot, Ordering::SeqCst);
                if let Ok(mut pending) = self.pending.lock() {
                    pending.nodes.settle(snapshot);
                    pending.edges.settle(snapshot);
                }
                self.leave_saving(if newer_changes {
                    ReadyState::Dirty
                } else {
                    ReadyState::Clean
                });
                if newer_changes {
                    self.touch_autosave();
                }
                tracing::info!("✅ Saved workflow");
                self.emit(SyncEvent::Saved { at: Utc::now() });

                self.cache.invalidate(&self.workflow_id, Some(self.session_id));
                self.refresh().await;
                Ok(SaveOutcome::Saved)
            }
            Err(source) => {
                self.leave_saving(ReadyState::Dirty);
                tracing::warn!("⚠️ Save failed, local edits kept: {}", source);
                self.emit(SyncEvent::SaveFailed {
                    message: source.user_message(),
                });
                Err(SyncError::Save {
                    workflow_id: self.workflow_id.clone(),
                    source,
                })
            }
        }
    }

    /// Debounced save entry point; outcomes are already logged and emitted
    async fn autosave(&self) {
        if self.phase() == SyncPhase::Ready(ReadyState::Clean) {
            tracing::debug!("⏭️ Autosave skipped, nothing unsaved");
            return;
        }
        match self.save().await {
            Ok(SaveOutcome::Saved) => tracing::debug!("💾 Autosave completed"),
            Ok(SaveOutcome::AlreadySaving) => {
                tracing::debug!("⏳ Autosave deferred to the save in flight")
            }
            Err(SyncError::NotReady(_)) => tracing::debug!("⏭️ Autosave skipped, workflow not loaded"),
            Err(e) => tracing::debug!("💾 Autosave failed: {}", e),
        }
    }

    async fn put_all(&self, nodes: &[Node], edges: &[Edge]) -> Result<(), StoreError> {
        self.store.put_nodes(&self.workflow_id, nodes).await?;
        self.store.put_edges(&self.workflow_id, edges).await
    }

    /// Run a direct mutation, then invalidate and re-fetch whatever its outcome
    async fn mutate<T, Fut>(&self, operation: &'static str, call: Fut) -> Result<T, SyncError>
    where
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let result = call.await;

        self.cache.invalidate(&self.workflow_id, Some(self.session_id));
        self.refresh().await;

        result.map_err(|source| {
            tracing::warn!("⚠️ {} failed: {}", operation, source);
            self.emit(SyncEvent::MutationFailed {
                operation,
                message: source.user_message(),
            });
            SyncError::Mutation { operation, source }
        })
    }

    /// Map fetched details to a graph and swap it in; returns whether auto layout ran
    ///
    /// With `keep_unsaved`, local edits made since the last save survive: nodes and
    /// edges removed locally stay removed, ones added locally stay, and moved nodes
    /// keep their local position.
    async fn install(&self, details: &WorkflowDetails, keep_unsaved: bool) -> bool {
        let (mut next, auto_layout) = self.build_graph(details);

        let mut graph = self.graph.write().await;
        let unsaved = self.revision.load(Ordering::SeqCst)
            != self.persisted_revision.load(Ordering::SeqCst);
        if keep_unsaved && unsaved {
            if let Ok(pending) = self.pending.lock() {
                next.nodes = pending.nodes.merge(next.nodes, &graph.nodes, |n| n.id.as_str());
                next.edges = pending.edges.merge(next.edges, &graph.edges, |e| e.id.as_str());
                next.edges.retain(|e| {
                    !pending.nodes.removed.contains_key(&e.source)
                        && !pending.nodes.removed.contains_key(&e.target)
                });
            }
            for node in next.nodes.iter_mut() {
                if let Some(local) = graph.node(&node.id) {
                    node.position = local.position;
                }
            }
            tracing::debug!("🧷 Kept unsaved local edits over the fetched snapshot");
        }

        let selection = self.selection.snapshot();
        for node in next.nodes.iter_mut() {
            node.selected = selection.contains_node(&node.id);
        }
        for edge in next.edges.iter_mut() {
            edge.selected = selection.contains_edge(&edge.id);
        }

        *graph = next;
        self.selection.reconcile(&graph.nodes, &graph.edges);
        auto_layout
    }

    fn build_graph(&self, details: &WorkflowDetails) -> (EditorGraph, bool) {
        let nodes = to_graph_nodes(&details.nodes);
        let edges = to_graph_edges(&details.edges);

        if needs_auto_layout(&details.nodes) {
            tracing::debug!("📐 No node has a display position, running auto layout");
            let result = layout(nodes, edges, self.sync_config.default_direction, &self.layout_config);
            (
                EditorGraph {
                    nodes: result.nodes,
                    edges: result.edges,
                },
                true,
            )
        } else {
            (EditorGraph { nodes, edges }, false)
        }
    }

    /// Record a model-altering change and return its revision; caller holds the
    /// graph write lock
    fn mark_dirty(&self) -> u64 {
        let revision = self.revision.fetch_add(1, Ordering::SeqCst) + 1;
        self.phase.send_if_modified(|phase| {
            if *phase == SyncPhase::Ready(ReadyState::Clean) {
                *phase = SyncPhase::Ready(ReadyState::Dirty);
                true
            } else {
                false
            }
        });
        self.touch_autosave();
        revision
    }

    fn touch_autosave(&self) {
        if let Ok(autosave) = self.autosave.lock() {
            if let Some(debouncer) = autosave.as_ref() {
                debouncer.touch();
            }
        }
    }

    fn cancel_autosave(&self) {
        if let Ok(autosave) = self.autosave.lock() {
            if let Some(debouncer) = autosave.as_ref() {
                debouncer.cancel();
            }
        }
    }

    fn enter_saving(&self) -> SaveGate {
        let mut gate = SaveGate::NotReady;
        self.phase.send_if_modified(|phase| match phase {
            SyncPhase::Ready(ReadyState::Saving) => {
                gate = SaveGate::AlreadySaving;
                false
            }
            SyncPhase::Ready(_) => {
                *phase = SyncPhase::Ready(ReadyState::Saving);
                gate = SaveGate::Started;
                true
            }
            _ => false,
        });
        gate
    }

    /// Settle a save; a reload that replaced the phase meanwhile wins
    fn leave_saving(&self, next: ReadyState) {
        self.phase.send_if_modified(|phase| {
            if phase.is_saving() {
                *phase = SyncPhase::Ready(next);
                true
            } else {
                false
            }
        });
    }

    fn ensure_ready(&self) -> Result<(), SyncError> {
        if self.phase.borrow().is_ready() {
            Ok(())
        } else {
            Err(SyncError::NotReady(self.workflow_id.clone()))
        }
    }

    fn emit(&self, event: SyncEvent) {
        // Nobody listening is fine
        let _ = self.events.send(event);
    }
}

impl<S: WorkflowStore> Drop for SyncController<S> {
    fn drop(&mut self) {
        if let Ok(mut listener) = self.invalidation_listener.lock() {
            if let Some(handle) = listener.take() {
                handle.abort();
            }
        }
    }
}

/// Re-fetch when another session invalidates the same workflow
fn spawn_invalidation_listener<S: WorkflowStore>(
    controller: Weak<SyncController<S>>,
    mut invalidations: broadcast::Receiver<crate::workflow::cache::Invalidation>,
    workflow_id: String,
    session_id: Uuid,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match invalidations.recv().await {
                Ok(note) => {
                    if note.workflow_id != workflow_id || note.origin == Some(session_id) {
                        continue;
                    }
                    let Some(controller) = controller.upgrade() else {
                        break;
                    };
                    tracing::debug!("📨 Workflow {} invalidated elsewhere, refreshing", workflow_id);
                    controller.refresh().await;
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("⚠️ Missed {} invalidations, refreshing to be safe", skipped);
                    match controller.upgrade() {
                        Some(controller) => controller.refresh().await,
                        None => break,
                    }
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}
