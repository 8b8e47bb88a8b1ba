/// Shared workflow detail cache with invalidation broadcast
///
/// Holds the last fetched `WorkflowDetails` per workflow id behind an `ArcSwap`, so
/// readers never block writers. A session opening a workflow another session
/// already fetched is served from here. Every direct mutation against the workflow service
/// invalidates the entry for that workflow; invalidations are broadcast so every
/// editing session open on the same workflow can re-fetch. This is the only way the
/// editor observes server-computed changes (pull-based consistency).

use crate::workflow::types::WorkflowDetails;
use arc_swap::ArcSwap;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Notification that a cached workflow is stale
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invalidation {
    pub workflow_id: String,
    /// Session whose mutation caused the invalidation, if any
    pub origin: Option<Uuid>,
}

/// Lock-free detail cache keyed by workflow id
#[derive(Debug)]
pub struct WorkflowCache {
    /// Atomic pointer to the workflow_id -> details map
    entries: ArcSwap<HashMap<String, Arc<WorkflowDetails>>>,
    /// Invalidation fan-out
    invalidations: broadcast::Sender<Invalidation>,
}

impl Default for WorkflowCache {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowCache {
    pub fn new() -> Self {
        let (invalidations, _) = broadcast::channel(64);
        Self {
            entries: ArcSwap::new(Arc::new(HashMap::new())),
            invalidations,
        }
    }

    /// Get cached details (lock-free read)
    pub fn get(&self, workflow_id: &str) -> Option<Arc<WorkflowDetails>> {
        self.entries.load().get(workflow_id).cloned()
    }

    /// Store freshly fetched details, replacing any previous snapshot
    pub fn store(&self, details: WorkflowDetails) -> Arc<WorkflowDetails> {
        let details = Arc::new(details);
        let workflow_id = details.workflow.id.clone();
        let entry = Arc::clone(&details);
        self.entries.rcu(move |current| {
            let mut next = (**current).clone();
            next.insert(workflow_id.clone(), Arc::clone(&entry));
            next
        });
        details
    }

    /// Drop the cached snapshot for a workflow and notify subscribers
    pub fn invalidate(&self, workflow_id: &str, origin: Option<Uuid>) {
        self.entries.rcu(|current| {
            let mut next = (**current).clone();
            next.remove(workflow_id);
            next
        });

        tracing::debug!("🗑️ Invalidated cached workflow: {}", workflow_id);

        // No subscribers is fine: nobody is watching this workflow right now
        let _ = self.invalidations.send(Invalidation {
            workflow_id: workflow_id.to_string(),
            origin,
        });
    }

    /// Subscribe to invalidation notifications for all workflows
    pub fn subscribe(&self) -> broadcast::Receiver<Invalidation> {
        self.invalidations.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::types::Workflow;

    fn details(id: &str) -> WorkflowDetails {
        WorkflowDetails {
            workflow: Workflow {
                id: id.into(),
                name: "wf".into(),
                owner: "me".into(),
            },
            nodes: vec![],
            edges: vec![],
        }
    }

    #[test]
    fn store_then_invalidate() {
        let cache = WorkflowCache::new();
        cache.store(details("W1"));
        cache.store(details("W2"));
        assert!(cache.get("W1").is_some());

        let mut rx = cache.subscribe();
        let origin = Uuid::new_v4();
        cache.invalidate("W1", Some(origin));

        assert!(cache.get("W1").is_none());
        assert!(cache.get("W2").is_some());
        let note = rx.try_recv().unwrap();
        assert_eq!(note.workflow_id, "W1");
        assert_eq!(note.origin, Some(origin));
    }
}
