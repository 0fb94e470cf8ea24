//! Node context injection
//!
//! The exchanger processes one node at a time. Setting the node in
//! thread-local storage lets every span opened while it is being processed
//! carry the node id and the id of the simulation run.

use std::cell::RefCell;

use switchnet_core::NodeId;
use uuid::Uuid;

/// Context stored in thread-local storage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeContextData {
    /// Node currently being processed
    pub node_id: NodeId,
    /// Simulation run the node belongs to
    pub run_id: Uuid,
}

thread_local! {
    static NODE_CONTEXT: RefCell<Option<NodeContextData>> = const { RefCell::new(None) };
}

/// RAII guard for node context
///
/// Sets the node context for the current thread and restores the previous
/// one (if any) when dropped.
///
/// # Example
///
/// ```ignore
/// use switchnet_logging::NodeContextGuard;
///
/// let _guard = NodeContextGuard::new(NodeId(3), run_id);
/// let _span = tracing::debug_span!("node").entered();
/// tracing::debug!("Queue scanned");
/// ```
pub struct NodeContextGuard {
    previous: Option<NodeContextData>,
}

impl NodeContextGuard {
    pub fn new(node_id: NodeId, run_id: Uuid) -> Self {
        let previous = NODE_CONTEXT.with(|ctx| *ctx.borrow());
        NODE_CONTEXT.with(|ctx| *ctx.borrow_mut() = Some(NodeContextData { node_id, run_id }));
        Self { previous }
    }

    /// Get the current node context (if any)
    pub fn current() -> Option<NodeContextData> {
        NODE_CONTEXT.with(|ctx| *ctx.borrow())
    }

    pub fn current_node_id() -> Option<NodeId> {
        Self::current().map(|ctx| ctx.node_id)
    }

    pub fn current_run_id() -> Option<Uuid> {
        Self::current().map(|ctx| ctx.run_id)
    }
}

impl Drop for NodeContextGuard {
    fn drop(&mut self) {
        NODE_CONTEXT.with(|ctx| *ctx.borrow_mut() = self.previous.take());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_context_guard() {
        assert!(NodeContextGuard::current().is_none());

        let run = Uuid::new_v4();
        {
            let _guard = NodeContextGuard::new(NodeId(4), run);
            let ctx = NodeContextGuard::current().unwrap();
            assert_eq!(ctx.node_id, NodeId(4));
            assert_eq!(ctx.run_id, run);
        }

        assert!(NodeContextGuard::current().is_none());
    }

    #[test]
    fn test_nested_contexts() {
        let run = Uuid::new_v4();
        {
            let _outer = NodeContextGuard::new(NodeId(1), run);
            {
                let _inner = NodeContextGuard::new(NodeId(2), run);
                assert_eq!(NodeContextGuard::current_node_id(), Some(NodeId(2)));
            }
            // Restored after the inner guard drops
            assert_eq!(NodeContextGuard::current_node_id(), Some(NodeId(1)));
        }
        assert!(NodeContextGuard::current_node_id().is_none());
    }
}
