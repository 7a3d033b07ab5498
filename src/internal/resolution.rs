//! Resolution depth tracking and object-graph bookkeeping.
//!
//! One `ResolutionState` exists per container hierarchy and lives inside the
//! hierarchy's reentrant lock, so it is only ever touched by the thread that
//! currently owns the lock.

use std::cell::{Cell, RefCell};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::ReentrantMutex;

use crate::error::DiError;
use crate::key::Key;
use crate::registration::Entry;

/// Default guard against runaway recursion.
pub(crate) const DEFAULT_MAX_DEPTH: usize = 200;

static NEXT_GRAPH: AtomicU64 = AtomicU64::new(1);

/// Identifies the object graph built by one top-level resolve call.
///
/// Every nested resolution triggered by that call sees the same identifier,
/// which is how `Graph`-scoped registrations decide whether to reuse an
/// instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectGraphId(u64);

impl ObjectGraphId {
    fn next() -> Self {
        ObjectGraphId(NEXT_GRAPH.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value, useful for log correlation.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

/// Lock shared by a container and all of its ancestors and descendants.
pub(crate) type HierarchyLock = ReentrantMutex<ResolutionState>;

pub(crate) struct ResolutionState {
    depth: Cell<usize>,
    graph: Cell<Option<ObjectGraphId>>,
    touched: RefCell<Vec<Arc<Entry>>>,
    max_depth: usize,
}

impl ResolutionState {
    pub(crate) fn new(max_depth: usize) -> Self {
        Self {
            depth: Cell::new(0),
            graph: Cell::new(None),
            touched: RefCell::new(Vec::new()),
            max_depth,
        }
    }

    pub(crate) fn new_lock(max_depth: usize) -> Arc<HierarchyLock> {
        Arc::new(ReentrantMutex::new(Self::new(max_depth)))
    }

    /// Records a graph-scoped entry so it is notified when the graph completes.
    pub(crate) fn touch(&self, entry: Arc<Entry>) {
        self.touched.borrow_mut().push(entry);
    }

    pub(crate) fn depth(&self) -> usize {
        self.depth.get()
    }

    pub(crate) fn max_depth(&self) -> usize {
        self.max_depth
    }
}

/// Guard for one level of resolution.
///
/// Entering at depth 0 opens a new object graph; dropping the outermost guard
/// (also during unwinding) closes it and notifies every graph-scoped entry
/// that cached an instance in it.
pub(crate) struct DepthGuard<'a> {
    state: &'a ResolutionState,
    graph: ObjectGraphId,
}

impl<'a> DepthGuard<'a> {
    /// # Panics
    ///
    /// Panics with [`DiError::CycleDepthExceeded`] when the hierarchy is
    /// already `max_depth` levels deep.
    pub(crate) fn enter(state: &'a ResolutionState, key: &Key) -> Self {
        let depth = state.depth.get();
        if depth >= state.max_depth {
            let err = DiError::CycleDepthExceeded { depth, key: key.clone() };
            tracing::error!(service = %key, depth, "resolution depth exceeded");
            panic!("{}", err);
        }

        let graph = match state.graph.get() {
            Some(graph) if depth > 0 => graph,
            _ => {
                let graph = ObjectGraphId::next();
                state.graph.set(Some(graph));
                tracing::trace!(graph = graph.0, service = %key, "opened object graph");
                graph
            }
        };
        state.depth.set(depth + 1);

        Self { state, graph }
    }

    pub(crate) fn graph(&self) -> ObjectGraphId {
        self.graph
    }
}

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        let depth = self.state.depth.get().saturating_sub(1);
        self.state.depth.set(depth);
        if depth == 0 {
            let touched = self.state.touched.take();
            for entry in &touched {
                entry.graph_completed();
            }
            self.state.graph.set(None);
            tracing::trace!(graph = self.graph.0, instances = touched.len(), "closed object graph");
        }
    }
}
