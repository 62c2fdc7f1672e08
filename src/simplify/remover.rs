//! Safe edge-removal primitive shared by every simplification pass.
//!
//! Removal always acts on conjugate pairs: handlers fire for both strands
//! while the handles are still valid, then the pair is deleted and every
//! exposed endpoint is compressed (or dropped when fully isolated).

use std::cell::RefCell;
use std::rc::Rc;

use tracing::debug;

use crate::graph::store::{EdgeId, Graph, VertexId};

/// External observer invoked for every removed edge before its handle is
/// invalidated. Handlers run in registration order.
pub type RemovalHandler = Rc<RefCell<dyn FnMut(&Graph, EdgeId)>>;

pub struct EdgeRemover {
    checks_enabled: bool,
    handlers: Vec<RemovalHandler>,
}

impl EdgeRemover {
    pub fn new(checks_enabled: bool) -> Self {
        Self {
            checks_enabled,
            handlers: Vec::new(),
        }
    }

    pub fn add_handler(&mut self, handler: RemovalHandler) {
        self.handlers.push(handler);
    }

    pub fn with_handler(mut self, handler: RemovalHandler) -> Self {
        self.add_handler(handler);
        self
    }

    /// Clone of this remover's handler list under a different safety flag.
    pub fn fork(&self, checks_enabled: bool) -> Self {
        Self {
            checks_enabled,
            handlers: self.handlers.clone(),
        }
    }

    /// Remove `e` and its conjugate. Returns false when the safety check
    /// refused the removal.
    pub fn remove_edge(&mut self, graph: &mut Graph, e: EdgeId) -> bool {
        if self.checks_enabled && self.would_strand_neighbours(graph, e) {
            debug!(edge = %e, "removal refused: edge is the sole connection on both sides");
            return false;
        }
        let conj = graph.conjugate_edge(e);
        for handler in &self.handlers {
            (&mut *handler.borrow_mut())(graph, e);
        }
        if conj != e {
            for handler in &self.handlers {
                (&mut *handler.borrow_mut())(graph, conj);
            }
        }

        let mut exposed: Vec<VertexId> = vec![
            graph.edge_start(e),
            graph.edge_end(e),
            graph.edge_start(conj),
            graph.edge_end(conj),
        ];
        exposed.sort();
        exposed.dedup();

        graph.delete_edge(e);

        for v in exposed {
            if !graph.contains_vertex(v) {
                continue;
            }
            if graph.is_isolated(v) {
                graph.delete_vertex(v);
            } else {
                compress_chain(graph, v);
            }
        }
        true
    }

    /// The edge is the only outgoing edge of its start and the only
    /// incoming edge of its end; removing it would tear the local chain
    /// apart rather than prune a branch.
    fn would_strand_neighbours(&self, graph: &Graph, e: EdgeId) -> bool {
        graph.out_degree(graph.edge_start(e)) == 1 && graph.in_degree(graph.edge_end(e)) == 1
    }
}

/// Compress `v` and keep following merged edges until the whole unbranched
/// chain around it has been zipped into a single edge.
pub fn compress_chain(graph: &mut Graph, v: VertexId) {
    let mut frontier = vec![v];
    while let Some(v) = frontier.pop() {
        if !graph.contains_vertex(v) {
            continue;
        }
        if let Some(merged) = graph.compress_vertex(v) {
            frontier.push(graph.edge_start(merged));
            frontier.push(graph.edge_end(merged));
        }
    }
}

/// Removes single-edge islands shorter than the configured bound.
pub struct IsolatedEdgeRemover {
    min_length: usize,
}

impl IsolatedEdgeRemover {
    pub fn new(min_length: usize) -> Self {
        Self { min_length }
    }

    pub fn remove_isolated_edges(&self, graph: &mut Graph, remover: &mut EdgeRemover) -> usize {
        let candidates: Vec<EdgeId> = graph
            .edge_ids()
            .filter(|&e| self.is_isolated_island(graph, e) && graph.length(e) < self.min_length)
            .collect();
        let mut removed = 0;
        for e in candidates {
            if graph.contains_edge(e) && remover.remove_edge(graph, e) {
                removed += 1;
            }
        }
        if removed > 0 {
            debug!(removed, "isolated edges removed");
        }
        removed
    }

    fn is_isolated_island(&self, graph: &Graph, e: EdgeId) -> bool {
        let start = graph.edge_start(e);
        let end = graph.edge_end(e);
        graph.in_degree(start) == 0
            && graph.out_degree(start) == 1
            && graph.in_degree(end) == 1
            && graph.out_degree(end) == 0
    }
}
