//! Mutable de Bruijn graph store with conjugate pairing.
//!
//! Vertices are (k-1)-mers and edges carry nucleotide sequences of length
//! >= k+1 together with a real coverage value. Every vertex and edge has a
//! conjugate (reverse-complement) twin; mutation always acts on conjugate
//! pairs atomically so that both strands stay consistent. Records live in
//! arena vectors indexed by stable small-integer handles with free lists,
//! and every record carries a monotonically increasing `int_id` that gives
//! iteration a deterministic order.
//!
//! Observers (the smart iterators) register through [`GraphListener`] and
//! are notified of additions after the record exists and of removals while
//! the handles are still valid.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use serde::{Deserialize, Serialize};
use tracing::trace;

use super::sequence::Sequence;

/// Stable handle to a vertex record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VertexId(pub(crate) u32);

/// Stable handle to an edge record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeId(pub(crate) u32);

impl std::fmt::Display for VertexId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "V{}", self.0)
    }
}

impl std::fmt::Display for EdgeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "E{}", self.0)
    }
}

/// Observer interface for graph mutations.
///
/// Additions are reported after the record is fully attached; removals are
/// reported while the handle is still dereferenceable, so listeners may
/// query lengths and ids of the doomed element.
pub trait GraphListener {
    fn vertex_added(&self, _graph: &Graph, _v: VertexId) {}
    fn vertex_removed(&self, _graph: &Graph, _v: VertexId) {}
    fn edge_added(&self, _graph: &Graph, _e: EdgeId) {}
    fn edge_removed(&self, _graph: &Graph, _e: EdgeId) {}
}

#[derive(Debug)]
struct VertexRecord {
    int_id: u64,
    conjugate: VertexId,
    outgoing: Vec<EdgeId>,
    incoming: Vec<EdgeId>,
}

#[derive(Debug)]
struct EdgeRecord {
    int_id: u64,
    source: VertexId,
    target: VertexId,
    conjugate: EdgeId,
    sequence: Sequence,
    coverage: f64,
}

/// Conjugate de Bruijn graph over a fixed k.
pub struct Graph {
    k: usize,
    vertices: Vec<Option<VertexRecord>>,
    edges: Vec<Option<EdgeRecord>>,
    free_vertices: Vec<u32>,
    free_edges: Vec<u32>,
    next_int_id: u64,
    listeners: RefCell<Vec<Weak<dyn GraphListener>>>,
}

impl Graph {
    pub fn new(k: usize) -> Self {
        assert!(k >= 1, "k must be positive");
        Self {
            k,
            vertices: Vec::new(),
            edges: Vec::new(),
            free_vertices: Vec::new(),
            free_edges: Vec::new(),
            next_int_id: 1,
            listeners: RefCell::new(Vec::new()),
        }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    /* ------------------------- record access ------------------------- */

    fn vertex(&self, v: VertexId) -> &VertexRecord {
        self.vertices[v.0 as usize]
            .as_ref()
            .unwrap_or_else(|| panic!("{v} refers to a deleted vertex"))
    }

    fn vertex_mut(&mut self, v: VertexId) -> &mut VertexRecord {
        self.vertices[v.0 as usize]
            .as_mut()
            .unwrap_or_else(|| panic!("{v} refers to a deleted vertex"))
    }

    fn edge(&self, e: EdgeId) -> &EdgeRecord {
        self.edges[e.0 as usize]
            .as_ref()
            .unwrap_or_else(|| panic!("{e} refers to a deleted edge"))
    }

    fn edge_mut(&mut self, e: EdgeId) -> &mut EdgeRecord {
        self.edges[e.0 as usize]
            .as_mut()
            .unwrap_or_else(|| panic!("{e} refers to a deleted edge"))
    }

    pub fn contains_vertex(&self, v: VertexId) -> bool {
        self.vertices
            .get(v.0 as usize)
            .map_or(false, Option::is_some)
    }

    pub fn contains_edge(&self, e: EdgeId) -> bool {
        self.edges.get(e.0 as usize).map_or(false, Option::is_some)
    }

    fn fresh_int_id(&mut self) -> u64 {
        let id = self.next_int_id;
        self.next_int_id += 1;
        id
    }

    fn alloc_vertex(&mut self, record: VertexRecord) -> VertexId {
        match self.free_vertices.pop() {
            Some(ix) => {
                self.vertices[ix as usize] = Some(record);
                VertexId(ix)
            }
            None => {
                self.vertices.push(Some(record));
                VertexId((self.vertices.len() - 1) as u32)
            }
        }
    }

    fn alloc_edge(&mut self, record: EdgeRecord) -> EdgeId {
        match self.free_edges.pop() {
            Some(ix) => {
                self.edges[ix as usize] = Some(record);
                EdgeId(ix)
            }
            None => {
                self.edges.push(Some(record));
                EdgeId((self.edges.len() - 1) as u32)
            }
        }
    }

    /* --------------------------- observers --------------------------- */

    pub(crate) fn register_listener(&self, listener: Weak<dyn GraphListener>) {
        let mut listeners = self.listeners.borrow_mut();
        listeners.retain(|l| l.strong_count() > 0);
        listeners.push(listener);
    }

    fn live_listeners(&self) -> Vec<Rc<dyn GraphListener>> {
        self.listeners
            .borrow()
            .iter()
            .filter_map(Weak::upgrade)
            .collect()
    }

    fn notify_vertex_added(&self, v: VertexId) {
        for l in self.live_listeners() {
            l.vertex_added(self, v);
        }
    }

    fn notify_vertex_removed(&self, v: VertexId) {
        for l in self.live_listeners() {
            l.vertex_removed(self, v);
        }
    }

    fn notify_edge_added(&self, e: EdgeId) {
        for l in self.live_listeners() {
            l.edge_added(self, e);
        }
    }

    fn notify_edge_removed(&self, e: EdgeId) {
        for l in self.live_listeners() {
            l.edge_removed(self, e);
        }
    }

    /* --------------------------- mutation ---------------------------- */

    /// Add a vertex pair, returning one of the two conjugate handles.
    pub fn add_vertex(&mut self) -> VertexId {
        let id_a = self.fresh_int_id();
        let id_b = self.fresh_int_id();
        let a = self.alloc_vertex(VertexRecord {
            int_id: id_a,
            conjugate: VertexId(u32::MAX), // patched below
            outgoing: Vec::new(),
            incoming: Vec::new(),
        });
        let b = self.alloc_vertex(VertexRecord {
            int_id: id_b,
            conjugate: a,
            outgoing: Vec::new(),
            incoming: Vec::new(),
        });
        self.vertex_mut(a).conjugate = b;
        self.notify_vertex_added(a);
        self.notify_vertex_added(b);
        a
    }

    /// Add an edge from `src` to `dst` carrying `sequence`, creating the
    /// conjugate edge atomically. A palindromic sequence between conjugate
    /// endpoints produces a single self-conjugate edge.
    pub fn add_edge(&mut self, src: VertexId, dst: VertexId, sequence: Sequence) -> EdgeId {
        assert!(
            sequence.len() >= self.k + 1,
            "edge sequence must have length >= k+1 (got {} for k={})",
            sequence.len(),
            self.k
        );
        assert!(self.contains_vertex(src) && self.contains_vertex(dst));

        let rc = sequence.revcomp();
        let self_conjugate = rc == sequence && dst == self.conjugate(src);

        let int_id = self.fresh_int_id();
        let e = self.alloc_edge(EdgeRecord {
            int_id,
            source: src,
            target: dst,
            conjugate: EdgeId(u32::MAX), // patched below
            sequence,
            coverage: 0.0,
        });
        self.vertex_mut(src).outgoing.push(e);
        self.vertex_mut(dst).incoming.push(e);

        if self_conjugate {
            self.edge_mut(e).conjugate = e;
            self.notify_edge_added(e);
            return e;
        }

        let conj_src = self.conjugate(dst);
        let conj_dst = self.conjugate(src);
        let conj_int_id = self.fresh_int_id();
        let ec = self.alloc_edge(EdgeRecord {
            int_id: conj_int_id,
            source: conj_src,
            target: conj_dst,
            conjugate: e,
            sequence: rc,
            coverage: 0.0,
        });
        self.edge_mut(e).conjugate = ec;
        self.vertex_mut(conj_src).outgoing.push(ec);
        self.vertex_mut(conj_dst).incoming.push(ec);

        self.notify_edge_added(e);
        self.notify_edge_added(ec);
        e
    }

    /// Delete `e` and its conjugate atomically. A self-conjugate edge is
    /// deleted exactly once.
    pub fn delete_edge(&mut self, e: EdgeId) {
        assert!(self.contains_edge(e), "delete_edge on deleted {e}");
        let conj = self.conjugate_edge(e);

        self.notify_edge_removed(e);
        if conj != e {
            self.notify_edge_removed(conj);
        }

        self.detach_edge(e);
        if conj != e {
            self.detach_edge(conj);
        }
        trace!(edge = %e, conjugate = %conj, "deleted edge pair");
    }

    fn detach_edge(&mut self, e: EdgeId) {
        let (src, dst) = {
            let rec = self.edge(e);
            (rec.source, rec.target)
        };
        self.vertex_mut(src).outgoing.retain(|&x| x != e);
        self.vertex_mut(dst).incoming.retain(|&x| x != e);
        self.edges[e.0 as usize] = None;
        self.free_edges.push(e.0);
    }

    /// Delete an isolated vertex pair. Panics if either twin still has
    /// incident edges; use [`Graph::force_delete_vertex`] for those.
    pub fn delete_vertex(&mut self, v: VertexId) {
        let conj = self.conjugate(v);
        assert!(
            self.in_degree(v) == 0
                && self.out_degree(v) == 0
                && self.in_degree(conj) == 0
                && self.out_degree(conj) == 0,
            "delete_vertex on {v} with incident edges"
        );
        self.notify_vertex_removed(v);
        self.notify_vertex_removed(conj);
        self.vertices[v.0 as usize] = None;
        self.free_vertices.push(v.0);
        self.vertices[conj.0 as usize] = None;
        self.free_vertices.push(conj.0);
    }

    /// Delete a vertex pair together with every incident edge.
    pub fn force_delete_vertex(&mut self, v: VertexId) {
        loop {
            let next = {
                let rec = self.vertex(v);
                rec.outgoing.first().or(rec.incoming.first()).copied()
            };
            match next {
                Some(e) => self.delete_edge(e),
                None => break,
            }
        }
        // Conjugate incident edges were the conjugates of the ones just
        // removed, so both twins are isolated now.
        self.delete_vertex(v);
    }

    /// Set edge coverage, mirrored onto the conjugate.
    pub fn set_coverage(&mut self, e: EdgeId, coverage: f64) {
        assert!(coverage >= 0.0, "coverage must be non-negative");
        let conj = self.conjugate_edge(e);
        self.edge_mut(e).coverage = coverage;
        if conj != e {
            self.edge_mut(conj).coverage = coverage;
        }
    }

    /// Increment edge coverage, mirrored onto the conjugate.
    pub fn inc_coverage(&mut self, e: EdgeId, delta: f64) {
        let new = self.edge(e).coverage + delta;
        self.set_coverage(e, new);
    }

    /* ------------------------- compression --------------------------- */

    /// A vertex is compressible when it sits inside an unbranched chain:
    /// exactly one incoming and one outgoing edge that can be merged
    /// without creating a self-loop and without crossing a palindromic
    /// edge (a palindrome anchors both strands to the same record, so the
    /// two strands would disagree about which vertex survives the merge).
    pub fn can_compress(&self, v: VertexId) -> bool {
        if !self.contains_vertex(v) {
            return false;
        }
        let rec = self.vertex(v);
        if rec.incoming.len() != 1 || rec.outgoing.len() != 1 {
            return false;
        }
        let a = rec.incoming[0];
        let b = rec.outgoing[0];
        if a == b || v == self.conjugate(v) {
            return false;
        }
        if a == self.conjugate_edge(a) || b == self.conjugate_edge(b) {
            return false;
        }
        // Merging must not create a self-loop.
        self.edge_start(a) != self.edge_end(b)
    }

    /// Merge the chain through `v` into a single edge. Returns the merged
    /// edge, or `None` when `v` is not compressible.
    pub fn compress_vertex(&mut self, v: VertexId) -> Option<EdgeId> {
        if !self.can_compress(v) {
            return None;
        }
        let a = self.vertex(v).incoming[0];
        let b = self.vertex(v).outgoing[0];
        let src = self.edge_start(a);
        let dst = self.edge_end(b);

        let (len_a, len_b) = (self.length(a), self.length(b));
        let merged_seq = self.edge(a).sequence.overlap_merge(&self.edge(b).sequence, self.k);
        let merged_cov = (self.coverage(a) * len_a as f64 + self.coverage(b) * len_b as f64)
            / (len_a + len_b) as f64;

        self.delete_edge(a);
        // `b` may have been the conjugate of `a` and died with it.
        if self.contains_edge(b) {
            self.delete_edge(b);
        }
        let merged = self.add_edge(src, dst, merged_seq);
        self.set_coverage(merged, merged_cov);

        // The chain interior and its twin are now isolated.
        self.delete_vertex(v);
        trace!(vertex = %v, merged = %merged, "compressed chain vertex");
        Some(merged)
    }

    /// Compress every compressible vertex currently in the graph.
    pub fn compress_all_vertices(&mut self) -> usize {
        let mut compressed = 0;
        let mut worklist: Vec<VertexId> = self.vertex_ids().collect();
        worklist.sort_by_key(|&v| self.vertex_int_id(v));
        for v in worklist {
            if self.contains_vertex(v) && self.compress_vertex(v).is_some() {
                compressed += 1;
            }
        }
        compressed
    }

    /* --------------------------- queries ----------------------------- */

    pub fn conjugate(&self, v: VertexId) -> VertexId {
        self.vertex(v).conjugate
    }

    pub fn conjugate_edge(&self, e: EdgeId) -> EdgeId {
        self.edge(e).conjugate
    }

    pub fn edge_start(&self, e: EdgeId) -> VertexId {
        self.edge(e).source
    }

    pub fn edge_end(&self, e: EdgeId) -> VertexId {
        self.edge(e).target
    }

    /// Edge length in k-mers (sequence length minus k).
    pub fn length(&self, e: EdgeId) -> usize {
        self.edge(e).sequence.len() - self.k
    }

    pub fn coverage(&self, e: EdgeId) -> f64 {
        self.edge(e).coverage
    }

    pub fn sequence(&self, e: EdgeId) -> &Sequence {
        &self.edge(e).sequence
    }

    pub fn vertex_int_id(&self, v: VertexId) -> u64 {
        self.vertex(v).int_id
    }

    pub fn edge_int_id(&self, e: EdgeId) -> u64 {
        self.edge(e).int_id
    }

    pub fn outgoing_edges(&self, v: VertexId) -> Vec<EdgeId> {
        self.vertex(v).outgoing.clone()
    }

    pub fn incoming_edges(&self, v: VertexId) -> Vec<EdgeId> {
        self.vertex(v).incoming.clone()
    }

    pub fn out_degree(&self, v: VertexId) -> usize {
        self.vertex(v).outgoing.len()
    }

    pub fn in_degree(&self, v: VertexId) -> usize {
        self.vertex(v).incoming.len()
    }

    pub fn is_isolated(&self, v: VertexId) -> bool {
        self.in_degree(v) == 0 && self.out_degree(v) == 0
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.iter().filter(|v| v.is_some()).count()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.iter().filter(|e| e.is_some()).count()
    }

    /// All live vertex handles in arena order.
    pub fn vertex_ids(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.vertices
            .iter()
            .enumerate()
            .filter(|(_, rec)| rec.is_some())
            .map(|(ix, _)| VertexId(ix as u32))
    }

    /// All live edge handles in arena order.
    pub fn edge_ids(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.edges
            .iter()
            .enumerate()
            .filter(|(_, rec)| rec.is_some())
            .map(|(ix, _)| EdgeId(ix as u32))
    }

    /// Check structural invariants; used by tests and debug assertions.
    pub fn check_invariants(&self) {
        for v in self.vertex_ids() {
            assert_eq!(self.conjugate(self.conjugate(v)), v);
            for &e in &self.vertex(v).outgoing {
                assert_eq!(self.edge_start(e), v, "outgoing edge {e} of {v} has wrong source");
            }
            for &e in &self.vertex(v).incoming {
                assert_eq!(self.edge_end(e), v, "incoming edge {e} of {v} has wrong target");
            }
        }
        for e in self.edge_ids() {
            let conj = self.conjugate_edge(e);
            assert_eq!(self.conjugate_edge(conj), e);
            assert_eq!(self.edge_start(conj), self.conjugate(self.edge_end(e)));
            assert_eq!(self.edge_end(conj), self.conjugate(self.edge_start(e)));
            assert_eq!(self.sequence(conj), &self.sequence(e).revcomp());
            assert!(self.length(e) >= 1);
        }
    }
}
