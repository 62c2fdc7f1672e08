//! Bulge removal: collapsing short parallel paths between a vertex pair.
//!
//! A candidate edge is a bulge when some alternative simple path between
//! its endpoints has matching length (within the configured delta window)
//! and carries at least a comparable share of coverage. The lower-coverage
//! side is removed and its coverage mass is re-routed onto the surviving
//! path, so the per-length coverage sum is conserved exactly.

use ahash::AHashSet;
use bio::alignment::distance::levenshtein;
use tracing::{debug, trace};

use crate::graph::iterators::SmartEdgeIterator;
use crate::graph::sequence::Sequence;
use crate::graph::store::{EdgeId, Graph, VertexId};
use crate::simplify::remover::{compress_chain, EdgeRemover};

/// Cap on vertices touched per alternative-path search.
const PATH_SEARCH_NODE_LIMIT: usize = 1_000;

/// Strand-consistency requirement for the alternative path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimilarityCondition {
    /// The path must be internally disjoint from its own conjugate, so
    /// collapsing it keeps both strands consistent.
    SimplePath,
    /// Accept any path; suitable when strands are handled independently.
    Trivial,
}

/// Observational callback invoked with each (edge, path) pair just before
/// the collapse; the return value is ignored for acceptance.
pub type PathFoundCallback<'a> = Box<dyn FnMut(&Graph, EdgeId, &[EdgeId]) + 'a>;

pub struct BulgeRemover<'a> {
    max_length: usize,
    max_coverage: f64,
    max_relative_coverage: f64,
    max_delta: f64,
    max_relative_delta: f64,
    similarity: SimilarityCondition,
    path_found_callback: Option<PathFoundCallback<'a>>,
}

impl<'a> BulgeRemover<'a> {
    pub fn new(
        max_length: usize,
        max_coverage: f64,
        max_relative_coverage: f64,
        max_delta: f64,
        max_relative_delta: f64,
        similarity: SimilarityCondition,
    ) -> Self {
        Self {
            max_length,
            max_coverage,
            max_relative_coverage,
            max_delta,
            max_relative_delta,
            similarity,
            path_found_callback: None,
        }
    }

    pub fn with_path_found_callback(mut self, callback: PathFoundCallback<'a>) -> Self {
        self.path_found_callback = Some(callback);
        self
    }

    /// One pass over the graph in ascending edge-length order. Returns the
    /// number of collapsed bulges.
    pub fn remove_bulges(&mut self, graph: &mut Graph, remover: &mut EdgeRemover) -> usize {
        let mut it = SmartEdgeIterator::new(graph);
        let mut collapsed = 0;
        while let Some(e) = it.next(graph) {
            if graph.length(e) > self.max_length || graph.coverage(e) > self.max_coverage {
                continue;
            }
            if let Some(path) = self.find_alternative_path(graph, e) {
                if let Some(cb) = self.path_found_callback.as_mut() {
                    cb(graph, e, &path);
                }
                self.collapse(graph, remover, e, &path);
                collapsed += 1;
            }
        }
        debug!(collapsed, max_length = self.max_length, "bulge removal finished");
        collapsed
    }

    /// Depth-first search for a simple alternative path between the
    /// endpoints of `e` whose total length falls inside the delta window
    /// and whose weakest edge still carries `coverage(e) / relative` or
    /// more.
    fn find_alternative_path(&self, graph: &Graph, e: EdgeId) -> Option<Vec<EdgeId>> {
        let source = graph.edge_start(e);
        let sink = graph.edge_end(e);
        if source == sink {
            return None;
        }
        let len = graph.length(e) as f64;
        let low = len * (1.0 - self.max_relative_delta) - self.max_delta;
        let high = len * (1.0 + self.max_relative_delta) + self.max_delta;
        let min_coverage = graph.coverage(e) / self.max_relative_coverage;

        let conj = graph.conjugate_edge(e);
        let mut visited_vertices: AHashSet<VertexId> = AHashSet::new();
        visited_vertices.insert(source);
        let mut path: Vec<EdgeId> = Vec::new();
        let mut budget = PATH_SEARCH_NODE_LIMIT;
        self.search(
            graph,
            SearchContext {
                e,
                conj,
                sink,
                low,
                high,
                min_coverage,
            },
            source,
            0,
            &mut path,
            &mut visited_vertices,
            &mut budget,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn search(
        &self,
        graph: &Graph,
        ctx: SearchContext,
        at: VertexId,
        walked: usize,
        path: &mut Vec<EdgeId>,
        visited: &mut AHashSet<VertexId>,
        budget: &mut usize,
    ) -> Option<Vec<EdgeId>> {
        if *budget == 0 {
            return None;
        }
        *budget -= 1;

        let mut hops = graph.outgoing_edges(at);
        hops.sort_by_key(|&alt| graph.edge_int_id(alt));
        for alt in hops {
            if alt == ctx.e || alt == ctx.conj {
                continue;
            }
            if graph.coverage(alt) < ctx.min_coverage {
                continue;
            }
            let next_walked = walked + graph.length(alt);
            if next_walked as f64 > ctx.high {
                continue;
            }
            let next = graph.edge_end(alt);
            path.push(alt);
            if next == ctx.sink {
                if next_walked as f64 >= ctx.low && self.similarity_holds(graph, ctx.e, path) {
                    return Some(path.clone());
                }
            } else if !visited.contains(&next) {
                visited.insert(next);
                if let Some(found) =
                    self.search(graph, ctx, next, next_walked, path, visited, budget)
                {
                    return Some(found);
                }
                visited.remove(&next);
            }
            path.pop();
        }
        None
    }

    fn similarity_holds(&self, graph: &Graph, e: EdgeId, path: &[EdgeId]) -> bool {
        match self.similarity {
            SimilarityCondition::Trivial => true,
            SimilarityCondition::SimplePath => {
                if e == graph.conjugate_edge(e) {
                    return false;
                }
                let mut seen: AHashSet<EdgeId> = AHashSet::new();
                for &q in path {
                    let qc = graph.conjugate_edge(q);
                    if q == qc || seen.contains(&qc) {
                        return false;
                    }
                    seen.insert(q);
                }
                true
            }
        }
    }

    /// Re-route the coverage mass of `e` uniformly over the path (which
    /// conserves mass exactly, since each path edge gains
    /// `cov(e) * len(e) / len(path)` over its own length), then remove `e`.
    fn collapse(&self, graph: &mut Graph, remover: &mut EdgeRemover, e: EdgeId, path: &[EdgeId]) {
        let path_length: usize = path.iter().map(|&q| graph.length(q)).sum();
        let increment = graph.coverage(e) * graph.length(e) as f64 / path_length as f64;
        trace!(edge = %e, path_edges = path.len(), increment, "collapsing bulge");
        for &q in path {
            graph.inc_coverage(q, increment);
        }
        let interior: Vec<VertexId> = path.iter().map(|&q| graph.edge_end(q)).collect();
        remover.remove_edge(graph, e);
        // Interior vertices of the surviving path lost their parallel rival
        // and may now sit on an unbranched chain.
        for v in interior {
            compress_chain(graph, v);
        }
    }
}

/// `k * coefficient`: the default bulge length bound.
pub fn max_bulge_length(k: usize, coefficient: f64) -> usize {
    (k as f64 * coefficient) as usize
}

#[derive(Clone, Copy)]
struct SearchContext {
    e: EdgeId,
    conj: EdgeId,
    sink: VertexId,
    low: f64,
    high: f64,
    min_coverage: f64,
}

/// Logs the edit distance between a collapsed bulge and its replacement
/// path; purely observational.
pub fn edit_distance_tracking_callback<'a>(k: usize) -> PathFoundCallback<'a> {
    Box::new(move |graph: &Graph, e: EdgeId, path: &[EdgeId]| {
        let mut merged: Option<Sequence> = None;
        for &q in path {
            merged = Some(match merged {
                None => graph.sequence(q).clone(),
                Some(acc) => acc.overlap_merge(graph.sequence(q), k),
            });
        }
        if let Some(path_seq) = merged {
            let dist = levenshtein(graph.sequence(e).as_bytes(), path_seq.as_bytes());
            trace!(edge = %e, distance = dist, "bulge sequences aligned");
        }
    })
}
