//! Composable boolean predicates over edges.
//!
//! Every simplification heuristic is phrased as a [`Condition`] handed to a
//! predicate-driven removal loop. Conditions are plain data (a tagged tree
//! of leaves under `And`/`Or`/`Not`), evaluated against the current graph
//! state by a single dispatcher, so composites built by the driver stay
//! inspectable and serializable.

use bio::alignment::distance::levenshtein;
use serde::{Deserialize, Serialize};

use super::store::{EdgeId, Graph, VertexId};

/// Upper bound on vertices touched while searching for an alternative
/// path in [`Condition::AlternativeWithinLevenshtein`].
const ALTERNATIVE_SEARCH_NODE_LIMIT: usize = 1_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Condition {
    AlwaysTrue,
    /// length(e) <= max_length
    LengthUpperBound { max_length: usize },
    /// coverage(e) <= max_coverage
    CoverageUpperBound { max_coverage: f64 },
    /// coverage(e) <= ratio * (max competitor coverage + 1); competitors
    /// are the other edges out of start(e) and into end(e). The +1 keeps
    /// zero-coverage competitors from blocking removal in iterative runs.
    RelativeCoverage { max_relative_coverage: f64 },
    /// One endpoint is a degree-1 dead end and the combined degree at the
    /// anchored side exceeds 2, so a competitor exists.
    TipShape,
    /// One endpoint has no edges on one side; weaker than `TipShape` in
    /// that no competitor is required.
    DeadEndShape,
    /// A longer parallel edge out of the same vertex matches the edge
    /// sequence within `max_diff` mismatches (checked on both strands).
    MismatchTip { max_diff: usize },
    /// The (in- or out-) tip portion of the sequence is dominated by a
    /// single nucleotide beyond `max_fraction` of the window.
    AtContent {
        max_fraction: f64,
        max_length: usize,
        tip_only: bool,
    },
    /// Some alternative path from the same vertex reaches the edge's
    /// length within `max_levenshtein` edits, expanding the frontier at
    /// most `max_iterations` times and never beyond `max_path_length`.
    AlternativeWithinLevenshtein {
        max_levenshtein: usize,
        max_iterations: usize,
        max_path_length: usize,
    },
    And(Vec<Condition>),
    Or(Vec<Condition>),
    Not(Box<Condition>),
}

impl Condition {
    pub fn check(&self, graph: &Graph, e: EdgeId) -> bool {
        match self {
            Condition::AlwaysTrue => true,
            Condition::LengthUpperBound { max_length } => graph.length(e) <= *max_length,
            Condition::CoverageUpperBound { max_coverage } => graph.coverage(e) <= *max_coverage,
            Condition::RelativeCoverage {
                max_relative_coverage,
            } => {
                let max_competitor = max_competitor_coverage(graph, e);
                graph.coverage(e) <= max_relative_coverage * (max_competitor + 1.0)
            }
            Condition::TipShape => check_tip_shape(graph, e),
            Condition::DeadEndShape => check_dead_end_shape(graph, e),
            Condition::MismatchTip { max_diff } => {
                check_mismatch_side(graph, e, *max_diff)
                    || check_mismatch_side(graph, graph.conjugate_edge(e), *max_diff)
            }
            Condition::AtContent {
                max_fraction,
                max_length,
                tip_only,
            } => check_at_content(graph, e, *max_fraction, *max_length, *tip_only),
            Condition::AlternativeWithinLevenshtein {
                max_levenshtein,
                max_iterations,
                max_path_length,
            } => {
                let params = (*max_levenshtein, *max_iterations, *max_path_length);
                check_alternative_side(graph, e, params)
                    || check_alternative_side(graph, graph.conjugate_edge(e), params)
            }
            Condition::And(conds) => conds.iter().all(|c| c.check(graph, e)),
            Condition::Or(conds) => conds.iter().any(|c| c.check(graph, e)),
            Condition::Not(cond) => !cond.check(graph, e),
        }
    }
}

/// `And(TipShape, condition)`.
pub fn tip_of(condition: Condition) -> Condition {
    Condition::And(vec![Condition::TipShape, condition])
}

/// `And(DeadEndShape, condition)`.
pub fn dead_end_of(condition: Condition) -> Condition {
    Condition::And(vec![Condition::DeadEndShape, condition])
}

/// The length/coverage bounds every tip must satisfy before any of the
/// more expensive checks run.
pub fn necessary_tip_condition(max_length: usize, max_coverage: f64) -> Condition {
    tip_of(Condition::And(vec![
        Condition::LengthUpperBound {
            max_length,
        },
        Condition::CoverageUpperBound {
            max_coverage,
        },
    ]))
}

/// Strongest coverage among the edges competing with `e` at either end.
pub(crate) fn max_competitor_coverage(graph: &Graph, e: EdgeId) -> f64 {
    let mut result: f64 = 0.0;
    for alt in graph.outgoing_edges(graph.edge_start(e)) {
        if alt != e {
            result = result.max(graph.coverage(alt));
        }
    }
    for alt in graph.incoming_edges(graph.edge_end(e)) {
        if alt != e {
            result = result.max(graph.coverage(alt));
        }
    }
    result
}

fn is_tip_vertex(graph: &Graph, v: VertexId) -> bool {
    graph.in_degree(v) + graph.out_degree(v) == 1
}

fn check_tip_shape(graph: &Graph, e: EdgeId) -> bool {
    (is_tip_vertex(graph, graph.edge_end(e)) || is_tip_vertex(graph, graph.edge_start(e)))
        && graph.out_degree(graph.edge_start(e)) + graph.in_degree(graph.edge_end(e)) > 2
}

fn is_dead_end(graph: &Graph, v: VertexId) -> bool {
    graph.in_degree(v) * graph.out_degree(v) == 0
}

fn check_dead_end_shape(graph: &Graph, e: EdgeId) -> bool {
    (is_dead_end(graph, graph.edge_end(e)) || is_dead_end(graph, graph.edge_start(e)))
        && graph.out_degree(graph.edge_end(e)) + graph.in_degree(graph.edge_start(e)) >= 1
}

fn check_mismatch_side(graph: &Graph, e: EdgeId, max_diff: usize) -> bool {
    let len = graph.length(e);
    for alt in graph.outgoing_edges(graph.edge_start(e)) {
        if alt != e
            && len < graph.length(alt)
            && graph.sequence(e).hamming(graph.sequence(alt)) <= max_diff
        {
            return true;
        }
    }
    false
}

fn check_at_content(
    graph: &Graph,
    e: EdgeId,
    max_fraction: f64,
    max_length: usize,
    tip_only: bool,
) -> bool {
    if graph.length(e) > max_length {
        return false;
    }
    let mut start = 0;
    let mut end = graph.length(e) + graph.k();
    if tip_only {
        if graph.out_degree(graph.edge_end(e)) == 0 {
            start = graph.k();
        } else if graph.in_degree(graph.edge_start(e)) == 0 {
            end = graph.length(e);
        } else {
            return false;
        }
    }
    if start >= end {
        return false;
    }
    let counts = graph.sequence(e).nucleotide_counts(start, end);
    let dominant = counts.into_iter().max().unwrap_or(0);
    dominant as f64 > (end - start) as f64 * max_fraction
}

fn check_alternative_side(
    graph: &Graph,
    e: EdgeId,
    (max_levenshtein, max_iterations, max_path_length): (usize, usize, usize),
) -> bool {
    let target = graph.sequence(e).as_bytes();
    let conj = graph.conjugate_edge(e);

    let mut frontier: Vec<(VertexId, Vec<u8>, usize)> = Vec::new();
    let mut first_hop = graph.outgoing_edges(graph.edge_start(e));
    first_hop.sort_by_key(|&alt| graph.edge_int_id(alt));
    for alt in first_hop {
        if alt != e && alt != conj {
            frontier.push((
                graph.edge_end(alt),
                graph.sequence(alt).as_bytes().to_vec(),
                graph.length(alt),
            ));
        }
    }

    let mut visited = 0usize;
    for _ in 0..max_iterations {
        if frontier.is_empty() {
            return false;
        }
        let mut next_frontier = Vec::new();
        for (v, seq, path_len) in frontier {
            if seq.len() >= target.len() {
                let prefix = &seq[..target.len()];
                if levenshtein(target, prefix) as usize <= max_levenshtein {
                    return true;
                }
                continue;
            }
            if path_len > max_path_length {
                continue;
            }
            visited += 1;
            if visited > ALTERNATIVE_SEARCH_NODE_LIMIT {
                return false;
            }
            let mut hops = graph.outgoing_edges(v);
            hops.sort_by_key(|&alt| graph.edge_int_id(alt));
            for alt in hops {
                if alt == e || alt == conj {
                    continue;
                }
                let mut extended = seq.clone();
                extended.extend_from_slice(&graph.sequence(alt).as_bytes()[graph.k()..]);
                next_frontier.push((graph.edge_end(alt), extended, path_len + graph.length(alt)));
            }
        }
        frontier = next_frontier;
    }
    false
}
