//! End-to-end scenarios for the simplification passes: canonical tip,
//! bulge, and erroneous-connection cases on small hand-built graphs.

use graph_forge::graph::sequence::Sequence;
use graph_forge::graph::store::{EdgeId, Graph};
use graph_forge::simplify::bulge_remover::{BulgeRemover, SimilarityCondition};
use graph_forge::simplify::ec_remover::{
    iterative_coverage_threshold, LowCoverageEdgeRemover,
};
use graph_forge::simplify::remover::{EdgeRemover, RemovalHandler};
use graph_forge::simplify::tip_clipper::{escalated_length_bound, TipClipper};
use std::cell::RefCell;
use std::rc::Rc;

const K: usize = 3;

/// Sequence running from one junction 3-mer to another with filler bytes
/// between, so compressions always find consistent overlaps.
fn span(from: &str, mid: usize, fill: &[u8], to: &str) -> Sequence {
    let mut bytes = from.as_bytes().to_vec();
    bytes.extend((0..mid).map(|i| fill[i % fill.len()]));
    bytes.extend_from_slice(to.as_bytes());
    Sequence::new(&bytes).unwrap()
}

fn coverage_mass(g: &Graph) -> f64 {
    g.edge_ids()
        .map(|e| g.coverage(e) * g.length(e) as f64)
        .sum()
}

/// A ==> B ==> C trunk with a branch B -> D. Junction 3-mer at B: ACG.
fn tip_scenario(branch_cov: f64) -> (Graph, EdgeId) {
    let mut g = Graph::new(K);
    let a = g.add_vertex();
    let b = g.add_vertex();
    let c = g.add_vertex();
    let d = g.add_vertex();
    let ab = g.add_edge(a, b, span("GAT", 197, b"GATC", "ACG"));
    let bc = g.add_edge(b, c, span("ACG", 197, b"CTGA", "TTC"));
    let bd = g.add_edge(b, d, span("ACG", 37, b"TGCA", "AAT"));
    g.set_coverage(ab, 30.0);
    g.set_coverage(bc, 30.0);
    g.set_coverage(bd, branch_cov);
    (g, bd)
}

#[test]
fn simple_tip_is_clipped_and_chain_compresses() {
    let (mut g, tip) = tip_scenario(2.0);
    let clipper = TipClipper::new(100, 5.0, 0.5);
    let mut remover = EdgeRemover::new(false);

    assert_eq!(clipper.clip_tips(&mut g, &mut remover), 1);
    assert!(!g.contains_edge(tip));

    // A single merged edge per strand, length-weighted coverage 30.
    assert_eq!(g.edge_count(), 2);
    let merged = g.edge_ids().next().unwrap();
    assert_eq!(g.length(merged), 400);
    assert!((g.coverage(merged) - 30.0).abs() < 1e-9);
    for v in g.vertex_ids() {
        assert!(!g.can_compress(v));
    }
    g.check_invariants();
}

#[test]
fn well_covered_short_edge_is_not_a_tip() {
    let (mut g, branch) = tip_scenario(30.0);
    let clipper = TipClipper::new(100, 5.0, 0.5);
    let mut remover = EdgeRemover::new(false);

    assert_eq!(clipper.clip_tips(&mut g, &mut remover), 0);
    assert!(g.contains_edge(branch));
    assert_eq!(g.edge_count(), 6);
}

#[test]
fn tip_pass_leaves_no_qualifying_tip_behind() {
    let (mut g, _tip) = tip_scenario(2.0);
    let (max_length, max_coverage, max_relative) = (100, 5.0, 0.5);
    let clipper = TipClipper::new(max_length, max_coverage, max_relative);
    let mut remover = EdgeRemover::new(false);
    clipper.clip_tips(&mut g, &mut remover);

    // Postcondition: every surviving tip-shaped edge violates one bound.
    for e in g.edge_ids() {
        let dead_end = g.in_degree(g.edge_start(e)) + g.out_degree(g.edge_start(e)) == 1
            || g.in_degree(g.edge_end(e)) + g.out_degree(g.edge_end(e)) == 1;
        let has_competitor =
            g.out_degree(g.edge_start(e)) + g.in_degree(g.edge_end(e)) > 2;
        if dead_end && has_competitor {
            assert!(g.length(e) > max_length || g.coverage(e) > max_coverage);
        }
    }
}

/// A -> B directly (length 50) and through X (total length 48).
fn bulge_scenario() -> (Graph, EdgeId) {
    let mut g = Graph::new(K);
    let a = g.add_vertex();
    let b = g.add_vertex();
    let x = g.add_vertex();
    let direct = g.add_edge(a, b, span("ACG", 47, b"ACGT", "TGG")); // length 50
    let ax = g.add_edge(a, x, span("ACG", 21, b"ACCT", "CCA")); // length 24
    let xb = g.add_edge(x, b, span("CCA", 21, b"CTAG", "TGG")); // length 24
    g.set_coverage(direct, 5.0);
    g.set_coverage(ax, 50.0);
    g.set_coverage(xb, 50.0);
    (g, direct)
}

#[test]
fn simple_bulge_collapses_onto_stronger_path() {
    let (mut g, direct) = bulge_scenario();
    let mass_before = coverage_mass(&g);
    let mut br = BulgeRemover::new(60, 10.0, 2.0, 5.0, 0.0, SimilarityCondition::SimplePath);
    let mut remover = EdgeRemover::new(false);

    assert_eq!(br.remove_bulges(&mut g, &mut remover), 1);
    assert!(!g.contains_edge(direct));
    // X compressed away; the rerouted mass is conserved exactly.
    for v in g.vertex_ids() {
        assert!(!g.can_compress(v));
    }
    assert!((coverage_mass(&g) - mass_before).abs() < 1e-6);
    assert_eq!(g.edge_count(), 2);
    let survivor = g.edge_ids().next().unwrap();
    assert_eq!(g.length(survivor), 48);
    g.check_invariants();
}

/// Long trunks bridged by a short weak edge, with side branches keeping
/// the bridge endpoints as branch points.
fn bridge_scenario(bridge_cov: f64) -> (Graph, EdgeId) {
    let mut g = Graph::new(K);
    let a = g.add_vertex();
    let b = g.add_vertex();
    let c = g.add_vertex();
    let d = g.add_vertex();
    let b_alt = g.add_vertex();
    let c_alt = g.add_vertex();
    let l1 = g.add_edge(a, b, span("GAT", 500, b"GATC", "ACG"));
    let l2 = g.add_edge(c, d, span("TGG", 500, b"CTGA", "TTC"));
    let bridge = g.add_edge(b, c, span("ACG", K, b"TCAG", "TGG")); // length k+3
    let b_branch = g.add_edge(b, b_alt, span("ACG", 400, b"AGGT", "CAA"));
    let c_branch = g.add_edge(c_alt, c, span("GTT", 400, b"TCCA", "TGG"));
    g.set_coverage(l1, 40.0);
    g.set_coverage(l2, 40.0);
    g.set_coverage(bridge, bridge_cov);
    g.set_coverage(b_branch, 35.0);
    g.set_coverage(c_branch, 35.0);
    (g, bridge)
}

#[test]
fn iterative_low_coverage_erodes_bridge_once_threshold_reaches_it() {
    let (mut g, bridge) = bridge_scenario(1.0);
    let mut remover = EdgeRemover::new(false);
    let (iterations, c_max) = (10, 5.0);
    let max_length = K + 10;

    let mut removed_at = None;
    for i in 0..iterations {
        let threshold = iterative_coverage_threshold(c_max, i, iterations);
        LowCoverageEdgeRemover::new(max_length, threshold).remove_edges(&mut g, &mut remover);
        if !g.contains_edge(bridge) {
            removed_at = Some((i, threshold));
            break;
        }
    }
    let (iteration, threshold) = removed_at.expect("bridge should fall to the escalation");
    assert!(threshold >= 1.0, "removed before the bar reached its coverage");
    assert!(iteration <= 2, "escalation took too long: iteration {iteration}");
    g.check_invariants();
}

#[test]
fn low_coverage_pass_is_idempotent() {
    let (mut g, _bridge) = bridge_scenario(1.0);
    let mut remover = EdgeRemover::new(false);
    let ec = LowCoverageEdgeRemover::new(K + 10, 5.0);
    assert!(ec.remove_edges(&mut g, &mut remover));
    assert!(!ec.remove_edges(&mut g, &mut remover));
}

#[test]
fn coverage_mass_never_increases_across_passes() {
    let (mut g, _bridge) = bridge_scenario(1.0);
    let mut remover = EdgeRemover::new(false);
    let mut previous = coverage_mass(&g);
    for i in 0..5 {
        let threshold = iterative_coverage_threshold(5.0, i, 5);
        LowCoverageEdgeRemover::new(K + 10, threshold).remove_edges(&mut g, &mut remover);
        let current = coverage_mass(&g);
        assert!(current <= previous + 1e-9);
        previous = current;
    }
}

#[test]
fn palindromic_edge_removal_fires_handler_once() {
    let mut g = Graph::new(K);
    let v = g.add_vertex();
    let p = g.add_edge(v, g.conjugate(v), span("AAC", 0, b"", "GTT"));
    assert_eq!(g.conjugate_edge(p), p);

    let fired: Rc<RefCell<usize>> = Rc::new(RefCell::new(0));
    let sink = fired.clone();
    let handler: RemovalHandler = Rc::new(RefCell::new(move |_g: &Graph, _e: EdgeId| {
        *sink.borrow_mut() += 1;
    }));
    let mut remover = EdgeRemover::new(false).with_handler(handler);
    assert!(remover.remove_edge(&mut g, p));

    assert_eq!(*fired.borrow(), 1);
    assert_eq!(g.edge_count(), 0);
}

/// Trunk with two tips of different lengths hanging off the same vertex.
fn two_tip_scenario() -> (Graph, EdgeId, EdgeId) {
    let mut g = Graph::new(K);
    let a = g.add_vertex();
    let b = g.add_vertex();
    let c = g.add_vertex();
    let t1 = g.add_vertex();
    let t2 = g.add_vertex();
    let ab = g.add_edge(a, b, span("GAT", 500, b"GATC", "ACG"));
    let bc = g.add_edge(b, c, span("ACG", 500, b"CTGA", "TTC"));
    let short_tip = g.add_edge(b, t1, span("ACG", 37, b"TGCA", "AAT")); // length 40
    let long_tip = g.add_edge(b, t2, span("ACG", 77, b"TGAC", "AAG")); // length 80
    g.set_coverage(ab, 30.0);
    g.set_coverage(bc, 30.0);
    g.set_coverage(short_tip, 1.0);
    g.set_coverage(long_tip, 1.0);
    (g, short_tip, long_tip)
}

#[test]
fn escalation_admits_longer_tips_in_later_iterations() {
    let (mut g, short_tip, long_tip) = two_tip_scenario();
    let mut remover = EdgeRemover::new(false);
    let (full_bound, iterations) = (100, 3);

    // Iteration 0: bound 67 admits only the length-40 tip.
    let bound0 = escalated_length_bound(full_bound, 0, iterations);
    assert_eq!(bound0, 67);
    TipClipper::new(bound0, 5.0, 0.5).clip_tips(&mut g, &mut remover);
    assert!(!g.contains_edge(short_tip));
    assert!(g.contains_edge(long_tip));

    // Iteration 1: bound 83 admits the length-80 tip as well.
    let bound1 = escalated_length_bound(full_bound, 1, iterations);
    assert_eq!(bound1, 83);
    TipClipper::new(bound1, 5.0, 0.5).clip_tips(&mut g, &mut remover);
    assert!(!g.contains_edge(long_tip));

    // Iteration 2 runs at the full bound with nothing left to do.
    let bound2 = escalated_length_bound(full_bound, 2, iterations);
    assert_eq!(bound2, full_bound);
    assert_eq!(TipClipper::new(bound2, 5.0, 0.5).clip_tips(&mut g, &mut remover), 0);
    g.check_invariants();
}
