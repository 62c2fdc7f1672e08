//! Tip clipping: removal of short dead-end branches left by read errors.
//!
//! A tip is removed when it satisfies the composite predicate (tip shape,
//! length bound, absolute and relative coverage bounds, and optionally the
//! advanced sequence checks). The driver calls the clipper several times
//! with an escalating length bound so that the shortest artifacts go first
//! and cascading removals cannot eat real structure in one pass.

use tracing::{debug, info};

use crate::graph::conditions::{tip_of, Condition};
use crate::graph::iterators::SmartEdgeIterator;
use crate::graph::store::Graph;
use crate::simplify::remover::EdgeRemover;

/// Mismatch budget for the advanced parallel-edge gate.
const MISMATCH_MAX_DIFF: usize = 3;
/// Fraction of the tip window a single nucleotide must dominate before the
/// advanced checks flag it as a homopolymer artifact.
const AT_DOMINANCE_FRACTION: f64 = 0.8;

/// Extra sequence-level checks enabled by `tc.advanced_checks`.
#[derive(Debug, Clone, Copy)]
pub struct AdvancedTipChecks {
    pub max_iterations: usize,
    pub max_levenshtein: usize,
    pub max_ec_length: usize,
}

pub struct TipClipper {
    max_tip_length: usize,
    max_coverage: f64,
    max_relative_coverage: f64,
    advanced: Option<AdvancedTipChecks>,
}

impl TipClipper {
    pub fn new(max_tip_length: usize, max_coverage: f64, max_relative_coverage: f64) -> Self {
        Self {
            max_tip_length,
            max_coverage,
            max_relative_coverage,
            advanced: None,
        }
    }

    pub fn with_advanced_checks(mut self, checks: AdvancedTipChecks) -> Self {
        self.advanced = Some(checks);
        self
    }

    fn condition(&self) -> Condition {
        let necessary = Condition::And(vec![
            Condition::LengthUpperBound {
                max_length: self.max_tip_length,
            },
            Condition::CoverageUpperBound {
                max_coverage: self.max_coverage,
            },
            Condition::RelativeCoverage {
                max_relative_coverage: self.max_relative_coverage,
            },
        ]);
        let full = match self.advanced {
            None => necessary,
            Some(checks) => Condition::And(vec![
                necessary,
                Condition::Or(vec![
                    Condition::AlternativeWithinLevenshtein {
                        max_levenshtein: checks.max_levenshtein,
                        max_iterations: checks.max_iterations,
                        max_path_length: checks.max_ec_length,
                    },
                    Condition::MismatchTip {
                        max_diff: MISMATCH_MAX_DIFF,
                    },
                    Condition::AtContent {
                        max_fraction: AT_DOMINANCE_FRACTION,
                        max_length: self.max_tip_length,
                        tip_only: true,
                    },
                ]),
            ]),
        };
        tip_of(full)
    }

    /// One full clipping pass in ascending length order. Returns the
    /// number of removed tips.
    pub fn clip_tips(&self, graph: &mut Graph, remover: &mut EdgeRemover) -> usize {
        let condition = self.condition();
        let mut it = SmartEdgeIterator::new(graph);
        let mut removed = 0;
        while let Some(e) = it.next(graph) {
            if condition.check(graph, e) && remover.remove_edge(graph, e) {
                removed += 1;
            }
        }
        debug!(removed, max_tip_length = self.max_tip_length, "tip clipping finished");
        removed
    }
}

/// `min(k, read_length / 2) * coefficient`.
pub fn max_tip_length(read_length: usize, k: usize, coefficient: f64) -> usize {
    (k.min(read_length / 2) as f64 * coefficient) as usize
}

/// Escalated length bound for cycle iteration `i` of `n`: early passes see
/// roughly half the configured bound, the last pass the full bound.
pub fn escalated_length_bound(max_tip_length: usize, iteration: usize, iteration_count: usize) -> usize {
    assert!(
        iteration < iteration_count,
        "escalation iteration {iteration} out of range (count {iteration_count})"
    );
    (max_tip_length as f64 / 2.0 * (1.0 + (iteration + 1) as f64 / iteration_count as f64)).round()
        as usize
}

/// Aggressive clipping ahead of repeat resolution: full length bound,
/// halved relative-coverage bar.
pub fn clip_tips_for_resolver(
    graph: &mut Graph,
    remover: &mut EdgeRemover,
    max_tip_length: usize,
    max_coverage: f64,
    max_relative_coverage: f64,
    advanced: Option<AdvancedTipChecks>,
) -> usize {
    info!("clipping tips for resolver");
    let mut clipper = TipClipper::new(max_tip_length, max_coverage, max_relative_coverage * 0.5);
    if let Some(checks) = advanced {
        clipper = clipper.with_advanced_checks(checks);
    }
    clipper.clip_tips(graph, remover)
}
