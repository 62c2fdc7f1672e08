//! Simplification driver: pre-, cyclic, and post-simplification phases.
//!
//! The driver owns nothing but orchestration. It validates the
//! configuration, resolves the coverage threshold, then runs tip clipping,
//! bulge removal and erroneous-connection removal against the shared graph
//! with escalating bounds until the final fixed-point phase, writing the
//! measured average coverage back into the dataset descriptor when done.

use anyhow::Result;
use tracing::{debug, info};

use crate::graph::stats::{average_coverage, find_coverage_threshold};
use crate::graph::store::Graph;
use crate::simplify::bulge_remover::{max_bulge_length, BulgeRemover, SimilarityCondition};
use crate::simplify::ec_remover::{
    iterate_to_fixed_point, iterative_coverage_threshold, max_erroneous_connection_length,
    AdvancedTopologyChimericEdgeRemover, ChimericEdgesRemover, LowCoverageEdgeRemover,
    MaxFlowChimericEdgeRemover, PairInfoAwareErroneousEdgeRemover, PairedInfoIndex, ThornRemover,
    TopologyBasedChimericEdgeRemover, TopologyReliabilityChimericEdgeRemover,
};
use crate::simplify::remover::{EdgeRemover, IsolatedEdgeRemover, RemovalHandler};
use crate::simplify::tip_clipper::{
    escalated_length_bound, max_tip_length, AdvancedTipChecks, TipClipper,
};
use crate::utils::configuration::{DatasetInfo, SimplificationConfig, SimplificationMode};

/// Length bound of the simple length-only chimeric mode.
const CHIMERIC_MODE_LENGTH: usize = 10;

/// Named checkpoints at which the info printer fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Checkpoint {
    BeforeSimplification,
    TipClipping,
    BulgeRemoval,
    ErrConRemoval,
    BeforeFinalErrConRemoval,
    FinalErrConRemoval,
    FinalTipClipping,
    FinalBulgeRemoval,
    RemovingIsolatedEdges,
    FinalSimplified,
}

impl Checkpoint {
    pub fn tag(&self) -> &'static str {
        match self {
            Checkpoint::BeforeSimplification => "before_simplification",
            Checkpoint::TipClipping => "tip_clipping",
            Checkpoint::BulgeRemoval => "bulge_removal",
            Checkpoint::ErrConRemoval => "err_con_removal",
            Checkpoint::BeforeFinalErrConRemoval => "before_final_err_con_removal",
            Checkpoint::FinalErrConRemoval => "final_err_con_removal",
            Checkpoint::FinalTipClipping => "final_tip_clipping",
            Checkpoint::FinalBulgeRemoval => "final_bulge_removal",
            Checkpoint::RemovingIsolatedEdges => "removing_isolated_edges",
            Checkpoint::FinalSimplified => "final_simplified",
        }
    }
}

/// Hooks into the surrounding pipeline. All optional; the driver composes
/// the tip projector into the removal handler chain for tip passes only.
#[derive(Default)]
pub struct SimplifyCallbacks<'a> {
    /// Fired per removed edge before its handle is invalidated.
    pub removal_handler: Option<RemovalHandler>,
    /// Extra handler for clipped tips (read-correction projection).
    pub tip_projector: Option<RemovalHandler>,
    /// External gap closer, invoked inside the cycle and after the final
    /// bulge removal.
    pub gap_closer: Option<Box<dyn FnMut(&mut Graph) + 'a>>,
    /// Observational stage printer: (checkpoint, iteration suffix).
    pub info_printer: Option<Box<dyn FnMut(Checkpoint, &str) + 'a>>,
    /// Paired-read evidence enabling the pair-info removal pass.
    pub paired_info: Option<&'a dyn PairedInfoIndex>,
}

/// Run the full simplification over `graph` in place.
pub fn simplify_graph(
    graph: &mut Graph,
    dataset: &mut DatasetInfo,
    config: &SimplificationConfig,
    callbacks: SimplifyCallbacks<'_>,
) -> Result<()> {
    config.validate()?;
    info!("graph simplification started");

    let mut edge_remover = EdgeRemover::new(config.removal_checks_enabled);
    if let Some(handler) = callbacks.removal_handler {
        edge_remover.add_handler(handler);
    }
    let mut tip_remover = edge_remover.fork(config.removal_checks_enabled);
    if let Some(projector) = callbacks.tip_projector {
        tip_remover.add_handler(projector);
    }

    let mut driver = Driver {
        config,
        read_length: dataset.read_length,
        insert_size: dataset.insert_size,
        printer: callbacks.info_printer,
        gap_closer: callbacks.gap_closer,
        paired_info: callbacks.paired_info,
    };
    driver.print(Checkpoint::BeforeSimplification, "");

    let max_coverage = driver.resolve_coverage_threshold(graph);

    if dataset.single_cell {
        driver.pre_simplification(graph, &mut edge_remover, &mut tip_remover);
    }

    let iteration_count = config.cycle_iter_count;
    for iteration in 0..iteration_count {
        driver.close_gaps(graph);
        driver.simplification_cycle(
            graph,
            &mut edge_remover,
            &mut tip_remover,
            iteration_count,
            iteration,
            max_coverage,
        );
    }

    driver.post_simplification(graph, &mut edge_remover, &mut tip_remover);

    let avg = average_coverage(graph);
    dataset.avg_coverage = Some(avg);
    info!(average_coverage = avg, "graph simplification finished");
    Ok(())
}

struct Driver<'a> {
    config: &'a SimplificationConfig,
    read_length: usize,
    insert_size: f64,
    printer: Option<Box<dyn FnMut(Checkpoint, &str) + 'a>>,
    gap_closer: Option<Box<dyn FnMut(&mut Graph) + 'a>>,
    paired_info: Option<&'a dyn PairedInfoIndex>,
}

impl<'a> Driver<'a> {
    fn print(&mut self, checkpoint: Checkpoint, suffix: &str) {
        if let Some(printer) = self.printer.as_mut() {
            printer(checkpoint, suffix);
        }
    }

    fn close_gaps(&mut self, graph: &mut Graph) {
        if let Some(closer) = self.gap_closer.as_mut() {
            closer(graph);
        }
    }

    fn resolve_coverage_threshold(&self, graph: &Graph) -> f64 {
        if self.config.ec.estimate_max_coverage {
            find_coverage_threshold(graph, self.config.ec.coverage_percentile)
        } else {
            info!(
                max_coverage = self.config.ec.max_coverage,
                "using manual erroneous connection coverage threshold"
            );
            self.config.ec.max_coverage
        }
    }

    fn clip_tips(
        &self,
        graph: &mut Graph,
        remover: &mut EdgeRemover,
        iteration_count: usize,
        iteration: usize,
    ) {
        let tc = &self.config.tc;
        let full_bound = max_tip_length(self.read_length, graph.k(), tc.max_tip_length_coefficient);
        let bound = escalated_length_bound(full_bound, iteration, iteration_count);
        let mut clipper = TipClipper::new(bound, tc.max_coverage, tc.max_relative_coverage);
        if tc.advanced_checks {
            clipper = clipper.with_advanced_checks(AdvancedTipChecks {
                max_iterations: tc.max_iterations,
                max_levenshtein: tc.max_levenshtein,
                max_ec_length: tc.max_ec_length,
            });
        }
        clipper.clip_tips(graph, remover);
    }

    fn remove_bulges(
        &self,
        graph: &mut Graph,
        remover: &mut EdgeRemover,
        additional_length_bound: Option<usize>,
    ) {
        let br = &self.config.br;
        let mut max_length = max_bulge_length(graph.k(), br.max_bulge_length_coefficient);
        if let Some(extra) = additional_length_bound {
            if extra < max_length {
                max_length = extra;
            }
        }
        BulgeRemover::new(
            max_length,
            br.max_coverage,
            br.max_relative_coverage,
            br.max_delta,
            br.max_relative_delta,
            SimilarityCondition::SimplePath,
        )
        .remove_bulges(graph, remover);
    }

    fn remove_low_coverage_edges(
        &self,
        graph: &mut Graph,
        remover: &mut EdgeRemover,
        iteration_count: usize,
        iteration: usize,
        max_coverage: f64,
    ) {
        let max_length = max_erroneous_connection_length(
            graph.k(),
            self.config.ec.max_ec_length_coefficient,
        );
        let threshold = iterative_coverage_threshold(max_coverage, iteration, iteration_count);
        LowCoverageEdgeRemover::new(max_length, threshold).remove_edges(graph, remover);
        IsolatedEdgeRemover::new(self.config.isolated_min_len)
            .remove_isolated_edges(graph, remover);
    }

    /// Early cleanup for single-cell data: one unescalated tip pass and a
    /// bulge pass limited to near-minimal length.
    fn pre_simplification(
        &mut self,
        graph: &mut Graph,
        edge_remover: &mut EdgeRemover,
        tip_remover: &mut EdgeRemover,
    ) {
        info!("early tip clipping");
        self.clip_tips(graph, tip_remover, 1, 0);
        info!("early bulge removal");
        let bound = graph.k() + 1;
        self.remove_bulges(graph, edge_remover, Some(bound));
    }

    fn simplification_cycle(
        &mut self,
        graph: &mut Graph,
        edge_remover: &mut EdgeRemover,
        tip_remover: &mut EdgeRemover,
        iteration_count: usize,
        iteration: usize,
        max_coverage: f64,
    ) {
        info!(iteration, "simplification cycle iteration");
        let suffix = format!("_{iteration}");

        debug!(iteration, "tip clipping");
        self.clip_tips(graph, tip_remover, iteration_count, iteration);
        self.print(Checkpoint::TipClipping, &suffix);

        debug!(iteration, "bulge removal");
        self.remove_bulges(graph, edge_remover, None);
        self.print(Checkpoint::BulgeRemoval, &suffix);

        debug!(iteration, "erroneous connection removal");
        self.remove_low_coverage_edges(graph, edge_remover, iteration_count, iteration, max_coverage);
        self.print(Checkpoint::ErrConRemoval, &suffix);
    }

    /// Final erroneous-connection detector per the configured mode.
    fn final_remove_erroneous_edges(
        &mut self,
        graph: &mut Graph,
        remover: &mut EdgeRemover,
    ) -> bool {
        let k = graph.k();
        match self.config.simpl_mode {
            SimplificationMode::Cheating => {
                let cec = &self.config.cec;
                TopologyBasedChimericEdgeRemover::new(
                    max_erroneous_connection_length(k, cec.max_ec_length_coefficient),
                    cec.coverage_gap,
                    cec.sufficient_neighbour_length,
                )
                .remove_edges(graph, remover)
            }
            SimplificationMode::Topology => {
                let tec = &self.config.tec;
                let ec = AdvancedTopologyChimericEdgeRemover::new(
                    max_erroneous_connection_length(k, tec.max_ec_length_coefficient),
                    tec.uniqueness_length,
                    tec.plausibility_length,
                );
                let mut changed =
                    iterate_to_fixed_point(graph, remover, |g, r| ec.remove_edges(g, r));
                if self.config.additional_ec_removing {
                    let trec = &self.config.trec;
                    let max_unreliable_length =
                        max_erroneous_connection_length(k, trec.max_ec_length_coefficient);
                    let reliability = TopologyReliabilityChimericEdgeRemover::new(
                        max_unreliable_length,
                        trec.uniqueness_length,
                        trec.unreliable_coverage,
                    );
                    let thorns = ThornRemover::new(max_unreliable_length, trec.uniqueness_length);
                    changed |= reliability.remove_edges(graph, remover)
                        && thorns.remove_edges(graph, remover);
                }
                changed
            }
            SimplificationMode::Chimeric => {
                ChimericEdgesRemover::new(CHIMERIC_MODE_LENGTH).remove_edges(graph, remover)
            }
            SimplificationMode::MaxFlow => {
                let mfec = &self.config.mfec;
                // Flow-based removal skips the disconnect-safety check.
                let mut rough_remover = remover.fork(false);
                MaxFlowChimericEdgeRemover::new(
                    max_erroneous_connection_length(k, mfec.max_ec_length_coefficient),
                    mfec.uniqueness_length,
                    mfec.plausibility_length,
                )
                .remove_edges(graph, &mut rough_remover)
            }
        }
    }

    fn remove_edges_using_paired_info(&mut self, graph: &mut Graph, remover: &mut EdgeRemover) {
        let Some(index) = self.paired_info else {
            return;
        };
        info!("removing erroneous edges using paired info");
        let piec = &self.config.piec;
        PairInfoAwareErroneousEdgeRemover::new(
            index,
            max_erroneous_connection_length(graph.k(), piec.max_ec_length_coefficient),
            piec.min_neighbour_length,
            self.insert_size,
            self.read_length,
        )
        .remove_edges(graph, remover);
        IsolatedEdgeRemover::new(self.config.isolated_min_len)
            .remove_isolated_edges(graph, remover);
    }

    fn post_simplification(
        &mut self,
        graph: &mut Graph,
        edge_remover: &mut EdgeRemover,
        tip_remover: &mut EdgeRemover,
    ) {
        info!("final erroneous connections removal");
        self.print(Checkpoint::BeforeFinalErrConRemoval, "");
        self.final_remove_erroneous_edges(graph, edge_remover);
        self.remove_edges_using_paired_info(graph, edge_remover);
        self.print(Checkpoint::FinalErrConRemoval, "");

        info!("final tip clipping");
        self.clip_tips(graph, tip_remover, 1, 0);
        self.print(Checkpoint::FinalTipClipping, "");

        info!("final bulge removal");
        self.remove_bulges(graph, edge_remover, None);
        self.print(Checkpoint::FinalBulgeRemoval, "");

        self.close_gaps(graph);

        info!("final isolated edges removal");
        IsolatedEdgeRemover::new(self.config.isolated_min_len)
            .remove_isolated_edges(graph, edge_remover);
        self.print(Checkpoint::RemovingIsolatedEdges, "");

        self.print(Checkpoint::FinalSimplified, "");
    }
}
