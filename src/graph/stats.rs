//! Read-only coverage statistics over the graph.
//!
//! These passes never mutate; they feed the driver's threshold selection
//! and the average-coverage write-back. Aggregation runs over a plain
//! snapshot of (coverage, length) pairs so the heavy part can use rayon
//! without touching the single-threaded graph.

use rayon::prelude::*;
use tracing::info;

use super::store::Graph;

/// Length-weighted average coverage over all edges.
pub fn average_coverage(graph: &Graph) -> f64 {
    let pairs: Vec<(f64, usize)> = graph
        .edge_ids()
        .map(|e| (graph.coverage(e), graph.length(e)))
        .collect();
    let (mass, total_len) = pairs
        .par_iter()
        .map(|&(cov, len)| (cov * len as f64, len as f64))
        .reduce(|| (0.0, 0.0), |a, b| (a.0 + b.0, a.1 + b.1));
    if total_len == 0.0 {
        0.0
    } else {
        mass / total_len
    }
}

/// Percentile-based coverage threshold for erroneous-connection removal.
///
/// Builds a histogram of `floor(10 * coverage)` buckets and scans it until
/// `percentile` of all edges are covered; the bucket boundary divided by
/// ten is the threshold.
pub fn find_coverage_threshold(graph: &Graph, percentile: f64) -> f64 {
    let buckets: Vec<usize> = graph
        .edge_ids()
        .map(|e| (10.0 * graph.coverage(e)) as usize)
        .collect();
    let total = buckets.len();
    if total == 0 {
        return 0.0;
    }
    let max_bucket = buckets.par_iter().copied().max().unwrap_or(0);
    let mut histogram = vec![0usize; max_bucket + 2];
    for b in buckets {
        histogram[b] += 1;
    }

    let needed = (percentile * total as f64) as usize;
    let mut area = 0usize;
    let mut i = 0usize;
    while area < needed && i < histogram.len() {
        area += histogram[i];
        i += 1;
    }
    let threshold = i as f64 * 0.1;
    info!(threshold, percentile, "estimated erroneous connection coverage threshold");
    threshold
}
