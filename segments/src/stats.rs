//! Summarizes how far apart stops are, in a few ways. A segment used by 100 trips a day matters
//! more to riders than one used twice, so besides plain averages over distinct segments, there are
//! statistics weighted by traversals.

use std::collections::BTreeSet;

use gtfs::RouteID;
use serde::Serialize;

use crate::segment::{Segment, SegmentID};

pub const DEFAULT_SPACING_THRESHOLD: f64 = 3000.0;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SpacingSummary {
    /// Every distinct physical segment counts once
    pub stop_weighted_mean: f64,
    /// Segments shared by several routes count once per route
    pub route_weighted_mean: f64,
    pub traversal_weighted_mean: f64,
    pub traversal_weighted_std: f64,
    pub traversal_weighted_q25: f64,
    pub traversal_weighted_q50: f64,
    pub traversal_weighted_q75: f64,
    pub num_segments: usize,
    pub num_routes: usize,
    pub num_traversals: usize,
    pub spacing_threshold: f64,
    /// The percentage of traversals on segments longer than the threshold
    pub pct_traversals_over_threshold: f64,
}

impl SpacingSummary {
    /// Summarizes segments no longer than `threshold` meters. Longer segments usually come from
    /// express runs or bad data, so they're only counted in `pct_traversals_over_threshold`.
    /// Segments without a distance are ignored. `None` if nothing is left to summarize.
    pub fn new(segments: &[Segment], threshold: f64) -> Option<Self> {
        let measured: Vec<(&Segment, f64)> = segments
            .iter()
            .filter_map(|s| s.distance.map(|d| (s, d)))
            .collect();
        let all_traversals: usize = measured.iter().map(|(s, _)| s.traversals).sum();
        let over_threshold: usize = measured
            .iter()
            .filter(|(_, d)| *d > threshold)
            .map(|(s, _)| s.traversals)
            .sum();

        let kept: Vec<(&Segment, f64)> = measured
            .into_iter()
            .filter(|(_, d)| *d <= threshold)
            .collect();
        if kept.is_empty() {
            return None;
        }

        // Distances are already rounded, so comparing their bits is safe
        let per_stop: BTreeSet<(&SegmentID, u64)> =
            kept.iter().map(|(s, d)| (&s.segment_id, d.to_bits())).collect();
        let per_route: BTreeSet<(&RouteID, &SegmentID, u64)> = kept
            .iter()
            .map(|(s, d)| (&s.route_id, &s.segment_id, d.to_bits()))
            .collect();
        let routes: BTreeSet<&RouteID> = kept.iter().map(|(s, _)| &s.route_id).collect();

        let mut weighted: Vec<(f64, usize)> =
            kept.iter().map(|(s, d)| (*d, s.traversals)).collect();
        weighted.sort_by(|a, b| a.0.total_cmp(&b.0));
        let num_traversals: usize = weighted.iter().map(|(_, t)| t).sum();
        let (mean, std) = weighted_mean_std(&weighted, num_traversals);

        let stop_weighted_mean = mean_of(per_stop.iter().map(|(_, bits)| f64::from_bits(*bits)));
        let route_weighted_mean =
            mean_of(per_route.iter().map(|(_, _, bits)| f64::from_bits(*bits)));

        Some(Self {
            stop_weighted_mean,
            route_weighted_mean,
            traversal_weighted_mean: mean,
            traversal_weighted_std: std,
            traversal_weighted_q25: weighted_quantile(&weighted, num_traversals, 0.25),
            traversal_weighted_q50: weighted_quantile(&weighted, num_traversals, 0.5),
            traversal_weighted_q75: weighted_quantile(&weighted, num_traversals, 0.75),
            num_segments: kept.len(),
            num_routes: routes.len(),
            num_traversals,
            spacing_threshold: threshold,
            pct_traversals_over_threshold: if all_traversals == 0 {
                0.0
            } else {
                100.0 * over_threshold as f64 / all_traversals as f64
            },
        })
    }
}

fn mean_of<I: Iterator<Item = f64>>(values: I) -> f64 {
    let (sum, count) = values.fold((0.0, 0), |(sum, count), x| (sum + x, count + 1));
    if count == 0 {
        return 0.0;
    }
    sum / count as f64
}

// Population standard deviation, as if every value was repeated `weight` times
fn weighted_mean_std(sorted: &[(f64, usize)], total: usize) -> (f64, f64) {
    if total == 0 {
        return (0.0, 0.0);
    }
    let n = total as f64;
    let mean = sorted.iter().map(|(x, w)| x * *w as f64).sum::<f64>() / n;
    let variance = sorted
        .iter()
        .map(|(x, w)| (x - mean).powi(2) * *w as f64)
        .sum::<f64>()
        / n;
    (mean, variance.sqrt())
}

// Linear interpolation between the two closest ranks, over values repeated by weight
fn weighted_quantile(sorted: &[(f64, usize)], total: usize, q: f64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let pos = q * (total - 1) as f64;
    let lower = pos.floor() as usize;
    let frac = pos - lower as f64;
    let a = value_at(sorted, lower);
    if frac == 0.0 {
        return a;
    }
    let b = value_at(sorted, lower + 1);
    a + (b - a) * frac
}

// The value at a rank, if every value was repeated by its weight
fn value_at(sorted: &[(f64, usize)], rank: usize) -> f64 {
    let mut seen = 0;
    for (x, w) in sorted {
        seen += w;
        if rank < seen {
            return *x;
        }
    }
    sorted.last().map_or(0.0, |(x, _)| *x)
}
