//! Places each stop of a trip somewhere along its shape, so that the shape can be cut between
//! consecutive stops.
//!
//! The nearest vertex alone isn't good enough: routes loop back on themselves, pass the same
//! corner twice, or have stops sitting between two legs of the path. Instead, stops are placed in
//! order, and each one has to land strictly further along the shape than the previous stop and
//! before where the following stop's candidates are. Among the remaining candidates, a score
//! strongly prefers small jumps along the shape over slightly closer points further ahead.

use std::fmt;

use geo::Coord;
use serde::{Deserialize, Serialize};

use crate::spatial::{Neighbor, SpatialIndex};

#[derive(Clone, Debug, PartialEq)]
pub struct SnapConfig {
    pub k_neighbors: usize,
    pub max_neighbors: usize,
    pub widen_step: usize,
    pub index_gap_exponent: f64,
    pub distance_exponent: f64,
}

impl Default for SnapConfig {
    fn default() -> Self {
        Self {
            k_neighbors: 5,
            max_neighbors: 9,
            widen_step: 2,
            index_gap_exponent: 3.0,
            distance_exponent: 1.0,
        }
    }
}

/// Why a trip couldn't be placed along its shape. The trip is skipped entirely.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SnapFailure {
    /// Fewer than 2 stops, so no segments
    TooFewStops,
    /// Fewer than 2 vertices in the shape
    DegenerateShape,
    /// No increasing placement found, even after considering the most neighbors allowed
    Ambiguous,
}

impl fmt::Display for SnapFailure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SnapFailure::TooFewStops => write!(f, "fewer than 2 stops"),
            SnapFailure::DegenerateShape => write!(f, "shape has fewer than 2 points"),
            SnapFailure::Ambiguous => write!(f, "no monotonic placement of stops"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Snapped {
    /// One index into the shape's vertices per stop, strictly increasing
    pub indices: Vec<usize>,
    /// How many neighbors per stop the successful pass considered
    pub neighbors: usize,
    /// Two consecutive stops landed on vertices with the same position, from repeated points in
    /// the shape. Their segment will have no length.
    pub duplicate_positions: bool,
}

/// Snaps stops to a shape, building a one-off index.
pub fn snap_stops(
    shape: &[Coord],
    stops: &[Coord],
    config: &SnapConfig,
) -> Result<Snapped, SnapFailure> {
    if stops.len() < 2 {
        return Err(SnapFailure::TooFewStops);
    }
    if shape.len() < 2 {
        return Err(SnapFailure::DegenerateShape);
    }
    snap_with_index(&SpatialIndex::new(shape), shape, stops, config)
}

/// Snaps stops to a shape whose vertices are already indexed. The index can be shared by every
/// trip following the shape.
pub fn snap_with_index(
    index: &SpatialIndex,
    shape: &[Coord],
    stops: &[Coord],
    config: &SnapConfig,
) -> Result<Snapped, SnapFailure> {
    if stops.len() < 2 {
        return Err(SnapFailure::TooFewStops);
    }
    if index.len() < 2 {
        return Err(SnapFailure::DegenerateShape);
    }

    let cap = config.max_neighbors.min(index.len()).max(1);
    // Query once at the widest we'll ever go; narrower passes just use a prefix.
    let candidates: Vec<Vec<Neighbor>> = stops.iter().map(|pt| index.nearest(*pt, cap)).collect();

    let mut k = config.k_neighbors.clamp(1, cap);
    loop {
        if let Some(indices) = assign(&candidates, k, config) {
            let duplicate_positions = indices
                .windows(2)
                .any(|pair| shape.get(pair[0]) == shape.get(pair[1]));
            return Ok(Snapped {
                indices,
                neighbors: k,
                duplicate_positions,
            });
        }
        if k >= cap {
            return Err(SnapFailure::Ambiguous);
        }
        k = (k + config.widen_step.max(1)).min(cap);
    }
}

// One pass over the stops, considering the first k candidates of each.
fn assign(candidates: &[Vec<Neighbor>], k: usize, config: &SnapConfig) -> Option<Vec<usize>> {
    let top = |i: usize| first_k(&candidates[i], k);

    // Seed with the earliest candidate, biasing toward the start of the shape
    let mut prev = top(0).iter().map(|n| n.index).min()?;
    let mut indices = Vec::with_capacity(candidates.len());
    indices.push(prev);

    for i in 1..candidates.len() {
        let upper_bound = if i + 1 < candidates.len() {
            Some(top(i + 1).iter().map(|n| n.index).max()?)
        } else {
            None
        };

        let (_, best) = top(i)
            .iter()
            .filter(|n| n.index > prev && upper_bound.map_or(true, |upper| n.index < upper))
            .map(|n| (score(n, prev, config), n.index))
            .min_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)))?;
        indices.push(best);
        prev = best;
    }
    Some(indices)
}

fn first_k(neighbors: &[Neighbor], k: usize) -> &[Neighbor] {
    &neighbors[..k.min(neighbors.len())]
}

fn score(candidate: &Neighbor, prev: usize, config: &SnapConfig) -> f64 {
    let gap = (candidate.index - prev) as f64;
    gap.powf(config.index_gap_exponent) * candidate.distance_meters().powf(config.distance_exponent)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pt(x: f64, y: f64) -> Coord {
        Coord { x, y }
    }

    #[test]
    fn simple_trip() {
        let shape = vec![pt(0.0, 0.0), pt(0.0, 0.01)];
        let snapped = snap_stops(&shape, &shape, &SnapConfig::default()).unwrap();
        assert_eq!(snapped.indices, vec![0, 1]);
        assert!(!snapped.duplicate_positions);
    }

    #[test]
    fn too_few_stops_or_points() {
        let shape = vec![pt(0.0, 0.0), pt(0.0, 0.01)];
        assert_eq!(
            snap_stops(&shape, &[pt(0.0, 0.0)], &SnapConfig::default()),
            Err(SnapFailure::TooFewStops)
        );
        assert_eq!(
            snap_stops(&shape[0..1], &shape, &SnapConfig::default()),
            Err(SnapFailure::DegenerateShape)
        );
    }

    #[test]
    fn stops_along_a_straight_line() {
        let shape: Vec<Coord> = (0..50).map(|i| pt(0.0, i as f64 * 0.0001)).collect();
        let stops = vec![pt(0.00002, 0.0), pt(-0.00002, 0.0021), pt(0.00001, 0.0049)];
        let snapped = snap_stops(&shape, &stops, &SnapConfig::default()).unwrap();
        assert_eq!(snapped.indices, vec![0, 21, 49]);
    }

    // Out along x=0, then back along x=0.2. The middle stop sits nearer the return leg, which is
    // further along the shape than the last stop allows.
    fn hairpin() -> (Vec<Coord>, Vec<Coord>) {
        let shape = vec![
            pt(0.0, 0.0),
            pt(0.0, 1.0),
            pt(0.0, 2.0),
            pt(0.0, 3.0),
            pt(0.2, 3.0),
            pt(0.2, 2.1),
            pt(0.2, 2.0),
            pt(0.2, 1.9),
            pt(0.2, 0.0),
        ];
        let stops = vec![pt(0.0, 0.0), pt(0.17, 2.0), pt(0.0, 3.0)];
        (shape, stops)
    }

    #[test]
    fn widens_until_placement_found() {
        let (shape, stops) = hairpin();
        let config = SnapConfig {
            k_neighbors: 3,
            max_neighbors: 5,
            ..SnapConfig::default()
        };
        let snapped = snap_stops(&shape, &stops, &config).unwrap();
        assert_eq!(snapped.indices, vec![0, 2, 3]);
        assert_eq!(snapped.neighbors, 5);
    }

    #[test]
    fn gives_up_at_the_cap() {
        let (shape, stops) = hairpin();
        let config = SnapConfig {
            k_neighbors: 3,
            max_neighbors: 3,
            ..SnapConfig::default()
        };
        assert_eq!(snap_stops(&shape, &stops, &config), Err(SnapFailure::Ambiguous));
    }

    #[test]
    fn repeated_vertices_flagged() {
        let shape = vec![pt(0.0, 0.0), pt(0.0, 0.001), pt(0.0, 0.001), pt(0.0, 0.002)];
        let stops = vec![pt(0.0, 0.0), pt(0.0, 0.001), pt(0.0, 0.001), pt(0.0, 0.002)];
        let snapped = snap_stops(&shape, &stops, &SnapConfig::default()).unwrap();
        assert_eq!(snapped.indices, vec![0, 1, 2, 3]);
        assert!(snapped.duplicate_positions);
    }
}
