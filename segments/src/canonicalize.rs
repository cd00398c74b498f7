//! Trips of one route can share a stop pair but get there differently, like a detour or a
//! short-turn. Averaging those together would produce a segment that doesn't exist, so each
//! distinct length becomes its own variant of the stop pair.

use std::collections::HashMap;

use gtfs::{RouteID, StopID};

use crate::segment::Segment;

/// Merges raw segments (one per trip group and stop pair) into one row per physical segment.
/// Rows of a route with the same stop pair and the same length, rounded to the meter, are the same
/// segment: the first one found is kept, with the traversals of all of them. Segments with fewer
/// than `min_traversals` are dropped. Variants are numbered from 1 among the survivors, in the
/// order first found.
///
/// Running this on its own output changes nothing.
pub fn canonicalize(raw: Vec<Segment>, min_traversals: usize) -> Vec<Segment> {
    // Clusters per (route, stop1, stop2), keeping first-found order at both levels
    let mut group_order: Vec<Vec<Segment>> = Vec::new();
    let mut group_lookup: HashMap<(RouteID, StopID, StopID), usize> = HashMap::new();
    let mut cluster_lookup: HashMap<(usize, Option<i64>), usize> = HashMap::new();

    for segment in raw {
        let key = (
            segment.route_id.clone(),
            segment.stop1().clone(),
            segment.stop2().clone(),
        );
        let group_idx = *group_lookup.entry(key).or_insert_with(|| {
            group_order.push(Vec::new());
            group_order.len() - 1
        });
        let clusters = &mut group_order[group_idx];

        let length_key = segment.distance.map(|d| d.round() as i64);
        match cluster_lookup.get(&(group_idx, length_key)) {
            Some(cluster_idx) => {
                clusters[*cluster_idx].traversals += segment.traversals;
            }
            None => {
                cluster_lookup.insert((group_idx, length_key), clusters.len());
                clusters.push(segment);
            }
        }
    }

    let mut result = Vec::new();
    let mut dropped = 0;
    for clusters in group_order {
        let mut variant = 1;
        for mut segment in clusters {
            if segment.traversals < min_traversals {
                dropped += 1;
                continue;
            }
            segment.segment_id.variant = variant;
            variant += 1;
            result.push(segment);
        }
    }
    if dropped > 0 {
        debug!("Dropped {dropped} segments with fewer than {min_traversals} traversals");
    }
    result
}
