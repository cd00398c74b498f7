use geo::{Coord, LineString};
use gtfs::{StopID, Time};

use crate::projection::Projector;
use crate::resolver::RouteShapeGroup;
use crate::segment::{round_to_cm, Segment, SegmentID};

/// One stop along a trip, after stops without a location have been removed.
#[derive(Clone, Debug, PartialEq)]
pub struct TripStop {
    pub stop_id: StopID,
    pub stop_sequence: u32,
    pub pos: Coord,
    pub arrival_time: Option<Time>,
}

/// Cuts a group's shape between every pair of consecutive stops, given where each stop was
/// snapped. A pair whose second index isn't past the first produces nothing. Lengths are only
/// filled out when there's a projection to measure with.
pub fn cut_segments(
    group: &RouteShapeGroup,
    stops: &[TripStop],
    indices: &[usize],
    projector: Option<&Projector>,
) -> Vec<Segment> {
    let pts = &group.shape.0;
    let mut segments = Vec::new();
    for (pair, idx) in stops.windows(2).zip(indices.windows(2)) {
        let (i, j) = (idx[0], idx[1]);
        if j <= i || j >= pts.len() {
            continue;
        }
        let geometry = LineString::new(pts[i..=j].to_vec());
        let distance = projector.map(|p| round_to_cm(p.length(&geometry)));
        let traversal_time = match (pair[0].arrival_time, pair[1].arrival_time) {
            (Some(t1), Some(t2)) => t1.seconds_until(t2).filter(|secs| *secs > 0),
            _ => None,
        };
        let speed = match (distance, traversal_time) {
            (Some(dist), Some(secs)) => Some(dist / secs as f64),
            _ => None,
        };

        segments.push(Segment {
            segment_id: SegmentID::new(pair[0].stop_id.clone(), pair[1].stop_id.clone()),
            route_id: group.route_id.clone(),
            direction_id: group.direction_id,
            shape_id: group.shape_id.clone(),
            traversals: group.traversals,
            distance,
            geometry,
            traversal_time,
            speed,
        });
    }
    segments
}
