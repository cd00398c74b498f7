use std::fmt;

use geo::{Coord, LineString};
use gtfs::{DirectionID, RouteID, ShapeID, StopID};

/// Identifies a physical stretch of road between two stops. Usually there's one path between a
/// pair of stops, with `variant` 1. When trips take noticeably different paths between the same
/// two stops, each path gets its own variant.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SegmentID {
    pub stop1: StopID,
    pub stop2: StopID,
    pub variant: usize,
}

impl SegmentID {
    pub fn new(stop1: StopID, stop2: StopID) -> Self {
        Self {
            stop1,
            stop2,
            variant: 1,
        }
    }
}

impl fmt::Display for SegmentID {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}-{}-{}", self.stop1, self.stop2, self.variant)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Segment {
    pub segment_id: SegmentID,
    pub route_id: RouteID,
    pub direction_id: Option<DirectionID>,
    pub shape_id: ShapeID,
    /// How many scheduled trips run along this segment
    pub traversals: usize,
    /// In meters, rounded to centimeters. `None` if no projection could be picked for the shape.
    pub distance: Option<f64>,
    /// Longitude/latitude, owned independently of the shape it was cut from
    pub geometry: LineString,
    /// Scheduled seconds between the two stops
    pub traversal_time: Option<u32>,
    /// Meters per second
    pub speed: Option<f64>,
}

impl Segment {
    pub fn stop1(&self) -> &StopID {
        &self.segment_id.stop1
    }

    pub fn stop2(&self) -> &StopID {
        &self.segment_id.stop2
    }

    pub fn start(&self) -> Option<Coord> {
        self.geometry.0.first().copied()
    }

    pub fn end(&self) -> Option<Coord> {
        self.geometry.0.last().copied()
    }
}

/// Canonical segments, grouped by route and stop pair in the order they were first found.
pub type SegmentTable = Vec<Segment>;

pub(crate) fn round_to_cm(meters: f64) -> f64 {
    (meters * 100.0).round() / 100.0
}
