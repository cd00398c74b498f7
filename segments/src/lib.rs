//! Cuts the routes of a GTFS feed into segments between consecutive stops, measuring how long each
//! one is and how many trips use it.

#[macro_use]
extern crate log;

mod canonicalize;
mod config;
mod cutter;
mod densify;
mod error;
pub mod export;
mod pipeline;
mod projection;
mod resolver;
pub mod route_stats;
mod segment;
mod snapper;
mod spatial;
pub mod stats;

pub use canonicalize::canonicalize;
pub use config::Config;
pub use cutter::{cut_segments, TripStop};
pub use densify::{densify, geodesic_distance, geodesic_length};
pub use error::{Result, SegmentsError};
pub use pipeline::{build_segments, Diagnostics, PipelineOutput, SegmentPipeline};
pub use projection::{Projector, UtmZone};
pub use resolver::{resolve, GroupingKey, Resolved, RouteShapeGroup};
pub use segment::{Segment, SegmentID, SegmentTable};
pub use snapper::{snap_stops, snap_with_index, SnapConfig, SnapFailure, Snapped};
pub use spatial::{Neighbor, SpatialIndex, METERS_PER_DEGREE};
