use std::collections::{BTreeMap, BTreeSet};

use abstutil::{prettyprint_usize, Timer};
use geo::{Coord, LineString};
use gtfs::{ShapeID, StopID, StopTime, TripID, GTFS};
use serde::Serialize;

use crate::canonicalize::canonicalize;
use crate::config::Config;
use crate::cutter::{cut_segments, TripStop};
use crate::densify::densify;
use crate::error::{Result, SegmentsError};
use crate::projection::{Projector, UtmZone};
use crate::resolver::{resolve, RouteShapeGroup};
use crate::segment::SegmentTable;
use crate::snapper::{snap_with_index, SnapConfig, SnapFailure, Snapped};
use crate::spatial::SpatialIndex;

/// Data quality problems found along the way. None of these stop the pipeline; they're reported
/// next to the segments.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Diagnostics {
    /// Trips with a missing or unknown shape, never grouped
    pub dropped_trips: Vec<TripID>,
    /// The representative trip of every group that couldn't be snapped, sorted
    pub failed_trips: Vec<(TripID, SnapFailure)>,
    /// Stops referenced by a trip, but unknown or without a location. Sorted.
    pub excluded_stops: Vec<StopID>,
    /// Trips in all groups
    pub total_traversals: usize,
    /// Trips in the failed groups
    pub defective_traversals: usize,
    /// Groups whose segments have no distance, because no UTM zone fits their shape
    pub undefined_length_groups: usize,
    /// Trips where two consecutive stops snapped to the same position
    pub duplicate_snaps: Vec<TripID>,
    /// Segments before merging identical ones
    pub raw_segments: usize,
}

impl Diagnostics {
    /// The percentage of trips that couldn't be cut into segments, weighted by how many trips each
    /// group stands for.
    pub fn defective_percentage(&self) -> f64 {
        if self.total_traversals == 0 {
            return 0.0;
        }
        100.0 * self.defective_traversals as f64 / self.total_traversals as f64
    }

    fn log(&self) {
        if !self.dropped_trips.is_empty() {
            warn!(
                "{} trips without a usable shape, like {}",
                prettyprint_usize(self.dropped_trips.len()),
                self.dropped_trips[0]
            );
        }
        if !self.excluded_stops.is_empty() {
            warn!(
                "{} stops have no location and were skipped",
                prettyprint_usize(self.excluded_stops.len())
            );
        }
        if self.undefined_length_groups > 0 {
            warn!(
                "{} route shapes couldn't be measured",
                self.undefined_length_groups
            );
        }
        if !self.duplicate_snaps.is_empty() {
            info!(
                "{} trips had stops snapped to the same position",
                self.duplicate_snaps.len()
            );
        }
        info!(
            "{} of {} trips couldn't be snapped ({:.2}%)",
            prettyprint_usize(self.defective_traversals),
            prettyprint_usize(self.total_traversals),
            self.defective_percentage()
        );
    }
}

#[derive(Debug)]
pub struct PipelineOutput {
    pub segments: SegmentTable,
    pub diagnostics: Diagnostics,
}

/// Turns a feed into canonical segments. Holds no state besides its configuration, so running
/// twice on the same feed gives the same result.
pub struct SegmentPipeline {
    config: Config,
}

// One route shape group to snap
struct Job {
    group: usize,
    stops: Vec<TripStop>,
    pts: Vec<Coord>,
}

impl SegmentPipeline {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn run(&self, gtfs: &GTFS, timer: &mut Timer) -> Result<PipelineOutput> {
        if gtfs.stop_times.is_empty() {
            return Err(SegmentsError::EmptyFeed);
        }
        if gtfs.trips.is_empty() {
            return Err(SegmentsError::NoTrips);
        }
        let uses_shapes = gtfs.trips.iter().any(|trip| {
            trip.shape_id
                .as_ref()
                .map_or(false, |id| gtfs.shapes.contains_key(id))
        });
        if !uses_shapes {
            return Err(SegmentsError::MissingShapes);
        }

        timer.start("build segments");
        let output = self.build(gtfs, timer);
        timer.stop("build segments");

        let before_filter = output.segments.len();
        if before_filter == 0 {
            return Err(SegmentsError::NoSegments { before_filter });
        }
        let output = self.filter_spacing(output);
        if output.segments.is_empty() {
            return Err(SegmentsError::NoSegments { before_filter });
        }
        Ok(output)
    }

    fn build(&self, gtfs: &GTFS, timer: &mut Timer) -> PipelineOutput {
        let mut diagnostics = Diagnostics::default();

        let densified;
        let shapes = match self.config.densify_spacing {
            Some(spacing) => {
                densified = densify_shapes(gtfs, spacing, self.config.parallel, timer);
                &densified
            }
            None => &gtfs.shapes,
        };

        let resolved = resolve(&gtfs.trips, shapes);
        info!(
            "{} trips grouped into {} route shapes, by {:?}",
            prettyprint_usize(resolved.total_traversals()),
            prettyprint_usize(resolved.groups.len()),
            resolved.key
        );
        diagnostics.dropped_trips = resolved.dropped_trips.clone();
        diagnostics.total_traversals = resolved.total_traversals();

        let mut excluded_stops = BTreeSet::new();
        let jobs: Vec<Job> = resolved
            .groups
            .iter()
            .enumerate()
            .map(|(idx, group)| {
                let stops = self.trip_stops(
                    gtfs,
                    gtfs.stop_times_for(&group.representative.trip_id),
                    &mut excluded_stops,
                );
                let pts = stops.iter().map(|s| s.pos).collect();
                Job {
                    group: idx,
                    stops,
                    pts,
                }
            })
            .collect();
        diagnostics.excluded_stops = excluded_stops.into_iter().collect();

        timer.start("index shapes");
        // Groups of different routes or directions often share a shape
        let mut indices: BTreeMap<&ShapeID, SpatialIndex> = BTreeMap::new();
        for group in &resolved.groups {
            indices
                .entry(&group.shape_id)
                .or_insert_with(|| SpatialIndex::new(&group.shape.0));
        }
        timer.stop("index shapes");

        let snap_config = self.config.snap_config();
        let results = snap_all(
            &resolved.groups,
            &indices,
            &jobs,
            &snap_config,
            self.config.parallel,
            timer,
        );

        timer.start("cut segments");
        let mut raw = Vec::new();
        for (job, result) in jobs.iter().zip(results) {
            let group = &resolved.groups[job.group];
            let trip_id = &group.representative.trip_id;
            let snapped = match result {
                Ok(snapped) => snapped,
                Err(failure) => {
                    debug!("Couldn't snap {trip_id}: {failure}");
                    diagnostics.failed_trips.push((trip_id.clone(), failure));
                    diagnostics.defective_traversals += group.traversals;
                    continue;
                }
            };
            if snapped.duplicate_positions {
                debug!("{trip_id} has stops snapped to the same position");
                diagnostics.duplicate_snaps.push(trip_id.clone());
            }

            let projector = UtmZone::for_points(&group.shape.0).map(Projector::new);
            if projector.is_none() {
                warn!(
                    "No UTM zone for shape {}, so its segments have no length",
                    group.shape_id
                );
                diagnostics.undefined_length_groups += 1;
            }
            raw.extend(cut_segments(
                group,
                &job.stops,
                &snapped.indices,
                projector.as_ref(),
            ));
        }
        timer.stop("cut segments");

        diagnostics.failed_trips.sort();
        diagnostics.duplicate_snaps.sort();
        diagnostics.raw_segments = raw.len();

        let segments = canonicalize(raw, self.config.min_traversals);
        info!(
            "{} raw segments merged into {}",
            prettyprint_usize(diagnostics.raw_segments),
            prettyprint_usize(segments.len())
        );
        diagnostics.log();

        PipelineOutput {
            segments,
            diagnostics,
        }
    }

    // The stops of a trip that can be placed, without deadheading at either end.
    fn trip_stops(
        &self,
        gtfs: &GTFS,
        stop_times: &[StopTime],
        excluded: &mut BTreeSet<StopID>,
    ) -> Vec<TripStop> {
        let mut stop_times = stop_times;
        if self.config.trim_deadheads {
            if stop_times.first().map_or(false, |st| st.no_pickup()) {
                stop_times = &stop_times[1..];
            }
            if stop_times.last().map_or(false, |st| st.no_drop_off()) {
                stop_times = &stop_times[..stop_times.len() - 1];
            }
        }

        let mut stops = Vec::new();
        for st in stop_times {
            match gtfs.stops.get(&st.stop_id).and_then(|s| s.pos) {
                Some(pos) => stops.push(TripStop {
                    stop_id: st.stop_id.clone(),
                    stop_sequence: st.stop_sequence,
                    pos,
                    arrival_time: st.arrival_time,
                }),
                None => {
                    excluded.insert(st.stop_id.clone());
                }
            }
        }
        stops
    }

    fn filter_spacing(&self, mut output: PipelineOutput) -> PipelineOutput {
        if let Some(max) = self.config.max_spacing {
            let before = output.segments.len();
            output
                .segments
                .retain(|s| s.distance.map_or(false, |d| d <= max));
            info!(
                "{} of {} segments are at most {max}m long",
                prettyprint_usize(output.segments.len()),
                prettyprint_usize(before)
            );
        }
        output
    }
}

/// Builds segments with the default configuration, besides the given options.
pub fn build_segments(
    gtfs: &GTFS,
    parallel: bool,
    max_spacing: Option<f64>,
) -> Result<PipelineOutput> {
    let config = Config {
        parallel,
        max_spacing,
        ..Config::default()
    };
    SegmentPipeline::new(config)?.run(gtfs, &mut Timer::throwaway())
}

// Only the shapes some trip uses
fn densify_shapes(
    gtfs: &GTFS,
    spacing: f64,
    parallel: bool,
    timer: &mut Timer,
) -> BTreeMap<ShapeID, LineString> {
    let used: BTreeSet<&ShapeID> = gtfs
        .trips
        .iter()
        .filter_map(|t| t.shape_id.as_ref())
        .collect();
    let requests: Vec<(&ShapeID, &LineString)> = gtfs
        .shapes
        .iter()
        .filter(|(id, _)| used.contains(id))
        .collect();
    let densify_one = |(id, line): (&ShapeID, &LineString)| (id.clone(), densify(line, spacing));
    if parallel {
        timer
            .parallelize("densify shapes", requests, densify_one)
            .into_iter()
            .collect()
    } else {
        requests.into_iter().map(densify_one).collect()
    }
}

fn snap_all(
    groups: &[RouteShapeGroup],
    indices: &BTreeMap<&ShapeID, SpatialIndex>,
    jobs: &[Job],
    config: &SnapConfig,
    parallel: bool,
    timer: &mut Timer,
) -> Vec<std::result::Result<Snapped, SnapFailure>> {
    let snap_one = |job: &Job| {
        let group = &groups[job.group];
        match indices.get(&group.shape_id) {
            Some(index) => snap_with_index(index, &group.shape.0, &job.pts, config),
            None => Err(SnapFailure::DegenerateShape),
        }
    };
    if parallel {
        timer.parallelize("snap stops", jobs.iter().collect(), snap_one)
    } else {
        jobs.iter().map(snap_one).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defective_percentage() {
        let mut diagnostics = Diagnostics::default();
        assert_eq!(diagnostics.defective_percentage(), 0.0);
        diagnostics.total_traversals = 8;
        diagnostics.defective_traversals = 2;
        assert_eq!(diagnostics.defective_percentage(), 25.0);
    }

    #[test]
    fn rejects_invalid_config() {
        let config = Config {
            k_neighbors: 0,
            ..Config::default()
        };
        assert!(matches!(
            SegmentPipeline::new(config),
            Err(SegmentsError::InvalidConfig(_))
        ));
    }

    #[test]
    fn empty_feed() {
        assert!(matches!(
            build_segments(&GTFS::empty(), false, None),
            Err(SegmentsError::EmptyFeed)
        ));
    }
}
