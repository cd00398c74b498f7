//! Service statistics per route and direction, read straight from the schedule: how long the
//! route is, how often buses come, how fast they go, and how many run at once.

use std::collections::BTreeMap;

use gtfs::{DirectionID, RouteID, ShapeID, Time, Trip, TripID, GTFS};
use serde::Serialize;

use crate::projection::{Projector, UtmZone};
use crate::segment::round_to_cm;

/// Gaps between buses longer than this are service breaks, not headways.
pub const MAX_HEADWAY: u32 = 3 * 3600;
/// How often to count the buses on the road when averaging
pub const ACTIVE_BUS_SAMPLE_INTERVAL: u32 = 5 * 60;
/// How often to count the buses on the road when looking for the peak
pub const PEAK_SAMPLE_INTERVAL: u32 = 60;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RouteStats {
    pub route_id: RouteID,
    pub direction_id: Option<DirectionID>,
    pub trips: usize,
    /// The shape most trips in this direction follow. The length, time, and stop spacing describe
    /// the first trip along it.
    pub shape_id: Option<ShapeID>,
    /// Meters, measured in the shape's UTM zone
    pub route_length: Option<f64>,
    /// Seconds from the first to the last arrival of a trip
    pub route_time: Option<u32>,
    /// Mean seconds between trips at the first stop
    pub headway: Option<f64>,
    /// Meters per second
    pub average_speed: Option<f64>,
    /// Buses on the road at once, averaged over the times when there's at least one
    pub average_active_buses: Option<f64>,
    /// Meters between buses
    pub bus_spacing: Option<f64>,
    /// Meters between stops
    pub stop_spacing: Option<f64>,
    pub peak_buses: usize,
    /// Every stretch of time when `peak_buses` are on the road
    pub peak_periods: Vec<(Time, Time)>,
}

// When a trip starts and ends, by its known arrival times
#[derive(Clone, Copy)]
struct Span {
    start: Time,
    end: Time,
}

impl Span {
    fn contains(self, t: u32) -> bool {
        self.start.inner_seconds() <= t && t <= self.end.inner_seconds()
    }
}

/// Summarizes every route and direction with at least one trip that has stop times. Results are
/// sorted by route, then direction.
pub fn route_stats(gtfs: &GTFS) -> Vec<RouteStats> {
    let mut per_direction: BTreeMap<(RouteID, Option<DirectionID>), Vec<&Trip>> = BTreeMap::new();
    for trip in &gtfs.trips {
        if gtfs.stop_times_for(&trip.trip_id).is_empty() {
            continue;
        }
        per_direction
            .entry((trip.route_id.clone(), trip.direction_id))
            .or_insert_with(Vec::new)
            .push(trip);
    }

    per_direction
        .into_iter()
        .map(|((route_id, direction_id), trips)| {
            direction_stats(gtfs, route_id, direction_id, &trips)
        })
        .collect()
}

fn direction_stats(
    gtfs: &GTFS,
    route_id: RouteID,
    direction_id: Option<DirectionID>,
    trips: &[&Trip],
) -> RouteStats {
    let shape_id = busiest_shape(gtfs, trips);
    let on_shape: Vec<&Trip> = match shape_id {
        Some(ref id) => trips
            .iter()
            .filter(|t| t.shape_id.as_ref() == Some(id))
            .copied()
            .collect(),
        None => trips.to_vec(),
    };
    // Never empty: the busiest shape has at least one trip
    let representative = &on_shape[0].trip_id;

    let route_length = shape_id
        .as_ref()
        .and_then(|id| gtfs.shapes.get(id))
        .and_then(|shape| {
            let projector = Projector::new(UtmZone::for_points(&shape.0)?);
            Some(round_to_cm(projector.length(shape)))
        });

    let route_time = span(gtfs, representative)
        .map(|span| span.end.inner_seconds() - span.start.inner_seconds());
    let average_speed = match (route_length, route_time) {
        (Some(length), Some(time)) if time > 0 => Some(length / time as f64),
        _ => None,
    };

    let num_stops = gtfs.stop_times_for(representative).len();
    let stop_spacing = route_length
        .filter(|_| num_stops > 1)
        .map(|length| length / (num_stops - 1) as f64);

    let spans: Vec<Span> = trips
        .iter()
        .filter_map(|t| span(gtfs, &t.trip_id))
        .collect();
    let average_active_buses = average_active_buses(&spans);
    let bus_spacing = match (route_length, average_active_buses) {
        (Some(length), Some(buses)) => Some(length / buses),
        _ => None,
    };
    let (peak_buses, peak_periods) = peak_periods(&spans);

    RouteStats {
        route_id,
        direction_id,
        trips: trips.len(),
        shape_id,
        route_length,
        route_time,
        headway: headway(gtfs, &on_shape),
        average_speed,
        average_active_buses,
        bus_spacing,
        stop_spacing,
        peak_buses,
        peak_periods,
    }
}

// The shape with the most trips, breaking ties by ID. Only shapes the feed defines count.
fn busiest_shape(gtfs: &GTFS, trips: &[&Trip]) -> Option<ShapeID> {
    let mut counts: BTreeMap<&ShapeID, usize> = BTreeMap::new();
    for trip in trips {
        if let Some(ref id) = trip.shape_id {
            if gtfs.shapes.contains_key(id) {
                *counts.entry(id).or_insert(0) += 1;
            }
        }
    }
    let mut best: Option<(&ShapeID, usize)> = None;
    for (id, count) in counts {
        if best.map_or(true, |(_, most)| count > most) {
            best = Some((id, count));
        }
    }
    best.map(|(id, _)| id.clone())
}

fn span(gtfs: &GTFS, trip_id: &TripID) -> Option<Span> {
    let mut times = gtfs
        .stop_times_for(trip_id)
        .iter()
        .filter_map(|st| st.arrival_time);
    let first = times.next()?;
    let (start, end) = times.fold((first, first), |(lo, hi), t| (lo.min(t), hi.max(t)));
    Some(Span { start, end })
}

// Mean gap between consecutive arrivals at the first stop of the first trip, ignoring service
// breaks
fn headway(gtfs: &GTFS, trips: &[&Trip]) -> Option<f64> {
    let first_stop = &gtfs.stop_times_for(&trips.first()?.trip_id).first()?.stop_id;
    let mut arrivals: Vec<u32> = trips
        .iter()
        .flat_map(|t| gtfs.stop_times_for(&t.trip_id))
        .filter(|st| &st.stop_id == first_stop)
        .filter_map(|st| st.arrival_time.map(|t| t.inner_seconds()))
        .collect();
    arrivals.sort_unstable();
    let gaps: Vec<u32> = arrivals
        .windows(2)
        .map(|pair| pair[1] - pair[0])
        .filter(|gap| *gap <= MAX_HEADWAY)
        .collect();
    if gaps.is_empty() {
        return None;
    }
    Some(gaps.iter().map(|gap| *gap as f64).sum::<f64>() / gaps.len() as f64)
}

// Every `step` seconds from the first start to the last end, how many trips are running
fn active_counts(spans: &[Span], step: u32) -> Vec<(u32, usize)> {
    let start = match spans.iter().map(|s| s.start.inner_seconds()).min() {
        Some(t) => t,
        None => return Vec::new(),
    };
    let end = spans
        .iter()
        .map(|s| s.end.inner_seconds())
        .max()
        .unwrap_or(start);
    (start..=end)
        .step_by(step as usize)
        .map(|t| (t, spans.iter().filter(|s| s.contains(t)).count()))
        .collect()
}

fn average_active_buses(spans: &[Span]) -> Option<f64> {
    let counts: Vec<usize> = active_counts(spans, ACTIVE_BUS_SAMPLE_INTERVAL)
        .into_iter()
        .map(|(_, count)| count)
        .filter(|count| *count > 0)
        .collect();
    if counts.is_empty() {
        return None;
    }
    Some(counts.iter().sum::<usize>() as f64 / counts.len() as f64)
}

fn peak_periods(spans: &[Span]) -> (usize, Vec<(Time, Time)>) {
    let counts = active_counts(spans, PEAK_SAMPLE_INTERVAL);
    let peak = counts.iter().map(|(_, count)| *count).max().unwrap_or(0);
    if peak == 0 {
        return (0, Vec::new());
    }

    let mut periods: Vec<(Time, Time)> = Vec::new();
    let mut previous_at_peak = false;
    for (t, count) in counts {
        let at_peak = count == peak;
        if at_peak {
            let time = Time::from_seconds(t);
            if previous_at_peak {
                if let Some(period) = periods.last_mut() {
                    period.1 = time;
                }
            } else {
                periods.push((time, time));
            }
        }
        previous_at_peak = at_peak;
    }
    (peak, periods)
}
