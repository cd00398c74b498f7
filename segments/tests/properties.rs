//! Checks that should hold for any feed, over randomly generated routes.

mod common;

use std::collections::{BTreeMap, BTreeSet};

use abstutil::Timer;
use common::FeedBuilder;
use geo::{Coord, LineString};
use gtfs::{RouteID, ShapeID, StopID, GTFS};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use segments::{
    canonicalize, densify, geodesic_length, snap_stops, Config, Projector, SegmentPipeline,
    SnapConfig, UtmZone,
};

// A wandering path near Seattle, with vertices 10-60m apart
fn random_path(rng: &mut StdRng, start: Coord, len: usize) -> Vec<Coord> {
    let mut pts = vec![start];
    let mut heading: f64 = rng.random_range(0.0..std::f64::consts::TAU);
    for _ in 1..len {
        heading += rng.random_range(-0.5..0.5);
        let step = rng.random_range(0.0001..0.0005);
        let last = pts[pts.len() - 1];
        pts.push(Coord {
            x: last.x + step * heading.cos(),
            y: last.y + step * heading.sin(),
        });
    }
    pts
}

// Stops near increasing vertices of the path, a few meters off
fn random_stops(rng: &mut StdRng, path: &[Coord], count: usize) -> Vec<Coord> {
    let mut picks: BTreeSet<usize> = BTreeSet::new();
    picks.insert(0);
    picks.insert(path.len() - 1);
    while picks.len() < count {
        picks.insert(rng.random_range(1..path.len() - 1));
    }
    picks
        .into_iter()
        .map(|idx| Coord {
            x: path[idx].x + rng.random_range(-0.00003..0.00003),
            y: path[idx].y + rng.random_range(-0.00003..0.00003),
        })
        .collect()
}

fn seattle(rng: &mut StdRng) -> Coord {
    Coord {
        x: -122.33 + rng.random_range(-0.02..0.02),
        y: 47.6 + rng.random_range(-0.02..0.02),
    }
}

#[test]
fn accepted_snaps_are_increasing() {
    let mut rng = StdRng::seed_from_u64(42);
    let mut accepted = 0;
    for _ in 0..200 {
        let start = seattle(&mut rng);
        let len = rng.random_range(5..80);
        let path = random_path(&mut rng, start, len);
        let count = rng.random_range(2..len.min(12));
        let stops = random_stops(&mut rng, &path, count);

        let dense = densify(&LineString::new(path), 5.0);
        if let Ok(snapped) = snap_stops(&dense.0, &stops, &SnapConfig::default()) {
            accepted += 1;
            assert_eq!(snapped.indices.len(), stops.len());
            for pair in snapped.indices.windows(2) {
                assert!(pair[0] < pair[1], "{:?}", snapped.indices);
            }
        }
    }
    // The generated stops really are along the path, so most trips should work out
    assert!(accepted > 100, "only {accepted} trips snapped");
}

#[test]
fn densifying_keeps_vertices_and_length() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..50 {
        let start = seattle(&mut rng);
        let path = LineString::new(random_path(&mut rng, start, 30));
        let spacing = rng.random_range(2.0..20.0);
        let dense = densify(&path, spacing);

        let mut from = 0;
        for pt in &path.0 {
            let offset = dense.0[from..].iter().position(|x| x == pt).unwrap();
            from += offset + 1;
        }
        let before = geodesic_length(&path);
        let after = geodesic_length(&dense);
        assert!((before - after).abs() < 0.01 + before * 1e-6);
    }
}

struct RandomFeed {
    gtfs: GTFS,
    // Per shape: the route and the number of trips
    trips_per_shape: BTreeMap<ShapeID, (RouteID, usize)>,
    stops_per_shape: BTreeMap<ShapeID, Vec<StopID>>,
}

fn random_feed(seed: u64) -> RandomFeed {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut builder = FeedBuilder::new();
    let mut trips_per_shape = BTreeMap::new();
    let mut stops_per_shape = BTreeMap::new();

    for shape_idx in 0..8 {
        let shape_id = format!("shape{shape_idx}");
        let route_id = format!("route{}", shape_idx % 3);
        let start = seattle(&mut rng);
        let path = random_path(&mut rng, start, 40);
        let count = rng.random_range(2..8);
        let stop_pts = random_stops(&mut rng, &path, count);

        let stop_ids: Vec<String> = (0..stop_pts.len())
            .map(|i| format!("{shape_id}-stop{i}"))
            .collect();
        for (id, pt) in stop_ids.iter().zip(&stop_pts) {
            builder = builder.stop(id, pt.x, pt.y);
        }
        builder = builder.shape(&shape_id, path.iter().map(|pt| (pt.x, pt.y)).collect());

        let refs: Vec<&str> = stop_ids.iter().map(|s| s.as_str()).collect();
        let num_trips = rng.random_range(1..5);
        for trip_idx in 0..num_trips {
            builder = builder.trip(
                &format!("{shape_id}-trip{trip_idx}"),
                &route_id,
                Some(shape_id.as_str()),
                None,
                &refs,
            );
        }
        trips_per_shape.insert(
            ShapeID::new(shape_id.clone()),
            (RouteID::new(route_id), num_trips),
        );
        stops_per_shape.insert(
            ShapeID::new(shape_id),
            stop_ids.into_iter().map(StopID::new).collect(),
        );
    }

    RandomFeed {
        gtfs: builder.build(),
        trips_per_shape,
        stops_per_shape,
    }
}

fn run(gtfs: &GTFS) -> segments::PipelineOutput {
    let config = Config {
        parallel: false,
        ..Config::default()
    };
    SegmentPipeline::new(config)
        .unwrap()
        .run(gtfs, &mut Timer::throwaway())
        .unwrap()
}

#[test]
fn lengths_match_geometry() {
    for seed in 0..5 {
        let feed = random_feed(seed);
        let output = run(&feed.gtfs);
        for segment in &output.segments {
            let distance = segment.distance.unwrap();
            assert!(distance >= 0.0);
            let projector = Projector::new(UtmZone::containing(segment.start().unwrap()).unwrap());
            assert!((projector.length(&segment.geometry) - distance).abs() <= 0.01);
        }
    }
}

#[test]
fn traversals_conserved() {
    for seed in 10..15 {
        let feed = random_feed(seed);
        let output = run(&feed.gtfs);

        let failed_shapes: BTreeSet<ShapeID> = output
            .diagnostics
            .failed_trips
            .iter()
            .filter_map(|(trip_id, _)| {
                feed.gtfs
                    .trips
                    .iter()
                    .find(|t| &t.trip_id == trip_id)
                    .and_then(|t| t.shape_id.clone())
            })
            .collect();

        let mut expected: BTreeMap<(RouteID, StopID, StopID), usize> = BTreeMap::new();
        for (shape_id, (route_id, trips)) in &feed.trips_per_shape {
            if failed_shapes.contains(shape_id) {
                continue;
            }
            for pair in feed.stops_per_shape[shape_id].windows(2) {
                *expected
                    .entry((route_id.clone(), pair[0].clone(), pair[1].clone()))
                    .or_insert(0) += trips;
            }
        }

        let mut actual: BTreeMap<(RouteID, StopID, StopID), usize> = BTreeMap::new();
        for segment in &output.segments {
            *actual
                .entry((
                    segment.route_id.clone(),
                    segment.stop1().clone(),
                    segment.stop2().clone(),
                ))
                .or_insert(0) += segment.traversals;
        }
        assert_eq!(expected, actual);
    }
}

#[test]
fn canonicalizing_twice_changes_nothing() {
    let feed = random_feed(99);
    let output = run(&feed.gtfs);
    let again = canonicalize(output.segments.clone(), Config::default().min_traversals);
    assert_eq!(again, output.segments);
}
