mod common;

use abstutil::Timer;
use approx::assert_relative_eq;
use common::FeedBuilder;
use gtfs::{StopID, TripID, GTFS};
use segments::{build_segments, Config, SegmentPipeline, SegmentsError, SnapFailure};

fn run(gtfs: &GTFS, config: Config) -> segments::Result<segments::PipelineOutput> {
    SegmentPipeline::new(config)?.run(gtfs, &mut Timer::throwaway())
}

fn sequential() -> Config {
    Config {
        parallel: false,
        ..Config::default()
    }
}

fn simple_feed() -> GTFS {
    FeedBuilder::new()
        .stop("A", 0.0, 0.0)
        .stop("B", 0.0, 0.01)
        .shape("s1", vec![(0.0, 0.0), (0.0, 0.01)])
        .trip("t1", "r1", Some("s1"), None, &["A", "B"])
        .build()
}

#[test]
fn simple_trip() {
    let output = build_segments(&simple_feed(), false, None).unwrap();
    assert_eq!(output.segments.len(), 1);

    let segment = &output.segments[0];
    assert_eq!(segment.segment_id.to_string(), "A-B-1");
    assert_eq!(segment.traversals, 1);
    assert_relative_eq!(segment.distance.unwrap(), 1113.0, max_relative = 0.01);
    assert_eq!(segment.traversal_time, Some(120));
    assert_relative_eq!(segment.speed.unwrap(), segment.distance.unwrap() / 120.0);

    assert_eq!(output.diagnostics.total_traversals, 1);
    assert_eq!(output.diagnostics.defective_percentage(), 0.0);
}

#[test]
fn densifying_keeps_lengths() {
    let gtfs = simple_feed();
    let dense = run(&gtfs, sequential()).unwrap();
    let raw = run(
        &gtfs,
        Config {
            densify_spacing: None,
            ..sequential()
        },
    )
    .unwrap();

    assert_eq!(raw.segments[0].geometry.0.len(), 2);
    assert!(dense.segments[0].geometry.0.len() > 200);
    assert_relative_eq!(
        dense.segments[0].distance.unwrap(),
        raw.segments[0].distance.unwrap(),
        epsilon = 0.5
    );
}

#[test]
fn single_stop_trip_fails() {
    let gtfs = FeedBuilder::new()
        .stop("A", 0.0, 0.0)
        .stop("B", 0.0, 0.01)
        .shape("s1", vec![(0.0, 0.0), (0.0, 0.01)])
        .shape("s2", vec![(0.0, 0.01), (0.0, 0.0)])
        .trip("t1", "r1", Some("s1"), None, &["A", "B"])
        .trip("t2", "r1", Some("s2"), None, &["B"])
        .build();
    let output = run(&gtfs, sequential()).unwrap();

    assert_eq!(output.segments.len(), 1);
    assert_eq!(output.segments[0].segment_id.to_string(), "A-B-1");
    assert_eq!(
        output.diagnostics.failed_trips,
        vec![(TripID::new("t2"), SnapFailure::TooFewStops)]
    );
    assert_eq!(output.diagnostics.defective_percentage(), 50.0);
}

#[test]
fn different_paths_between_the_same_stops() {
    let gtfs = FeedBuilder::new()
        .stop("A", 0.0, 0.0)
        .stop("B", 0.0, 0.01)
        .shape("s1", vec![(0.0, 0.0), (0.0, 0.01)])
        .shape("s2", vec![(0.0, 0.0), (0.005, 0.005), (0.0, 0.01)])
        .trip("t1", "r1", Some("s1"), None, &["A", "B"])
        .trip("t2", "r1", Some("s2"), None, &["A", "B"])
        .trip("t3", "r1", Some("s1"), None, &["A", "B"])
        .build();
    let output = run(&gtfs, sequential()).unwrap();

    assert_eq!(output.diagnostics.raw_segments, 2);
    assert_eq!(output.segments.len(), 2);
    let direct = &output.segments[0];
    let detour = &output.segments[1];
    assert_eq!(direct.segment_id.to_string(), "A-B-1");
    assert_eq!(direct.traversals, 2);
    assert_eq!(detour.segment_id.to_string(), "A-B-2");
    assert_eq!(detour.traversals, 1);
    assert!(detour.distance.unwrap() > direct.distance.unwrap() + 100.0);
}

#[test]
fn ambiguous_trip_excluded() {
    let gtfs = FeedBuilder::new()
        .stop("A", 0.0, 0.0)
        .stop("B", 0.17, 2.0)
        .stop("C", 0.0, 3.0)
        .shape(
            "hairpin",
            vec![
                (0.0, 0.0),
                (0.0, 1.0),
                (0.0, 2.0),
                (0.0, 3.0),
                (0.2, 3.0),
                (0.2, 2.1),
                (0.2, 2.0),
                (0.2, 1.9),
                (0.2, 0.0),
            ],
        )
        .shape("straight", vec![(0.0, 0.0), (0.0, 3.0)])
        .trip("bad", "r1", Some("hairpin"), None, &["A", "B", "C"])
        .trip("good", "r2", Some("straight"), None, &["A", "C"])
        .build();

    let narrow = Config {
        k_neighbors: 3,
        max_neighbors: 3,
        densify_spacing: None,
        ..sequential()
    };
    let output = run(&gtfs, narrow).unwrap();
    assert_eq!(
        output.diagnostics.failed_trips,
        vec![(TripID::new("bad"), SnapFailure::Ambiguous)]
    );
    assert_eq!(output.segments.len(), 1);

    // With more room to widen, the hairpin works out
    let wide = Config {
        k_neighbors: 3,
        max_neighbors: 5,
        densify_spacing: None,
        ..sequential()
    };
    let output = run(&gtfs, wide).unwrap();
    assert!(output.diagnostics.failed_trips.is_empty());
    assert_eq!(output.segments.len(), 3);
}

#[test]
fn trims_deadheads_and_skips_unlocated_stops() {
    let mut builder = FeedBuilder::new()
        .stop("depot", 0.0, -0.005)
        .stop("A", 0.0, 0.0)
        .stop_without_location("X")
        .stop("B", 0.0, 0.005)
        .stop("C", 0.0, 0.01)
        .shape("s1", vec![(0.0, -0.005), (0.0, 0.01)])
        .trip("t1", "r1", Some("s1"), None, &["depot", "A", "X", "B", "C"]);
    builder.stop_times_mut("t1")[0].pickup_type = Some(1);
    let output = run(&builder.build(), sequential()).unwrap();

    let ids: Vec<String> = output
        .segments
        .iter()
        .map(|s| s.segment_id.to_string())
        .collect();
    assert_eq!(ids, vec!["A-B-1", "B-C-1"]);
    assert_eq!(output.diagnostics.excluded_stops, vec![StopID::new("X")]);
    // X was skipped, so A to B spans two stop intervals
    assert_eq!(output.segments[0].traversal_time, Some(240));
}

#[test]
fn trips_without_shapes_dropped() {
    let gtfs = FeedBuilder::new()
        .stop("A", 0.0, 0.0)
        .stop("B", 0.0, 0.01)
        .shape("s1", vec![(0.0, 0.0), (0.0, 0.01)])
        .trip("t1", "r1", Some("s1"), None, &["A", "B"])
        .trip("t2", "r1", None, None, &["A", "B"])
        .trip("t3", "r1", Some("gone"), None, &["A", "B"])
        .build();
    let output = run(&gtfs, sequential()).unwrap();
    assert_eq!(
        output.diagnostics.dropped_trips,
        vec![TripID::new("t2"), TripID::new("t3")]
    );
    assert_eq!(output.segments[0].traversals, 1);
}

#[test]
fn max_spacing_filter() {
    let gtfs = FeedBuilder::new()
        .stop("A", 0.0, 0.0)
        .stop("B", 0.0, 0.001)
        .stop("C", 0.0, 0.01)
        .shape("s1", vec![(0.0, 0.0), (0.0, 0.01)])
        .trip("t1", "r1", Some("s1"), None, &["A", "B", "C"])
        .build();
    let output = build_segments(&gtfs, false, Some(500.0)).unwrap();
    assert_eq!(output.segments.len(), 1);
    assert_eq!(output.segments[0].segment_id.to_string(), "A-B-1");

    assert_eq!(
        build_segments(&gtfs, false, Some(10.0)).unwrap_err(),
        SegmentsError::NoSegments { before_filter: 2 }
    );
}

#[test]
fn fatal_conditions() {
    assert_eq!(
        build_segments(&GTFS::empty(), false, None).unwrap_err(),
        SegmentsError::EmptyFeed
    );

    let mut no_trips = simple_feed();
    no_trips.trips.clear();
    assert_eq!(
        build_segments(&no_trips, false, None).unwrap_err(),
        SegmentsError::NoTrips
    );

    let mut no_shapes = simple_feed();
    no_shapes.shapes.clear();
    assert_eq!(
        build_segments(&no_shapes, false, None).unwrap_err(),
        SegmentsError::MissingShapes
    );
}

#[test]
fn parallel_matches_sequential() {
    let mut builder = FeedBuilder::new();
    for i in 0..6 {
        let x = i as f64 * 0.01;
        let stops = [format!("{i}a"), format!("{i}b"), format!("{i}c")];
        let stop_refs: Vec<&str> = stops.iter().map(|s| s.as_str()).collect();
        let shape = format!("s{i}");
        builder = builder
            .stop(&stops[0], x, 0.0)
            .stop(&stops[1], x, 0.004)
            .stop(&stops[2], x + 0.002, 0.008)
            .shape(&shape, vec![(x, 0.0), (x, 0.004), (x + 0.002, 0.008)]);
        for j in 0..=i {
            builder = builder.trip(
                &format!("t{i}-{j}"),
                &format!("r{}", i % 2),
                Some(shape.as_str()),
                Some(0),
                &stop_refs,
            );
        }
    }
    let gtfs = builder.build();

    let parallel = run(&gtfs, Config::default()).unwrap();
    let serial = run(&gtfs, sequential()).unwrap();
    assert_eq!(parallel.segments, serial.segments);
    assert_eq!(parallel.diagnostics, serial.diagnostics);
    assert_eq!(parallel.segments.len(), 12);
    assert_eq!(parallel.diagnostics.total_traversals, 21);

    // No hidden state between runs
    let again = run(&gtfs, sequential()).unwrap();
    assert_eq!(again.segments, serial.segments);
}

#[test]
fn shapes_outside_utm_have_no_length() {
    // Above 84°N, where UTM stops
    let gtfs = FeedBuilder::new()
        .stop("A", 10.0, 85.0)
        .stop("B", 10.0, 85.01)
        .shape("arctic", vec![(10.0, 85.0), (10.0, 85.01)])
        .trip("t1", "r1", Some("arctic"), None, &["A", "B"])
        .build();
    let output = run(&gtfs, sequential()).unwrap();

    assert_eq!(output.diagnostics.undefined_length_groups, 1);
    assert_eq!(output.segments.len(), 1);
    let segment = &output.segments[0];
    assert_eq!(segment.segment_id.to_string(), "A-B-1");
    assert_eq!(segment.distance, None);
    assert_eq!(segment.speed, None);
    assert_eq!(segment.traversal_time, Some(120));

    // Unmeasured segments never pass a spacing limit
    let limited = Config {
        max_spacing: Some(1_000_000.0),
        ..sequential()
    };
    assert_eq!(
        run(&gtfs, limited).unwrap_err(),
        SegmentsError::NoSegments { before_filter: 1 }
    );
}
