#![allow(dead_code)]

use geo::{Coord, LineString};
use gtfs::{DirectionID, Route, RouteID, ServiceID, Stop, StopID, StopTime, Time, Trip, TripID, GTFS};

/// Builds small feeds in code.
pub struct FeedBuilder {
    pub gtfs: GTFS,
}

impl FeedBuilder {
    pub fn new() -> Self {
        Self {
            gtfs: GTFS::empty(),
        }
    }

    pub fn stop(mut self, id: &str, lon: f64, lat: f64) -> Self {
        self.gtfs.stops.insert(
            id.into(),
            Stop {
                stop_id: id.into(),
                name: None,
                pos: Some(Coord { x: lon, y: lat }),
            },
        );
        self
    }

    pub fn stop_without_location(mut self, id: &str) -> Self {
        self.gtfs.stops.insert(
            id.into(),
            Stop {
                stop_id: id.into(),
                name: None,
                pos: None,
            },
        );
        self
    }

    pub fn shape(mut self, id: &str, pts: Vec<(f64, f64)>) -> Self {
        self.gtfs.shapes.insert(id.into(), LineString::from(pts));
        self
    }

    /// A trip stopping at `stops` every 2 minutes from 7am.
    pub fn trip(
        self,
        id: &str,
        route: &str,
        shape: Option<&str>,
        direction: Option<u8>,
        stops: &[&str],
    ) -> Self {
        self.trip_starting_at(id, route, shape, direction, stops, 7 * 3600)
    }

    /// A trip stopping at `stops` every 2 minutes, starting `start` seconds into the day.
    pub fn trip_starting_at(
        mut self,
        id: &str,
        route: &str,
        shape: Option<&str>,
        direction: Option<u8>,
        stops: &[&str],
        start: u32,
    ) -> Self {
        if !self.gtfs.routes.contains_key(&RouteID::new(route)) {
            self.gtfs.routes.insert(
                route.into(),
                Route {
                    route_id: route.into(),
                    agency_id: None,
                    route_type: 3,
                    short_name: Some(route.to_string()),
                    long_name: None,
                },
            );
        }
        self.gtfs.trips.push(Trip {
            trip_id: id.into(),
            route_id: route.into(),
            service_id: ServiceID::new("weekday"),
            shape_id: shape.map(|s| s.into()),
            direction_id: direction.map(|d| DirectionID::new(d).unwrap()),
        });
        let stop_times = stops
            .iter()
            .enumerate()
            .map(|(idx, stop)| {
                let time = Time::from_seconds(start + 120 * idx as u32);
                StopTime {
                    stop_id: StopID::new(*stop),
                    stop_sequence: idx as u32 + 1,
                    arrival_time: Some(time),
                    departure_time: Some(time),
                    pickup_type: None,
                    drop_off_type: None,
                }
            })
            .collect();
        self.gtfs.stop_times.insert(id.into(), stop_times);
        self
    }

    pub fn stop_times_mut(&mut self, trip: &str) -> &mut Vec<StopTime> {
        self.gtfs.stop_times.get_mut(&TripID::new(trip)).unwrap()
    }

    pub fn build(self) -> GTFS {
        self.gtfs
    }
}
