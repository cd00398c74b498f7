//! Reads the parts of a GTFS feed needed to cut routes into stop-to-stop segments.

#[macro_use]
extern crate anyhow;
#[macro_use]
extern crate log;

mod calendar;
mod ids;
mod routes;
mod shapes;
mod source;
mod stop_times;
mod stops;
mod time;
mod trips;

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use abstutil::{prettyprint_usize, Timer};
use anyhow::Result;
use chrono::NaiveDate;
use geo::LineString;

pub use calendar::{Calendar, DaysOfWeek, Service};
pub use ids::{DirectionID, RouteID, ServiceID, ShapeID, StopID, TripID};
pub use routes::{Route, BUS_ROUTE_TYPES};
pub use source::Source;
pub use stop_times::StopTime;
pub use stops::Stop;
pub use time::{Time, TimeParser};
pub use trips::Trip;

#[derive(Debug)]
pub struct GTFS {
    pub stops: BTreeMap<StopID, Stop>,
    pub routes: BTreeMap<RouteID, Route>,
    /// In the order of trips.txt
    pub trips: Vec<Trip>,
    /// Only shapes referenced by some remaining trip
    pub shapes: BTreeMap<ShapeID, LineString>,
    /// Sorted by stop_sequence
    pub stop_times: BTreeMap<TripID, Vec<StopTime>>,
    pub calendar: Calendar,
    /// Set if the feed was narrowed down to its busiest day
    pub busiest_date: Option<NaiveDate>,
    /// Trips left out because their stop times were unusable, sorted
    pub malformed_trips: Vec<TripID>,
}

/// Which part of a feed to keep while loading.
#[derive(Clone, Debug)]
pub struct FeedFilter {
    /// Only keep routes with a bus route_type
    pub bus_only: bool,
    /// Only keep trips running on the date with the most trips
    pub busiest_day: bool,
    pub agency_id: Option<String>,
    /// When narrowing to the busiest day, services running on this many days or fewer over the
    /// whole calendar are dropped as one-off oddities.
    pub service_threshold: usize,
}

impl Default for FeedFilter {
    fn default() -> Self {
        Self {
            bus_only: true,
            busiest_day: true,
            agency_id: None,
            service_threshold: 1,
        }
    }
}

impl FeedFilter {
    /// Keep everything in the feed.
    pub fn everything() -> Self {
        Self {
            bus_only: false,
            busiest_day: false,
            agency_id: None,
            service_threshold: 0,
        }
    }
}

impl GTFS {
    /// Loads from a zip file or a directory.
    pub fn load<P: AsRef<Path>>(path: P, filter: &FeedFilter, timer: &mut Timer) -> Result<Self> {
        let mut source = Source::open(path)?;
        Self::load_from_source(&mut source, filter, timer)
    }

    pub fn load_from_source(
        source: &mut Source,
        filter: &FeedFilter,
        timer: &mut Timer,
    ) -> Result<Self> {
        timer.start("load GTFS");
        let result = Self::load_inner(source, filter, timer);
        timer.stop("load GTFS");
        result
    }

    fn load_inner(source: &mut Source, filter: &FeedFilter, timer: &mut Timer) -> Result<Self> {
        let mut gtfs = Self::empty();

        timer.start("read files");
        gtfs.stops = in_file("stops.txt", stops::load(&source.read_required("stops.txt")?[..]))?;
        gtfs.routes = in_file(
            "routes.txt",
            routes::load(&source.read_required("routes.txt")?[..]),
        )?;
        gtfs.trips = in_file("trips.txt", trips::load(&source.read_required("trips.txt")?[..]))?;
        let mut times = TimeParser::default();
        let stop_times = in_file(
            "stop_times.txt",
            stop_times::load(&source.read_required("stop_times.txt")?[..], &mut times),
        )?;
        gtfs.stop_times = stop_times.per_trip;
        if !stop_times.malformed_trips.is_empty() {
            warn!(
                "Skipped {} trips with contradictory stop times",
                prettyprint_usize(stop_times.malformed_trips.len())
            );
            let malformed = &stop_times.malformed_trips;
            gtfs.trips.retain(|trip| !malformed.contains(&trip.trip_id));
        }
        gtfs.malformed_trips = stop_times.malformed_trips.into_iter().collect();
        if let Some(bytes) = source.read("shapes.txt")? {
            gtfs.shapes = in_file("shapes.txt", shapes::load(&bytes[..]))?;
        }
        if let Some(bytes) = source.read("calendar.txt")? {
            gtfs.calendar = in_file("calendar.txt", calendar::load(&bytes[..]))?;
        }
        if let Some(bytes) = source.read("calendar_dates.txt")? {
            in_file(
                "calendar_dates.txt",
                calendar::load_exceptions(&mut gtfs.calendar, &bytes[..]),
            )?;
        }
        timer.stop("read files");

        let all_trip_ids: BTreeSet<&TripID> = gtfs.trips.iter().map(|t| &t.trip_id).collect();
        let unknown: Vec<&TripID> = gtfs
            .stop_times
            .keys()
            .filter(|id| !all_trip_ids.contains(id))
            .collect();
        if !unknown.is_empty() {
            warn!(
                "Stop times defined for {} unknown trips, like {:?}",
                unknown.len(),
                unknown[0]
            );
        }

        gtfs.apply_filter(filter);

        info!(
            "Loaded {} routes, {} trips, {} shapes, {} stops",
            prettyprint_usize(gtfs.routes.len()),
            prettyprint_usize(gtfs.trips.len()),
            prettyprint_usize(gtfs.shapes.len()),
            prettyprint_usize(gtfs.stops.len())
        );
        Ok(gtfs)
    }

    fn apply_filter(&mut self, filter: &FeedFilter) {
        if filter.bus_only {
            self.routes.retain(|_, route| route.is_bus());
        }
        if let Some(ref agency_id) = filter.agency_id {
            // Single-agency feeds may leave agency_id blank
            self.routes.retain(|_, route| {
                route
                    .agency_id
                    .as_ref()
                    .map_or(true, |x| x == agency_id)
            });
        }
        let routes = &self.routes;
        self.trips.retain(|trip| routes.contains_key(&trip.route_id));

        if filter.busiest_day && !self.calendar.is_empty() {
            if let Some((date, services)) = self.calendar.busiest_date(&self.trips) {
                let mut keep = BTreeSet::new();
                let mut removed = Vec::new();
                for service_id in services {
                    let days = self.calendar.services[&service_id].count_active_days();
                    if days > filter.service_threshold {
                        keep.insert(service_id);
                    } else {
                        removed.push(service_id);
                    }
                }
                if !removed.is_empty() {
                    info!("Services eliminated due to low frequency: {:?}", removed);
                }
                info!("Busiest day is {date}, with {} services", keep.len());
                self.trips.retain(|trip| keep.contains(&trip.service_id));
                self.busiest_date = Some(date);
            }
        }

        let trip_ids: BTreeSet<TripID> = self.trips.iter().map(|t| t.trip_id.clone()).collect();
        self.stop_times.retain(|id, _| trip_ids.contains(id));
        let shape_ids: BTreeSet<&ShapeID> =
            self.trips.iter().flat_map(|t| t.shape_id.as_ref()).collect();
        self.shapes.retain(|id, _| shape_ids.contains(id));
    }

    pub fn empty() -> Self {
        Self {
            stops: BTreeMap::new(),
            routes: BTreeMap::new(),
            trips: Vec::new(),
            shapes: BTreeMap::new(),
            stop_times: BTreeMap::new(),
            calendar: Calendar::default(),
            busiest_date: None,
            malformed_trips: Vec::new(),
        }
    }

    /// The stop times of a trip, or nothing if it has none.
    pub fn stop_times_for(&self, trip_id: &TripID) -> &[StopTime] {
        self.stop_times
            .get(trip_id)
            .map(|x| x.as_slice())
            .unwrap_or(&[])
    }
}

// Adds the file name in the error message
fn in_file<T>(name: &str, result: Result<T>) -> Result<T> {
    result.map_err(|err| anyhow!("{name}: {err}"))
}

pub(crate) fn csv_reader<R: std::io::Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader)
}
