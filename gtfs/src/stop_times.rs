use std::collections::{BTreeMap, BTreeSet};

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::time::TimeParser;
use crate::{StopID, Time, TripID};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StopTime {
    pub stop_id: StopID,
    pub stop_sequence: u32,
    /// Only timepoints are required to have times; the rest may be blank.
    pub arrival_time: Option<Time>,
    pub departure_time: Option<Time>,
    /// 1 means no pickup is available here
    pub pickup_type: Option<u8>,
    /// 1 means no drop off is available here
    pub drop_off_type: Option<u8>,
}

impl StopTime {
    pub fn no_pickup(&self) -> bool {
        self.pickup_type == Some(1)
    }

    pub fn no_drop_off(&self) -> bool {
        self.drop_off_type == Some(1)
    }
}

/// Stop times per trip, sorted by stop_sequence, plus the trips whose rows contradict each other.
/// Those trips are left out entirely.
pub struct StopTimes {
    pub per_trip: BTreeMap<TripID, Vec<StopTime>>,
    pub malformed_trips: BTreeSet<TripID>,
}

pub fn load<R: std::io::Read>(reader: R, times: &mut TimeParser) -> Result<StopTimes> {
    let mut per_trip: BTreeMap<TripID, Vec<StopTime>> = BTreeMap::new();
    let mut malformed_trips = BTreeSet::new();
    for rec in crate::csv_reader(reader).deserialize() {
        let rec: Record = rec?;
        if malformed_trips.contains(&rec.trip_id) {
            continue;
        }
        let parsed = parse_optional(times, rec.arrival_time).and_then(|arrival| {
            parse_optional(times, rec.departure_time).map(|departure| (arrival, departure))
        });
        let (arrival_time, departure_time) = match parsed {
            Ok(x) => x,
            Err(err) => {
                warn!("Skipping trip {}: {err}", rec.trip_id);
                malformed_trips.insert(rec.trip_id);
                continue;
            }
        };
        if let (Some(arrival), Some(departure)) = (arrival_time, departure_time) {
            if arrival > departure {
                warn!(
                    "Skipping trip {}: arrival time {arrival} is after departure time {departure}",
                    rec.trip_id
                );
                malformed_trips.insert(rec.trip_id);
                continue;
            }
        }
        per_trip
            .entry(rec.trip_id)
            .or_insert_with(Vec::new)
            .push(StopTime {
                stop_id: rec.stop_id,
                stop_sequence: rec.stop_sequence,
                arrival_time,
                departure_time,
                pickup_type: rec.pickup_type,
                drop_off_type: rec.drop_off_type,
            });
    }

    // Sort by stop_sequence, in case the file isn't in order
    for (trip_id, stops) in &mut per_trip {
        stops.sort_by_key(|st| st.stop_sequence);
        if let Some(pair) = stops
            .windows(2)
            .find(|pair| pair[0].stop_sequence == pair[1].stop_sequence)
        {
            warn!(
                "Skipping trip {trip_id}: stop_sequence {} appears twice",
                pair[0].stop_sequence
            );
            malformed_trips.insert(trip_id.clone());
        }
    }
    per_trip.retain(|trip_id, _| !malformed_trips.contains(trip_id));

    Ok(StopTimes {
        per_trip,
        malformed_trips,
    })
}

fn parse_optional(times: &mut TimeParser, raw: Option<String>) -> Result<Option<Time>> {
    match raw {
        Some(raw) if !raw.trim().is_empty() => Ok(Some(times.parse(&raw)?)),
        _ => Ok(None),
    }
}

#[derive(Deserialize)]
struct Record {
    trip_id: TripID,
    stop_id: StopID,
    stop_sequence: u32,
    #[serde(default)]
    arrival_time: Option<String>,
    #[serde(default)]
    departure_time: Option<String>,
    #[serde(default)]
    pickup_type: Option<u8>,
    #[serde(default)]
    drop_off_type: Option<u8>,
}
