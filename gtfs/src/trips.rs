use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::{DirectionID, RouteID, ServiceID, ShapeID, TripID};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Trip {
    pub trip_id: TripID,
    pub route_id: RouteID,
    pub service_id: ServiceID,
    /// Optional in GTFS; trips without one can't be cut into segments.
    pub shape_id: Option<ShapeID>,
    /// Optional column, and even when present it may be blank for some rows.
    pub direction_id: Option<DirectionID>,
}

pub fn load<R: std::io::Read>(reader: R) -> Result<Vec<Trip>> {
    let mut trips = Vec::new();
    for rec in crate::csv_reader(reader).deserialize() {
        let rec: Record = rec?;
        let direction_id = match rec.direction_id.map(DirectionID::new) {
            Some(Ok(x)) => Some(x),
            Some(Err(err)) => {
                warn!("Trip {} has no direction: {err}", rec.trip_id);
                None
            }
            None => None,
        };
        let shape_id = rec.shape_id.filter(|id| !id.as_str().is_empty());
        trips.push(Trip {
            trip_id: rec.trip_id,
            route_id: rec.route_id,
            service_id: rec.service_id,
            shape_id,
            direction_id,
        });
    }
    Ok(trips)
}

#[derive(Deserialize)]
struct Record {
    trip_id: TripID,
    route_id: RouteID,
    service_id: ServiceID,
    #[serde(default)]
    direction_id: Option<u8>,
    #[serde(default)]
    shape_id: Option<ShapeID>,
}
