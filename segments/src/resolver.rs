use std::collections::BTreeMap;

use geo::LineString;
use gtfs::{DirectionID, RouteID, ShapeID, Trip, TripID};

/// How trips are folded together. `direction_id` is an optional column and is often only filled
/// in for some trips, so it's only part of the key when every trip has one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GroupingKey {
    RouteShape,
    RouteShapeDirection,
}

impl GroupingKey {
    pub fn for_trips(trips: &[Trip]) -> Self {
        if !trips.is_empty() && trips.iter().all(|t| t.direction_id.is_some()) {
            GroupingKey::RouteShapeDirection
        } else {
            GroupingKey::RouteShape
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct GroupID {
    route_id: RouteID,
    shape_id: ShapeID,
    direction_id: Option<DirectionID>,
}

/// All trips of one route following the same shape (and direction, if known). Every trip in the
/// group serves the same stops along the same path, so one of them stands in for the rest.
#[derive(Clone, Debug)]
pub struct RouteShapeGroup<'a> {
    pub route_id: RouteID,
    pub shape_id: ShapeID,
    /// The representative's direction
    pub direction_id: Option<DirectionID>,
    /// The first trip of the group, in feed order
    pub representative: &'a Trip,
    pub shape: &'a LineString,
    /// How many trips were folded in. At least 1.
    pub traversals: usize,
}

pub struct Resolved<'a> {
    pub key: GroupingKey,
    /// Sorted by route, shape, and direction
    pub groups: Vec<RouteShapeGroup<'a>>,
    /// Trips with no shape_id, or one that isn't in the shapes table
    pub dropped_trips: Vec<TripID>,
}

impl<'a> Resolved<'a> {
    pub fn total_traversals(&self) -> usize {
        self.groups.iter().map(|g| g.traversals).sum()
    }
}

pub fn resolve<'a>(trips: &'a [Trip], shapes: &'a BTreeMap<ShapeID, LineString>) -> Resolved<'a> {
    let key = GroupingKey::for_trips(trips);
    let mut dropped_trips = Vec::new();
    let mut groups: BTreeMap<GroupID, RouteShapeGroup<'a>> = BTreeMap::new();

    for trip in trips {
        let (shape_id, shape) = match trip
            .shape_id
            .as_ref()
            .and_then(|id| shapes.get_key_value(id))
        {
            Some(pair) => pair,
            None => {
                dropped_trips.push(trip.trip_id.clone());
                continue;
            }
        };

        let id = GroupID {
            route_id: trip.route_id.clone(),
            shape_id: shape_id.clone(),
            direction_id: match key {
                GroupingKey::RouteShape => None,
                GroupingKey::RouteShapeDirection => trip.direction_id,
            },
        };
        groups
            .entry(id)
            .or_insert_with(|| RouteShapeGroup {
                route_id: trip.route_id.clone(),
                shape_id: shape_id.clone(),
                direction_id: trip.direction_id,
                representative: trip,
                shape,
                traversals: 0,
            })
            .traversals += 1;
    }

    dropped_trips.sort();
    if !dropped_trips.is_empty() {
        warn!(
            "{} trips have a missing or unknown shape_id and were dropped",
            dropped_trips.len()
        );
    }

    Resolved {
        key,
        groups: groups.into_values().collect(),
        dropped_trips,
    }
}
