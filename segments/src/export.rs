use std::io::Write;

use anyhow::Result;
use geo::Point;
use geojson::{Feature, FeatureCollection, GeoJson};
use serde::Serialize;
use wkt::ToWkt;

use crate::route_stats::RouteStats;
use crate::segment::Segment;

/// Writes one row per segment. With `geometry`, the path is included as WKT along with the start
/// and end points; without it, just the start and end coordinates, which is much smaller.
pub fn write_csv<W: Write>(segments: &[Segment], writer: W, geometry: bool) -> Result<()> {
    let mut out = csv::Writer::from_writer(writer);
    for segment in segments {
        let start = segment.start();
        let end = segment.end();
        if geometry {
            out.serialize(GeometryRow {
                route_id: segment.route_id.as_str(),
                direction_id: segment.direction_id.map(|d| d.inner()),
                segment_id: segment.segment_id.to_string(),
                stop_id1: segment.stop1().as_str(),
                stop_id2: segment.stop2().as_str(),
                distance: segment.distance,
                traversals: segment.traversals,
                traversal_time: segment.traversal_time,
                speed: segment.speed,
                start_point: start.map(|pt| Point::from(pt).wkt_string()),
                end_point: end.map(|pt| Point::from(pt).wkt_string()),
                geometry: segment.geometry.wkt_string(),
            })?;
        } else {
            out.serialize(SpacingRow {
                route_id: segment.route_id.as_str(),
                direction_id: segment.direction_id.map(|d| d.inner()),
                segment_id: segment.segment_id.to_string(),
                stop_id1: segment.stop1().as_str(),
                stop_id2: segment.stop2().as_str(),
                start_lat: start.map(|pt| pt.y),
                start_lon: start.map(|pt| pt.x),
                end_lat: end.map(|pt| pt.y),
                end_lon: end.map(|pt| pt.x),
                distance: segment.distance,
                traversals: segment.traversals,
            })?;
        }
    }
    out.flush()?;
    Ok(())
}

#[derive(Serialize)]
struct GeometryRow<'a> {
    route_id: &'a str,
    direction_id: Option<u8>,
    segment_id: String,
    stop_id1: &'a str,
    stop_id2: &'a str,
    distance: Option<f64>,
    traversals: usize,
    traversal_time: Option<u32>,
    speed: Option<f64>,
    start_point: Option<String>,
    end_point: Option<String>,
    geometry: String,
}

#[derive(Serialize)]
struct SpacingRow<'a> {
    route_id: &'a str,
    direction_id: Option<u8>,
    segment_id: String,
    stop_id1: &'a str,
    stop_id2: &'a str,
    start_lat: Option<f64>,
    start_lon: Option<f64>,
    end_lat: Option<f64>,
    end_lon: Option<f64>,
    distance: Option<f64>,
    traversals: usize,
}

/// Every segment as a LineString feature, with the other fields as properties.
pub fn to_geojson(segments: &[Segment]) -> GeoJson {
    let mut features = Vec::new();
    for segment in segments {
        let mut feature = Feature {
            bbox: None,
            geometry: Some(geojson::Geometry::new(geojson::Value::from(&segment.geometry))),
            id: None,
            properties: None,
            foreign_members: None,
        };
        feature.set_property("segment_id", segment.segment_id.to_string());
        feature.set_property("route_id", segment.route_id.as_str());
        feature.set_property("direction_id", segment.direction_id.map(|d| d.inner()));
        feature.set_property("stop_id1", segment.stop1().as_str());
        feature.set_property("stop_id2", segment.stop2().as_str());
        feature.set_property("shape_id", segment.shape_id.as_str());
        feature.set_property("traversals", segment.traversals);
        feature.set_property("distance", segment.distance);
        feature.set_property("traversal_time", segment.traversal_time);
        feature.set_property("speed", segment.speed);
        features.push(feature);
    }

    GeoJson::FeatureCollection(FeatureCollection {
        features,
        bbox: None,
        foreign_members: None,
    })
}

pub fn write_geojson<W: Write>(segments: &[Segment], mut writer: W) -> Result<()> {
    let gj = to_geojson(segments);
    writer.write_all(serde_json::to_string_pretty(&gj)?.as_bytes())?;
    Ok(())
}

/// Writes one row per route and direction. Peak periods are listed like `07:00:00-07:04:00`,
/// separated by spaces.
pub fn write_route_stats<W: Write>(stats: &[RouteStats], writer: W) -> Result<()> {
    let mut out = csv::Writer::from_writer(writer);
    for route in stats {
        let peak_periods: Vec<String> = route
            .peak_periods
            .iter()
            .map(|(start, end)| format!("{start}-{end}"))
            .collect();
        out.serialize(RouteStatsRow {
            route_id: route.route_id.as_str(),
            direction_id: route.direction_id.map(|d| d.inner()),
            trips: route.trips,
            shape_id: route.shape_id.as_ref().map(|id| id.as_str()),
            route_length: route.route_length,
            route_time: route.route_time,
            headway: route.headway,
            average_speed: route.average_speed,
            average_active_buses: route.average_active_buses,
            bus_spacing: route.bus_spacing,
            stop_spacing: route.stop_spacing,
            peak_buses: route.peak_buses,
            peak_periods: peak_periods.join(" "),
        })?;
    }
    out.flush()?;
    Ok(())
}

#[derive(Serialize)]
struct RouteStatsRow<'a> {
    route_id: &'a str,
    direction_id: Option<u8>,
    trips: usize,
    shape_id: Option<&'a str>,
    route_length: Option<f64>,
    route_time: Option<u32>,
    headway: Option<f64>,
    average_speed: Option<f64>,
    average_active_buses: Option<f64>,
    bus_spacing: Option<f64>,
    stop_spacing: Option<f64>,
    peak_buses: usize,
    peak_periods: String,
}
