use std::collections::BTreeMap;

use anyhow::Result;
use geo::{Coord, LineString};
use serde::Deserialize;

use crate::ShapeID;

pub fn load<R: std::io::Read>(reader: R) -> Result<BTreeMap<ShapeID, LineString>> {
    let mut pts_per_shape: BTreeMap<ShapeID, Vec<(u32, Coord)>> = BTreeMap::new();
    for rec in crate::csv_reader(reader).deserialize() {
        let rec: Record = rec?;
        pts_per_shape
            .entry(rec.shape_id)
            .or_insert_with(Vec::new)
            .push((
                rec.shape_pt_sequence,
                Coord {
                    x: rec.shape_pt_lon,
                    y: rec.shape_pt_lat,
                },
            ));
    }

    // Sort by shape_pt_sequence, in case the file isn't in order
    let mut results = BTreeMap::new();
    for (shape_id, mut pts) in pts_per_shape {
        pts.sort_by_key(|(seq, _)| *seq);
        // Consecutive duplicates are kept. They don't break anything downstream, and dropping them
        // would shift vertex indices away from the raw file.
        let pts: Vec<Coord> = pts.into_iter().map(|(_, pt)| pt).collect();
        results.insert(shape_id, LineString::new(pts));
    }
    Ok(results)
}

#[derive(Deserialize)]
struct Record {
    shape_id: ShapeID,
    shape_pt_lat: f64,
    shape_pt_lon: f64,
    shape_pt_sequence: u32,
}
