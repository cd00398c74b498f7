use std::collections::BTreeMap;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::RouteID;

/// Basic bus (3) plus the extended bus types, except 701 (regional bus).
pub const BUS_ROUTE_TYPES: [u16; 6] = [3, 700, 702, 703, 704, 705];

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Route {
    pub route_id: RouteID,
    pub agency_id: Option<String>,
    pub route_type: u16,
    pub short_name: Option<String>,
    pub long_name: Option<String>,
}

impl Route {
    pub fn is_bus(&self) -> bool {
        BUS_ROUTE_TYPES.contains(&self.route_type)
    }

    pub fn describe(&self) -> String {
        self.short_name
            .as_ref()
            .or(self.long_name.as_ref())
            .map(|x| x.to_string())
            .unwrap_or_else(|| self.route_id.to_string())
    }
}

pub fn load<R: std::io::Read>(reader: R) -> Result<BTreeMap<RouteID, Route>> {
    let mut routes = BTreeMap::new();
    for rec in crate::csv_reader(reader).deserialize() {
        let rec: Record = rec?;
        if routes.contains_key(&rec.route_id) {
            bail!("Duplicate {:?}", rec.route_id);
        }
        routes.insert(
            rec.route_id.clone(),
            Route {
                route_id: rec.route_id,
                agency_id: rec.agency_id.filter(|x| !x.is_empty()),
                route_type: rec.route_type,
                short_name: rec.route_short_name.filter(|x| !x.is_empty()),
                long_name: rec.route_long_name.filter(|x| !x.is_empty()),
            },
        );
    }
    Ok(routes)
}

#[derive(Deserialize)]
struct Record {
    route_id: RouteID,
    #[serde(default)]
    agency_id: Option<String>,
    route_type: u16,
    #[serde(default)]
    route_short_name: Option<String>,
    #[serde(default)]
    route_long_name: Option<String>,
}
