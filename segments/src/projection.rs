//! Picks a UTM zone for a place and projects longitude/latitude into it, so lengths come out in
//! meters.

use std::fmt;

use geo::{Coord, LineString};

// WGS84
const EQUATORIAL_RADIUS: f64 = 6_378_137.0;
const FLATTENING: f64 = 1.0 / 298.257_223_563;
const SCALE_FACTOR: f64 = 0.9996;
const FALSE_EASTING: f64 = 500_000.0;
const FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

/// A UTM zone and hemisphere.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UtmZone {
    number: u8,
    north: bool,
}

impl UtmZone {
    /// The zone containing a point, using the Norway and Svalbard exceptions. `None` if the point
    /// isn't finite or lies outside UTM's latitude band of 80°S to 84°N.
    pub fn containing(pt: Coord) -> Option<Self> {
        let (lon, lat) = (pt.x, pt.y);
        if !lon.is_finite() || !lat.is_finite() {
            return None;
        }
        if !(-80.0..=84.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return None;
        }

        let mut number = (((lon + 180.0) / 6.0).floor() as u8 + 1).min(60);
        if (56.0..64.0).contains(&lat) && (3.0..12.0).contains(&lon) {
            number = 32;
        }
        if (72.0..=84.0).contains(&lat) && lon >= 0.0 {
            if lon < 9.0 {
                number = 31;
            } else if lon < 21.0 {
                number = 33;
            } else if lon < 33.0 {
                number = 35;
            } else if lon < 42.0 {
                number = 37;
            }
        }

        Some(Self {
            number,
            north: lat >= 0.0,
        })
    }

    /// The zone for a group of points, decided by the first one. `None` if there are no points.
    pub fn for_points<'a, I: IntoIterator<Item = &'a Coord>>(pts: I) -> Option<Self> {
        pts.into_iter().next().and_then(|pt| Self::containing(*pt))
    }

    pub fn number(self) -> u8 {
        self.number
    }

    pub fn is_north(self) -> bool {
        self.north
    }

    /// The EPSG code of the WGS84 / UTM coordinate system. Southern zones are 100 higher.
    pub fn epsg(self) -> u32 {
        if self.north {
            32600 + self.number as u32
        } else {
            32700 + self.number as u32
        }
    }

    fn central_meridian(self) -> f64 {
        (self.number as f64 - 1.0) * 6.0 - 180.0 + 3.0
    }
}

impl fmt::Display for UtmZone {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "UTM {}{} (EPSG:{})",
            self.number,
            if self.north { "N" } else { "S" },
            self.epsg()
        )
    }
}

/// Transverse Mercator projection into one UTM zone, using the Krüger series (accurate to well
/// under a millimeter inside the zone).
#[derive(Clone, Debug)]
pub struct Projector {
    zone: UtmZone,
    central_meridian: f64,
    rectifying_radius: f64,
    alpha: [f64; 3],
    n_factor: f64,
}

impl Projector {
    pub fn new(zone: UtmZone) -> Self {
        let n = FLATTENING / (2.0 - FLATTENING);
        let n2 = n * n;
        let n3 = n2 * n;
        Self {
            zone,
            central_meridian: zone.central_meridian().to_radians(),
            rectifying_radius: EQUATORIAL_RADIUS / (1.0 + n) * (1.0 + n2 / 4.0 + n2 * n2 / 64.0),
            alpha: [
                n / 2.0 - 2.0 / 3.0 * n2 + 5.0 / 16.0 * n3,
                13.0 / 48.0 * n2 - 3.0 / 5.0 * n3,
                61.0 / 240.0 * n3,
            ],
            n_factor: 2.0 * n.sqrt() / (1.0 + n),
        }
    }

    pub fn zone(&self) -> UtmZone {
        self.zone
    }

    /// Longitude/latitude to (easting, northing) in meters.
    pub fn project(&self, pt: Coord) -> Coord {
        let lat = pt.y.to_radians();
        let dlon = pt.x.to_radians() - self.central_meridian;

        let sin_lat = lat.sin();
        let t = (sin_lat.atanh() - self.n_factor * (self.n_factor * sin_lat).atanh()).sinh();
        let xi = t.atan2(dlon.cos());
        let eta = (dlon.sin() / (1.0 + t * t).sqrt()).atanh();

        let mut easting = eta;
        let mut northing = xi;
        for (j, alpha) in self.alpha.iter().enumerate() {
            let k = 2.0 * (j + 1) as f64;
            easting += alpha * (k * xi).cos() * (k * eta).sinh();
            northing += alpha * (k * xi).sin() * (k * eta).cosh();
        }

        Coord {
            x: FALSE_EASTING + SCALE_FACTOR * self.rectifying_radius * easting,
            y: if self.zone.north { 0.0 } else { FALSE_NORTHING_SOUTH }
                + SCALE_FACTOR * self.rectifying_radius * northing,
        }
    }

    pub fn project_line(&self, line: &LineString) -> LineString {
        line.0.iter().map(|pt| self.project(*pt)).collect()
    }

    /// The planar length in meters of a longitude/latitude path.
    pub fn length(&self, line: &LineString) -> f64 {
        line.0
            .windows(2)
            .map(|pair| {
                let a = self.project(pair[0]);
                let b = self.project(pair[1]);
                (b.x - a.x).hypot(b.y - a.y)
            })
            .sum()
    }
}
