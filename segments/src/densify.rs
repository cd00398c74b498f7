use geo::{Coord, Distance, Geodesic, LineString, Point};

/// The geodesic distance in meters between two longitude/latitude points.
pub fn geodesic_distance(a: Coord, b: Coord) -> f64 {
    Geodesic.distance(Point::from(a), Point::from(b))
}

/// The geodesic length in meters of a longitude/latitude path.
pub fn geodesic_length(line: &LineString) -> f64 {
    line.0
        .windows(2)
        .map(|pair| geodesic_distance(pair[0], pair[1]))
        .sum()
}

/// Returns a copy of the path where no two consecutive vertices are more than `max_spacing`
/// meters apart. Every input vertex is kept; new ones are interpolated linearly in
/// longitude/latitude, which is close enough to the geodesic over a few meters.
pub fn densify(line: &LineString, max_spacing: f64) -> LineString {
    let pts = &line.0;
    let mut result = Vec::with_capacity(pts.len());
    for pair in pts.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        result.push(a);
        let dist = geodesic_distance(a, b);
        if !(dist > max_spacing) {
            continue;
        }
        let pieces = (dist / max_spacing).ceil() as usize;
        for j in 1..pieces {
            let frac = j as f64 / pieces as f64;
            result.push(Coord {
                x: a.x + (b.x - a.x) * frac,
                y: a.y + (b.y - a.y) * frac,
            });
        }
    }
    if let Some(last) = pts.last() {
        result.push(*last);
    }
    LineString::new(result)
}
