//! Nearest-vertex lookups along one shape.

use geo::Coord;
use rstar::{PointDistance, RTree, RTreeObject, AABB};

/// Meters per degree at the equator. Distances from the index are in degrees; this is a good
/// enough conversion at city scale.
pub const METERS_PER_DEGREE: f64 = 111_320.0;

struct Vertex {
    index: usize,
    pt: [f64; 2],
}

impl RTreeObject for Vertex {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.pt)
    }
}

impl PointDistance for Vertex {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.pt[0] - point[0];
        let dy = self.pt[1] - point[1];
        dx * dx + dy * dy
    }
}

/// One result of a nearest-neighbor query.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Neighbor {
    /// Position in the shape's vertex list
    pub index: usize,
    /// Euclidean distance in degrees
    pub distance: f64,
}

impl Neighbor {
    pub fn distance_meters(&self) -> f64 {
        self.distance * METERS_PER_DEGREE
    }
}

/// Indexes the vertices of one path. Built once, then queried for every stop along the path.
pub struct SpatialIndex {
    tree: RTree<Vertex>,
    len: usize,
}

impl SpatialIndex {
    pub fn new(pts: &[Coord]) -> Self {
        let vertices = pts
            .iter()
            .enumerate()
            .map(|(index, pt)| Vertex {
                index,
                pt: [pt.x, pt.y],
            })
            .collect();
        Self {
            tree: RTree::bulk_load(vertices),
            len: pts.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The `k` vertices nearest to `query`, nearest first. Equally distant vertices are ordered by
    /// index, so results don't depend on the tree's layout. Returns fewer than `k` results if the
    /// path is shorter than that.
    pub fn nearest(&self, query: Coord, k: usize) -> Vec<Neighbor> {
        if k == 0 {
            return Vec::new();
        }
        let query = [query.x, query.y];
        let mut results: Vec<(f64, usize)> = Vec::with_capacity(k + 1);
        for vertex in self.tree.nearest_neighbor_iter(&query) {
            let dist_2 = vertex.distance_2(&query);
            // Keep going past k while there are ties with the k-th result
            if results.len() >= k && results.last().map_or(true, |(d, _)| dist_2 > *d) {
                break;
            }
            results.push((dist_2, vertex.index));
        }
        results.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        results.truncate(k);
        results
            .into_iter()
            .map(|(dist_2, index)| Neighbor {
                index,
                distance: dist_2.sqrt(),
            })
            .collect()
    }
}
