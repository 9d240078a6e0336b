//! Icosahedral subdivision of a sphere.
//!
//! Level `n` places `n` equidistant new nodes on every icosahedron edge and
//! an `n (n - 1) / 2` triangular lattice inside every face, deduplicating
//! the shared corner and edge points, then projects everything onto the
//! sphere of the requested radius around the mass center.

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::{Result, SeedError};
use crate::math::{Point3, TOLERANCE};

use super::SeedMesh;

/// Golden ratio, the building block of the icosahedron corner coordinates.
const PHI: f64 = 1.618_033_988_749_895;

const CORNERS: [[f64; 3]; 12] = [
    [-1.0, PHI, 0.0],
    [1.0, PHI, 0.0],
    [-1.0, -PHI, 0.0],
    [1.0, -PHI, 0.0],
    [0.0, -1.0, PHI],
    [0.0, 1.0, PHI],
    [0.0, -1.0, -PHI],
    [0.0, 1.0, -PHI],
    [PHI, 0.0, -1.0],
    [PHI, 0.0, 1.0],
    [-PHI, 0.0, -1.0],
    [-PHI, 0.0, 1.0],
];

const FACES: [[usize; 3]; 20] = [
    [0, 11, 5],
    [0, 5, 1],
    [0, 1, 7],
    [0, 7, 10],
    [0, 10, 11],
    [1, 5, 9],
    [5, 11, 4],
    [11, 10, 2],
    [10, 7, 6],
    [7, 1, 8],
    [3, 9, 4],
    [3, 4, 2],
    [3, 2, 6],
    [3, 6, 8],
    [3, 8, 9],
    [4, 9, 5],
    [2, 4, 11],
    [6, 2, 10],
    [8, 6, 7],
    [9, 8, 1],
];

/// Node count of a level-`n` subdivision:
/// `12 + 30 n + 20 n (n - 1) / 2`.
#[must_use]
pub fn node_count(subdivisions: usize) -> usize {
    12 + 30 * subdivisions + 20 * subdivisions * subdivisions.saturating_sub(1) / 2
}

/// Builds a spherical seed by subdividing the regular icosahedron.
pub struct MakeIcosphere {
    subdivisions: usize,
    radius: f64,
}

impl MakeIcosphere {
    /// Creates a new `MakeIcosphere` generator.
    #[must_use]
    pub fn new(subdivisions: usize, radius: f64) -> Self {
        Self {
            subdivisions,
            radius,
        }
    }

    /// Executes the subdivision.
    ///
    /// # Errors
    ///
    /// Returns an error if the radius is not positive.
    pub fn execute(&self) -> Result<SeedMesh> {
        if self.radius < TOLERANCE {
            return Err(SeedError::ParameterOutOfRange {
                parameter: "radius",
                value: self.radius,
                min: TOLERANCE,
                max: f64::INFINITY,
            }
            .into());
        }

        let n = self.subdivisions;
        // lattice rows per face; every icosahedron edge splits into m segments
        let m = n + 1;
        let mut seed = SeedMesh::with_node_count(node_count(n));
        for (k, corner) in CORNERS.iter().enumerate() {
            seed.positions[k] = Point3::new(corner[0], corner[1], corner[2]);
        }
        let mut next_id = 12;

        // one id block per icosahedron edge, keyed by the canonical corner
        // pair and ordered from the smaller corner to the larger
        let mut edge_points: BTreeMap<(usize, usize), Vec<usize>> = BTreeMap::new();
        for face in &FACES {
            for k in 0..3 {
                let (u, v) = (face[k], face[(k + 1) % 3]);
                let key = (u.min(v), u.max(v));
                if edge_points.contains_key(&key) {
                    continue;
                }
                let from = seed.positions[key.0];
                let to = seed.positions[key.1];
                let mut ids = Vec::with_capacity(n);
                for i in 1..=n {
                    seed.positions[next_id] = from + (to - from) * (i as f64 / m as f64);
                    ids.push(next_id);
                    next_id += 1;
                }
                edge_points.insert(key, ids);
            }
        }

        for face in &FACES {
            let [corner_a, corner_b, corner_c] = *face;
            let p_a = seed.positions[corner_a];
            let p_b = seed.positions[corner_b];
            let p_c = seed.positions[corner_c];

            // interior lattice points, row by row; row r of the face lattice
            // has r + 1 entries of which r - 1 are interior
            let interior_base = next_id;
            for r in 2..m {
                for c in 1..r {
                    let weight_a = (m - r) as f64;
                    let weight_b = (r - c) as f64;
                    let weight_c = c as f64;
                    seed.positions[next_id] = Point3::from(
                        (p_a.coords * weight_a + p_b.coords * weight_b + p_c.coords * weight_c)
                            / m as f64,
                    );
                    next_id += 1;
                }
            }

            let id_at = |r: usize, c: usize| -> usize {
                if r == 0 {
                    corner_a
                } else if r == m {
                    if c == 0 {
                        corner_b
                    } else if c == m {
                        corner_c
                    } else {
                        edge_id(&edge_points, corner_b, corner_c, c, n)
                    }
                } else if c == 0 {
                    edge_id(&edge_points, corner_a, corner_b, r, n)
                } else if c == r {
                    edge_id(&edge_points, corner_a, corner_c, r, n)
                } else {
                    interior_base + (r - 2) * (r - 1) / 2 + (c - 1)
                }
            };

            for r in 0..m {
                for c in 0..=r {
                    seed.connect_triangle([id_at(r, c), id_at(r + 1, c), id_at(r + 1, c + 1)]);
                    if c < r {
                        seed.connect_triangle([id_at(r, c), id_at(r, c + 1), id_at(r + 1, c + 1)]);
                    }
                }
            }
        }
        debug_assert_eq!(next_id, seed.len());

        project_to_sphere(&mut seed, self.radius);
        debug!(
            nodes = seed.len(),
            subdivisions = n,
            radius = self.radius,
            "seeded icosphere"
        );
        Ok(seed)
    }
}

/// Id of the `index`-th subdivision point along the edge from `from` to
/// `to`, with `index` in `1..=n` measured from `from`.
fn edge_id(
    edge_points: &BTreeMap<(usize, usize), Vec<usize>>,
    from: usize,
    to: usize,
    index: usize,
    n: usize,
) -> usize {
    let key = (from.min(to), from.max(to));
    let ids = &edge_points[&key];
    if from < to {
        ids[index - 1]
    } else {
        ids[n - index]
    }
}

/// Projects every position onto the sphere of the given radius around the
/// mass center.
fn project_to_sphere(seed: &mut SeedMesh, radius: f64) {
    let mut center = nalgebra::Vector3::zeros();
    for p in &seed.positions {
        center += p.coords;
    }
    let center = Point3::from(center / seed.positions.len() as f64);
    for p in &mut seed.positions {
        let diff = *p - center;
        *p = center + diff * (radius / diff.norm());
    }
}
