//! Planar rectangular sheet triangulation.
//!
//! An `n_x` by `n_y` grid of nodes spans `l_x` by `l_y`; every grid cell is
//! split into two triangles, with the diagonal direction alternating row by
//! row so that every bulk node ends up with exactly six neighbors. The
//! outer frame is reported as the boundary set.

use tracing::debug;

use crate::error::{Result, SeedError};
use crate::math::{Point3, TOLERANCE};
use crate::topology::NodeId;

use super::SeedMesh;

/// Builds a planar sheet seed.
pub struct MakePlanarSheet {
    n_x: usize,
    n_y: usize,
    l_x: f64,
    l_y: f64,
}

impl MakePlanarSheet {
    /// Creates a new `MakePlanarSheet` generator.
    #[must_use]
    pub fn new(n_x: usize, n_y: usize, l_x: f64, l_y: f64) -> Self {
        Self { n_x, n_y, l_x, l_y }
    }

    /// Executes the grid construction.
    ///
    /// # Errors
    ///
    /// Returns an error if either side has fewer than 2 nodes or a
    /// non-positive length.
    pub fn execute(&self) -> Result<SeedMesh> {
        if self.n_x < 2 || self.n_y < 2 {
            return Err(SeedError::GridTooSmall {
                n_x: self.n_x,
                n_y: self.n_y,
            }
            .into());
        }
        for (parameter, value) in [("l_x", self.l_x), ("l_y", self.l_y)] {
            if value < TOLERANCE {
                return Err(SeedError::ParameterOutOfRange {
                    parameter,
                    value,
                    min: TOLERANCE,
                    max: f64::INFINITY,
                }
                .into());
            }
        }

        let (n_x, n_y) = (self.n_x, self.n_y);
        let mut seed = SeedMesh::with_node_count(n_x * n_y);
        for i in 0..n_y {
            for j in 0..n_x {
                let id = i * n_x + j;
                seed.positions[id] = Point3::new(
                    j as f64 * self.l_x / n_x as f64,
                    i as f64 * self.l_y / n_y as f64,
                    0.0,
                );
                if i == 0 || j == 0 || i == n_y - 1 || j == n_x - 1 {
                    seed.boundary_ids.insert(NodeId(id));
                }
            }
        }

        for i in 0..n_y - 1 {
            for j in 0..n_x - 1 {
                let sw = i * n_x + j;
                let se = sw + 1;
                let nw = sw + n_x;
                let ne = nw + 1;
                if i % 2 == 0 {
                    // diagonal from the south-west to the north-east corner
                    seed.connect_triangle([sw, nw, ne]);
                    seed.connect_triangle([sw, ne, se]);
                } else {
                    // diagonal from the north-west to the south-east corner
                    seed.connect_triangle([sw, nw, se]);
                    seed.connect_triangle([nw, ne, se]);
                }
            }
        }
        debug!(n_x, n_y, "seeded planar sheet");
        Ok(seed)
    }
}
