//! Initial triangulation generators.
//!
//! Seeding is pure construction: a generator produces node positions and
//! symmetric adjacency lists. Ring ordering, orientation, geometry, and
//! proximity lists are applied by [`Mesh`](crate::mesh::Mesh) when it adopts
//! the seed.

mod grid;
mod icosphere;

pub use grid::MakePlanarSheet;
pub use icosphere::{node_count, MakeIcosphere};

use std::collections::BTreeSet;

use crate::math::Point3;
use crate::topology::NodeId;

/// Raw output of a seed generator: positions plus mutual adjacency, before
/// any ring ordering or geometry.
#[derive(Debug, Clone, Default)]
pub struct SeedMesh {
    /// Node positions; the index is the node id.
    pub positions: Vec<Point3>,
    /// Symmetric adjacency lists, not yet in ring order.
    pub neighbors: Vec<Vec<NodeId>>,
    /// Ids of frame nodes (planar seeds only).
    pub boundary_ids: BTreeSet<NodeId>,
}

impl SeedMesh {
    fn with_node_count(count: usize) -> Self {
        Self {
            positions: vec![Point3::origin(); count],
            neighbors: vec![Vec::new(); count],
            boundary_ids: BTreeSet::new(),
        }
    }

    /// Number of nodes in the seed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Returns `true` if the seed holds no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Connects two nodes symmetrically; no-op if already connected.
    fn connect(&mut self, a: usize, b: usize) {
        if !self.neighbors[a].contains(&NodeId(b)) {
            self.neighbors[a].push(NodeId(b));
            self.neighbors[b].push(NodeId(a));
        }
    }

    /// Connects the three corners of a triangle pairwise.
    fn connect_triangle(&mut self, corners: [usize; 3]) {
        self.connect(corners[0], corners[1]);
        self.connect(corners[1], corners[2]);
        self.connect(corners[2], corners[0]);
    }
}
