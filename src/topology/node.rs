use std::fmt;

use serde::{Deserialize, Serialize};

use crate::math::{Point3, Vector3};

/// Dense index of a node in a [`NodeStore`](super::NodeStore).
///
/// Ids are assigned at seeding time and stay dense in `[0, N)` for the
/// lifetime of the mesh; local updates never create or destroy nodes.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub usize);

impl NodeId {
    /// Sentinel for "no such node".
    ///
    /// Deliberately not zero (a valid id): indexing a store with `NONE`
    /// panics immediately, so a poisoned field surfaces at its first use
    /// instead of silently aliasing node 0.
    pub const NONE: NodeId = NodeId(i64::MAX as usize);

    /// Returns `true` if this id is the [`NodeId::NONE`] sentinel.
    #[must_use]
    pub fn is_none(self) -> bool {
        self == Self::NONE
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "NodeId(NONE)")
        } else {
            write!(f, "NodeId({})", self.0)
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-vertex record of the triangulation.
///
/// A `Node` is plain data: it stores its position, the cyclically ordered
/// ring of neighbor ids, the cached edge vector to each ring neighbor, the
/// node-associated geometry scalars, and the proximity list. It does not
/// police the coherence of what it holds; [`Mesh`](crate::mesh::Mesh) is
/// responsible for keeping rings symmetric and edges in sync with positions.
/// The one guarantee made here is that `neighbor_ids` and `neighbor_edges`
/// are always inserted into and removed from together.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) position: Point3,
    pub(crate) area: f64,
    pub(crate) volume: f64,
    pub(crate) bending_energy_unit: f64,
    pub(crate) curvature_vec: Vector3,
    pub(crate) neighbor_ids: Vec<NodeId>,
    pub(crate) neighbor_edges: Vec<Vector3>,
    pub(crate) proximity_ids: Vec<NodeId>,
}

impl Node {
    /// Creates a node at `position` with no neighbors and zeroed geometry.
    #[must_use]
    pub fn new(id: NodeId, position: Point3) -> Self {
        Self {
            id,
            position,
            area: 0.0,
            volume: 0.0,
            bending_energy_unit: 0.0,
            curvature_vec: Vector3::zeros(),
            neighbor_ids: Vec::new(),
            neighbor_edges: Vec::new(),
            proximity_ids: Vec::new(),
        }
    }

    /// Stable id of this node.
    #[must_use]
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Lab-frame position.
    #[must_use]
    pub fn position(&self) -> &Point3 {
        &self.position
    }

    /// Voronoi-like area associated with this node.
    #[must_use]
    pub fn area(&self) -> f64 {
        self.area
    }

    /// Signed tetrahedral volume contribution of this node's cell,
    /// relative to the lab origin.
    ///
    /// Only the sum over a closed surface has a physical interpretation.
    #[must_use]
    pub fn volume(&self) -> f64 {
        self.volume
    }

    /// Bending energy density `|K|^2 * A / 2` of this node, where `K` is the
    /// discrete mean-curvature vector: the Canham-Helfrich integrand with
    /// bending rigidity 1 and zero Gaussian stiffness.
    #[must_use]
    pub fn bending_energy_unit(&self) -> f64 {
        self.bending_energy_unit
    }

    /// Discrete mean-curvature vector.
    #[must_use]
    pub fn curvature_vec(&self) -> &Vector3 {
        &self.curvature_vec
    }

    /// Cyclically ordered ring of neighbor ids.
    ///
    /// Consecutive entries (with wraparound) are themselves mutually
    /// adjacent, so each consecutive pair closes a triangle with this node.
    #[must_use]
    pub fn neighbor_ids(&self) -> &[NodeId] {
        &self.neighbor_ids
    }

    /// Cached edge vectors from this node to each ring neighbor, in ring
    /// order.
    #[must_use]
    pub fn neighbor_edges(&self) -> &[Vector3] {
        &self.neighbor_edges
    }

    /// Ids of nodes currently within the proximity cutoff.
    #[must_use]
    pub fn proximity_ids(&self) -> &[NodeId] {
        &self.proximity_ids
    }

    /// Number of ring neighbors.
    #[must_use]
    pub fn degree(&self) -> usize {
        self.neighbor_ids.len()
    }

    /// Ring position of `neighbor_id`, if it is a neighbor.
    #[must_use]
    pub fn ring_index_of(&self, neighbor_id: NodeId) -> Option<usize> {
        self.neighbor_ids.iter().position(|&id| id == neighbor_id)
    }

    /// Cached edge vector to the given ring neighbor.
    ///
    /// # Panics
    ///
    /// Panics if `neighbor_id` is not a ring neighbor of this node. Asking
    /// for the edge to a non-neighbor is a programmer error, not a
    /// recoverable condition.
    #[must_use]
    pub fn edge_to(&self, neighbor_id: NodeId) -> &Vector3 {
        match self.ring_index_of(neighbor_id) {
            Some(k) => &self.neighbor_edges[k],
            None => panic!("node {neighbor_id} is not a ring neighbor of node {}", self.id),
        }
    }

    /// Inserts `neighbor_id` with its edge vector before ring position
    /// `ring_index`, keeping the id and edge arrays in lockstep.
    ///
    /// # Panics
    ///
    /// Panics if `ring_index` is past the end of the ring.
    pub(crate) fn insert_neighbor(&mut self, ring_index: usize, neighbor_id: NodeId, edge: Vector3) {
        self.neighbor_ids.insert(ring_index, neighbor_id);
        self.neighbor_edges.insert(ring_index, edge);
    }

    /// Removes `neighbor_id` and its edge vector from the ring; no-op if it
    /// is not a neighbor.
    pub(crate) fn remove_neighbor(&mut self, neighbor_id: NodeId) {
        if let Some(k) = self.ring_index_of(neighbor_id) {
            self.neighbor_ids.remove(k);
            self.neighbor_edges.remove(k);
        }
    }
}
