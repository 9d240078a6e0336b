//! Edge-flip protocol: the checked flip with its topological guards, the
//! trusted unflip, and the raw four-node rewrite they share.
//!
//! A flip transfers the edge of an adjacent pair `(a, b)` to their two
//! common neighbors:
//!
//! ```text
//!  before the flip              after the flip
//!
//!      c_next                       c_next
//!     /      \                     /   |  \
//!    a ------ b                   a    |   b
//!     \      /                     \   |  /
//!      c_prev                       c_prev
//! ```

use crate::topology::NodeId;

use super::{Mesh, MeshKind};

/// Minimum ring degree of a bulk node. A node may only donate an edge if it
/// has strictly more than this many neighbors, so no flip ever pushes a
/// degree below the floor.
pub const MIN_DEGREE: usize = 5;

/// Outcome of a checked edge flip.
///
/// When `applied` is false the receiver fields hold the [`NodeId::NONE`]
/// sentinel, so feeding a rejected report to
/// [`Mesh::unflip_edge`] fails loudly instead of silently rewiring node 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlipReport {
    /// Whether the flip was applied.
    pub applied: bool,
    /// Receiver that preceded the donated neighbor in the donor's ring.
    pub common_prev: NodeId,
    /// Receiver that followed the donated neighbor in the donor's ring.
    pub common_next: NodeId,
}

impl FlipReport {
    fn rejected() -> Self {
        Self::default()
    }
}

impl Default for FlipReport {
    fn default() -> Self {
        Self {
            applied: false,
            common_prev: NodeId::NONE,
            common_next: NodeId::NONE,
        }
    }
}

impl Mesh {
    /// Attempts to flip the edge between the adjacent nodes `node_id` and
    /// `neighbor_id`, keeping the triangulation intact.
    ///
    /// The flip is applied only if all guards pass:
    /// - in planar mode, none of the four diamond nodes is on the boundary;
    /// - both donors keep at least [`MIN_DEGREE`] neighbors after donating;
    /// - the squared length of the new edge lies strictly inside
    ///   `(min_bond_length_sq, max_bond_length_sq)`;
    /// - the donors share exactly two common neighbors, and after the
    ///   tentative rewrite the receivers do too (otherwise the rewrite is
    ///   rolled back).
    ///
    /// On success, diamond geometry is recomputed and the global aggregate
    /// adjusted by the exact delta. A rejected flip is not an error; it is
    /// reported through the returned [`FlipReport`].
    pub fn flip_edge(
        &mut self,
        node_id: NodeId,
        neighbor_id: NodeId,
        min_bond_length_sq: f64,
        max_bond_length_sq: f64,
    ) -> FlipReport {
        match self.kind {
            MeshKind::Spherical => {
                self.flip_bulk_edge(node_id, neighbor_id, min_bond_length_sq, max_bond_length_sq)
            }
            MeshKind::Planar => {
                if self.is_boundary(node_id) || self.is_boundary(neighbor_id) {
                    return FlipReport::rejected();
                }
                let Some(wings) = self.wings_of(node_id, neighbor_id) else {
                    return FlipReport::rejected();
                };
                if self.is_boundary(wings.prev) || self.is_boundary(wings.next) {
                    return FlipReport::rejected();
                }
                self.flip_bulk_edge(node_id, neighbor_id, min_bond_length_sq, max_bond_length_sq)
            }
        }
    }

    /// Reverses the most recent successful flip of the edge between
    /// `node_id` and `neighbor_id`, using the receivers recorded in
    /// `report`. The donated edge is taken back from the receivers and the
    /// global aggregate restored by subtracting the recorded delta.
    ///
    /// This method trusts its arguments and performs no validation: it must
    /// be called at most once per successful flip, and only if no other
    /// mutation happened in between. Feeding it a rejected report panics on
    /// the sentinel ids.
    pub fn unflip_edge(&mut self, node_id: NodeId, neighbor_id: NodeId, report: FlipReport) {
        self.rewire_edge_unchecked(report.common_prev, report.common_next, neighbor_id, node_id);
        self.update_diamond(node_id, neighbor_id, report.common_prev, report.common_next);
        self.global += self.pre_patch - self.post_patch;
    }

    /// Raw four-node rewrite: takes the edge away from `(node_id,
    /// neighbor_id)` and gives it to `(c_prev, c_next)`, with no guards and
    /// no geometry updates.
    ///
    /// Correct only if `node_id`'s ring cyclically contains
    /// `..., c_prev, neighbor_id, c_next, ...`; anything else corrupts the
    /// triangulation. Prefer [`Mesh::flip_edge`].
    pub fn rewire_edge_unchecked(
        &mut self,
        node_id: NodeId,
        neighbor_id: NodeId,
        c_prev: NodeId,
        c_next: NodeId,
    ) -> FlipReport {
        self.emplace_before(c_prev, node_id, c_next);
        self.emplace_before(c_next, neighbor_id, c_prev);
        self.store.pop_neighbor(node_id, neighbor_id);
        self.store.pop_neighbor(neighbor_id, node_id);
        FlipReport {
            applied: true,
            common_prev: c_prev,
            common_next: c_next,
        }
    }

    fn flip_bulk_edge(
        &mut self,
        node_id: NodeId,
        neighbor_id: NodeId,
        min_bond_length_sq: f64,
        max_bond_length_sq: f64,
    ) -> FlipReport {
        if self.store[node_id].degree() <= MIN_DEGREE
            || self.store[neighbor_id].degree() <= MIN_DEGREE
        {
            return FlipReport::rejected();
        }
        let Some(wings) = self.wings_of(node_id, neighbor_id) else {
            return FlipReport::rejected();
        };
        let new_edge_sq =
            (self.store[wings.next].position - self.store[wings.prev].position).norm_squared();
        if new_edge_sq <= min_bond_length_sq || new_edge_sq >= max_bond_length_sq {
            return FlipReport::rejected();
        }
        if self.common_neighbor_count(node_id, neighbor_id) != 2 {
            return FlipReport::rejected();
        }

        self.pre_patch = self.diamond_geometry(node_id, neighbor_id, wings.prev, wings.next);
        let report = self.rewire_edge_unchecked(node_id, neighbor_id, wings.prev, wings.next);
        if self.common_neighbor_count(wings.prev, wings.next) == 2 {
            self.update_diamond(node_id, neighbor_id, wings.prev, wings.next);
            self.post_patch = self.diamond_geometry(node_id, neighbor_id, wings.prev, wings.next);
            self.global += self.post_patch - self.pre_patch;
            report
        } else {
            // the receivers were already adjacent on the far side of the
            // quadrilateral; a second bond between them is not allowed
            self.rewire_edge_unchecked(wings.prev, wings.next, neighbor_id, node_id);
            FlipReport::rejected()
        }
    }

    /// Inserts `new_id` into the ring of `center` right before `anchor`.
    ///
    /// # Panics
    ///
    /// Panics if `anchor` is not a ring neighbor of `center`.
    fn emplace_before(&mut self, center: NodeId, anchor: NodeId, new_id: NodeId) {
        match self.store[center].ring_index_of(anchor) {
            Some(k) => self.store.emplace_neighbor(center, new_id, k),
            None => panic!("node {anchor} is not a ring neighbor of node {center}"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::topology::ring;

    fn sphere() -> Mesh {
        Mesh::spherical(1, 1.0, 0.8).unwrap()
    }

    /// First edge whose donors both have enough neighbors to donate.
    fn flippable_edge(mesh: &Mesh) -> (NodeId, NodeId) {
        for node in mesh.nodes() {
            if node.degree() <= MIN_DEGREE {
                continue;
            }
            for &neighbor_id in node.neighbor_ids() {
                if mesh[neighbor_id].degree() > MIN_DEGREE {
                    return (node.id(), neighbor_id);
                }
            }
        }
        panic!("no flippable edge in this mesh");
    }

    fn assert_rings_symmetric(mesh: &Mesh) {
        for node in mesh.nodes() {
            for &neighbor_id in node.neighbor_ids() {
                assert!(mesh[neighbor_id].ring_index_of(node.id()).is_some());
            }
        }
    }

    /// Ring equality up to cyclic rotation. Re-inserting a popped neighbor
    /// lands at the front of the ring vector when it used to sit at the
    /// end, so restored rings may come back rotated by one.
    fn rings_cyclically_equal(x: &[NodeId], y: &[NodeId]) -> bool {
        if x.len() != y.len() {
            return false;
        }
        let Some(offset) = y.iter().position(|&id| id == x[0]) else {
            return x.is_empty();
        };
        (0..x.len()).all(|k| x[k] == y[(offset + k) % y.len()])
    }

    #[test]
    fn flip_transfers_the_edge_to_the_receivers() {
        let mut mesh = sphere();
        let (a, b) = flippable_edge(&mesh);
        let report = mesh.flip_edge(a, b, 0.0, f64::MAX);
        assert!(report.applied);
        assert!(mesh[a].ring_index_of(b).is_none());
        assert!(mesh[b].ring_index_of(a).is_none());
        assert!(mesh[report.common_prev].ring_index_of(report.common_next).is_some());
        assert!(mesh[report.common_next].ring_index_of(report.common_prev).is_some());
        assert_rings_symmetric(&mesh);
    }

    #[test]
    fn flip_keeps_ring_order_closing_triangles() {
        let mut mesh = sphere();
        let (a, b) = flippable_edge(&mesh);
        let report = mesh.flip_edge(a, b, 0.0, f64::MAX);
        assert!(report.applied);
        for node in mesh.nodes() {
            let ring_ids = node.neighbor_ids();
            for (k, &id) in ring_ids.iter().enumerate() {
                let next = ring_ids[ring::next(k, ring_ids.len())];
                assert!(
                    mesh[id].ring_index_of(next).is_some(),
                    "ring of node {} no longer closes triangles",
                    node.id()
                );
            }
        }
    }

    #[test]
    fn flip_adjusts_the_global_aggregate() {
        let mut mesh = sphere();
        let (a, b) = flippable_edge(&mesh);
        assert!(mesh.flip_edge(a, b, 0.0, f64::MAX).applied);
        let mut total = crate::mesh::PatchGeometry::default();
        for node in mesh.nodes() {
            total += node;
        }
        assert!((mesh.global_geometry().area - total.area).abs() < 1e-9);
        assert!((mesh.global_geometry().volume - total.volume).abs() < 1e-9);
    }

    #[test]
    fn degree_floor_rejects_low_degree_donors() {
        // level-0 sphere: every node has exactly MIN_DEGREE neighbors, so
        // nobody may donate
        let mut mesh = Mesh::spherical(0, 1.0, 3.0).unwrap();
        let ids: Vec<NodeId> = mesh.nodes().map(|n| n.id()).collect();
        for a in ids {
            let ring_ids: Vec<NodeId> = mesh[a].neighbor_ids().to_vec();
            for b in ring_ids {
                let report = mesh.flip_edge(a, b, 0.0, f64::MAX);
                assert!(!report.applied);
                assert!(report.common_prev.is_none());
                assert!(report.common_next.is_none());
            }
        }
    }

    #[test]
    fn bond_length_window_rejects_the_flip() {
        let mut mesh = sphere();
        let (a, b) = flippable_edge(&mesh);
        assert!(!mesh.flip_edge(a, b, 0.0, 1e-12).applied);
        assert!(!mesh.flip_edge(a, b, 1e6, 1e7).applied);
        // the rejected attempts must not have rewired anything
        assert!(mesh[a].ring_index_of(b).is_some());
    }

    #[test]
    fn flip_of_non_neighbors_is_rejected() {
        let mut mesh = sphere();
        let a = NodeId(0);
        let far = mesh
            .nodes()
            .find(|n| n.id() != a && mesh[a].ring_index_of(n.id()).is_none())
            .map(|n| n.id())
            .unwrap();
        assert!(!mesh.flip_edge(a, far, 0.0, f64::MAX).applied);
    }

    #[test]
    fn unflip_restores_topology_exactly() {
        let mut mesh = sphere();
        let pristine = mesh.clone();
        let (a, b) = flippable_edge(&mesh);
        let report = mesh.flip_edge(a, b, 0.0, f64::MAX);
        assert!(report.applied);
        mesh.unflip_edge(a, b, report);
        for (node, original) in mesh.nodes().zip(pristine.nodes()) {
            assert!(
                rings_cyclically_equal(node.neighbor_ids(), original.neighbor_ids()),
                "ring of {} not restored",
                node.id()
            );
        }
        let global = mesh.global_geometry();
        let pristine_global = pristine.global_geometry();
        assert!((global.area - pristine_global.area).abs() < 1e-12);
        assert!((global.volume - pristine_global.volume).abs() < 1e-12);
        assert!(
            (global.bending_energy_unit - pristine_global.bending_energy_unit).abs() < 1e-12
        );
    }

    #[test]
    fn boundary_edges_never_flip() {
        let mut mesh = Mesh::planar(8, 8, 7.0, 7.0, 2.0).unwrap();
        let frame_id = *mesh.boundary_ids().iter().next().unwrap();
        let ring_ids: Vec<NodeId> = mesh[frame_id].neighbor_ids().to_vec();
        for b in ring_ids {
            assert!(!mesh.flip_edge(frame_id, b, 0.0, f64::MAX).applied);
        }
        // edges whose wing touches the frame are rejected as well
        let bulk = mesh
            .nodes()
            .find(|n| {
                !mesh.is_boundary(n.id())
                    && n.neighbor_ids().iter().any(|&id| mesh.is_boundary(id))
            })
            .map(|n| n.id())
            .unwrap();
        let partner = mesh[bulk]
            .neighbor_ids()
            .iter()
            .copied()
            .find(|&id| {
                !mesh.is_boundary(id) && {
                    let wings = mesh.wings_of(bulk, id).unwrap();
                    mesh.is_boundary(wings.prev) || mesh.is_boundary(wings.next)
                }
            })
            .unwrap();
        assert!(!mesh.flip_edge(bulk, partner, 0.0, f64::MAX).applied);
    }

    #[test]
    fn planar_bulk_flip_applies_away_from_the_frame() {
        // a wide sheet has interior edges whose whole diamond is bulk
        let mut mesh = Mesh::planar(10, 10, 9.0, 9.0, 2.0).unwrap();
        let candidates: Vec<(NodeId, NodeId)> = mesh
            .nodes()
            .filter(|n| !mesh.is_boundary(n.id()) && n.degree() > MIN_DEGREE)
            .flat_map(|n| {
                n.neighbor_ids()
                    .iter()
                    .map(|&b| (n.id(), b))
                    .collect::<Vec<_>>()
            })
            .collect();
        let mut applied = false;
        for (a, b) in candidates {
            if mesh[b].degree() <= MIN_DEGREE {
                continue;
            }
            if mesh.flip_edge(a, b, 0.0, f64::MAX).applied {
                applied = true;
                break;
            }
        }
        assert!(applied, "no interior edge could be flipped");
        assert_rings_symmetric(&mesh);
    }
}
