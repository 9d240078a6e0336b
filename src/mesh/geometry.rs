//! Additive geometry aggregates and the per-node update law.
//!
//! The update law follows the mixed-area / cotangent discretization of
//! Meyer et al.: each node carries a Voronoi-like area, a signed tetrahedral
//! volume contribution relative to the lab origin, the discrete
//! mean-curvature vector, and the resulting bending-energy density.

use std::ops::{Add, AddAssign, Sub, SubAssign};

use crate::math::{cot_between, Vector3};
use crate::topology::{ring, Node, NodeId};

use super::Mesh;

/// Additive `(area, volume, bending energy)` triple of a surface patch.
///
/// A patch can be a single node, a two-ring, a flip diamond, or the whole
/// surface; aggregates of nested patches combine with plain `+` and `-`.
/// The struct is dumb data and does not guarantee consistency with any mesh.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PatchGeometry {
    /// Sum of node-associated areas over the patch.
    pub area: f64,
    /// Sum of signed node volume contributions over the patch.
    pub volume: f64,
    /// Sum of node bending-energy densities over the patch.
    pub bending_energy_unit: f64,
}

impl PatchGeometry {
    /// Creates an aggregate from explicit components.
    #[must_use]
    pub fn new(area: f64, volume: f64, bending_energy_unit: f64) -> Self {
        Self {
            area,
            volume,
            bending_energy_unit,
        }
    }
}

impl From<&Node> for PatchGeometry {
    fn from(node: &Node) -> Self {
        Self {
            area: node.area,
            volume: node.volume,
            bending_energy_unit: node.bending_energy_unit,
        }
    }
}

impl Add for PatchGeometry {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            area: self.area + rhs.area,
            volume: self.volume + rhs.volume,
            bending_energy_unit: self.bending_energy_unit + rhs.bending_energy_unit,
        }
    }
}

impl Sub for PatchGeometry {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self {
            area: self.area - rhs.area,
            volume: self.volume - rhs.volume,
            bending_energy_unit: self.bending_energy_unit - rhs.bending_energy_unit,
        }
    }
}

impl AddAssign for PatchGeometry {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl SubAssign for PatchGeometry {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl AddAssign<&Node> for PatchGeometry {
    fn add_assign(&mut self, node: &Node) {
        self.area += node.area;
        self.volume += node.volume;
        self.bending_energy_unit += node.bending_energy_unit;
    }
}

/// Node-associated share of one triangle's area.
///
/// `e_j` and `e_j_p_1` are the edge vectors from the node to two consecutive
/// ring neighbors, `triangle_area` the area of the triangle they span, and
/// the cotangents belong to the angles at those neighbors. For a non-obtuse
/// triangle this is the Voronoi area of the node inside the triangle; an
/// obtuse triangle contributes half its area to the obtuse corner and a
/// quarter to each of the other two.
#[must_use]
pub(crate) fn mixed_area(
    e_j: &Vector3,
    e_j_p_1: &Vector3,
    triangle_area: f64,
    cot_at_j: f64,
    cot_at_j_p_1: f64,
) -> f64 {
    if cot_at_j > 0.0 && cot_at_j_p_1 > 0.0 {
        // both neighbor angles are acute, so only the node angle can be obtuse
        if e_j.dot(e_j_p_1) > 0.0 {
            (cot_at_j_p_1 * e_j.norm_squared() + cot_at_j * e_j_p_1.norm_squared()) / 8.0
        } else {
            triangle_area / 2.0
        }
    } else {
        triangle_area / 4.0
    }
}

impl Mesh {
    /// Recomputes area, volume, curvature vector, and bending-energy density
    /// of a bulk node from its stored positions and ring, refreshing the
    /// cached edge vectors first.
    pub(crate) fn update_bulk_node_geometry(&mut self, node_id: NodeId) {
        self.refresh_edge_vectors(node_id);

        let node = &self.store[node_id];
        let ring_size = node.degree();
        let mut area_sum = 0.0;
        let mut face_normal_sum = Vector3::zeros();
        let mut curvature = Vector3::zeros();

        for j in 0..ring_size {
            let j_p_1 = ring::next(j, ring_size);
            let e_j = node.neighbor_edges[j];
            let e_j_p_1 = node.neighbor_edges[j_p_1];
            // edge of the triangle opposite the node, from neighbor j to j+1
            let opposite = e_j_p_1 - e_j;

            let cot_at_j = cot_between(&e_j, &(-opposite));
            let cot_at_j_p_1 = cot_between(&e_j_p_1, &opposite);

            let face_normal = e_j.cross(&e_j_p_1);
            let face_normal_norm = face_normal.norm();
            debug_assert!(
                face_normal_norm > 1e-10,
                "degenerate triangle face at node {node_id} (|n| = {face_normal_norm})"
            );

            let face_area = mixed_area(&e_j, &e_j_p_1, 0.5 * face_normal_norm, cot_at_j, cot_at_j_p_1);
            area_sum += face_area;
            face_normal_sum += face_normal * (face_area / face_normal_norm);
            curvature -= cot_at_j_p_1 * e_j + cot_at_j * e_j_p_1;
        }

        let position = node.position;
        let node = self.store.node_mut(node_id);
        node.area = area_sum;
        node.volume = position.coords.dot(&face_normal_sum) / 3.0;
        node.curvature_vec = -curvature / (2.0 * area_sum);
        node.bending_energy_unit = curvature.dot(&curvature) / (8.0 * area_sum);
    }

    /// Boundary treatment: edge vectors are refreshed, all geometry scalars
    /// stay zero.
    pub(crate) fn update_boundary_node_geometry(&mut self, node_id: NodeId) {
        self.refresh_edge_vectors(node_id);
    }

    /// Recomputes the cached edge vectors of `node_id` from the current
    /// positions, preserving ring order.
    pub(crate) fn refresh_edge_vectors(&mut self, node_id: NodeId) {
        for k in 0..self.store[node_id].degree() {
            let neighbor_id = self.store[node_id].neighbor_ids[k];
            let edge = self.store[neighbor_id].position - self.store[node_id].position;
            self.store.node_mut(node_id).neighbor_edges[k] = edge;
        }
    }

    /// Aggregate over `node_id` and its ring, read from the stored scalars.
    #[must_use]
    pub fn two_ring_geometry(&self, node_id: NodeId) -> PatchGeometry {
        let node = &self.store[node_id];
        let mut patch = PatchGeometry::from(node);
        for &neighbor_id in &node.neighbor_ids {
            patch += &self.store[neighbor_id];
        }
        patch
    }

    /// Aggregate over the four nodes of a flip diamond, read from the stored
    /// scalars.
    #[must_use]
    pub(crate) fn diamond_geometry(
        &self,
        a: NodeId,
        b: NodeId,
        c_prev: NodeId,
        c_next: NodeId,
    ) -> PatchGeometry {
        let mut patch = PatchGeometry::from(&self.store[a]);
        patch += &self.store[b];
        patch += &self.store[c_prev];
        patch += &self.store[c_next];
        patch
    }

    /// Recomputes local geometry for `node_id` and every ring neighbor,
    /// applying the boundary treatment where required.
    pub(crate) fn update_two_ring(&mut self, node_id: NodeId) {
        self.update_one(node_id);
        for k in 0..self.store[node_id].degree() {
            let neighbor_id = self.store[node_id].neighbor_ids[k];
            self.update_one(neighbor_id);
        }
    }

    /// Recomputes local geometry for the four nodes of a flip diamond.
    pub(crate) fn update_diamond(&mut self, a: NodeId, b: NodeId, c_prev: NodeId, c_next: NodeId) {
        self.update_one(a);
        self.update_one(b);
        self.update_one(c_prev);
        self.update_one(c_next);
    }

    fn update_one(&mut self, node_id: NodeId) {
        if self.is_boundary(node_id) {
            self.update_boundary_node_geometry(node_id);
        } else {
            self.update_bulk_node_geometry(node_id);
        }
    }
}
