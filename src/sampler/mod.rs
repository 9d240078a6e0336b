//! Metropolis acceptance wrapper over the mesh update primitives.
//!
//! The sampler proposes node displacements and edge flips, guards proposals
//! with bond-length checks, evaluates a user-supplied energy function before
//! and after, and reverses updates that fail the Metropolis rule. It relies
//! on the exact reversibility of [`Mesh::displace`] and
//! [`Mesh::unflip_edge`].

use rand::Rng;

use crate::math::Vector3;
use crate::mesh::Mesh;
use crate::topology::{Node, NodeId};

/// Metropolis-Hastings driver for a [`Mesh`].
///
/// The energy function sees the proposed node, the whole mesh, and the
/// user parameters; it may read any geometry but must not mutate. The
/// random source is borrowed, not owned. With a positive temperature the
/// usual Metropolis rule applies; at zero temperature the sampler is
/// greedy and reverses every uphill update.
pub struct MetropolisSampler<'a, P, E, R> {
    mesh: &'a mut Mesh,
    params: &'a P,
    energy: E,
    rng: &'a mut R,
    temperature: f64,
    min_bond_length_sq: f64,
    max_bond_length_sq: f64,
    move_attempts: u64,
    bond_length_move_rejections: u64,
    move_reversals: u64,
    flip_attempts: u64,
    bond_length_flip_rejections: u64,
    flip_reversals: u64,
}

impl<'a, P, E, R> MetropolisSampler<'a, P, E, R>
where
    E: Fn(&Node, &Mesh, &P) -> f64,
    R: Rng,
{
    /// Creates a sampler with temperature 1 and the given bond-length
    /// window (plain lengths, not squares).
    #[must_use]
    pub fn new(
        mesh: &'a mut Mesh,
        params: &'a P,
        energy: E,
        rng: &'a mut R,
        min_bond_length: f64,
        max_bond_length: f64,
    ) -> Self {
        Self {
            mesh,
            params,
            energy,
            rng,
            temperature: 1.0,
            min_bond_length_sq: min_bond_length * min_bond_length,
            max_bond_length_sq: max_bond_length * max_bond_length,
            move_attempts: 0,
            bond_length_move_rejections: 0,
            move_reversals: 0,
            flip_attempts: 0,
            bond_length_flip_rejections: 0,
            flip_reversals: 0,
        }
    }

    /// Read access to the driven mesh.
    #[must_use]
    pub fn mesh(&self) -> &Mesh {
        self.mesh
    }

    /// Current thermal scale.
    #[must_use]
    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    /// Sets the thermal scale; zero switches the sampler to greedy mode.
    pub fn set_temperature(&mut self, temperature: f64) {
        self.temperature = temperature;
    }

    /// Proposes displacing `node_id` by `displacement`.
    ///
    /// The proposal is rejected outright if it would push any ring bond
    /// across the allowed length window from inside, or bring any proximity
    /// neighbor closer than the minimum bond length. Otherwise the mesh is
    /// updated and the update reversed if the Metropolis rule demands it.
    pub fn propose_move(&mut self, node_id: NodeId, displacement: Vector3) {
        self.move_attempts += 1;
        if !self.displacement_keeps_bond_lengths(node_id, displacement) {
            self.bond_length_move_rejections += 1;
            return;
        }
        let e_old = (self.energy)(&self.mesh[node_id], self.mesh, self.params);
        self.mesh.displace(node_id, displacement);
        let e_new = (self.energy)(&self.mesh[node_id], self.mesh, self.params);
        if self.undo_required(e_old, e_new) {
            self.mesh.displace(node_id, -displacement);
            self.move_reversals += 1;
        }
    }

    /// Proposes flipping the edge from `node_id` to a ring neighbor picked
    /// uniformly at random.
    pub fn propose_flip(&mut self, node_id: NodeId) {
        let ring_size = self.mesh[node_id].degree();
        let neighbor_id = self.mesh[node_id].neighbor_ids()[self.rng.gen_range(0..ring_size)];
        self.propose_flip_with(node_id, neighbor_id);
    }

    /// Proposes flipping the edge between `node_id` and the ring neighbor
    /// with the global id `neighbor_id`.
    ///
    /// A flip the mesh refuses (topology or bond length) counts as a
    /// bond-length rejection; an applied flip is reversed under the same
    /// Metropolis rule as a displacement.
    pub fn propose_flip_with(&mut self, node_id: NodeId, neighbor_id: NodeId) {
        self.flip_attempts += 1;
        let e_old = (self.energy)(&self.mesh[node_id], self.mesh, self.params);
        let report = self.mesh.flip_edge(
            node_id,
            neighbor_id,
            self.min_bond_length_sq,
            self.max_bond_length_sq,
        );
        if !report.applied {
            self.bond_length_flip_rejections += 1;
            return;
        }
        let e_new = (self.energy)(&self.mesh[node_id], self.mesh, self.params);
        if self.undo_required(e_old, e_new) {
            self.mesh.unflip_edge(node_id, neighbor_id, report);
            self.flip_reversals += 1;
        }
    }

    /// Metropolis rule: an update is undone iff it raised the energy and
    /// the acceptance draw fails; at zero temperature every uphill update
    /// is undone.
    fn undo_required(&mut self, e_old: f64, e_new: f64) -> bool {
        let e_diff = e_old - e_new;
        if self.temperature > 0.0 {
            e_diff < 0.0 && self.rng.gen::<f64>() > (e_diff / self.temperature).exp()
        } else {
            e_diff < 0.0
        }
    }

    fn displacement_keeps_bond_lengths(&self, node_id: NodeId, displacement: Vector3) -> bool {
        let node = &self.mesh[node_id];
        for edge in node.neighbor_edges() {
            let old_sq = edge.norm_squared();
            let new_sq = (edge - displacement).norm_squared();
            if new_sq > self.max_bond_length_sq && old_sq < self.max_bond_length_sq {
                return false;
            }
            if old_sq > self.min_bond_length_sq && new_sq < self.min_bond_length_sq {
                return false;
            }
        }
        for &other in node.proximity_ids() {
            let separation = self.mesh[other].position() - node.position();
            let old_sq = separation.norm_squared();
            let new_sq = (separation - displacement).norm_squared();
            if new_sq < self.min_bond_length_sq && old_sq > self.min_bond_length_sq {
                return false;
            }
        }
        true
    }

    /// Total number of displacement proposals.
    #[must_use]
    pub fn move_attempts(&self) -> u64 {
        self.move_attempts
    }

    /// Displacement proposals rejected by the bond-length guard.
    #[must_use]
    pub fn bond_length_move_rejections(&self) -> u64 {
        self.bond_length_move_rejections
    }

    /// Displacements reversed by the Metropolis rule.
    #[must_use]
    pub fn move_reversals(&self) -> u64 {
        self.move_reversals
    }

    /// Total number of flip proposals.
    #[must_use]
    pub fn flip_attempts(&self) -> u64 {
        self.flip_attempts
    }

    /// Flip proposals the mesh refused (topology or bond length).
    #[must_use]
    pub fn bond_length_flip_rejections(&self) -> u64 {
        self.bond_length_flip_rejections
    }

    /// Applied flips reversed by the Metropolis rule.
    #[must_use]
    pub fn flip_reversals(&self) -> u64 {
        self.flip_reversals
    }
}
