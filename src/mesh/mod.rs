pub mod flip;
pub mod geometry;
pub mod snapshot;

pub use flip::{FlipReport, MIN_DEGREE};
pub use geometry::PatchGeometry;

use std::collections::BTreeSet;
use std::ops::Index;

use tracing::debug;

use crate::error::Result;
use crate::math::{Point3, Vector3};
use crate::seed::{MakeIcosphere, MakePlanarSheet, SeedMesh};
use crate::topology::{ring, Node, NodeId, NodeStore, Wings};

/// Height of the reference point used to fix ring chirality on a planar
/// sheet. Rings wind so that face normals point up, toward a point lifted
/// this far above the sheet's mass center. Works for nearly flat patches;
/// fragile for strongly warped ones.
const PLANAR_ORIENTATION_LIFT: f64 = 10.0;

/// Surface variant of a mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshKind {
    /// Closed surface of spherical topology; every node is bulk.
    Spherical,
    /// Rectangular patch with a frozen frame of boundary nodes.
    Planar,
}

/// A dynamically triangulated two-dimensional surface embedded in 3D.
///
/// The mesh owns a [`NodeStore`] and keeps it coherent: after every public
/// mutation, rings are symmetric and cyclically ordered, cached edge vectors
/// match the stored positions, per-node geometry is current, and the global
/// aggregate equals the sum of per-node contributions. All updates are
/// local; the global aggregate is maintained by exact pre/post deltas and is
/// never rescanned during steady-state simulation.
///
/// In planar mode the frame nodes listed in `boundary_ids` are frozen:
/// their positions are immutable, their geometry scalars stay zero, and
/// edges touching them cannot be flipped.
#[derive(Debug, Clone)]
pub struct Mesh {
    store: NodeStore,
    kind: MeshKind,
    boundary_ids: BTreeSet<NodeId>,
    global: PatchGeometry,
    pre_patch: PatchGeometry,
    post_patch: PatchGeometry,
    proximity_radius: f64,
    proximity_radius_sq: f64,
}

impl Mesh {
    /// Builds a closed spherical mesh by icosahedral subdivision.
    ///
    /// Level `subdivisions` places that many new nodes on every icosahedron
    /// edge; all positions are projected onto the sphere of radius `radius`.
    /// `proximity_radius` is the cutoff for the proximity lists, typically a
    /// small multiple of the maximum allowed bond length.
    ///
    /// # Errors
    ///
    /// Returns an error if `radius` is not positive.
    pub fn spherical(subdivisions: usize, radius: f64, proximity_radius: f64) -> Result<Self> {
        let seed = MakeIcosphere::new(subdivisions, radius).execute()?;
        Ok(Self::from_seed(seed, MeshKind::Spherical, proximity_radius))
    }

    /// Builds a planar rectangular patch of `n_x` by `n_y` nodes spanning
    /// `l_x` by `l_y`, with an alternating diagonal pattern. The outer frame
    /// becomes the frozen boundary set.
    ///
    /// # Errors
    ///
    /// Returns an error if either side has fewer than 2 nodes or a
    /// non-positive length.
    pub fn planar(
        n_x: usize,
        n_y: usize,
        l_x: f64,
        l_y: f64,
        proximity_radius: f64,
    ) -> Result<Self> {
        let seed = MakePlanarSheet::new(n_x, n_y, l_x, l_y).execute()?;
        Ok(Self::from_seed(seed, MeshKind::Planar, proximity_radius))
    }

    /// Adopts a raw seed: orders and orients every bulk ring, fills the edge
    /// caches, computes all geometry, and builds the proximity lists.
    fn from_seed(seed: SeedMesh, kind: MeshKind, proximity_radius: f64) -> Self {
        let SeedMesh {
            positions,
            neighbors,
            boundary_ids,
        } = seed;

        let mut nodes = Vec::with_capacity(positions.len());
        for (k, (position, ring_ids)) in positions.into_iter().zip(neighbors).enumerate() {
            let mut node = Node::new(NodeId(k), position);
            node.neighbor_edges = vec![Vector3::zeros(); ring_ids.len()];
            node.neighbor_ids = ring_ids;
            nodes.push(node);
        }

        let mut mesh = Self {
            store: NodeStore::new(nodes),
            kind,
            boundary_ids,
            global: PatchGeometry::default(),
            pre_patch: PatchGeometry::default(),
            post_patch: PatchGeometry::default(),
            proximity_radius,
            proximity_radius_sq: proximity_radius * proximity_radius,
        };
        mesh.order_and_orient_rings();
        mesh.rebuild_geometry();
        mesh.build_proximity();
        debug!(nodes = mesh.len(), kind = ?mesh.kind, "seeded mesh");
        mesh
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Returns `true` if the mesh holds no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Surface variant of this mesh.
    #[must_use]
    pub fn kind(&self) -> MeshKind {
        self.kind
    }

    /// Read access to a node.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &Node {
        self.store.node(id)
    }

    /// Iterates over all nodes in id order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.store.iter()
    }

    /// The underlying node store.
    #[must_use]
    pub fn store(&self) -> &NodeStore {
        &self.store
    }

    /// Ids of the frozen frame nodes; empty for a spherical mesh.
    #[must_use]
    pub fn boundary_ids(&self) -> &BTreeSet<NodeId> {
        &self.boundary_ids
    }

    /// Returns `true` if `id` is a frozen boundary node.
    #[must_use]
    pub fn is_boundary(&self, id: NodeId) -> bool {
        self.boundary_ids.contains(&id)
    }

    /// Aggregate geometry of the whole surface, maintained incrementally.
    #[must_use]
    pub fn global_geometry(&self) -> PatchGeometry {
        self.global
    }

    /// Plain average of all node positions.
    #[must_use]
    pub fn mass_center(&self) -> Point3 {
        let mut sum = Vector3::zeros();
        for node in self.store.iter() {
            sum += node.position.coords;
        }
        Point3::from(sum / self.store.len() as f64)
    }

    /// Displaces a node and restores all dependent geometry.
    ///
    /// Recomputes the two-ring around `node_id` and applies the exact
    /// pre/post delta to the global aggregate. Displacing a frozen boundary
    /// node is a no-op. Bond-length guards are not applied here; the
    /// Metropolis sampler performs them before proposing.
    pub fn displace(&mut self, node_id: NodeId, displacement: Vector3) {
        if self.is_boundary(node_id) {
            return;
        }
        self.pre_patch = self.two_ring_geometry(node_id);
        self.store.displace(node_id, &displacement);
        self.update_two_ring(node_id);
        self.post_patch = self.two_ring_geometry(node_id);
        self.global += self.post_patch - self.pre_patch;
    }

    /// Rigidly shifts every node (boundary included) by `displacement`.
    ///
    /// Intended for setup, e.g. placing several vesicles before a combined
    /// run. Ring order and edge vectors are unaffected by a rigid shift, but
    /// the volume term is measured against the lab origin, so all geometry
    /// is rebuilt.
    pub fn translate_all(&mut self, displacement: Vector3) {
        for k in 0..self.store.len() {
            self.store.displace(NodeId(k), &displacement);
        }
        self.rebuild_geometry();
    }

    /// Stretches the `x`, `y`, and `z` coordinates of every node by the
    /// given factors, relative to the lab frame.
    ///
    /// Useful for deforming a freshly seeded sphere into an ellipsoid, so
    /// most meaningful while the mesh is still centered on the origin. In
    /// planar mode boundary nodes stay frozen.
    pub fn scale_coordinates(&mut self, x_stretch: f64, y_stretch: f64, z_stretch: f64) {
        for k in 0..self.store.len() {
            let id = NodeId(k);
            let p = self.store[id].position;
            let displacement = Vector3::new(
                p.x * (x_stretch - 1.0),
                p.y * (y_stretch - 1.0),
                p.z * (z_stretch - 1.0),
            );
            self.displace(id, displacement);
        }
    }

    /// Current proximity cutoff radius.
    #[must_use]
    pub fn proximity_radius(&self) -> f64 {
        self.proximity_radius
    }

    /// Sets the proximity cutoff used by [`Mesh::build_proximity`].
    pub fn set_proximity_radius(&mut self, radius: f64) {
        self.proximity_radius = radius;
        self.proximity_radius_sq = radius * radius;
    }

    /// Rebuilds every proximity list from scratch: each unordered node pair
    /// closer than the cutoff is entered into both lists.
    ///
    /// Deliberately naive (O(N^2)); lists are rebuilt explicitly by the
    /// caller, there is no incremental maintenance.
    pub fn build_proximity(&mut self) {
        for k in 0..self.store.len() {
            self.store.node_mut(NodeId(k)).proximity_ids.clear();
        }
        for i in 0..self.store.len() {
            for j in 0..i {
                let separation_sq =
                    (self.store[NodeId(i)].position - self.store[NodeId(j)].position).norm_squared();
                if separation_sq < self.proximity_radius_sq {
                    self.store.node_mut(NodeId(i)).proximity_ids.push(NodeId(j));
                    self.store.node_mut(NodeId(j)).proximity_ids.push(NodeId(i));
                }
            }
        }
        debug!(radius = self.proximity_radius, "rebuilt proximity lists");
    }

    /// The ring entries flanking `neighbor_id` in the ring of `node_id`,
    /// i.e. the two common neighbors of the adjacent pair. `None` if the
    /// nodes are not adjacent.
    #[must_use]
    pub(crate) fn wings_of(&self, node_id: NodeId, neighbor_id: NodeId) -> Option<Wings> {
        let node = &self.store[node_id];
        let j = node.ring_index_of(neighbor_id)?;
        let ring_size = node.degree();
        Some(Wings {
            prev: node.neighbor_ids[ring::prev(j, ring_size)],
            next: node.neighbor_ids[ring::next(j, ring_size)],
        })
    }

    /// Number of nodes adjacent to both `a` and `b`.
    #[must_use]
    pub(crate) fn common_neighbor_count(&self, a: NodeId, b: NodeId) -> usize {
        self.store[a]
            .neighbor_ids
            .iter()
            .filter(|id| self.store[b].neighbor_ids.contains(id))
            .count()
    }

    /// The first two common neighbors of `a` and `b` in the ring order of
    /// `a`; missing slots are poisoned with [`NodeId::NONE`].
    fn two_common_neighbors(&self, a: NodeId, b: NodeId) -> [NodeId; 2] {
        let mut found = [NodeId::NONE; 2];
        let mut count = 0;
        for &candidate in &self.store[a].neighbor_ids {
            if count == 2 {
                break;
            }
            if self.store[b].neighbor_ids.contains(&candidate) {
                found[count] = candidate;
                count += 1;
            }
        }
        found
    }

    /// Rebuilds per-node geometry for every node and resums the global
    /// aggregate. Construction-time only; steady-state updates go through
    /// the incremental paths.
    fn rebuild_geometry(&mut self) {
        self.global = PatchGeometry::default();
        for k in 0..self.store.len() {
            let node_id = NodeId(k);
            if self.is_boundary(node_id) {
                self.update_boundary_node_geometry(node_id);
            } else {
                self.update_bulk_node_geometry(node_id);
            }
            self.global += PatchGeometry::from(&self.store[node_id]);
        }
    }

    /// Sorts every bulk ring into cyclic order and fixes its chirality.
    ///
    /// Spherical rings wind counterclockwise seen from outside (consecutive
    /// edge cross products point away from the mass center); planar rings
    /// wind so normals point toward a reference lifted above the sheet.
    /// The result is unique up to cyclic rotation.
    fn order_and_orient_rings(&mut self) {
        let reference = match self.kind {
            MeshKind::Spherical => self.mass_center(),
            MeshKind::Planar => {
                self.mass_center() + Vector3::new(0.0, 0.0, PLANAR_ORIENTATION_LIFT)
            }
        };
        for k in 0..self.store.len() {
            let node_id = NodeId(k);
            if self.is_boundary(node_id) {
                continue;
            }
            let mut ordered = self.ordered_ring(node_id);
            let li0 = self.store[ordered[0]].position - self.store[node_id].position;
            let li1 = self.store[ordered[1]].position - self.store[node_id].position;
            let outward = li0.cross(&li1).dot(&(self.store[node_id].position - reference));
            let keep = match self.kind {
                MeshKind::Spherical => outward >= 0.0,
                MeshKind::Planar => outward <= 0.0,
            };
            if !keep {
                ordered.reverse();
            }
            self.store.node_mut(node_id).neighbor_ids = ordered;
        }
    }

    /// Cyclic ordering of a bulk node's ring, built by walking common
    /// neighbors: each next entry is the common neighbor of the center and
    /// the previous entry that has not been visited yet.
    fn ordered_ring(&self, node_id: NodeId) -> Vec<NodeId> {
        let first = self.store[node_id].neighbor_ids[0];
        let commons = self.two_common_neighbors(node_id, first);
        let mut ordered = vec![commons[0], first, commons[1]];

        for _ in 0..self.store[node_id].degree().saturating_sub(3) {
            let last = ordered[ordered.len() - 1];
            let commons = self.two_common_neighbors(node_id, last);
            if ordered.contains(&commons[0]) {
                ordered.push(commons[1]);
            } else {
                ordered.push(commons[0]);
            }
        }
        ordered
    }
}

impl Index<NodeId> for Mesh {
    type Output = Node;

    fn index(&self, id: NodeId) -> &Node {
        &self.store[id]
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn small_sphere() -> Mesh {
        Mesh::spherical(1, 1.0, 0.8).unwrap()
    }

    fn assert_rings_symmetric(mesh: &Mesh) {
        for node in mesh.nodes() {
            for &neighbor_id in node.neighbor_ids() {
                assert!(
                    mesh[neighbor_id].ring_index_of(node.id()).is_some(),
                    "ring symmetry broken between {} and {}",
                    node.id(),
                    neighbor_id
                );
            }
        }
    }

    fn assert_edges_coherent(mesh: &Mesh) {
        for node in mesh.nodes() {
            for (k, &neighbor_id) in node.neighbor_ids().iter().enumerate() {
                let expected = mesh[neighbor_id].position() - node.position();
                assert!((node.neighbor_edges()[k] - expected).norm() < 1e-12);
            }
        }
    }

    fn summed_geometry(mesh: &Mesh) -> PatchGeometry {
        let mut total = PatchGeometry::default();
        for node in mesh.nodes() {
            total += node;
        }
        total
    }

    // ── construction ──

    #[test]
    fn seeded_sphere_satisfies_ring_invariants() {
        let mesh = small_sphere();
        assert_rings_symmetric(&mesh);
        assert_edges_coherent(&mesh);
    }

    #[test]
    fn ring_order_closes_triangles() {
        let mesh = small_sphere();
        for node in mesh.nodes() {
            let ring_ids = node.neighbor_ids();
            for (k, &id) in ring_ids.iter().enumerate() {
                let next = ring_ids[ring::next(k, ring_ids.len())];
                assert!(
                    mesh[id].ring_index_of(next).is_some(),
                    "consecutive ring entries {id} and {next} are not adjacent"
                );
            }
        }
    }

    #[test]
    fn rings_wind_outward_on_a_sphere() {
        let mesh = small_sphere();
        let center = mesh.mass_center();
        for node in mesh.nodes() {
            let ring_ids = node.neighbor_ids();
            for (k, &id) in ring_ids.iter().enumerate() {
                let next = ring_ids[ring::next(k, ring_ids.len())];
                let li0 = mesh[id].position() - node.position();
                let li1 = mesh[next].position() - node.position();
                assert!(
                    li0.cross(&li1).dot(&(node.position() - center)) > 0.0,
                    "inward-winding triangle at node {}",
                    node.id()
                );
            }
        }
    }

    #[test]
    fn global_aggregate_matches_node_sum() {
        let mesh = small_sphere();
        let total = summed_geometry(&mesh);
        let global = mesh.global_geometry();
        assert!((global.area - total.area).abs() < 1e-9);
        assert!((global.volume - total.volume).abs() < 1e-9);
        assert!((global.bending_energy_unit - total.bending_energy_unit).abs() < 1e-9);
    }

    // ── displacement ──

    #[test]
    fn displace_keeps_aggregate_consistent() {
        let mut mesh = small_sphere();
        mesh.displace(NodeId(7), Vector3::new(0.05, -0.02, 0.01));
        assert_edges_coherent(&mesh);
        let total = summed_geometry(&mesh);
        assert!((mesh.global_geometry().area - total.area).abs() < 1e-9);
        assert!((mesh.global_geometry().volume - total.volume).abs() < 1e-9);
    }

    #[test]
    fn displace_only_touches_the_two_ring() {
        let mut mesh = small_sphere();
        let before = mesh.clone();
        let moved = NodeId(0);
        mesh.displace(moved, Vector3::new(0.01, 0.0, 0.0));
        // scalars of nodes outside the two-ring are untouched
        for node in mesh.nodes() {
            if node.id() != moved && node.ring_index_of(moved).is_none() {
                assert_eq!(node.area(), before[node.id()].area());
                assert_eq!(node.volume(), before[node.id()].volume());
            }
        }
    }

    #[test]
    fn boundary_nodes_are_frozen() {
        let mut mesh = Mesh::planar(6, 6, 5.0, 5.0, 2.0).unwrap();
        let frame_id = *mesh.boundary_ids().iter().next().unwrap();
        let before = *mesh[frame_id].position();
        mesh.displace(frame_id, Vector3::new(1.0, 1.0, 1.0));
        assert_eq!(*mesh[frame_id].position(), before);
    }

    #[test]
    fn planar_boundary_scalars_stay_zero_after_bulk_move() {
        let mut mesh = Mesh::planar(6, 6, 5.0, 5.0, 2.0).unwrap();
        // pick a bulk node adjacent to the frame
        let bulk = mesh
            .nodes()
            .find(|n| {
                !mesh.is_boundary(n.id())
                    && n.neighbor_ids().iter().any(|&id| mesh.is_boundary(id))
            })
            .map(Node::id)
            .unwrap();
        let area_before = mesh[bulk].area();
        mesh.displace(bulk, Vector3::new(0.0, 0.0, 0.3));
        assert!((mesh[bulk].area() - area_before).abs() > 1e-6);
        for &id in mesh.boundary_ids() {
            assert_eq!(mesh[id].area(), 0.0);
            assert_eq!(mesh[id].volume(), 0.0);
            assert_eq!(mesh[id].bending_energy_unit(), 0.0);
        }
    }

    // ── setup transforms ──

    #[test]
    fn translate_preserves_area_and_bending() {
        let mut mesh = small_sphere();
        let before = mesh.global_geometry();
        mesh.translate_all(Vector3::new(1.0, -2.0, 0.5));
        let after = mesh.global_geometry();
        assert!((after.area - before.area).abs() < 1e-9);
        assert!((after.bending_energy_unit - before.bending_energy_unit).abs() < 1e-9);
        assert_edges_coherent(&mesh);
    }

    #[test]
    fn mass_center_follows_translation() {
        let mut mesh = small_sphere();
        mesh.translate_all(Vector3::new(3.0, 0.0, 0.0));
        let center = mesh.mass_center();
        assert!((center.x - 3.0).abs() < 1e-9);
        assert!(center.y.abs() < 1e-9);
    }

    #[test]
    fn scaling_a_sphere_scales_its_area() {
        let mut mesh = small_sphere();
        let before = mesh.global_geometry();
        mesh.scale_coordinates(2.0, 2.0, 2.0);
        let after = mesh.global_geometry();
        assert!((after.area / before.area - 4.0).abs() < 1e-6);
        assert!((after.volume / before.volume - 8.0).abs() < 1e-6);
    }

    // ── proximity ──

    #[test]
    fn proximity_lists_are_symmetric_and_cutoff_bound() {
        let mesh = small_sphere();
        let cutoff_sq = mesh.proximity_radius() * mesh.proximity_radius();
        for node in mesh.nodes() {
            for &other in node.proximity_ids() {
                assert!(mesh[other].proximity_ids().contains(&node.id()));
                let separation_sq = (mesh[other].position() - node.position()).norm_squared();
                assert!(separation_sq < cutoff_sq);
            }
        }
    }

    #[test]
    fn widening_the_cutoff_grows_the_lists() {
        let mut mesh = small_sphere();
        let narrow: usize = mesh.nodes().map(|n| n.proximity_ids().len()).sum();
        mesh.set_proximity_radius(2.5);
        mesh.build_proximity();
        let wide: usize = mesh.nodes().map(|n| n.proximity_ids().len()).sum();
        assert!(wide > narrow);
    }
}
