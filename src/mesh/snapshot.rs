//! JSON snapshot of a mesh: an attribute map keyed by the decimal node id.
//!
//! Per-neighbor edge vectors are derived data and are not stored; they are
//! recomputed from positions at load time, together with all geometry and
//! the proximity lists. Reload assumes spherical topology (every node bulk,
//! rings stored already ordered and oriented); planar reload is deliberately
//! unsupported.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{Result, SnapshotError};
use crate::math::{Point3, Vector3};
use crate::topology::{Node, NodeId, NodeStore};

use super::{Mesh, MeshKind, PatchGeometry};

#[derive(Debug, Serialize, Deserialize)]
struct NodeRecord {
    area: f64,
    volume: f64,
    bending_energy_unit: f64,
    position: [f64; 3],
    curvature_vec: [f64; 3],
    neighbor_ids: Vec<NodeId>,
    proximity_ids: Vec<NodeId>,
}

impl From<&Node> for NodeRecord {
    fn from(node: &Node) -> Self {
        let p = node.position();
        let k = node.curvature_vec();
        Self {
            area: node.area(),
            volume: node.volume(),
            bending_energy_unit: node.bending_energy_unit(),
            position: [p.x, p.y, p.z],
            curvature_vec: [k.x, k.y, k.z],
            neighbor_ids: node.neighbor_ids().to_vec(),
            proximity_ids: node.proximity_ids().to_vec(),
        }
    }
}

impl Mesh {
    /// Serializes the mesh as a JSON object mapping each decimal node id to
    /// its attribute record.
    #[must_use]
    pub fn snapshot(&self) -> Value {
        let mut map = Map::new();
        for node in self.store.iter() {
            let record = serde_json::to_value(NodeRecord::from(node))
                .expect("a node record always serializes");
            map.insert(node.id().to_string(), record);
        }
        Value::Object(map)
    }

    /// Rebuilds a spherical mesh from snapshot data.
    ///
    /// Positions, rings, and proximity lists are read; edge vectors and all
    /// geometry are recomputed, and the proximity lists are rebuilt with the
    /// given cutoff.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot is not an object keyed by dense
    /// decimal ids, or if any record is malformed or references an
    /// out-of-range neighbor.
    pub fn from_snapshot(data: &Value, proximity_radius: f64) -> Result<Self> {
        let map = data.as_object().ok_or(SnapshotError::NotAnObject)?;
        let count = map.len();

        let mut records: Vec<Option<NodeRecord>> = Vec::new();
        records.resize_with(count, || None);
        for (key, value) in map {
            let id: usize = key
                .parse()
                .map_err(|_| SnapshotError::BadNodeKey(key.clone()))?;
            if id >= count {
                return Err(SnapshotError::IdOutOfRange { id, count }.into());
            }
            if records[id].is_some() {
                return Err(SnapshotError::DuplicateNode(id).into());
            }
            let record: NodeRecord = serde_json::from_value(value.clone())
                .map_err(|source| SnapshotError::BadRecord { id, source })?;
            if let Some(&bad) = record.neighbor_ids.iter().find(|n| n.0 >= count) {
                return Err(SnapshotError::NeighborOutOfRange {
                    id,
                    neighbor: bad.0,
                }
                .into());
            }
            records[id] = Some(record);
        }

        let mut nodes = Vec::with_capacity(count);
        for (k, record) in records.into_iter().enumerate() {
            // keys are unique and all ids are below the record count, so
            // every slot is filled
            let record = record.expect("dense id check left no gaps");
            let mut node = Node::new(
                NodeId(k),
                Point3::new(record.position[0], record.position[1], record.position[2]),
            );
            node.curvature_vec = Vector3::new(
                record.curvature_vec[0],
                record.curvature_vec[1],
                record.curvature_vec[2],
            );
            node.area = record.area;
            node.volume = record.volume;
            node.bending_energy_unit = record.bending_energy_unit;
            node.neighbor_edges = vec![Vector3::zeros(); record.neighbor_ids.len()];
            node.neighbor_ids = record.neighbor_ids;
            node.proximity_ids = record.proximity_ids;
            nodes.push(node);
        }

        let mut mesh = Mesh {
            store: NodeStore::new(nodes),
            kind: MeshKind::Spherical,
            boundary_ids: BTreeSet::new(),
            global: PatchGeometry::default(),
            pre_patch: PatchGeometry::default(),
            post_patch: PatchGeometry::default(),
            proximity_radius,
            proximity_radius_sq: proximity_radius * proximity_radius,
        };
        mesh.rebuild_geometry();
        mesh.build_proximity();
        debug!(nodes = mesh.len(), "reloaded spherical mesh from snapshot");
        Ok(mesh)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sphere() -> Mesh {
        Mesh::spherical(1, 1.0, 0.8).unwrap()
    }

    #[test]
    fn snapshot_uses_decimal_keys_and_full_records() {
        let mesh = sphere();
        let data = mesh.snapshot();
        let map = data.as_object().unwrap();
        assert_eq!(map.len(), mesh.len());
        let record = map.get("0").unwrap().as_object().unwrap();
        for field in [
            "area",
            "volume",
            "bending_energy_unit",
            "position",
            "curvature_vec",
            "neighbor_ids",
            "proximity_ids",
        ] {
            assert!(record.contains_key(field), "missing field {field}");
        }
        assert_eq!(record.get("position").unwrap().as_array().unwrap().len(), 3);
    }

    #[test]
    fn reload_reproduces_the_mesh() {
        let mesh = sphere();
        let reloaded = Mesh::from_snapshot(&mesh.snapshot(), mesh.proximity_radius()).unwrap();
        assert_eq!(reloaded.len(), mesh.len());
        for (node, original) in reloaded.nodes().zip(mesh.nodes()) {
            assert_eq!(node.neighbor_ids(), original.neighbor_ids());
            assert_eq!(node.proximity_ids(), original.proximity_ids());
            assert!((node.position() - original.position()).norm() < 1e-15);
            assert!((node.area() - original.area()).abs() < 1e-12);
            assert!((node.volume() - original.volume()).abs() < 1e-12);
        }
        let global = reloaded.global_geometry();
        let original = mesh.global_geometry();
        assert!((global.area - original.area).abs() < 1e-12);
        assert!((global.volume - original.volume).abs() < 1e-12);
    }

    #[test]
    fn reload_survives_a_json_round_trip_through_text() {
        let mesh = sphere();
        let text = serde_json::to_string(&mesh.snapshot()).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        let reloaded = Mesh::from_snapshot(&value, 0.8).unwrap();
        assert_eq!(reloaded.len(), mesh.len());
    }

    // ── malformed input ──

    #[test]
    fn non_object_root_is_rejected() {
        assert!(Mesh::from_snapshot(&json!([1, 2, 3]), 1.0).is_err());
    }

    #[test]
    fn non_decimal_key_is_rejected() {
        let mesh = sphere();
        let mut data = mesh.snapshot();
        let map = data.as_object_mut().unwrap();
        let record = map.remove("0").unwrap();
        map.insert("zero".into(), record);
        assert!(Mesh::from_snapshot(&data, 1.0).is_err());
    }

    #[test]
    fn sparse_ids_are_rejected() {
        let mesh = sphere();
        let mut data = mesh.snapshot();
        let map = data.as_object_mut().unwrap();
        let record = map.remove("0").unwrap();
        map.insert("999".into(), record);
        assert!(Mesh::from_snapshot(&data, 1.0).is_err());
    }

    #[test]
    fn malformed_record_is_rejected() {
        let mesh = sphere();
        let mut data = mesh.snapshot();
        let map = data.as_object_mut().unwrap();
        map.insert("0".into(), json!({ "area": "not a number" }));
        assert!(Mesh::from_snapshot(&data, 1.0).is_err());
    }

    #[test]
    fn out_of_range_neighbor_is_rejected() {
        let mesh = sphere();
        let mut data = mesh.snapshot();
        let map = data.as_object_mut().unwrap();
        let record = map.get_mut("0").unwrap().as_object_mut().unwrap();
        record.insert("neighbor_ids".into(), json!([1, 2, 100_000]));
        assert!(Mesh::from_snapshot(&data, 1.0).is_err());
    }
}
