use thiserror::Error;

/// Top-level error type for the velum membrane engine.
#[derive(Debug, Error)]
pub enum VelumError {
    #[error(transparent)]
    Seed(#[from] SeedError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

/// Errors raised while seeding an initial triangulation.
#[derive(Debug, Error)]
pub enum SeedError {
    #[error("parameter {parameter} = {value} is out of range [{min}, {max}]")]
    ParameterOutOfRange {
        parameter: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("grid must have at least 2 nodes per side, got {n_x} x {n_y}")]
    GridTooSmall { n_x: usize, n_y: usize },
}

/// Errors raised while rebuilding a mesh from snapshot data.
///
/// All of these are fatal at construction time; a mesh is never handed out
/// in a partially loaded state.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot root is not a JSON object of node records")]
    NotAnObject,

    #[error("node key {0:?} is not a decimal node id")]
    BadNodeKey(String),

    #[error("node ids are not dense in [0, {count}): id {id} out of range")]
    IdOutOfRange { id: usize, count: usize },

    #[error("duplicate record for node {0}")]
    DuplicateNode(usize),

    #[error("node {id} references out-of-range neighbor {neighbor}")]
    NeighborOutOfRange { id: usize, neighbor: usize },

    #[error("malformed record for node {id}")]
    BadRecord {
        id: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Convenience type alias for results using [`VelumError`].
pub type Result<T> = std::result::Result<T, VelumError>;
