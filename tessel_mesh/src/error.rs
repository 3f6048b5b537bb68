use std::collections::TryReserveError;

/// Errors produced while turning one sub-mesh into meshlets.
///
/// Every variant is scoped to a single sub-mesh: callers skip the mesh and
/// carry on with its siblings.
#[derive(Debug, thiserror::Error)]
pub enum MeshError {
    #[error("malformed mesh: {0}")]
    Malformed(#[from] MalformedMesh),

    #[error("meshlet build failed: {0}")]
    MeshletBuild(#[from] MeshletBuildError),

    #[error("out of memory allocating {len} elements for {buffer}")]
    OutOfMemory {
        buffer: &'static str,
        len: usize,
        #[source]
        source: TryReserveError,
    },
}

/// Bad cardinality or references coming out of ingestion.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MalformedMesh {
    #[error("index count {0} is not a multiple of 3")]
    IndexCount(usize),

    #[error("index {index} at position {position} is out of range for {vertex_count} vertices")]
    IndexOutOfRange {
        index: u32,
        position: usize,
        vertex_count: usize,
    },

    #[error("{attribute} has {found} entries, expected {expected}")]
    AttributeCount {
        attribute: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("{0} vertices cannot be addressed with 32-bit indices")]
    TooManyVertices(usize),

    #[error("required attribute {0} is missing")]
    MissingAttribute(&'static str),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MeshletBuildError {
    #[error("max_vertices must be within 3..=255, got {0}")]
    MaxVertices(usize),

    #[error("max_triangles must be within 1..=512 and divisible by 4, got {0}")]
    MaxTriangles(usize),

    #[error("cone_weight must be within [0, 1], got {0}")]
    ConeWeight(f32),

    #[error("meshlet count exceeded the precomputed bound of {0}")]
    BoundExceeded(usize),
}
