//! Preprocessing of triangle meshes for mesh-shader rendering: vertex
//! deduplication, locality optimization, meshlet clustering and packaging of
//! the results into GPU-ready buffers.

mod adjacency;
pub mod asset;
pub mod bounds;
pub mod config;
pub mod error;
mod kdtree;
pub mod mesh;
pub mod meshlet;
pub mod optimize;
pub mod pipeline;
pub mod remap;
mod scratch;

pub use asset::{Assets, Handle};
pub use bounds::{compute_meshlet_bounds, MeshletBounds};
pub use config::PipelineConfig;
pub use error::{MalformedMesh, MeshError, MeshletBuildError};
pub use mesh::{BufferBinding, BufferKind, MeshProperties, MeshletMesh, RawMesh, Vertex};
pub use meshlet::{build_meshlets, build_meshlets_bound, Meshlet, MeshletConfig, MeshletSet};
pub use pipeline::{process_mesh, process_meshes, BatchReport};
