use rayon::prelude::*;
use tracing::{debug, debug_span, warn};

use crate::{
    config::PipelineConfig,
    error::MeshError,
    mesh::{MeshletMesh, RawMesh},
    meshlet::build_meshlets,
    optimize::{analyze_vertex_cache, optimize_vertex_cache, optimize_vertex_fetch},
    remap::dedup,
};

/// Runs one sub-mesh through dedup, locality optimization and meshlet
/// building. Either every output buffer is produced or none is.
pub fn process_mesh(raw: &RawMesh, config: &PipelineConfig) -> Result<MeshletMesh, MeshError> {
    let _span = debug_span!("process_mesh", name = %raw.name).entered();
    config.validate()?;

    let vertices = raw.interleave()?;
    let (vertices, indices) = dedup(&vertices, &raw.indices)?;

    let cache_size = config.vertex_cache_size;
    let optimized = optimize_vertex_cache(&indices, vertices.len(), cache_size)?;
    if tracing::enabled!(tracing::Level::DEBUG) {
        let before = analyze_vertex_cache(&indices, vertices.len(), cache_size)?;
        let after = analyze_vertex_cache(&optimized, vertices.len(), cache_size)?;
        debug!(
            "acmr {:.3} -> {:.3}, atvr {:.3} -> {:.3}",
            before.acmr, after.acmr, before.atvr, after.atvr
        );
    }
    let mut indices = optimized;
    let vertices = optimize_vertex_fetch(&vertices, &mut indices)?;

    let meshlets = build_meshlets(&vertices, &indices, &config.meshlet)?;
    debug!(
        vertices = vertices.len(),
        triangles = indices.len() / 3,
        meshlets = meshlets.len(),
        "built meshlets"
    );

    Ok(MeshletMesh::new(raw.name.clone(), vertices, indices, meshlets))
}

/// Outcome of [`process_meshes`]. Successful meshes keep their input order;
/// each failure carries the index of the input it came from.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub meshes: Vec<(usize, MeshletMesh)>,
    pub failures: Vec<(usize, MeshError)>,
}

impl BatchReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Processes every sub-mesh in parallel. A failing sub-mesh is reported and
/// skipped; it never affects its siblings.
pub fn process_meshes(raws: &[RawMesh], config: &PipelineConfig) -> BatchReport {
    let results: Vec<Result<MeshletMesh, MeshError>> = raws
        .par_iter()
        .map(|raw| process_mesh(raw, config))
        .collect();

    let mut report = BatchReport::default();
    for (idx, result) in results.into_iter().enumerate() {
        match result {
            Ok(mesh) => report.meshes.push((idx, mesh)),
            Err(e) => {
                warn!("skipping mesh {} ({:?}): {}", idx, raws[idx].name, e);
                report.failures.push((idx, e));
            }
        }
    }
    report
}
