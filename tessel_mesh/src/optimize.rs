use crate::{
    adjacency::TriangleAdjacency,
    error::MeshError,
    mesh::Vertex,
    remap::{validate_triangles, UNUSED},
};

/// Largest modelled cache; also the length of the cache score table.
pub const CACHE_SIZE_MAX: usize = 16;
const VALENCE_MAX: usize = 8;

// Tuned score tables: index 0 of CACHE_SCORES is "not in cache", index 0 of
// LIVE_SCORES is "no remaining triangles".
const CACHE_SCORES: [f32; 1 + CACHE_SIZE_MAX] = [
    0.0, 0.779, 0.791, 0.789, 0.981, 0.843, 0.726, 0.847, 0.882, 0.867, 0.799, 0.642, 0.613,
    0.600, 0.568, 0.372, 0.234,
];
const LIVE_SCORES: [f32; 1 + VALENCE_MAX] =
    [0.0, 0.995, 0.713, 0.450, 0.404, 0.059, 0.005, 0.147, 0.006];

fn vertex_score(cache_position: Option<usize>, live_triangles: u32) -> f32 {
    let live = (live_triangles as usize).min(VALENCE_MAX);
    LIVE_SCORES[live] + CACHE_SCORES[cache_position.map_or(0, |p| p + 1)]
}

/// Reorders triangles so that consecutive triangles reuse recently
/// transformed vertices. Each triangle keeps its own vertex order.
pub fn optimize_vertex_cache(
    indices: &[u32],
    vertex_count: usize,
    cache_size: usize,
) -> Result<Vec<u32>, MeshError> {
    validate_triangles(indices, vertex_count)?;

    let face_count = indices.len() / 3;
    if face_count == 0 {
        return Ok(Vec::new());
    }
    let cache_size = cache_size.clamp(3, CACHE_SIZE_MAX);

    let mut adjacency = TriangleAdjacency::new(indices, vertex_count);
    let mut live_triangles = adjacency.counts.clone();

    let mut vertex_scores: Vec<f32> = live_triangles
        .iter()
        .map(|&live| vertex_score(None, live))
        .collect();
    let mut triangle_scores: Vec<f32> = indices
        .chunks_exact(3)
        .map(|t| t.iter().map(|&v| vertex_scores[v as usize]).sum())
        .collect();

    let mut emitted = vec![false; face_count];
    let mut cache: Vec<u32> = Vec::with_capacity(cache_size + 3);
    let mut cache_new: Vec<u32> = Vec::with_capacity(cache_size + 3);
    let mut destination = Vec::with_capacity(indices.len());

    let mut current = Some(0);
    let mut input_cursor = 1;

    while let Some(triangle) = current {
        let corners = [
            indices[triangle * 3],
            indices[triangle * 3 + 1],
            indices[triangle * 3 + 2],
        ];
        destination.extend_from_slice(&corners);
        emitted[triangle] = true;
        triangle_scores[triangle] = 0.0;

        // the new triangle's vertices move to the front, the rest shift back
        cache_new.clear();
        cache_new.extend_from_slice(&corners);
        cache_new.extend(cache.iter().filter(|&&v| !corners.contains(&v)));
        std::mem::swap(&mut cache, &mut cache_new);

        for &vertex in &corners {
            adjacency.remove(vertex as usize, triangle as u32);
            live_triangles[vertex as usize] -= 1;
        }

        // rescore everything the cache touched; entries pushed past the end are
        // scored as evicted
        let mut best = None;
        let mut best_score = 0.0;
        for (position, &vertex) in cache.iter().enumerate() {
            let vertex = vertex as usize;
            if live_triangles[vertex] == 0 {
                continue;
            }
            let cache_position = (position < cache_size).then_some(position);
            let score = vertex_score(cache_position, live_triangles[vertex]);
            let diff = score - vertex_scores[vertex];
            vertex_scores[vertex] = score;

            for &face in adjacency.faces(vertex) {
                let face = face as usize;
                let face_score = triangle_scores[face] + diff;
                if best_score < face_score {
                    best = Some(face);
                    best_score = face_score;
                }
                triangle_scores[face] = face_score;
            }
        }
        cache.truncate(cache_size);

        current = best.or_else(|| {
            while input_cursor < face_count {
                if !emitted[input_cursor] {
                    return Some(input_cursor);
                }
                input_cursor += 1;
            }
            None
        });
    }

    Ok(destination)
}

/// Relabels vertices in order of first use by `indices` and rewrites the
/// indices in place. Vertices no triangle references follow in their original
/// order, so the returned array is always a permutation of `vertices`.
pub fn optimize_vertex_fetch(
    vertices: &[Vertex],
    indices: &mut [u32],
) -> Result<Vec<Vertex>, MeshError> {
    validate_triangles(indices, vertices.len())?;

    let mut remap = vec![UNUSED; vertices.len()];
    let mut result = Vec::with_capacity(vertices.len());

    for index in indices.iter_mut() {
        let vertex = *index as usize;
        if remap[vertex] == UNUSED {
            remap[vertex] = result.len() as u32;
            result.push(vertices[vertex]);
        }
        *index = remap[vertex];
    }

    result.extend(
        vertices
            .iter()
            .zip(&remap)
            .filter(|(_, &slot)| slot == UNUSED)
            .map(|(vertex, _)| *vertex),
    );

    Ok(result)
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct VertexCacheStatistics {
    pub vertices_transformed: usize,
    /// Transformed vertices per triangle; 0.5 is the ideal for regular grids, 3 the worst.
    pub acmr: f32,
    /// Transformed vertices per referenced vertex; 1 is optimal.
    pub atvr: f32,
}

/// Simulates a FIFO post-transform cache of `cache_size` entries.
pub fn analyze_vertex_cache(
    indices: &[u32],
    vertex_count: usize,
    cache_size: usize,
) -> Result<VertexCacheStatistics, MeshError> {
    validate_triangles(indices, vertex_count)?;

    let cache_size = cache_size.max(1) as u64;
    let mut timestamps = vec![0u64; vertex_count];
    let mut referenced = vec![false; vertex_count];
    let mut timestamp = cache_size + 1;
    let mut transformed = 0;

    for &index in indices {
        let vertex = index as usize;
        referenced[vertex] = true;
        if timestamp - timestamps[vertex] > cache_size {
            timestamps[vertex] = timestamp;
            timestamp += 1;
            transformed += 1;
        }
    }

    let triangle_count = indices.len() / 3;
    let unique = referenced.iter().filter(|&&r| r).count();
    Ok(VertexCacheStatistics {
        vertices_transformed: transformed,
        acmr: if triangle_count == 0 {
            0.0
        } else {
            transformed as f32 / triangle_count as f32
        },
        atvr: if unique == 0 {
            0.0
        } else {
            transformed as f32 / unique as f32
        },
    })
}
