use std::{
    collections::{hash_map::Entry, HashMap},
    hash::{BuildHasherDefault, Hash, Hasher},
};

use bytemuck::Zeroable;
use tracing::debug;

use crate::{
    error::{MalformedMesh, MeshError},
    mesh::Vertex,
};

/// Marks original vertices that no triangle references.
pub const UNUSED: u32 = u32::MAX;

/// Checks that `indices` forms whole triangles over `vertex_count` vertices.
pub fn validate_triangles(indices: &[u32], vertex_count: usize) -> Result<(), MalformedMesh> {
    if indices.len() % 3 != 0 {
        return Err(MalformedMesh::IndexCount(indices.len()));
    }
    if let Some((position, &index)) = indices
        .iter()
        .enumerate()
        .find(|(_, &index)| index as usize >= vertex_count)
    {
        return Err(MalformedMesh::IndexOutOfRange {
            index,
            position,
            vertex_count,
        });
    }
    Ok(())
}

/// Full vertex record compared and hashed by its raw bytes, so that `-0.0`
/// and `0.0` stay distinct and equal NaN payloads merge.
struct VertexKey<'a>(&'a [u8]);

impl Hash for VertexKey<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write(self.0);
    }
}

impl PartialEq for VertexKey<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for VertexKey<'_> {}

#[derive(Default)]
struct VertexHasher {
    state: u64,
}

impl Hasher for VertexHasher {
    fn write(&mut self, bytes: &[u8]) {
        // MurmurHash2 over 32 bit words
        const M: u32 = 0x5bd1e995;
        const R: u32 = 24;

        let mut h = (self.state as u32) ^ bytes.len() as u32;
        let mut words = bytes.chunks_exact(4);
        for word in &mut words {
            let mut k = u32::from_ne_bytes([word[0], word[1], word[2], word[3]]);
            k = k.wrapping_mul(M);
            k ^= k >> R;
            k = k.wrapping_mul(M);

            h = h.wrapping_mul(M);
            h ^= k;
        }
        for &byte in words.remainder() {
            h ^= byte as u32;
            h = h.wrapping_mul(M);
        }

        h ^= h >> 13;
        h = h.wrapping_mul(M);
        h ^= h >> 15;

        self.state = h as u64;
    }

    fn finish(&self) -> u64 {
        self.state
    }
}

type BuildVertexHasher = BuildHasherDefault<VertexHasher>;

/// Original slot to canonical slot mapping.
#[derive(Debug, Clone)]
pub struct VertexRemap {
    table: Vec<u32>,
    vertex_count: usize,
}

impl VertexRemap {
    /// Canonical slot of every original vertex, [`UNUSED`] when unreferenced.
    pub fn table(&self) -> &[u32] {
        &self.table
    }

    /// Number of canonical vertices.
    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    pub fn remap_vertex_buffer(&self, vertices: &[Vertex]) -> Vec<Vertex> {
        let mut result = vec![Vertex::zeroed(); self.vertex_count];
        for (vertex, &slot) in vertices.iter().zip(&self.table) {
            if slot != UNUSED {
                result[slot as usize] = *vertex;
            }
        }
        result
    }

    pub fn remap_index_buffer(&self, indices: &[u32]) -> Vec<u32> {
        indices.iter().map(|&i| self.table[i as usize]).collect()
    }
}

/// Assigns one canonical slot per distinct referenced vertex, in order of
/// first occurrence in the index stream.
pub fn generate_vertex_remap(vertices: &[Vertex], indices: &[u32]) -> Result<VertexRemap, MeshError> {
    validate_triangles(indices, vertices.len())?;

    let mut table = vec![UNUSED; vertices.len()];
    let mut lookup: HashMap<VertexKey<'_>, u32, BuildVertexHasher> =
        HashMap::with_capacity_and_hasher(vertices.len(), BuildVertexHasher::default());
    let mut next = 0;

    for &index in indices {
        let index = index as usize;
        if table[index] != UNUSED {
            continue;
        }
        match lookup.entry(VertexKey(bytemuck::bytes_of(&vertices[index]))) {
            Entry::Occupied(entry) => table[index] = *entry.get(),
            Entry::Vacant(entry) => {
                entry.insert(next);
                table[index] = next;
                next += 1;
            }
        }
    }

    Ok(VertexRemap {
        table,
        vertex_count: next as usize,
    })
}

/// Collapses bit-identical vertices and rewrites the index list against the
/// canonical set. Triangle order and winding are untouched.
pub fn dedup(vertices: &[Vertex], indices: &[u32]) -> Result<(Vec<Vertex>, Vec<u32>), MeshError> {
    let remap = generate_vertex_remap(vertices, indices)?;
    debug!(
        "dedup: {} vertices -> {} canonical",
        vertices.len(),
        remap.vertex_count()
    );
    Ok((
        remap.remap_vertex_buffer(vertices),
        remap.remap_index_buffer(indices),
    ))
}
