/// Vertex to triangle adjacency stored as one flat array with per-vertex
/// ranges. Entries are swap-removed as triangles get emitted, so lists only
/// ever shrink.
pub(crate) struct TriangleAdjacency {
    pub counts: Vec<u32>,
    offsets: Vec<u32>,
    data: Vec<u32>,
}

impl TriangleAdjacency {
    /// `indices` must already be validated against `vertex_count`.
    pub fn new(indices: &[u32], vertex_count: usize) -> Self {
        let mut counts = vec![0u32; vertex_count];
        for &index in indices {
            counts[index as usize] += 1;
        }

        let mut offsets = Vec::with_capacity(vertex_count);
        let mut offset = 0;
        for &count in &counts {
            offsets.push(offset);
            offset += count;
        }

        let mut data = vec![0u32; indices.len()];
        let mut fill = offsets.clone();
        for (face, triangle) in indices.chunks_exact(3).enumerate() {
            for &index in triangle {
                let slot = &mut fill[index as usize];
                data[*slot as usize] = face as u32;
                *slot += 1;
            }
        }

        Self {
            counts,
            offsets,
            data,
        }
    }

    pub fn faces(&self, vertex: usize) -> &[u32] {
        let start = self.offsets[vertex] as usize;
        &self.data[start..start + self.counts[vertex] as usize]
    }

    pub fn remove(&mut self, vertex: usize, face: u32) {
        let start = self.offsets[vertex] as usize;
        let count = self.counts[vertex] as usize;
        let faces = &mut self.data[start..start + count];
        if let Some(position) = faces.iter().position(|&f| f == face) {
            faces.swap(position, count - 1);
            self.counts[vertex] -= 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adjacency() {
        let indices = [0, 1, 2, 2, 1, 3];
        let mut adjacency = TriangleAdjacency::new(&indices, 4);
        assert_eq!(adjacency.faces(0), &[0]);
        assert_eq!(adjacency.faces(1), &[0, 1]);
        assert_eq!(adjacency.faces(3), &[1]);

        adjacency.remove(1, 0);
        assert_eq!(adjacency.faces(1), &[1]);
        adjacency.remove(1, 7);
        assert_eq!(adjacency.faces(1), &[1]);
    }
}
