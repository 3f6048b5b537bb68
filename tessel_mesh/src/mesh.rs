use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};

use crate::{
    error::{MalformedMesh, MeshError},
    meshlet::{Meshlet, MeshletSet},
    remap::validate_triangles,
};

/// Interleaved vertex as read by the mesh shading stage.
///
/// The padding keeps every attribute on a 16 byte boundary; `pad0` doubles as
/// the `w` of the position and is always `1.0`.
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Vertex {
    pub position: Vec3,
    pub pad0: f32,
    pub normal: Vec3,
    pub pad1: f32,
    pub uv: Vec2,
    pub pad2: Vec2,
}

impl Vertex {
    pub fn new(position: Vec3, normal: Vec3, uv: Vec2) -> Self {
        Self {
            position,
            pad0: 1.0,
            normal,
            pad1: 0.0,
            uv,
            pad2: Vec2::ZERO,
        }
    }
}

/// Per-mesh uniform data bound next to the storage buffers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct MeshProperties {
    pub meshlet_count: u32,
    pub pad: [u32; 3],
}

/// Attribute streams of one sub-mesh as handed over by an importer.
#[derive(Debug, Clone, Default)]
pub struct RawMesh {
    pub name: String,
    pub positions: Vec<[f32; 3]>,
    /// May be empty, in which case smooth normals are generated.
    pub normals: Vec<[f32; 3]>,
    /// First texture coordinate set only.
    pub tex_coords: Option<Vec<[f32; 2]>>,
    pub indices: Vec<u32>,
}

impl RawMesh {
    /// Builds the interleaved vertex array, validating attribute and index
    /// cardinality on the way.
    pub fn interleave(&self) -> Result<Vec<Vertex>, MeshError> {
        let vertex_count = self.positions.len();
        if u32::try_from(vertex_count).is_err() {
            return Err(MalformedMesh::TooManyVertices(vertex_count).into());
        }
        validate_triangles(&self.indices, vertex_count)?;

        let generated;
        let normals = if self.normals.is_empty() && vertex_count > 0 {
            generated = generate_normals(&self.positions, &self.indices);
            &generated
        } else {
            &self.normals
        };
        check_attribute("normals", vertex_count, normals.len())?;
        if let Some(uvs) = &self.tex_coords {
            check_attribute("tex_coords", vertex_count, uvs.len())?;
        }

        let vertices = (0..vertex_count)
            .map(|i| {
                Vertex::new(
                    Vec3::from_array(self.positions[i]),
                    Vec3::from_array(normals[i]),
                    self.tex_coords
                        .as_ref()
                        .map(|uvs| Vec2::from_array(uvs[i]))
                        .unwrap_or(Vec2::ZERO),
                )
            })
            .collect();
        Ok(vertices)
    }
}

fn check_attribute(
    attribute: &'static str,
    expected: usize,
    found: usize,
) -> Result<(), MalformedMesh> {
    if expected != found {
        return Err(MalformedMesh::AttributeCount {
            attribute,
            expected,
            found,
        });
    }
    Ok(())
}

/// Area weighted vertex normals. Indices must already be validated.
pub fn generate_normals(positions: &[[f32; 3]], indices: &[u32]) -> Vec<[f32; 3]> {
    let mut accumulated = vec![Vec3::ZERO; positions.len()];
    for triangle in indices.chunks_exact(3) {
        let [a, b, c] = [triangle[0], triangle[1], triangle[2]].map(|i| i as usize);
        let p0 = Vec3::from_array(positions[a]);
        let p1 = Vec3::from_array(positions[b]);
        let p2 = Vec3::from_array(positions[c]);
        // unnormalized cross product is proportional to the triangle area
        let face = (p1 - p0).cross(p2 - p0);
        accumulated[a] += face;
        accumulated[b] += face;
        accumulated[c] += face;
    }
    accumulated
        .into_iter()
        .map(|n| n.normalize_or_zero().to_array())
        .collect()
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BufferKind {
    Storage,
    Uniform,
}

/// A borrowed view of one output array, ready to be bound at a fixed slot.
#[derive(Clone, Copy, Debug)]
pub struct BufferBinding<'a> {
    pub binding: u32,
    pub kind: BufferKind,
    pub bytes: &'a [u8],
}

pub const VERTEX_BUFFER_BINDING: u32 = 0;
pub const MESHLET_BUFFER_BINDING: u32 = 1;
pub const MESHLET_VERTEX_BUFFER_BINDING: u32 = 2;
pub const MESHLET_PRIMITIVE_BUFFER_BINDING: u32 = 3;
pub const MESH_PROPERTY_BUFFER_BINDING: u32 = 4;

/// Fully processed sub-mesh. Immutable once built.
#[derive(Debug)]
pub struct MeshletMesh {
    name: String,
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
    meshlets: MeshletSet,
    properties: MeshProperties,
}

/// Owned arrays of a [`MeshletMesh`], for handing over to a renderer.
#[derive(Debug)]
pub struct MeshletMeshParts {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub meshlets: Vec<Meshlet>,
    pub meshlet_vertices: Vec<u32>,
    pub meshlet_primitives: Vec<u8>,
    pub meshlet_count: usize,
}

impl MeshletMesh {
    pub fn new(
        name: impl Into<String>,
        vertices: Vec<Vertex>,
        indices: Vec<u32>,
        meshlets: MeshletSet,
    ) -> Self {
        let properties = MeshProperties {
            meshlet_count: meshlets.len() as u32,
            pad: [0; 3],
        };
        Self {
            name: name.into(),
            vertices,
            indices,
            meshlets,
            properties,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn meshlet_set(&self) -> &MeshletSet {
        &self.meshlets
    }

    pub fn meshlets(&self) -> &[Meshlet] {
        self.meshlets.meshlets()
    }

    pub fn meshlet_vertices(&self) -> &[u32] {
        self.meshlets.vertices()
    }

    pub fn meshlet_primitives(&self) -> &[u8] {
        self.meshlets.triangles()
    }

    pub fn meshlet_count(&self) -> usize {
        self.meshlets.len()
    }

    pub fn properties(&self) -> &MeshProperties {
        &self.properties
    }

    /// Byte views of the five output arrays in binding order.
    pub fn buffers(&self) -> [BufferBinding<'_>; 5] {
        [
            BufferBinding {
                binding: VERTEX_BUFFER_BINDING,
                kind: BufferKind::Storage,
                bytes: bytemuck::cast_slice(&self.vertices),
            },
            BufferBinding {
                binding: MESHLET_BUFFER_BINDING,
                kind: BufferKind::Storage,
                bytes: bytemuck::cast_slice(self.meshlets.meshlets()),
            },
            BufferBinding {
                binding: MESHLET_VERTEX_BUFFER_BINDING,
                kind: BufferKind::Storage,
                bytes: bytemuck::cast_slice(self.meshlets.vertices()),
            },
            BufferBinding {
                binding: MESHLET_PRIMITIVE_BUFFER_BINDING,
                kind: BufferKind::Storage,
                bytes: self.meshlets.triangles(),
            },
            BufferBinding {
                binding: MESH_PROPERTY_BUFFER_BINDING,
                kind: BufferKind::Uniform,
                bytes: bytemuck::bytes_of(&self.properties),
            },
        ]
    }

    pub fn into_parts(self) -> MeshletMeshParts {
        let meshlet_count = self.meshlets.len();
        let (meshlets, meshlet_vertices, meshlet_primitives) = self.meshlets.into_parts();
        MeshletMeshParts {
            vertices: self.vertices,
            indices: self.indices,
            meshlets,
            meshlet_vertices,
            meshlet_primitives,
            meshlet_count,
        }
    }
}
